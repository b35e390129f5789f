//! RS485 UART adapter.
//!
//! Implements [`SerialPort`] on top of the ESP-IDF UART driver.  The
//! transceiver switches direction on its own, so the UART runs in plain
//! mode with no RTS/DE handling.
//!
//! - **`target_os = "espidf"`**: `uart_*` driver calls, non-blocking reads
//!   out of the driver's RX ring buffer.
//! - **all other targets**: an in-memory line with injectable RX bytes.

use core::fmt;

use log::info;

use crate::app::ports::SerialPort;
use crate::config::{Parity, SerialSettings};
#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Ticks to wait for the TX FIFO to drain in `flush`.
#[cfg(target_os = "espidf")]
const TX_DONE_TIMEOUT_TICKS: u32 = 100;

#[cfg(target_os = "espidf")]
const PIN_NO_CHANGE: i32 = -1;

/// UART driver error carrying the ESP-IDF return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartError(pub i32);

impl fmt::Display for UartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UART driver error (rc={})", self.0)
    }
}

pub struct UartAdapter {
    #[cfg(target_os = "espidf")]
    port: uart_port_t,
    #[cfg(not(target_os = "espidf"))]
    rx: std::collections::VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    tx: Vec<u8>,
}

impl UartAdapter {
    /// Install the driver on the RS485 port with `settings`.
    #[cfg(target_os = "espidf")]
    pub fn new(settings: &SerialSettings) -> Result<Self, UartError> {
        let port = pins::RS485_UART_PORT as uart_port_t;
        let cfg = uart_config_t {
            baud_rate: settings.baud_rate as i32,
            data_bits: uart_word_length_t_UART_DATA_8_BITS,
            parity: match settings.parity {
                Parity::None => uart_parity_t_UART_PARITY_DISABLE,
                Parity::Even => uart_parity_t_UART_PARITY_EVEN,
                Parity::Odd => uart_parity_t_UART_PARITY_ODD,
            },
            stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
            flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
            ..Default::default()
        };

        // SAFETY: the RS485 port is configured once at boot and owned by
        // this adapter afterwards.
        unsafe {
            check(uart_driver_install(
                port,
                pins::RS485_RX_BUFFER,
                0,
                0,
                core::ptr::null_mut(),
                0,
            ))?;
            check(uart_param_config(port, &cfg))?;
            check(uart_set_pin(
                port,
                pins::RS485_TX_GPIO,
                pins::RS485_RX_GPIO,
                PIN_NO_CHANGE,
                PIN_NO_CHANGE,
            ))?;
        }
        info!(
            "UartAdapter: UART{} {} baud 8{}1",
            port,
            settings.baud_rate,
            parity_letter(settings)
        );
        Ok(Self { port })
    }

    /// Simulated line (host builds).
    #[cfg(not(target_os = "espidf"))]
    pub fn new(settings: &SerialSettings) -> Result<Self, UartError> {
        info!(
            "UartAdapter(sim): {} baud 8{}1",
            settings.baud_rate,
            parity_letter(settings)
        );
        Ok(Self {
            rx: std::collections::VecDeque::new(),
            tx: Vec::new(),
        })
    }

    /// Simulation: queue bytes as if they arrived on the line.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Simulation: everything written so far, draining the capture.
    #[cfg(not(target_os = "espidf"))]
    pub fn take_written(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.tx)
    }
}

fn parity_letter(settings: &SerialSettings) -> char {
    match settings.parity {
        Parity::None => 'N',
        Parity::Even => 'E',
        Parity::Odd => 'O',
    }
}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t) -> Result<(), UartError> {
    if ret == ESP_OK {
        Ok(())
    } else {
        Err(UartError(ret))
    }
}

// ───────────────────────────────────────────────────────────────
// SerialPort
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl SerialPort for UartAdapter {
    type Error = UartError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UartError> {
        // SAFETY: `buf` is valid for `buf.len()` bytes; zero ticks means
        // the call returns whatever the ring buffer holds right now.
        let n = unsafe {
            uart_read_bytes(
                self.port,
                buf.as_mut_ptr() as *mut _,
                buf.len() as u32,
                0,
            )
        };
        if n < 0 {
            return Err(UartError(n));
        }
        Ok(n as usize)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), UartError> {
        let n = unsafe { uart_write_bytes(self.port, data.as_ptr() as *const _, data.len()) };
        if n < 0 || n as usize != data.len() {
            return Err(UartError(n));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), UartError> {
        check(unsafe { uart_wait_tx_done(self.port, TX_DONE_TIMEOUT_TICKS) })
    }
}

#[cfg(not(target_os = "espidf"))]
impl SerialPort for UartAdapter {
    type Error = UartError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UartError> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), UartError> {
        self.tx.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), UartError> {
        Ok(())
    }
}
