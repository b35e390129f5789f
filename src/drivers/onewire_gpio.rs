//! Bit-banged 1-Wire master on a single open-drain GPIO.
//!
//! Standard-speed slot timing (µs):
//!
//! | Slot | Low | Sample | Total |
//! |---|---|---|---|
//! | reset | 480 | 70 | 960 |
//! | write 1 | 6 | | 70 |
//! | write 0 | 60 | | 70 |
//! | read | 6 | 15 | 70 |
//!
//! Slots run with interrupts masked so an interrupt cannot stretch
//! the low pulse of a `write 1` into a `write 0`.

use esp_idf_svc::sys::*;

use crate::sensors::onewire::OneWireBus;

/// GPIO driver error carrying the ESP-IDF return code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub i32);

pub struct OneWireGpio {
    pin: i32,
}

impl OneWireGpio {
    /// Configure `pin` as open-drain input/output, released high.
    pub fn new(pin: i32) -> Result<Self, GpioError> {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: configures a pin owned exclusively by this driver.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(GpioError(ret));
        }
        unsafe { gpio_set_level(pin, 1) };
        log::info!("OneWireGpio: bus on GPIO{}", pin);
        Ok(Self { pin })
    }

    fn low(&self) {
        // SAFETY: level write on our own open-drain pin.
        unsafe { gpio_set_level(self.pin, 0) };
    }

    fn release(&self) {
        unsafe { gpio_set_level(self.pin, 1) };
    }

    fn sample(&self) -> bool {
        (unsafe { gpio_get_level(self.pin) }) != 0
    }

    fn delay_us(us: u32) {
        unsafe { esp_rom_delay_us(us) };
    }

    fn slot<T>(f: impl FnOnce() -> T) -> T {
        esp_idf_hal::interrupt::free(f)
    }
}

impl OneWireBus for OneWireGpio {
    type Error = GpioError;

    fn reset(&mut self) -> Result<bool, GpioError> {
        self.low();
        Self::delay_us(480);
        let present = Self::slot(|| {
            self.release();
            Self::delay_us(70);
            !self.sample()
        });
        Self::delay_us(410);
        Ok(present)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), GpioError> {
        let (low, high) = if bit { (6, 64) } else { (60, 10) };
        Self::slot(|| {
            self.low();
            Self::delay_us(low);
            self.release();
        });
        Self::delay_us(high);
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, GpioError> {
        let bit = Self::slot(|| {
            self.low();
            Self::delay_us(6);
            self.release();
            Self::delay_us(9);
            self.sample()
        });
        Self::delay_us(55);
        Ok(bit)
    }
}
