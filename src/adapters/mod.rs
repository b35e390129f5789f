//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements              | Connects to               |
//! |------------|-------------------------|---------------------------|
//! | `log_sink` | EventSink               | Serial console log        |
//! | `nvs`      | ConfigPort, MappingPort | NVS / in-memory store     |
//! | `time`     | Clock                   | ESP32 high-res timer      |
//! | `uart`     | SerialPort              | RS485 transceiver (UART1) |
//! | `wifi`     | NetworkPort             | ESP-IDF WiFi driver       |
//!
//! The probe bus is served by [`SensorHub`](crate::sensors::SensorHub)
//! over the GPIO 1-Wire driver.

pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uart;
pub mod wifi;
