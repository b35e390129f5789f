//! Bus node firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  UartAdapter    SystemClock   SensorHub      NvsAdapter        │
//! │  (SerialPort)   (Clock)       (SensorPort)   (Config+Mapping)  │
//! │  WifiAdapter    LogEventSink                                   │
//! │  (NetworkPort)  (EventSink)                                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Bus arbitration · Command engine · Scheduler          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use log::info;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::wifi::EspWifi;

use busnode::adapters::log_sink::LogEventSink;
use busnode::adapters::nvs::NvsAdapter;
use busnode::adapters::time::SystemClock;
use busnode::adapters::uart::UartAdapter;
use busnode::adapters::wifi::WifiAdapter;
use busnode::app::ports::{Clock, NodePorts};
use busnode::app::service::{NodeService, load_config};
use busnode::diagnostics::{self, RuntimeMetrics, SUMMARY_INTERVAL_MS};
use busnode::drivers::onewire_gpio::OneWireGpio;
use busnode::drivers::watchdog::Watchdog;
use busnode::pins;
use busnode::sensors::SensorHub;

/// Yield between main-loop iterations (ms).
const LOOP_YIELD_MS: u32 = 1;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  BusNode v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let watchdog = Watchdog::subscribe();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {e}"))?;
    let config = load_config(&nvs);

    // ── 3. Construct adapters ─────────────────────────────────
    let serial = UartAdapter::new(&config.serial).map_err(|e| anyhow!("RS485 UART: {e}"))?;
    let onewire =
        OneWireGpio::new(pins::ONEWIRE_GPIO).map_err(|e| anyhow!("1-Wire GPIO: {:?}", e))?;
    let mut sensors = SensorHub::new(onewire);
    sensors.prime();
    info!("Sensors: {} probe(s) ready", sensors.count());

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let driver = EspWifi::new(peripherals.modem, sysloop, None)?;
    let mut wifi = WifiAdapter::with_driver(driver);

    let mut log_sink = LogEventSink::new();
    let uptime = SystemClock::new();

    // SAFETY: esp_random reads the hardware RNG.
    let seed = unsafe {
        u64::from(esp_idf_svc::sys::esp_random()) << 32 | u64::from(esp_idf_svc::sys::esp_random())
    };

    // ── 4. Construct node service ─────────────────────────────
    let mut node = NodeService::new(config, serial, SystemClock::new(), seed);
    let mut ports = NodePorts {
        sensors: &mut sensors,
        network: &mut wifi,
        store: &nvs,
        sink: &mut log_sink,
    };
    node.start(&mut ports);

    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    let mut next_summary_ms = SUMMARY_INTERVAL_MS;
    loop {
        node.tick(&mut ports);

        let now_ms = uptime.now_ms();
        if now_ms >= next_summary_ms {
            let metrics = RuntimeMetrics::collect(uptime.uptime_secs());
            diagnostics::log_summary(node.stats(), &metrics);
            next_summary_ms = now_ms + SUMMARY_INTERVAL_MS;
        }

        watchdog.feed();
        FreeRtos::delay_ms(LOOP_YIELD_MS);
    }
}
