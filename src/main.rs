//! BLE Simulator Firmware — Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BleAdapter        MqttTransport     LogEventSink              │
//! │  (BleStackPort)    (EventSink)       (EventSink)               │
//! │  WifiAdapter       MonotonicClock                              │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              SimulatorCore (pure logic)                │    │
//! │  │  Radio FSM · GATT profile · Values · Scheduler         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  NimBLE host task ──▶ StackEventQueue ──▶ main loop            │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use blesim::adapters::ble::BleAdapter;
use blesim::adapters::device_id;
use blesim::adapters::log_sink::LogEventSink;
use blesim::adapters::mqtt::{InboundChannel, MqttTransport};
use blesim::adapters::time::MonotonicClock;
use blesim::adapters::wifi::WifiAdapter;
use blesim::app::commands::{Command, Connectivity};
use blesim::app::service::SimulatorCore;
use blesim::config::{FIRMWARE_VERSION, NetworkConfig, SimConfig};
use blesim::events::StackEventQueue;

/// Filled by NimBLE callbacks, drained by the main loop.
static STACK_EVENTS: StackEventQueue = StackEventQueue::new();

/// Filled by the MQTT client task, drained by the main loop.
static MQTT_INBOUND: InboundChannel = InboundChannel::new();

/// Main loop period.
const LOOP_PERIOD_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  BLE Simulator v{}                  ║", FIRMWARE_VERSION);
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = SimConfig::default();
    config.validate()?;
    let network = NetworkConfig::from_build_env();

    let mac = device_id::read_mac();
    let dev_id = if network.device_id.is_empty() {
        device_id::device_id(&mac)
    } else {
        let mut id = device_id::DeviceIdString::new();
        for c in network.device_id.chars() {
            if id.push(c).is_err() {
                break;
            }
        }
        id
    };
    info!("Device ID: {}", dev_id);

    // ── 3. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let clock = MonotonicClock::new();
    let mut wifi = WifiAdapter::new(BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?,
        sys_loop,
    )?);
    if network.wifi_configured() {
        wifi.set_credentials(&network.wifi_ssid, &network.wifi_password)?;
        if let Err(e) = wifi.connect(clock.uptime_ms()) {
            warn!("WiFi unavailable ({}), retrying in background", e);
        }
    } else {
        warn!("No WiFi credentials baked in; MQTT control disabled");
    }

    let mut mqtt = MqttTransport::new(&dev_id, &network, &MQTT_INBOUND);

    // ── 4. Simulator core ─────────────────────────────────────
    let mut ble = BleAdapter::new(&STACK_EVENTS);
    let mut log_sink = LogEventSink::new();
    let mut core = SimulatorCore::new(config);
    core.start(clock.uptime_ms(), &mut ble, &mut (&mut log_sink, &mut mqtt));

    info!("System ready. Entering event loop.");

    // ── 5. Event loop ─────────────────────────────────────────
    loop {
        let now = clock.uptime_ms();

        // Link supervision
        let mut links_changed = wifi.poll(now);
        if network.mqtt_configured() {
            links_changed |= mqtt.poll(now, wifi.is_connected());
        }
        if links_changed {
            let links = Connectivity {
                wifi: wifi.is_connected(),
                mqtt: mqtt.is_connected(),
                ip: wifi.ip().clone(),
            };
            core.handle_command(
                Command::ReportConnectivity(links),
                now,
                &mut ble,
                &mut (&mut log_sink, &mut mqtt),
            );
        }

        // MQTT commands
        while let Some(decoded) = mqtt.next_command() {
            let mut sink = (&mut log_sink, &mut mqtt);
            match decoded {
                Ok(command) => core.handle_command(command, now, &mut ble, &mut sink),
                Err(e) => core.reject(e, &mut sink),
            }
        }

        // Stack events, timers, notify and status cadences
        core.poll(now, &STACK_EVENTS, &mut ble, &mut (&mut log_sink, &mut mqtt));

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
