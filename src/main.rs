//! FilterChlorine node firmware: main entry point.
//!
//! Hexagonal architecture driven by a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        WifiAdapter    MqttAdapter   Clock     │
//! │  (Sensor+Actuator+LED)  (LinkDriver)   (BrokerClient)          │
//! │  LogEventSink           console thread (NodeCommand)           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │             NodeService (pure logic)                   │    │
//! │  │  SampleTimer · MotorCycle · PowerIntegrator            │    │
//! │  │  LinkAutomaton · BrokerAutomaton                       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Result;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use filterchlorine::adapters::hardware::HardwareAdapter;
use filterchlorine::adapters::log_sink::LogEventSink;
use filterchlorine::adapters::mqtt::MqttAdapter;
use filterchlorine::adapters::time::Clock;
use filterchlorine::adapters::wifi::WifiAdapter;
use filterchlorine::app::commands::{CommandReply, NodeCommand};
use filterchlorine::app::service::NodeService;
use filterchlorine::config::NodeConfig;
use filterchlorine::drivers::hw_init;
use filterchlorine::drivers::motor::MotorDriver;
use filterchlorine::drivers::status_led::StatusLed;
use filterchlorine::error::Error;
use filterchlorine::pins;
use filterchlorine::sensors::{Ina219, ina219};

/// Pause between two scheduler invocations.
const LOOP_PERIOD_MS: u32 = 10;
const CONSOLE_QUEUE_DEPTH: usize = 4;

type CommandQueue = Channel<CriticalSectionRawMutex, NodeCommand, CONSOLE_QUEUE_DEPTH>;

/// Build-time configuration overlay, if any.
fn load_config() -> NodeConfig {
    let Some(json) = option_env!("FILTERCHLORINE_CONFIG") else {
        return NodeConfig::default();
    };
    match NodeConfig::from_json(json.as_bytes()) {
        Ok(cfg) => {
            info!("Config overlay applied");
            cfg
        }
        Err(e) => {
            warn!("Config overlay rejected ({}), using defaults", e);
            NodeConfig::default()
        }
    }
}

/// Read operator commands from the serial console.
fn spawn_console(queue: Arc<CommandQueue>) -> Result<()> {
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(4 * 1024)
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines().map_while(std::result::Result::ok) {
                match NodeCommand::parse(&line) {
                    Some(cmd) => {
                        if queue.try_send(cmd).is_err() {
                            warn!("Console: command queue full, '{}' ignored", line.trim());
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("Console: unknown command '{}'", line.trim()),
                }
            }
        })?;
    Ok(())
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  FilterChlorine v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();
    let clock = Clock::new();
    let config = load_config();

    // ── 2. Peripherals (failures degrade, never halt) ─────────
    let motor_ok = match hw_init::init_peripherals() {
        Ok(()) => true,
        Err(e) => {
            error!("Motor/LED init failed: {}", e);
            false
        }
    };

    let i2c_conf = I2cConfig::new().baudrate(pins::I2C_BAUDRATE_HZ.Hz());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio9,
        peripherals.pins.gpio8,
        &i2c_conf,
    )?;
    let mut ina = Ina219::new(i2c, ina219::DEFAULT_ADDRESS);
    if let Err(e) = ina.begin() {
        error!("INA219 init failed: {}", e);
    }

    let mut hw = HardwareAdapter::new(ina, MotorDriver::new(motor_ok), StatusLed::new());
    let mut sink = LogEventSink::new();

    // ── 3. Service and network adapters ───────────────────────
    let mut app = NodeService::new(config, clock.now_ms(), &hw);

    let mut wifi = WifiAdapter::new(
        peripherals.modem,
        sysloop,
        nvs,
        option_env!("WIFI_SSID").unwrap_or(""),
        option_env!("WIFI_PASS").unwrap_or(""),
        app.link_event_handle(),
    )?;
    let mut mqtt = MqttAdapter::new(&app.config().broker_url).map_err(Error::from)?;

    let commands: Arc<CommandQueue> = Arc::new(Channel::new());
    spawn_console(Arc::clone(&commands))?;

    app.start(clock.now_ms(), &mut hw, &mut wifi, &mut sink);
    info!("System ready. Entering loop.");

    // ── 4. Cooperative loop ───────────────────────────────────
    loop {
        let now_ms = clock.now_ms();

        while let Ok(cmd) = commands.try_receive() {
            match app.handle_command(cmd, now_ms, &mut hw, &mut sink) {
                CommandReply::Power(p) => info!(
                    "Power: {:.1} mA, bus {:.2} V, shunt {:.2} mV, load {:.2} V, {:.1} mW",
                    p.current_milliamps,
                    p.bus_volts,
                    p.shunt_millivolts,
                    p.load_volts,
                    p.power_milliwatts
                ),
                CommandReply::Ignored => warn!("Command {:?} ignored", cmd),
                CommandReply::Accepted => {}
            }
        }

        app.tick(now_ms, &mut hw, &mut wifi, &mut mqtt, &mut sink);

        if app.reboot_requested() {
            warn!("Restarting");
            FreeRtos::delay_ms(100);
            esp_idf_svc::hal::reset::restart();
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
