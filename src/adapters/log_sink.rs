//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::net::broker::BrokerTransition;
use crate::net::link::LinkTransition;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | dir={} rev={} | I={:.1}mA bus={:.2}V load={:.2}V P={:.1}mW | \
                     R={:.1}\u{03a9} | {:.3}mAh | rssi={:?} | sensor={} motor={} | up={}s",
                    t.direction.as_str(),
                    t.reversecount,
                    t.current,
                    t.busvoltage,
                    t.loadvoltage,
                    t.power_mw,
                    t.resistance,
                    t.milliamp_hours,
                    t.rssi,
                    if t.down { "DOWN" } else { "OK" },
                    if t.motor_down { "DOWN" } else { "OK" },
                    t.uptime,
                );
            }
            AppEvent::LinkChanged(LinkTransition::Up) => info!("LINK  | up"),
            AppEvent::LinkChanged(LinkTransition::Down { reason, class, will_retry }) => {
                info!("LINK  | down reason={} class={:?} retry={}", reason, class, will_retry);
            }
            AppEvent::LinkChanged(LinkTransition::Retrying { class }) => {
                info!("LINK  | retrying after {:?}", class);
            }
            AppEvent::BrokerChanged(BrokerTransition::Up) => info!("MQTT  | up"),
            AppEvent::BrokerChanged(t) => info!("MQTT  | {:?}", t),
            AppEvent::Fault(kind) => warn!("FAULT | {}", kind),
            AppEvent::UpdateRequested => info!("OTA   | update requested"),
            AppEvent::RebootRequested => warn!("SYS   | reboot requested"),
            AppEvent::Started { sensor_healthy, motor_available } => {
                if *sensor_healthy && *motor_available {
                    info!("START | all peripherals up");
                } else {
                    error!(
                        "START | degraded: sensor={} motor={}",
                        sensor_healthy, motor_available
                    );
                }
            }
        }
    }
}
