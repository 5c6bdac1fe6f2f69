//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements        | Connects to                 |
//! |------------|-------------------|-----------------------------|
//! | `hardware` | SensorPort        | INA219 over I2C             |
//! |            | ActuatorPort      | LEDC PWM + DIR GPIO         |
//! |            | IndicatorPort     | RGB status LED (LEDC)       |
//! | `wifi`     | LinkDriver        | ESP-IDF WiFi STA            |
//! | `mqtt`     | BrokerClient      | ESP-IDF MQTT client         |
//! | `log_sink` | EventSink         | Serial log output           |
//! | `time`     | —                 | ESP32 system timer          |

pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod time;
pub mod wifi;
