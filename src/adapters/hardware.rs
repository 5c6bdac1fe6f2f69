//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the INA219, the motor driver and the status LED, exposing them
//! through [`SensorPort`], [`ActuatorPort`] and [`IndicatorPort`].  On
//! non-espidf targets the underlying drivers use cfg-gated simulation
//! stubs, and any `embedded_hal` I2C bus (including a mock) can back the
//! sensor.

use embedded_hal::i2c::I2c;

use crate::app::ports::{ActuatorPort, IndicatorPort, RawPowerReading, SensorPort};
use crate::drivers::motor::MotorDriver;
use crate::drivers::status_led::StatusLed;
use crate::error::SensorError;
use crate::motor::Direction;
use crate::sensors::Ina219;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<I2C> {
    sensor: Ina219<I2C>,
    motor: MotorDriver,
    led: StatusLed,
}

impl<I2C: I2c> HardwareAdapter<I2C> {
    /// `sensor` must already have had `begin()` called; its outcome is
    /// what [`SensorPort::initialized`] reports from then on.
    pub fn new(sensor: Ina219<I2C>, motor: MotorDriver, led: StatusLed) -> Self {
        Self { sensor, motor, led }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I2C: I2c> SensorPort for HardwareAdapter<I2C> {
    fn initialized(&self) -> bool {
        self.sensor.is_initialized()
    }

    fn read_raw(&mut self) -> Result<RawPowerReading, SensorError> {
        self.sensor.read()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<I2C> ActuatorPort for HardwareAdapter<I2C> {
    fn available(&self) -> bool {
        self.motor.is_available()
    }

    fn drive(&mut self, direction: Direction, speed: u16) {
        self.motor.set(direction, speed);
    }

    fn stop(&mut self) {
        self.motor.stop();
    }

    fn is_forward(&self) -> bool {
        self.motor.direction() == Direction::Forward
    }

    fn current_speed(&self) -> u16 {
        self.motor.speed()
    }
}

impl<I2C> IndicatorPort for HardwareAdapter<I2C> {
    fn set_led(&mut self, r: u8, g: u8, b: u8) {
        self.led.set_colour(r, g, b);
    }
}
