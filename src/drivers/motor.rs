//! Brushed motor driver (Cytron MD13S / MD135, PWM + DIR).
//!
//! Variable-speed forward/reverse control via LEDC PWM (ch0) and a
//! digital direction pin (LOW = forward).  The driver is a dumb
//! actuator: the duty cycle lives in [`crate::motor`].
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives real PWM and GPIO via hw_init helpers.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::motor::Direction;
use crate::pins;

/// Full-scale duty at 8-bit resolution.
pub const MAX_DUTY: u16 = (1 << pins::PWM_RESOLUTION_BITS) - 1;

pub struct MotorDriver {
    available: bool,
    direction: Direction,
    speed: u16,
}

impl MotorDriver {
    /// `available` is the outcome of `hw_init::init_peripherals()`.
    pub fn new(available: bool) -> Self {
        Self {
            available,
            direction: Direction::Forward,
            speed: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn set(&mut self, direction: Direction, speed: u16) {
        if !self.available {
            return;
        }
        let speed = speed.min(MAX_DUTY);
        self.set_direction_hw(direction);
        self.set_duty_hw(speed);
        self.direction = direction;
        self.speed = speed;
    }

    /// Zero the PWM; direction pin is left where it is.
    pub fn stop(&mut self) {
        if !self.available {
            return;
        }
        self.set_duty_hw(0);
        self.speed = 0;
    }

    fn set_direction_hw(&self, dir: Direction) {
        hw_init::gpio_write(pins::MOTOR_DIR_GPIO, dir == Direction::Reverse);
    }

    fn set_duty_hw(&self, speed: u16) {
        hw_init::ledc_set(hw_init::LEDC_CH_MOTOR, speed as u8);
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed(&self) -> u16 {
        self.speed
    }
}
