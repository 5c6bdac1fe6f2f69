//! RGB status LED driver.
//!
//! Three LEDC PWM channels (CH1-3) drive a common-cathode RGB LED.
//! Colours are scaled by a fixed brightness so the LED stays readable
//! without lighting up the enclosure.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives three LEDC PWM channels via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;

/// Output scale out of 255.
pub const BRIGHTNESS: u8 = 20;

fn scale(channel: u8) -> u8 {
    ((u16::from(channel) * u16::from(BRIGHTNESS)) / 255) as u8
}

pub struct StatusLed {
    current: (u8, u8, u8),
}

impl StatusLed {
    pub fn new() -> Self {
        Self { current: (0, 0, 0) }
    }

    pub fn set_colour(&mut self, r: u8, g: u8, b: u8) {
        if self.current == (r, g, b) {
            return;
        }
        hw_init::ledc_set(hw_init::LEDC_CH_LED_R, scale(r));
        hw_init::ledc_set(hw_init::LEDC_CH_LED_G, scale(g));
        hw_init::ledc_set(hw_init::LEDC_CH_LED_B, scale(b));
        self.current = (r, g, b);
    }

    /// Last requested (unscaled) colour.
    pub fn current_colour(&self) -> (u8, u8, u8) {
        self.current
    }
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}
