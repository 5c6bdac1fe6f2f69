//! GPIO / peripheral pin assignments for the FilterChlorine board
//! (ESP32-S3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Motor driver (Cytron MD13S / MD135, PWM + DIR)
// ---------------------------------------------------------------------------

/// LEDC PWM output for motor speed.
pub const MOTOR_PWM_GPIO: i32 = 35;
/// Digital output: LOW = forward, HIGH = reverse.
pub const MOTOR_DIR_GPIO: i32 = 36;

// ---------------------------------------------------------------------------
// Status LED (discrete RGB on LEDC)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 11;
pub const LED_G_GPIO: i32 = 12;
pub const LED_B_GPIO: i32 = 13;

// ---------------------------------------------------------------------------
// I²C bus (INA219 power monitor)
// ---------------------------------------------------------------------------

// SDA = GPIO9, SCL = GPIO8; `main` takes them as typed HAL pins.
pub const I2C_BAUDRATE_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
/// LEDC base frequency for the motor driver.
pub const MOTOR_PWM_FREQ_HZ: u32 = 5_000;
/// LEDC frequency for the RGB status LED.
pub const LED_PWM_FREQ_HZ: u32 = 1_000;
