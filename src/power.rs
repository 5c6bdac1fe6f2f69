//! Power telemetry integrator (Coulomb counting).
//!
//! Each sample tick reads the INA219 through the [`SensorPort`],
//! applies the calibration multiplier to the raw current, derives load
//! voltage, power and resistance, and integrates charge over the real
//! elapsed time since the previous update:
//!
//! ```text
//!   load_V   = bus_V + shunt_mV / 1000
//!   power_mW = load_V * current_mA
//!   mAh     += current_mA * elapsed_s / 3600
//!   R_ohm    = bus_V * 1000 / current_mA     (sentinel if |I| ≈ 0)
//! ```
//!
//! If the sensor failed to initialise the integrator is permanently
//! skipped: no reads, every field frozen, telemetry reports `down`.

use log::{info, warn};

use crate::app::ports::SensorPort;
use crate::scheduler::reached;

/// Currents below this magnitude (mA) are treated as zero for the
/// resistance calculation.
pub const MIN_CURRENT_MA: f32 = 1e-3;

/// Minimum spacing of the periodic power log line.
const LOG_INTERVAL_MS: u32 = 10_000;

/// Latest derived power reading plus integration totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerSample {
    pub shunt_millivolts: f32,
    pub bus_volts: f32,
    /// Post-calibration current.
    pub current_milliamps: f32,
    pub load_volts: f32,
    pub power_milliwatts: f32,
    pub resistance_ohms: f32,
    pub accumulated_milliamp_hours: f32,
    pub total_elapsed_secs: f32,
    pub sensor_healthy: bool,
    pub last_update_at_ms: u32,
}

/// Ohm's law with a divide-by-zero guard.  Returns `sentinel` instead of
/// dividing when `current_ma` is zero, near-zero, or not finite.
pub fn resistance_ohms(bus_volts: f32, current_ma: f32, sentinel: f32) -> f32 {
    if !current_ma.is_finite() || current_ma.abs() < MIN_CURRENT_MA {
        return sentinel;
    }
    let r = (bus_volts * 1000.0) / current_ma;
    if r.is_finite() { r } else { sentinel }
}

pub struct PowerIntegrator {
    sample: PowerSample,
    calibration: f32,
    resistance_sentinel: f32,
    /// Charge in mA·s; kept separately so the mAh figure is derived
    /// from one running sum rather than accumulating rounding per tick.
    total_milliamp_secs: f64,
    last_log_at_ms: Option<u32>,
    guard_tripped: bool,
}

impl PowerIntegrator {
    /// `sensor_healthy` is the sensor's init result; it never changes
    /// afterwards.
    pub fn new(calibration: f32, resistance_sentinel: f32, sensor_healthy: bool, now_ms: u32) -> Self {
        Self {
            sample: PowerSample {
                sensor_healthy,
                last_update_at_ms: now_ms,
                ..PowerSample::default()
            },
            calibration,
            resistance_sentinel,
            total_milliamp_secs: 0.0,
            last_log_at_ms: None,
            guard_tripped: false,
        }
    }

    /// Read the sensor and integrate.  Returns `false` if skipped
    /// (unhealthy sensor) or the read failed; fields are left untouched
    /// in both cases.
    pub fn sample(&mut self, now_ms: u32, sensor: &mut impl SensorPort) -> bool {
        if !self.sample.sensor_healthy {
            return false;
        }

        let raw = match sensor.read_raw() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Power: read failed ({}), keeping last values", e);
                return false;
            }
        };

        let elapsed_ms = now_ms.wrapping_sub(self.sample.last_update_at_ms);
        let elapsed_secs = elapsed_ms as f32 / 1000.0;
        self.sample.last_update_at_ms = now_ms;

        let s = &mut self.sample;
        s.shunt_millivolts = raw.shunt_millivolts;
        s.bus_volts = raw.bus_volts;
        s.current_milliamps = raw.current_milliamps * self.calibration;
        s.load_volts = s.bus_volts + s.shunt_millivolts / 1000.0;
        s.power_milliwatts = s.load_volts * s.current_milliamps;

        // Charge consumed is never negative; reverse current does not
        // un-count it.
        let charge = f64::from(s.current_milliamps.max(0.0)) * f64::from(elapsed_secs);
        self.total_milliamp_secs += charge;
        s.total_elapsed_secs += elapsed_secs;
        s.accumulated_milliamp_hours = (self.total_milliamp_secs / 3600.0) as f32;

        s.resistance_ohms = resistance_ohms(s.bus_volts, s.current_milliamps, self.resistance_sentinel);
        let guarded = !s.current_milliamps.is_finite() || s.current_milliamps.abs() < MIN_CURRENT_MA;
        if guarded && !self.guard_tripped {
            warn!("Power: near-zero current, resistance reported as sentinel");
        }
        self.guard_tripped = guarded;

        self.log_rate_limited(now_ms);
        true
    }

    pub fn latest(&self) -> &PowerSample {
        &self.sample
    }

    pub fn is_degraded(&self) -> bool {
        !self.sample.sensor_healthy
    }

    /// True while the latest reading is too small to divide by.
    pub fn resistance_guarded(&self) -> bool {
        self.guard_tripped
    }

    fn log_rate_limited(&mut self, now_ms: u32) {
        let due = self
            .last_log_at_ms
            .is_none_or(|last| reached(now_ms, last.wrapping_add(LOG_INTERVAL_MS)));
        if !due {
            return;
        }
        self.last_log_at_ms = Some(now_ms);
        let s = &self.sample;
        info!(
            "Power | bus={:.2}V shunt={:.2}mV | I={:.1}mA load={:.2}V P={:.1}mW | {:.3}mAh",
            s.bus_volts,
            s.shunt_millivolts,
            s.current_milliamps,
            s.load_volts,
            s.power_milliwatts,
            s.accumulated_milliamp_hours,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::RawPowerReading;
    use crate::error::SensorError;

    struct ConstSensor {
        reading: RawPowerReading,
        reads: usize,
        fail: bool,
    }

    impl ConstSensor {
        fn new(current: f32) -> Self {
            Self {
                reading: RawPowerReading {
                    shunt_millivolts: 2.0,
                    bus_volts: 12.0,
                    current_milliamps: current,
                },
                reads: 0,
                fail: false,
            }
        }
    }

    impl SensorPort for ConstSensor {
        fn initialized(&self) -> bool {
            true
        }
        fn read_raw(&mut self) -> Result<RawPowerReading, SensorError> {
            self.reads += 1;
            if self.fail {
                Err(SensorError::BusFault)
            } else {
                Ok(self.reading)
            }
        }
    }

    #[test]
    fn derives_load_voltage_and_power() {
        let mut p = PowerIntegrator::new(2.0, -1.0, true, 0);
        let mut sensor = ConstSensor::new(50.0);
        assert!(p.sample(1_000, &mut sensor));
        let s = p.latest();
        assert!((s.current_milliamps - 100.0).abs() < 1e-4);
        assert!((s.load_volts - 12.002).abs() < 1e-4);
        assert!((s.power_milliwatts - 1200.2).abs() < 1e-2);
        assert!((s.resistance_ohms - 120.0).abs() < 1e-3);
    }

    #[test]
    fn coulomb_count_matches_constant_current() {
        let mut p = PowerIntegrator::new(1.0, -1.0, true, 0);
        let mut sensor = ConstSensor::new(360.0);
        // 3600 s in 60 s steps.
        for i in 1..=60u32 {
            p.sample(i * 60_000, &mut sensor);
        }
        let s = p.latest();
        assert!((s.accumulated_milliamp_hours - 360.0).abs() < 1e-3);
        assert!((s.total_elapsed_secs - 3600.0).abs() < 1e-2);
    }

    #[test]
    fn zero_current_reports_sentinel_not_nan() {
        let mut p = PowerIntegrator::new(18.15, -1.0, true, 0);
        let mut sensor = ConstSensor::new(0.0);
        p.sample(1_000, &mut sensor);
        let r = p.latest().resistance_ohms;
        assert!(!r.is_nan());
        assert!((r - -1.0).abs() < f32::EPSILON);
        assert!(p.resistance_guarded());
    }

    #[test]
    fn resistance_guard_handles_non_finite_input() {
        assert!((resistance_ohms(5.0, f32::NAN, -1.0) - -1.0).abs() < f32::EPSILON);
        assert!((resistance_ohms(5.0, 1e-6, -1.0) - -1.0).abs() < f32::EPSILON);
        assert!((resistance_ohms(5.0, 10.0, -1.0) - 500.0).abs() < 1e-3);
    }

    #[test]
    fn unhealthy_sensor_is_never_read() {
        let mut p = PowerIntegrator::new(18.15, -1.0, false, 0);
        let mut sensor = ConstSensor::new(100.0);
        for i in 1..100u32 {
            assert!(!p.sample(i * 1_000, &mut sensor));
        }
        assert_eq!(sensor.reads, 0);
        assert_eq!(*p.latest(), PowerSample { sensor_healthy: false, ..PowerSample::default() });
        assert!(p.is_degraded());
    }

    #[test]
    fn failed_read_keeps_previous_values() {
        let mut p = PowerIntegrator::new(1.0, -1.0, true, 0);
        let mut sensor = ConstSensor::new(10.0);
        p.sample(1_000, &mut sensor);
        let before = *p.latest();
        sensor.fail = true;
        assert!(!p.sample(2_000, &mut sensor));
        assert_eq!(*p.latest(), before);
    }

    #[test]
    fn integration_spans_clock_wraparound() {
        let start = u32::MAX - 499;
        let mut p = PowerIntegrator::new(1.0, -1.0, true, start);
        let mut sensor = ConstSensor::new(3600.0);
        p.sample(500, &mut sensor); // 1000 ms later
        assert!((p.latest().total_elapsed_secs - 1.0).abs() < 1e-6);
        assert!((p.latest().accumulated_milliamp_hours - 1.0).abs() < 1e-6);
    }
}
