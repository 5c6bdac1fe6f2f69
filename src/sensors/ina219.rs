//! INA219 high-side current / power monitor (I2C).
//!
//! Configured for the 32 V / 2 A range: bus ADC 12-bit, shunt ADC
//! 12-bit, PGA /8 (±320 mV), continuous shunt + bus conversion, with a
//! calibration value giving a 0.1 mA current LSB on a 0.1 Ω shunt.
//!
//! Generic over any `embedded_hal::i2c::I2c` bus, so the same driver
//! runs on the ESP-IDF `I2cDriver` and on a mock bus in tests.

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::RawPowerReading;
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x40;

const REG_CONFIG: u8 = 0x00;
const REG_SHUNT_VOLTAGE: u8 = 0x01;
const REG_BUS_VOLTAGE: u8 = 0x02;
const REG_CURRENT: u8 = 0x04;
const REG_CALIBRATION: u8 = 0x05;

/// 32 V range | gain /8 | 12-bit bus | 12-bit shunt | continuous S+B.
const CONFIG_32V_2A: u16 = 0x2000 | 0x1800 | 0x0180 | 0x0018 | 0x0007;
const CALIBRATION_32V_2A: u16 = 4096;
/// Raw current register counts per mA at `CALIBRATION_32V_2A`.
const CURRENT_COUNTS_PER_MA: f32 = 10.0;
/// Shunt voltage LSB.
const SHUNT_MV_PER_LSB: f32 = 0.01;
/// Bus voltage LSB (after dropping the 3 status bits).
const BUS_MV_PER_LSB: f32 = 4.0;

pub struct Ina219<I2C> {
    i2c: I2C,
    address: u8,
    initialized: bool,
}

impl<I2C: I2c> Ina219<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            initialized: false,
        }
    }

    /// Program calibration and configuration.  A device that does not
    /// acknowledge leaves the driver uninitialised for good.
    pub fn begin(&mut self) -> Result<(), SensorError> {
        let result = self
            .write_register(REG_CALIBRATION, CALIBRATION_32V_2A)
            .and_then(|()| self.write_register(REG_CONFIG, CONFIG_32V_2A));
        match result {
            Ok(()) => {
                self.initialized = true;
                info!("INA219 initialised at 0x{:02x} (32V/2A)", self.address);
                Ok(())
            }
            Err(_) => {
                self.initialized = false;
                warn!("INA219 not found at 0x{:02x}", self.address);
                Err(SensorError::NotPresent)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn read(&mut self) -> Result<RawPowerReading, SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
        let shunt = self.read_register(REG_SHUNT_VOLTAGE)? as i16;
        let bus = self.read_register(REG_BUS_VOLTAGE)?;
        // A brown-out resets the calibration register; rewrite it before
        // every current read.
        self.write_register(REG_CALIBRATION, CALIBRATION_32V_2A)?;
        let current = self.read_register(REG_CURRENT)? as i16;

        Ok(RawPowerReading {
            shunt_millivolts: f32::from(shunt) * SHUNT_MV_PER_LSB,
            bus_volts: f32::from(bus >> 3) * BUS_MV_PER_LSB / 1000.0,
            current_milliamps: f32::from(current) / CURRENT_COUNTS_PER_MA,
        })
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg, hi, lo])
            .map_err(|_| SensorError::BusFault)
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorError::BusFault)?;
        Ok(u16::from_be_bytes(buf))
    }
}
