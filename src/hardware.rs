//! Physical inputs and outputs of the device.
//!
//! The control loop only sees these traits. [`SysfsSwitch`], [`SysfsLed`] and
//! [`FileLightSensor`] bind them to Linux value files (GPIO sysfs, IIO ADC
//! channels). [`Unwired`] and [`FixedLightSensor`] stand in for parts a device
//! is built without. [`crate::sim`] provides controllable versions for tests.
//!
//! Readers and actuators are infallible from the loop's point of view: a failed
//! read is logged and reported as the resting state (released switch, dark
//! sensor), and a failed write is logged and ignored.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Momentary push switch.
pub trait Switch {
    /// Returns whether the switch is currently held down.
    fn is_pressed(&mut self) -> bool;
}

/// Ambient light sensor behind an ADC.
pub trait LightSensor {
    /// Returns the current raw light level.
    fn level(&mut self) -> u16;
}

/// Indicator LED.
pub trait Led {
    /// Lights the LED.
    fn enable(&mut self);
    /// Turns the LED off.
    fn disable(&mut self);
}

/// Switch read from a GPIO `value` file (`1` = pressed).
#[derive(Debug)]
pub struct SysfsSwitch {
    path: PathBuf,
    active_low: bool,
}

impl SysfsSwitch {
    /// Binds the switch to `path`, checking the file is readable.
    ///
    /// With `active_low` a `0` reading counts as pressed (pull-up wiring).
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpen`] if the value file cannot be read.
    pub fn open(path: impl Into<PathBuf>, active_low: bool) -> Result<Self> {
        let path = path.into();
        read_value(&path).map_err(|source| Error::DeviceOpen {
            device: "switch",
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, active_low })
    }
}

impl Switch for SysfsSwitch {
    fn is_pressed(&mut self) -> bool {
        match read_value(&self.path) {
            Ok(value) => (value == "1") != self.active_low,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read switch");
                false
            }
        }
    }
}

/// Light sensor read from a file holding a decimal level, such as an IIO
/// `in_voltageN_raw` channel.
#[derive(Debug)]
pub struct FileLightSensor {
    path: PathBuf,
}

impl FileLightSensor {
    /// Binds the sensor to `path`, checking the file holds a level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpen`] if the file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        read_level(&path).map_err(|source| Error::DeviceOpen {
            device: "light sensor",
            path: path.clone(),
            source,
        })?;
        Ok(Self { path })
    }
}

impl LightSensor for FileLightSensor {
    fn level(&mut self) -> u16 {
        read_level(&self.path).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to read light sensor");
            0
        })
    }
}

/// LED driven through a GPIO `value` file.
#[derive(Debug)]
pub struct SysfsLed {
    path: PathBuf,
    enabled: Option<bool>,
}

impl SysfsLed {
    /// Binds the LED to `path`, checking the file is writable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceOpen`] if the value file cannot be opened for writing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|source| Error::DeviceOpen {
                device: "led",
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            enabled: None,
        })
    }

    fn set(&mut self, on: bool) {
        // The loop drives the LED every tick; only touch the file on change.
        if self.enabled == Some(on) {
            return;
        }
        match std::fs::write(&self.path, if on { "1" } else { "0" }) {
            Ok(()) => self.enabled = Some(on),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to drive LED"),
        }
    }
}

impl Led for SysfsLed {
    fn enable(&mut self) {
        self.set(true);
    }

    fn disable(&mut self) {
        self.set(false);
    }
}

/// Placeholder for a switch or LED that is not fitted: never pressed, and
/// drives nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unwired;

impl Switch for Unwired {
    fn is_pressed(&mut self) -> bool {
        false
    }
}

impl Led for Unwired {
    fn enable(&mut self) {}

    fn disable(&mut self) {}
}

/// Light sensor that always reports the same level.
#[derive(Debug, Clone, Copy)]
pub struct FixedLightSensor(pub u16);

impl FixedLightSensor {
    /// Reads as full light, keeping the display awake.
    pub const BRIGHT: Self = Self(u16::MAX);
}

impl LightSensor for FixedLightSensor {
    fn level(&mut self) -> u16 {
        self.0
    }
}

fn read_value(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path).map(|s| s.trim().to_string())
}

fn read_level(path: &Path) -> std::io::Result<u16> {
    let raw = read_value(path)?;
    raw.parse::<u16>().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("not a light level: {raw:?} ({e})"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysfs_switch_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value");
        std::fs::write(&path, "0\n").unwrap();

        let mut switch = SysfsSwitch::open(&path, false).unwrap();
        assert!(!switch.is_pressed());

        std::fs::write(&path, "1\n").unwrap();
        assert!(switch.is_pressed());

        let mut inverted = SysfsSwitch::open(&path, true).unwrap();
        assert!(!inverted.is_pressed());
    }

    #[test]
    fn test_switch_read_failure_reads_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value");
        std::fs::write(&path, "1").unwrap();

        let mut switch = SysfsSwitch::open(&path, false).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(!switch.is_pressed());
    }

    #[test]
    fn test_light_sensor_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        std::fs::write(&path, "512\n").unwrap();

        let mut sensor = FileLightSensor::open(&path).unwrap();
        assert_eq!(sensor.level(), 512);

        std::fs::write(&path, "garbage").unwrap();
        assert_eq!(sensor.level(), 0);
    }

    #[test]
    fn test_light_sensor_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in_voltage0_raw");
        std::fs::write(&path, "bright").unwrap();

        let err = FileLightSensor::open(&path).unwrap_err();
        assert!(matches!(err, Error::DeviceOpen { device: "light sensor", .. }));
    }

    #[test]
    fn test_led_writes_value_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value");
        std::fs::write(&path, "0").unwrap();

        let mut led = SysfsLed::open(&path).unwrap();
        led.enable();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1");
        led.disable();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0");
    }

    #[test]
    fn test_stand_ins() {
        let mut switch = Unwired;
        assert!(!switch.is_pressed());

        let mut led = Unwired;
        led.enable();
        led.disable();

        let mut sensor = FixedLightSensor::BRIGHT;
        assert_eq!(sensor.level(), u16::MAX);
        assert_eq!(FixedLightSensor(42).level(), 42);
    }

    #[test]
    fn test_missing_device_is_fatal() {
        let err = SysfsSwitch::open("/definitely/not/gpio6/value", false).unwrap_err();
        assert!(err.is_fatal());
    }
}
