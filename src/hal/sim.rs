// Simulated collaborators for host runs and tests
//
// Each stub records what the core asked of it and always succeeds unless
// told to fail.

use tracing::trace;

use super::{
    ActuatorDriver, Detection, DriverError, IndicatorDriver, Orientation, OrientationSensor,
    PersonDetector, Rgb, Side,
};
use crate::config::{LED_EYE_NUM_LEDS, SERVO_CHANNELS};

/// Servo board stub that keeps the last duty written to each channel
#[derive(Debug, Clone, Default)]
pub struct SimServoBoard {
    duties: [Option<u16>; SERVO_CHANNELS],
    writes: usize,
    failing: bool,
}

impl SimServoBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn duty(&self, channel: u8) -> Option<u16> {
        self.duties.get(channel as usize).copied().flatten()
    }

    /// Total writes accepted
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ActuatorDriver for SimServoBoard {
    fn write(&mut self, channel: u8, duty: u16) -> Result<(), DriverError> {
        if self.failing {
            return Err(DriverError::Actuator {
                channel,
                reason: "simulated fault".to_string(),
            });
        }
        let slot = self
            .duties
            .get_mut(channel as usize)
            .ok_or_else(|| DriverError::Actuator {
                channel,
                reason: "no such channel".to_string(),
            })?;
        trace!("Servo {} duty {}", channel, duty);
        *slot = Some(duty);
        self.writes += 1;
        Ok(())
    }
}

/// IMU stub returning a settable orientation
#[derive(Debug, Clone, Default)]
pub struct SimImu {
    orientation: Orientation,
    failing: bool,
}

impl SimImu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }
}

impl OrientationSensor for SimImu {
    fn sample(&mut self) -> Result<Orientation, DriverError> {
        if self.failing {
            return Err(DriverError::Sensor("simulated fault".to_string()));
        }
        Ok(self.orientation)
    }
}

/// LED ring stub holding both eyes' colors
#[derive(Debug, Clone)]
pub struct SimIndicator {
    right: [Rgb; LED_EYE_NUM_LEDS],
    left: [Rgb; LED_EYE_NUM_LEDS],
    shows: usize,
}

impl Default for SimIndicator {
    fn default() -> Self {
        Self {
            right: [Rgb::BLACK; LED_EYE_NUM_LEDS],
            left: [Rgb::BLACK; LED_EYE_NUM_LEDS],
            shows: 0,
        }
    }
}

impl SimIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(&self, side: Side, index: usize) -> Option<Rgb> {
        match side {
            Side::Right => self.right.get(index).copied(),
            Side::Left => self.left.get(index).copied(),
        }
    }

    pub fn shows(&self) -> usize {
        self.shows
    }
}

impl IndicatorDriver for SimIndicator {
    fn write(&mut self, side: Side, index: usize, color: Rgb) -> Result<(), DriverError> {
        let ring = match side {
            Side::Right => &mut self.right,
            Side::Left => &mut self.left,
        };
        let led = ring
            .get_mut(index)
            .ok_or_else(|| DriverError::Indicator(format!("LED index {} out of range", index)))?;
        *led = color;
        Ok(())
    }

    fn show(&mut self) -> Result<(), DriverError> {
        self.shows += 1;
        Ok(())
    }
}

/// Detector stub: never sees anyone unless a detection is queued
#[derive(Debug, Clone, Default)]
pub struct NoDetector {
    queued: Option<Detection>,
}

impl NoDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `detection` on every following poll (None clears it)
    pub fn queue(&mut self, detection: Option<Detection>) {
        self.queued = detection;
    }
}

impl PersonDetector for NoDetector {
    fn detect(&mut self) -> Option<Detection> {
        self.queued
    }
}
