// Joint angle state for one servo board
//
// Holds the current and target angle of every channel and moves current
// toward target once per servo tick, writing duty values to the driver.

use tracing::{debug, warn};

use crate::config::{
    INTERPOLATION_GAIN, INTERPOLATION_TOLERANCE, PWM_PERIOD_US, PWM_RESOLUTION,
    SERVO_CENTER_ANGLE, SERVO_CHANNELS, SERVO_MAX_ANGLE, SERVO_MAX_PULSE_US, SERVO_MIN_PULSE_US,
};
use crate::hal::ActuatorDriver;

/// Pulse range and PWM period used to turn angles into duty values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoCalibration {
    pub min_pulse_us: f32,
    pub max_pulse_us: f32,
    pub period_us: f32,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            min_pulse_us: SERVO_MIN_PULSE_US,
            max_pulse_us: SERVO_MAX_PULSE_US,
            period_us: PWM_PERIOD_US,
        }
    }
}

impl ServoCalibration {
    /// Map [0, 180] degrees onto the pulse range, then onto a 12-bit duty
    pub fn angle_to_duty(&self, angle: f32) -> u16 {
        let angle = angle.clamp(0.0, SERVO_MAX_ANGLE);
        let pulse =
            self.min_pulse_us + (self.max_pulse_us - self.min_pulse_us) * angle / SERVO_MAX_ANGLE;
        (pulse * PWM_RESOLUTION / self.period_us) as u16
    }
}

pub struct ActuatorState {
    current: [f32; SERVO_CHANNELS],
    target: [f32; SERVO_CHANNELS],
    calibration: ServoCalibration,
    faults: u32,
}

impl Default for ActuatorState {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorState {
    /// All channels start centered
    pub fn new() -> Self {
        Self::with_calibration(ServoCalibration::default())
    }

    pub fn with_calibration(calibration: ServoCalibration) -> Self {
        Self {
            current: [SERVO_CENTER_ANGLE; SERVO_CHANNELS],
            target: [SERVO_CENTER_ANGLE; SERVO_CHANNELS],
            calibration,
            faults: 0,
        }
    }

    /// Set a channel's target, clamped to [0, 180]
    pub fn set_target(&mut self, channel: u8, angle: f32) {
        match self.target.get_mut(channel as usize) {
            Some(slot) => *slot = angle.clamp(0.0, SERVO_MAX_ANGLE),
            None => warn!("Ignoring target for channel {} (board has {})", channel, SERVO_CHANNELS),
        }
    }

    pub fn target(&self, channel: u8) -> f32 {
        self.target
            .get(channel as usize)
            .copied()
            .unwrap_or(SERVO_CENTER_ANGLE)
    }

    pub fn current(&self, channel: u8) -> f32 {
        self.current
            .get(channel as usize)
            .copied()
            .unwrap_or(SERVO_CENTER_ANGLE)
    }

    /// True when the channel is within tolerance of its target
    pub fn settled(&self, channel: u8) -> bool {
        (self.current(channel) - self.target(channel)).abs() <= INTERPOLATION_TOLERANCE
    }

    /// Driver writes that failed since startup
    pub fn faults(&self) -> u32 {
        self.faults
    }

    /// One servo tick: step every unsettled channel 20% closer and write it
    ///
    /// A failed write is logged and counted; the channel still advances so
    /// the next tick sends a fresh duty. Returns the number of channels moved.
    pub fn tick<D: ActuatorDriver + ?Sized>(&mut self, driver: &mut D) -> usize {
        let mut moved = 0;

        for channel in 0..SERVO_CHANNELS {
            let diff = self.target[channel] - self.current[channel];
            if diff.abs() <= INTERPOLATION_TOLERANCE {
                continue;
            }

            self.current[channel] += diff * INTERPOLATION_GAIN;
            moved += 1;

            let duty = self.calibration.angle_to_duty(self.current[channel]);
            if let Err(e) = driver.write(channel as u8, duty) {
                self.faults = self.faults.wrapping_add(1);
                warn!("Servo write failed: {}", e);
            }
        }

        if moved > 0 {
            debug!("Servo tick moved {} channels", moved);
        }
        moved
    }
}
