// IMU-driven balance stabilization for the lower board
//
// Independent PID loops on pitch and roll, both holding the body level
// (set-point 0). Runs once per IMU sample, only while walking.

use tracing::trace;

use crate::config::{
    ANKLE_CORRECTION_GAIN, ANKLE_MAX, ANKLE_MIN, BALANCE_INTEGRAL_LIMIT, BALANCE_KD, BALANCE_KI,
    BALANCE_KP, SERVO_LEG_LEFT_ANKLE, SERVO_LEG_RIGHT_ANKLE,
};
use crate::hal::Orientation;
use crate::motion::ActuatorState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: BALANCE_KP,
            ki: BALANCE_KI,
            kd: BALANCE_KD,
        }
    }
}

/// Per-axis PID memory
///
/// The integral is an unscaled sum of errors clamped to +/-100; the
/// derivative is the per-sample error difference (no dt, fixed 100Hz rate).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisState {
    pub error: f32,
    pub integral: f32,
    pub previous_error: f32,
}

impl AxisState {
    /// Feed one measured angle and return the correction
    pub fn update(&mut self, angle: f32, gains: &PidGains) -> f32 {
        self.error = 0.0 - angle;
        self.integral =
            (self.integral + self.error).clamp(-BALANCE_INTEGRAL_LIMIT, BALANCE_INTEGRAL_LIMIT);
        let derivative = self.error - self.previous_error;
        self.previous_error = self.error;

        gains.kp * self.error + gains.ki * self.integral + gains.kd * derivative
    }
}

/// Corrections computed from one orientation sample
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnkleCorrection {
    pub pitch: f32,
    /// Computed and reported, but not driven into any joint
    pub roll: f32,
}

#[derive(Debug, Clone, Default)]
pub struct BalanceController {
    gains: PidGains,
    pitch: AxisState,
    roll: AxisState,
    last: AnkleCorrection,
}

impl BalanceController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            ..Default::default()
        }
    }

    pub fn pitch_state(&self) -> &AxisState {
        &self.pitch
    }

    pub fn roll_state(&self) -> &AxisState {
        &self.roll
    }

    /// Most recent correction, zero until the first walking sample
    pub fn last_correction(&self) -> AnkleCorrection {
        self.last
    }

    /// Run both axes on one sample
    pub fn tick(&mut self, orientation: &Orientation) -> AnkleCorrection {
        let correction = AnkleCorrection {
            pitch: self.pitch.update(orientation.pitch, &self.gains),
            roll: self.roll.update(orientation.roll, &self.gains),
        };
        trace!(
            "Balance: pitch {:.2} -> {:.2}, roll {:.2} -> {:.2}",
            orientation.pitch, correction.pitch, orientation.roll, correction.roll
        );
        self.last = correction;
        correction
    }

    /// Add the pitch correction to both ankles, same sign, then clamp to the
    /// safe ankle range
    pub fn apply(correction: &AnkleCorrection, actuators: &mut ActuatorState) {
        for channel in [SERVO_LEG_RIGHT_ANKLE, SERVO_LEG_LEFT_ANKLE] {
            let target = actuators.target(channel) + correction.pitch * ANKLE_CORRECTION_GAIN;
            actuators.set_target(channel, target.clamp(ANKLE_MIN, ANKLE_MAX));
        }
        // TODO: drive correction.roll into a hip-roll joint once the lower
        // board has lateral actuation
    }
}
