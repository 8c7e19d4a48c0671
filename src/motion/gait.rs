// Biped gait synthesis for the lower board
//
// A single phase accumulator in [0, 1) drives both legs half a cycle apart.
// Each leg lifts on the positive half of its sine and swings on its cosine;
// the body sways with the right leg's phase.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::config::{
    SERVO_CENTER_ANGLE, SERVO_LEG_LEFT_ANKLE, SERVO_LEG_LEFT_HIP_PITCH, SERVO_LEG_LEFT_HIP_YAW,
    SERVO_LEG_LEFT_KNEE, SERVO_LEG_RIGHT_ANKLE, SERVO_LEG_RIGHT_HIP_PITCH,
    SERVO_LEG_RIGHT_HIP_YAW, SERVO_LEG_RIGHT_KNEE, SERVO_WAIST, SIT_ANGLE, WALK_CYCLE_SPEED,
    WALK_DEFAULT_SPEED, WALK_STEP_HEIGHT, WALK_STEP_LENGTH, WALK_SWAY_AMOUNT, WALK_TURN_BIAS,
    WALK_WAIST_SWAY_FACTOR,
};
use crate::motion::ActuatorState;
use crate::protocol::ProtocolError;

/// Walking modes as carried in WalkData.mode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkMode {
    #[default]
    Stop = 0,
    Forward = 1,
    Backward = 2,
    Left = 3,
    Right = 4,
    TurnLeft = 5,
    TurnRight = 6,
}

impl TryFrom<u8> for WalkMode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Stop),
            1 => Ok(Self::Forward),
            2 => Ok(Self::Backward),
            3 => Ok(Self::Left),
            4 => Ok(Self::Right),
            5 => Ok(Self::TurnLeft),
            6 => Ok(Self::TurnRight),
            _ => Err(ProtocolError::InvalidValue {
                field: "walk mode",
                value,
            }),
        }
    }
}

/// Long-lived walking state of the lower board
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkState {
    pub mode: WalkMode,
    pub speed: u8,  // 0-100
    pub phase: f32, // [0, 1)
    pub walking: bool,
}

impl Default for WalkState {
    fn default() -> Self {
        Self {
            mode: WalkMode::Stop,
            speed: WALK_DEFAULT_SPEED,
            phase: 0.0,
            walking: false,
        }
    }
}

/// Joint angles for one leg (degrees)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegTargets {
    pub hip_yaw: f32,
    pub hip_pitch: f32,
    pub knee: f32,
    pub ankle: f32,
}

impl LegTargets {
    fn neutral(reference: f32) -> Self {
        Self {
            hip_yaw: reference,
            hip_pitch: reference,
            knee: reference,
            ankle: reference,
        }
    }
}

/// Waist and leg targets produced by one gait tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTargets {
    pub waist: f32,
    pub right: LegTargets,
    pub left: LegTargets,
}

impl JointTargets {
    /// Standing posture: every joint at the reference angle
    pub fn stand() -> Self {
        Self::neutral(SERVO_CENTER_ANGLE)
    }

    pub fn neutral(reference: f32) -> Self {
        Self {
            waist: reference,
            right: LegTargets::neutral(reference),
            left: LegTargets::neutral(reference),
        }
    }

    /// Write these targets into the board's actuator state
    pub fn apply(&self, actuators: &mut ActuatorState) {
        actuators.set_target(SERVO_WAIST, self.waist);

        actuators.set_target(SERVO_LEG_RIGHT_HIP_YAW, self.right.hip_yaw);
        actuators.set_target(SERVO_LEG_RIGHT_HIP_PITCH, self.right.hip_pitch);
        actuators.set_target(SERVO_LEG_RIGHT_KNEE, self.right.knee);
        actuators.set_target(SERVO_LEG_RIGHT_ANKLE, self.right.ankle);

        actuators.set_target(SERVO_LEG_LEFT_HIP_YAW, self.left.hip_yaw);
        actuators.set_target(SERVO_LEG_LEFT_HIP_PITCH, self.left.hip_pitch);
        actuators.set_target(SERVO_LEG_LEFT_KNEE, self.left.knee);
        actuators.set_target(SERVO_LEG_LEFT_ANKLE, self.left.ankle);
    }
}

/// Sitting posture: bend hips and knees, leave the rest where it is
pub fn apply_sit(actuators: &mut ActuatorState) {
    actuators.set_target(SERVO_LEG_RIGHT_HIP_PITCH, SIT_ANGLE);
    actuators.set_target(SERVO_LEG_RIGHT_KNEE, SIT_ANGLE);
    actuators.set_target(SERVO_LEG_LEFT_HIP_PITCH, SIT_ANGLE);
    actuators.set_target(SERVO_LEG_LEFT_KNEE, SIT_ANGLE);
}

/// Gait shape parameters (degrees, phase per tick)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitParams {
    pub step_height: f32,
    pub step_length: f32,
    pub sway_amount: f32,
    pub cycle_speed: f32,
    pub waist_sway_factor: f32,
    pub turn_bias: f32,
    pub reference: f32,
}

impl Default for GaitParams {
    fn default() -> Self {
        Self {
            step_height: WALK_STEP_HEIGHT,
            step_length: WALK_STEP_LENGTH,
            sway_amount: WALK_SWAY_AMOUNT,
            cycle_speed: WALK_CYCLE_SPEED,
            waist_sway_factor: WALK_WAIST_SWAY_FACTOR,
            turn_bias: WALK_TURN_BIAS,
            reference: SERVO_CENTER_ANGLE,
        }
    }
}

/// Lift and swing of one leg at a given leg phase (radians)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegMotion {
    pub lift: f32,
    pub swing: f32,
}

/// Result of one gait tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaitStep {
    pub targets: JointTargets,
    /// Mode was Stop: the caller should clear its walking flag
    pub stopped: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GaitGenerator {
    params: GaitParams,
}

impl GaitGenerator {
    pub fn new(params: GaitParams) -> Self {
        Self { params }
    }

    /// Foot lift only on the positive half of the sine, never negative
    pub fn leg_motion(&self, leg_phase: f32) -> LegMotion {
        LegMotion {
            lift: leg_phase.sin().max(0.0) * self.params.step_height,
            swing: leg_phase.cos() * self.params.step_length,
        }
    }

    /// Joint targets at a gait phase in [0, 1)
    pub fn pose(&self, phase: f32, mode: WalkMode) -> JointTargets {
        let p = &self.params;
        let theta = phase * 2.0 * PI;

        // Legs are half a cycle apart
        let right = self.leg_motion(theta);
        let left = self.leg_motion(theta + PI);

        let direction = if mode == WalkMode::Backward { -1.0 } else { 1.0 };
        let sway = theta.sin() * p.sway_amount;

        let mut targets = JointTargets {
            waist: p.reference + sway * p.waist_sway_factor,
            right: LegTargets {
                hip_yaw: p.reference + sway,
                hip_pitch: p.reference + right.swing * direction,
                knee: p.reference + right.lift,
                ankle: p.reference - right.lift * 0.5,
            },
            left: LegTargets {
                hip_yaw: p.reference - sway,
                hip_pitch: p.reference + left.swing * direction,
                knee: p.reference + left.lift,
                ankle: p.reference - left.lift * 0.5,
            },
        };

        match mode {
            WalkMode::TurnLeft => {
                targets.right.hip_yaw += p.turn_bias;
                targets.left.hip_yaw += p.turn_bias;
            }
            WalkMode::TurnRight => {
                targets.right.hip_yaw -= p.turn_bias;
                targets.left.hip_yaw -= p.turn_bias;
            }
            _ => {}
        }

        targets
    }

    /// Advance the phase by `cycle_speed * speed / 100` and produce targets
    pub fn tick(&self, walk: &mut WalkState) -> GaitStep {
        if walk.mode == WalkMode::Stop {
            return GaitStep {
                targets: JointTargets::neutral(self.params.reference),
                stopped: true,
            };
        }

        let speed_factor = walk.speed.min(100) as f32 / 100.0;
        walk.phase = (walk.phase + self.params.cycle_speed * speed_factor).rem_euclid(1.0);

        GaitStep {
            targets: self.pose(walk.phase, walk.mode),
            stopped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_right_leg_kinematics() {
        let gait = GaitGenerator::default();

        let at0 = gait.pose(0.0, WalkMode::Forward);
        assert!(close(at0.right.knee, 90.0), "lift should be 0 at phase 0");
        assert!(close(at0.right.hip_pitch, 90.0 + 15.0), "swing should be +stepLength");

        let at25 = gait.pose(0.25, WalkMode::Forward);
        assert!(close(at25.right.knee, 90.0 + 20.0), "lift should peak at phase 0.25");
        assert!(close(at25.right.ankle, 90.0 - 10.0));

        let at50 = gait.pose(0.5, WalkMode::Forward);
        assert!(close(at50.right.knee, 90.0));
        assert!(close(at50.right.hip_pitch, 90.0 - 15.0));
    }

    #[test]
    fn test_left_leg_delayed_half_cycle() {
        let gait = GaitGenerator::default();
        for i in 0..20 {
            let phase = i as f32 / 20.0;
            let now = gait.pose(phase, WalkMode::Forward);
            let earlier = gait.pose((phase + 0.5).rem_euclid(1.0), WalkMode::Forward);
            assert!(close(now.left.knee, earlier.right.knee), "phase {}", phase);
            assert!(close(now.left.hip_pitch, earlier.right.hip_pitch), "phase {}", phase);
        }
    }

    #[test]
    fn test_lift_never_negative() {
        let gait = GaitGenerator::default();
        for i in 0..100 {
            let motion = gait.leg_motion(i as f32 / 100.0 * 2.0 * PI);
            assert!(motion.lift >= 0.0);
        }
    }

    #[test]
    fn test_backward_flips_swing() {
        let gait = GaitGenerator::default();
        let fwd = gait.pose(0.1, WalkMode::Forward);
        let back = gait.pose(0.1, WalkMode::Backward);
        assert!(close(fwd.right.hip_pitch - 90.0, -(back.right.hip_pitch - 90.0)));
        assert!(close(fwd.right.knee, back.right.knee));
    }

    #[test]
    fn test_sway_opposite_on_hips_and_scaled_on_waist() {
        let gait = GaitGenerator::default();
        let pose = gait.pose(0.25, WalkMode::Forward);
        // sin(pi/2) * 10 = 10
        assert!(close(pose.right.hip_yaw, 100.0));
        assert!(close(pose.left.hip_yaw, 80.0));
        assert!(close(pose.waist, 93.0));
    }

    #[test]
    fn test_turn_bias() {
        let gait = GaitGenerator::default();
        let base = gait.pose(0.3, WalkMode::Forward);
        let left = gait.pose(0.3, WalkMode::TurnLeft);
        let right = gait.pose(0.3, WalkMode::TurnRight);

        assert!(close(left.right.hip_yaw, base.right.hip_yaw + 10.0));
        assert!(close(left.left.hip_yaw, base.left.hip_yaw + 10.0));
        assert!(close(right.right.hip_yaw, base.right.hip_yaw - 10.0));
        assert!(close(right.left.hip_yaw, base.left.hip_yaw - 10.0));
    }

    #[test]
    fn test_stop_emits_stand_and_signals() {
        let gait = GaitGenerator::default();
        let mut walk = WalkState {
            phase: 0.4,
            walking: true,
            ..Default::default()
        };
        let step = gait.tick(&mut walk);
        assert!(step.stopped);
        assert_eq!(step.targets, JointTargets::stand());
        assert_eq!(walk.phase, 0.4);
    }

    #[test]
    fn test_phase_advance_proportional_to_speed() {
        let gait = GaitGenerator::default();
        let mut walk = WalkState {
            mode: WalkMode::Forward,
            speed: 80,
            phase: 0.0,
            walking: true,
        };
        gait.tick(&mut walk);
        assert!(close(walk.phase, 0.005 * 0.8));

        let mut half = WalkState {
            speed: 40,
            ..walk
        };
        half.phase = 0.0;
        gait.tick(&mut half);
        assert!((half.phase * 2.0 - walk.phase).abs() < 1e-6);
    }

    #[test]
    fn test_phase_wraps() {
        let gait = GaitGenerator::default();
        let mut walk = WalkState {
            mode: WalkMode::Forward,
            speed: 100,
            phase: 0.998,
            walking: true,
        };
        gait.tick(&mut walk);
        assert!(walk.phase >= 0.0 && walk.phase < 1.0);
        assert!(close(walk.phase, 0.003));
    }

    #[test]
    fn test_walk_mode_from_byte() {
        assert_eq!(WalkMode::try_from(2).unwrap(), WalkMode::Backward);
        assert_eq!(WalkMode::try_from(6).unwrap(), WalkMode::TurnRight);
        assert!(WalkMode::try_from(7).is_err());
    }

    #[test]
    fn test_apply_writes_leg_channels() {
        let gait = GaitGenerator::default();
        let mut actuators = ActuatorState::new();
        gait.pose(0.25, WalkMode::Forward).apply(&mut actuators);
        assert!(close(actuators.target(SERVO_LEG_RIGHT_KNEE), 110.0));
        assert!(close(actuators.target(SERVO_LEG_LEFT_KNEE), 90.0));

        apply_sit(&mut actuators);
        assert_eq!(actuators.target(SERVO_LEG_RIGHT_HIP_PITCH), 45.0);
        assert_eq!(actuators.target(SERVO_LEG_LEFT_KNEE), 45.0);
    }
}
