// Face control for the upper board: expressions, gaze, eyelids, mouth and
// eye LED rings
//
// Expression changes overwrite every face output at once from a fixed table.
// Blinking and idle gaze run on their own timers and simply write over
// whatever the expression set; the last write in a tick wins.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{
    BLINK_CHECK_MS, EXPRESSION_UPDATE_MS, EYELID_CLOSE, EYELID_OPEN, EYE_H_MAX, EYE_H_MIN,
    EYE_V_MAX, EYE_V_MIN, LED_EYE_NUM_LEDS, MOUTH_CLOSED, MOUTH_OPEN, SERVO_EYELID_LEFT,
    SERVO_EYELID_RIGHT, SERVO_EYE_LEFT_H, SERVO_EYE_LEFT_V, SERVO_EYE_RIGHT_H, SERVO_EYE_RIGHT_V,
    SERVO_MOUTH_LOWER, SERVO_MOUTH_UPPER,
};
use crate::hal::{DriverError, IndicatorDriver, Rgb, Side};
use crate::motion::ActuatorState;
use crate::protocol::ProtocolError;
use crate::scheduler::Periodic;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    #[default]
    Neutral = 0,
    Happy = 1,
    Sad = 2,
    Surprised = 3,
    Angry = 4,
    Sleepy = 5,
    Thinking = 6,
    Excited = 7,
}

impl TryFrom<u8> for Expression {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Neutral),
            1 => Ok(Self::Happy),
            2 => Ok(Self::Sad),
            3 => Ok(Self::Surprised),
            4 => Ok(Self::Angry),
            5 => Ok(Self::Sleepy),
            6 => Ok(Self::Thinking),
            7 => Ok(Self::Excited),
            _ => Err(ProtocolError::InvalidValue {
                field: "expression",
                value,
            }),
        }
    }
}

/// Face outputs for one expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacePose {
    pub gaze: (i8, i8),
    pub eyelid: f32,
    pub mouth: u8,
    pub color: Rgb,
}

const WARM: Rgb = Rgb::new(255, 200, 100);
const BLUE: Rgb = Rgb::new(100, 100, 255);
const RED: Rgb = Rgb::new(255, 50, 50);
const SOFT_WHITE: Rgb = Rgb::new(200, 200, 200);

impl Expression {
    /// Fixed lookup table of face outputs
    pub fn pose(self) -> FacePose {
        let (gaze, eyelid, mouth, color) = match self {
            Expression::Neutral => ((0, 0), EYELID_OPEN, 0, SOFT_WHITE),
            Expression::Happy => ((0, 10), EYELID_OPEN + 20.0, 30, WARM),
            Expression::Sad => ((0, -20), EYELID_OPEN + 30.0, 10, BLUE),
            Expression::Surprised => ((0, 20), EYELID_OPEN - 10.0, 80, SOFT_WHITE),
            Expression::Angry => ((0, -10), EYELID_OPEN + 40.0, 20, RED),
            Expression::Sleepy => ((0, -30), EYELID_OPEN + 50.0, 10, SOFT_WHITE),
            Expression::Thinking => ((30, 20), EYELID_OPEN, 5, SOFT_WHITE),
            Expression::Excited => ((0, 15), EYELID_OPEN, 50, WARM),
        };
        FacePose {
            gaze,
            eyelid,
            mouth,
            color,
        }
    }
}

/// Integer linear remap, truncating like the servo firmware's `map`
fn map_range(value: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Long-lived face state of the upper board
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExpressionState {
    pub current: Expression,
    pub speaking: bool,
    /// Eyelids currently held shut by the blink timer
    pub blinking: bool,
    pub mouth_amount: u8,
    pub gaze: (i8, i8),
}

pub struct ExpressionController {
    state: ExpressionState,
    rng: StdRng,
    blink_timer: Periodic,
    blink_counter: u32,
    blink_threshold: u32,
    idle_timer: Periodic,
    idle_counter: u32,
    idle_threshold: u32,
}

impl ExpressionController {
    /// `seed` makes blink and idle timing reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let blink_threshold = rng.gen_range(30..50);
        let idle_threshold = rng.gen_range(50..100);

        Self {
            state: ExpressionState::default(),
            rng,
            blink_timer: Periodic::new(BLINK_CHECK_MS),
            blink_counter: 0,
            blink_threshold,
            idle_timer: Periodic::new(EXPRESSION_UPDATE_MS),
            idle_counter: 0,
            idle_threshold,
        }
    }

    pub fn state(&self) -> &ExpressionState {
        &self.state
    }

    /// Overwrite gaze, eyelids, mouth and color from the expression table
    ///
    /// While speaking, the mouth stays under lip-sync control.
    pub fn set_expression(&mut self, expression: Expression, actuators: &mut ActuatorState) {
        let pose = expression.pose();
        self.state.current = expression;

        self.set_eye_position(pose.gaze.0, pose.gaze.1, actuators);
        set_eyelids(pose.eyelid, actuators);
        if !self.state.speaking {
            self.set_mouth_open(pose.mouth, actuators);
        }

        info!("Expression: {:?}", expression);
    }

    /// Point both eyes at normalized coordinates in [-50, 50]
    pub fn set_eye_position(&mut self, x: i8, y: i8, actuators: &mut ActuatorState) {
        let x = x.clamp(-50, 50);
        let y = y.clamp(-50, 50);
        self.state.gaze = (x, y);

        let h = map_range(x as i32, -50, 50, EYE_H_MIN, EYE_H_MAX) as f32;
        let v = map_range(y as i32, -50, 50, EYE_V_MIN, EYE_V_MAX) as f32;

        actuators.set_target(SERVO_EYE_RIGHT_H, h);
        actuators.set_target(SERVO_EYE_LEFT_H, h);
        actuators.set_target(SERVO_EYE_RIGHT_V, v);
        actuators.set_target(SERVO_EYE_LEFT_V, v);
    }

    /// Force the eyelids fully shut or fully open
    pub fn set_blink(&mut self, closed: bool, actuators: &mut ActuatorState) {
        set_eyelids(if closed { EYELID_CLOSE } else { EYELID_OPEN }, actuators);
    }

    /// Mouth aperture 0-100; the upper lip counter-moves by a third
    pub fn set_mouth_open(&mut self, amount: u8, actuators: &mut ActuatorState) {
        let amount = amount.min(100);
        self.state.mouth_amount = amount;

        let lower = map_range(amount as i32, 0, 100, MOUTH_CLOSED, MOUTH_OPEN);
        let upper = MOUTH_CLOSED - (lower - MOUTH_CLOSED) / 3;
        actuators.set_target(SERVO_MOUTH_LOWER, lower as f32);
        actuators.set_target(SERVO_MOUTH_UPPER, upper as f32);
    }

    /// Lip-sync sample: marks speech active and drives the mouth
    pub fn lipsync(&mut self, amount: u8, actuators: &mut ActuatorState) {
        self.state.speaking = true;
        self.set_mouth_open(amount, actuators);
    }

    pub fn speak_start(&mut self) {
        self.state.speaking = true;
    }

    /// End of speech closes the mouth to neutral, not to the expression's
    /// own mouth target
    pub fn speak_stop(&mut self, actuators: &mut ActuatorState) {
        self.state.speaking = false;
        self.set_mouth_open(0, actuators);
    }

    /// Blink timer: check every 100ms, close after a random 3-5s, reopen
    /// after 0.3s. The threshold is re-rolled whenever the eyelids flip.
    pub fn update_blink(&mut self, now_ms: u64, actuators: &mut ActuatorState) {
        if !self.blink_timer.ready(now_ms) {
            return;
        }
        self.blink_counter += 1;

        if !self.state.blinking && self.blink_counter > self.blink_threshold {
            self.state.blinking = true;
            self.set_blink(true, actuators);
            self.blink_counter = 0;
            self.blink_threshold = self.rng.gen_range(30..50);
        } else if self.state.blinking && self.blink_counter > 2 {
            self.state.blinking = false;
            self.set_blink(false, actuators);
            self.blink_counter = 0;
            self.blink_threshold = self.rng.gen_range(30..50);
        }
    }

    /// One idle-gaze step: only while neutral and silent, glance somewhere
    /// random after 50-100 steps (2.5-5s at the expression rate)
    pub fn update_idle(&mut self, actuators: &mut ActuatorState) -> bool {
        if self.state.speaking || self.state.current != Expression::Neutral {
            return false;
        }

        self.idle_counter += 1;
        if self.idle_counter <= self.idle_threshold {
            return false;
        }

        let x = self.rng.gen_range(-20..20);
        let y = self.rng.gen_range(-10..10);
        debug!("Idle glance to ({}, {})", x, y);
        self.set_eye_position(x, y, actuators);
        self.idle_counter = 0;
        self.idle_threshold = self.rng.gen_range(50..100);
        true
    }

    /// Paint both eye rings: highlight at index 0, expression color elsewhere
    pub fn update_leds<I: IndicatorDriver + ?Sized>(&self, leds: &mut I) -> Result<(), DriverError> {
        let color = self.state.current.pose().color;
        for side in [Side::Right, Side::Left] {
            leds.write(side, 0, Rgb::WHITE)?;
            for index in 1..LED_EYE_NUM_LEDS {
                leds.write(side, index, color)?;
            }
        }
        leds.show()
    }

    /// Expression-rate housekeeping (every 50ms): idle gaze then LEDs
    pub fn tick<I: IndicatorDriver + ?Sized>(
        &mut self,
        now_ms: u64,
        actuators: &mut ActuatorState,
        leds: &mut I,
    ) {
        if !self.idle_timer.ready(now_ms) {
            return;
        }
        self.update_idle(actuators);
        if let Err(e) = self.update_leds(leds) {
            warn!("Eye LED update failed: {}", e);
        }
    }
}

fn set_eyelids(angle: f32, actuators: &mut ActuatorState) {
    actuators.set_target(SERVO_EYELID_RIGHT, angle);
    actuators.set_target(SERVO_EYELID_LEFT, angle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SimIndicator;

    fn controller() -> (ExpressionController, ActuatorState) {
        (ExpressionController::new(Some(7)), ActuatorState::new())
    }

    #[test]
    fn test_expression_overwrites_face() {
        let (mut face, mut act) = controller();
        face.set_expression(Expression::Surprised, &mut act);

        // gaze (0, 20): h = 90, v = (70 * 40 / 100) + 70 = 98
        assert_eq!(act.target(SERVO_EYE_RIGHT_H), 90.0);
        assert_eq!(act.target(SERVO_EYE_LEFT_V), 98.0);
        assert_eq!(act.target(SERVO_EYELID_RIGHT), 20.0);
        // mouth 80: lower = 90 + 80 * 30 / 100 = 114, upper = 90 - 24 / 3 = 82
        assert_eq!(act.target(SERVO_MOUTH_LOWER), 114.0);
        assert_eq!(act.target(SERVO_MOUTH_UPPER), 82.0);
        assert_eq!(face.state().current, Expression::Surprised);
    }

    #[test]
    fn test_eye_position_clamped_and_mapped() {
        let (mut face, mut act) = controller();
        face.set_eye_position(-100, 50, &mut act);
        assert_eq!(face.state().gaze, (-50, 50));
        assert_eq!(act.target(SERVO_EYE_RIGHT_H), 60.0);
        assert_eq!(act.target(SERVO_EYE_LEFT_H), 60.0);
        assert_eq!(act.target(SERVO_EYE_RIGHT_V), 110.0);
    }

    #[test]
    fn test_lipsync_wins_while_speaking() {
        let (mut face, mut act) = controller();
        face.lipsync(60, &mut act);
        face.set_expression(Expression::Happy, &mut act);

        assert!(face.state().speaking);
        assert_eq!(face.state().mouth_amount, 60);
        assert_eq!(act.target(SERVO_MOUTH_LOWER), 108.0);
    }

    #[test]
    fn test_speech_end_resets_mouth_to_neutral() {
        let (mut face, mut act) = controller();
        face.set_expression(Expression::Excited, &mut act);
        face.lipsync(90, &mut act);
        face.speak_stop(&mut act);

        // Closed, not Excited's 50
        assert!(!face.state().speaking);
        assert_eq!(face.state().mouth_amount, 0);
        assert_eq!(act.target(SERVO_MOUTH_LOWER), MOUTH_CLOSED as f32);
        assert_eq!(face.state().current, Expression::Excited);
    }

    #[test]
    fn test_blink_closes_then_reopens() {
        let (mut face, mut act) = controller();
        let mut closed_at = None;

        for step in 1..=60u64 {
            face.update_blink(step * BLINK_CHECK_MS, &mut act);
            if face.state().blinking {
                closed_at = Some(step);
                break;
            }
        }
        let closed_at = closed_at.expect("no blink within 6s");
        assert!(closed_at > 30 && closed_at <= 50);
        assert_eq!(act.target(SERVO_EYELID_LEFT), EYELID_CLOSE);

        for step in 1..=3u64 {
            face.update_blink((closed_at + step) * BLINK_CHECK_MS, &mut act);
        }
        assert!(!face.state().blinking);
        assert_eq!(act.target(SERVO_EYELID_LEFT), EYELID_OPEN);
    }

    #[test]
    fn test_idle_gaze_only_when_neutral_and_silent() {
        let (mut face, mut act) = controller();
        face.set_expression(Expression::Thinking, &mut act);
        for _ in 0..200 {
            assert!(!face.update_idle(&mut act));
        }
        assert_eq!(face.state().gaze, (30, 20));

        face.set_expression(Expression::Neutral, &mut act);
        let glanced = (0..200).any(|_| face.update_idle(&mut act));
        assert!(glanced);
        let (x, y) = face.state().gaze;
        assert!((-20..20).contains(&x) && (-10..10).contains(&y));
    }

    #[test]
    fn test_led_colors_follow_expression() {
        let (mut face, mut act) = controller();
        let mut leds = SimIndicator::new();

        face.set_expression(Expression::Angry, &mut act);
        face.update_leds(&mut leds).unwrap();
        assert_eq!(leds.color(Side::Right, 0), Some(Rgb::WHITE));
        assert_eq!(leds.color(Side::Left, 5), Some(Rgb::new(255, 50, 50)));
        assert_eq!(leds.shows(), 1);

        face.set_expression(Expression::Sleepy, &mut act);
        face.update_leds(&mut leds).unwrap();
        assert_eq!(leds.color(Side::Right, 11), Some(Rgb::new(200, 200, 200)));
    }

    #[test]
    fn test_tick_paints_leds_at_expression_rate() {
        let (mut face, mut act) = controller();
        let mut leds = SimIndicator::new();

        face.tick(10, &mut act, &mut leds);
        assert_eq!(leds.shows(), 0);
        face.tick(EXPRESSION_UPDATE_MS, &mut act, &mut leds);
        face.tick(EXPRESSION_UPDATE_MS + 10, &mut act, &mut leds);
        assert_eq!(leds.shows(), 1);
        assert_eq!(leds.color(Side::Left, 3), Some(Rgb::new(200, 200, 200)));
    }

    #[test]
    fn test_expression_from_byte() {
        assert_eq!(Expression::try_from(7).unwrap(), Expression::Excited);
        assert!(Expression::try_from(8).is_err());
    }
}
