// Timing, channel assignments, limits, gains and per-node runtime settings
use std::path::Path;

use serde::{Deserialize, Serialize};

// Scheduler cadences (ms)
pub const LOOP_PERIOD_MS: u64 = 1;
pub const SERVO_UPDATE_INTERVAL_MS: u64 = 20; // 50Hz
pub const IMU_UPDATE_INTERVAL_MS: u64 = 10; // 100Hz
pub const WALK_UPDATE_INTERVAL_MS: u64 = 10;
pub const TELEMETRY_INTERVAL_MS: u64 = 100;
pub const EXPRESSION_UPDATE_MS: u64 = 50;
pub const BLINK_CHECK_MS: u64 = 100;
pub const WAVE_SWING_MS: u64 = 300;
pub const PERSON_CHECK_MS: u64 = 1000;
pub const IDLE_ACTION_MS: u64 = 10_000;
pub const HEALTH_INTERVAL_MS: u64 = 1000;

// Serial links between boards
pub const UART_BAUD_RATE: u32 = 115_200;

// Zenoh topics (main board only)
pub const TOPIC_CMD_MAIN: &str = "corosuke/cmd/main"; // remote commands
pub const TOPIC_HEALTH: &str = "corosuke/state/health"; // health status

// Servo driver: 16 channels, 50Hz PWM with 12-bit resolution
pub const SERVO_CHANNELS: usize = 16;
pub const SERVO_MIN_PULSE_US: f32 = 500.0;
pub const SERVO_MAX_PULSE_US: f32 = 2500.0;
pub const PWM_PERIOD_US: f32 = 20_000.0;
pub const PWM_RESOLUTION: f32 = 4096.0;
pub const SERVO_CENTER_ANGLE: f32 = 90.0;
pub const SERVO_MAX_ANGLE: f32 = 180.0;

// Interpolation: move 20% of the remaining distance per servo tick
pub const INTERPOLATION_GAIN: f32 = 0.2;
pub const INTERPOLATION_TOLERANCE: f32 = 0.5;

// Upper board channels
pub const SERVO_EYE_RIGHT_H: u8 = 0;
pub const SERVO_EYE_RIGHT_V: u8 = 1;
pub const SERVO_EYE_LEFT_H: u8 = 2;
pub const SERVO_EYE_LEFT_V: u8 = 3;
pub const SERVO_EYELID_RIGHT: u8 = 4;
pub const SERVO_EYELID_LEFT: u8 = 5;
pub const SERVO_MOUTH_UPPER: u8 = 6;
pub const SERVO_MOUTH_LOWER: u8 = 7;
pub const SERVO_NECK_YAW: u8 = 8;
pub const SERVO_NECK_PITCH: u8 = 9;
pub const SERVO_ARM_RIGHT_SHOULDER: u8 = 10;
pub const SERVO_ARM_RIGHT_ELBOW: u8 = 11;
pub const SERVO_ARM_LEFT_SHOULDER: u8 = 12;
pub const SERVO_ARM_LEFT_ELBOW: u8 = 13;

// Lower board channels
pub const SERVO_WAIST: u8 = 0;
pub const SERVO_LEG_RIGHT_HIP_YAW: u8 = 1;
pub const SERVO_LEG_RIGHT_HIP_PITCH: u8 = 2;
pub const SERVO_LEG_RIGHT_KNEE: u8 = 3;
pub const SERVO_LEG_RIGHT_ANKLE: u8 = 4;
pub const SERVO_LEG_LEFT_HIP_YAW: u8 = 5;
pub const SERVO_LEG_LEFT_HIP_PITCH: u8 = 6;
pub const SERVO_LEG_LEFT_KNEE: u8 = 7;
pub const SERVO_LEG_LEFT_ANKLE: u8 = 8;

// Face ranges (degrees)
pub const EYE_H_MIN: i32 = 60;
pub const EYE_H_MAX: i32 = 120;
pub const EYE_V_MIN: i32 = 70;
pub const EYE_V_MAX: i32 = 110;
pub const EYELID_OPEN: f32 = 30.0;
pub const EYELID_CLOSE: f32 = 120.0;
pub const MOUTH_CLOSED: i32 = 90;
pub const MOUTH_OPEN: i32 = 120;

// Eye LED rings
pub const LED_EYE_NUM_LEDS: usize = 12;

// Arm wave gesture
pub const WAVE_LOW_ANGLE: f32 = 45.0;
pub const WAVE_HIGH_ANGLE: f32 = 135.0;
pub const WAVE_CYCLES: u8 = 3;

// Gait (degrees, phase per walk update)
pub const WALK_STEP_HEIGHT: f32 = 20.0;
pub const WALK_STEP_LENGTH: f32 = 15.0;
pub const WALK_SWAY_AMOUNT: f32 = 10.0;
pub const WALK_CYCLE_SPEED: f32 = 0.005;
pub const WALK_WAIST_SWAY_FACTOR: f32 = 0.3;
pub const WALK_TURN_BIAS: f32 = 10.0;
pub const WALK_DEFAULT_SPEED: u8 = 50;
pub const SIT_ANGLE: f32 = 45.0;

// Balance PID
pub const BALANCE_KP: f32 = 2.0;
pub const BALANCE_KI: f32 = 0.1;
pub const BALANCE_KD: f32 = 0.5;
pub const BALANCE_INTEGRAL_LIMIT: f32 = 100.0;
pub const ANKLE_CORRECTION_GAIN: f32 = 0.5;
pub const ANKLE_MIN: f32 = 60.0;
pub const ANKLE_MAX: f32 = 120.0;

// Main board camera frame
pub const CAMERA_WIDTH: i32 = 320;
pub const CAMERA_HEIGHT: i32 = 240;

/// Which board this process drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Main,
    Upper,
    Lower,
}

impl NodeKind {
    /// Wire id used in status replies
    pub fn wire_id(self) -> u8 {
        match self {
            NodeKind::Main => 0,
            NodeKind::Upper => 1,
            NodeKind::Lower => 2,
        }
    }
}

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime settings for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeKind,
    /// Serial port toward the main board (None on the main board)
    pub upstream_port: Option<String>,
    /// Serial port toward the next board down (None on the lower board)
    pub downstream_port: Option<String>,
    pub baud_rate: u32,
    /// Seed for blink and idle randomness; None seeds from entropy
    pub seed: Option<u64>,
    /// Enable the zenoh bridge on the main board
    pub zenoh: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeKind::Lower,
            upstream_port: None,
            downstream_port: None,
            baud_rate: UART_BAUD_RATE,
            seed: None,
            zenoh: true,
        }
    }
}

impl NodeConfig {
    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}
