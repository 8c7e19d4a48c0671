// Motion control for the servo boards
//
// Provides:
// - Joint target/current state with per-tick interpolation
// - Biped gait synthesis (lower board)
// - Pitch/roll balance PID (lower board)

mod actuator;
pub mod balance;
pub mod gait;

pub use actuator::{ActuatorState, ServoCalibration};
pub use balance::{AnkleCorrection, BalanceController, PidGains};
pub use gait::{GaitGenerator, GaitParams, GaitStep, JointTargets, WalkMode, WalkState};
