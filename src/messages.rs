// JSON message types carried over zenoh

use serde::{Deserialize, Serialize};

use crate::config::NodeKind;
use crate::expression::Expression;
use crate::motion::WalkMode;
use crate::protocol::{CommandId, ExpressionData, LipsyncData, LookAtData, Payload, TurnData, WalkData};

/// Command from teleop/scripts -> main board
///
/// Tagged by `type`, e.g. `{"type": "walk", "mode": "forward", "speed": 60}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteCommand {
    Expression { expression: Expression },
    LookAt { x: i8, y: i8 },
    Walk { mode: WalkMode, speed: u8 },
    Stop,
    Stand,
    Sit,
    Turn { direction: i8 },
    Wave,
    SpeakStart,
    SpeakStop,
    /// Raw audio amplitude 0-255
    Lipsync { amplitude: u8 },
    Ping,
}

/// Scale a 0-255 audio amplitude onto the 0-100 mouth range
pub fn amplitude_to_mouth(amplitude: u8) -> u8 {
    (amplitude as u16 * 100 / 255) as u8
}

impl RemoteCommand {
    /// Wire command and payload this request turns into
    pub fn to_packet(&self) -> (CommandId, Vec<u8>) {
        match *self {
            RemoteCommand::Expression { expression } => (
                CommandId::Expression,
                ExpressionData {
                    expression_id: expression as u8,
                    intensity: 100,
                    duration_ms: 0,
                }
                .encode(),
            ),
            RemoteCommand::LookAt { x, y } => (CommandId::LookAt, LookAtData { x, y }.encode()),
            RemoteCommand::Walk { mode, speed } => (
                CommandId::WalkDirection,
                WalkData {
                    mode: mode as u8,
                    speed: speed.min(100),
                    direction: 0,
                }
                .encode(),
            ),
            RemoteCommand::Stop => (CommandId::WalkStop, Vec::new()),
            RemoteCommand::Stand => (CommandId::Stand, Vec::new()),
            RemoteCommand::Sit => (CommandId::Sit, Vec::new()),
            RemoteCommand::Turn { direction } => (CommandId::Turn, TurnData { direction }.encode()),
            RemoteCommand::Wave => (CommandId::Wave, Vec::new()),
            RemoteCommand::SpeakStart => (CommandId::SpeakStart, Vec::new()),
            RemoteCommand::SpeakStop => (CommandId::SpeakStop, Vec::new()),
            RemoteCommand::Lipsync { amplitude } => (
                CommandId::LipsyncData,
                LipsyncData {
                    amplitude: amplitude_to_mouth(amplitude),
                }
                .encode(),
            ),
            RemoteCommand::Ping => (CommandId::Ping, Vec::new()),
        }
    }
}

/// Health counters published by every board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHealth {
    pub node: NodeKind,
    pub packets_dispatched: u32,
    pub unknown_commands: u32,
    pub frames_dropped: u32,
    pub driver_faults: u32,
}

impl NodeHealth {
    pub fn new(node: NodeKind) -> Self {
        Self {
            node,
            packets_dispatched: 0,
            unknown_commands: 0,
            frames_dropped: 0,
            driver_faults: 0,
        }
    }
}
