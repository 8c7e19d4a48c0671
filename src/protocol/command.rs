// Command id table shared by all three boards
//
// Ids are grouped by numeric range; new commands go into the matching range.

use super::ProtocolError;

/// Command groups, one per 16-id range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandGroup {
    System,     // 0x00-0x0F
    Expression, // 0x10-0x1F
    Speech,     // 0x20-0x2F
    Locomotion, // 0x30-0x3F
    Arm,        // 0x40-0x4F
    Sensor,     // 0x50-0x5F
    Vision,     // 0x60-0x6F
}

impl CommandGroup {
    /// Group a raw command byte belongs to, or None outside the defined ranges
    pub fn of(cmd: u8) -> Option<Self> {
        match cmd >> 4 {
            0x0 => Some(Self::System),
            0x1 => Some(Self::Expression),
            0x2 => Some(Self::Speech),
            0x3 => Some(Self::Locomotion),
            0x4 => Some(Self::Arm),
            0x5 => Some(Self::Sensor),
            0x6 => Some(Self::Vision),
            _ => None,
        }
    }
}

/// Every command id understood on the wire
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandId {
    Ping = 0x00,
    Pong = 0x01,
    Status = 0x02,
    StatusResp = 0x03,
    Error = 0x0F,

    // main -> upper
    Expression = 0x10,
    EyePosition = 0x11,
    Blink = 0x12,
    MouthOpen = 0x13,

    // main -> upper
    SpeakStart = 0x20,
    SpeakStop = 0x21,
    LipsyncData = 0x22,
    PlayAudio = 0x23,

    // upper -> lower
    WalkStart = 0x30,
    WalkStop = 0x31,
    WalkDirection = 0x32,
    Turn = 0x33,
    Stand = 0x34,
    Sit = 0x35,

    // main -> upper
    ArmPosition = 0x40,
    Wave = 0x41,
    Point = 0x42,

    // lower -> upper
    ImuData = 0x50,
    BalanceStatus = 0x51,

    // main -> upper
    PersonDetected = 0x60,
    FacePosition = 0x61,
    LookAt = 0x62,
}

impl CommandId {
    pub const ALL: [CommandId; 27] = [
        Self::Ping,
        Self::Pong,
        Self::Status,
        Self::StatusResp,
        Self::Error,
        Self::Expression,
        Self::EyePosition,
        Self::Blink,
        Self::MouthOpen,
        Self::SpeakStart,
        Self::SpeakStop,
        Self::LipsyncData,
        Self::PlayAudio,
        Self::WalkStart,
        Self::WalkStop,
        Self::WalkDirection,
        Self::Turn,
        Self::Stand,
        Self::Sit,
        Self::ArmPosition,
        Self::Wave,
        Self::Point,
        Self::ImuData,
        Self::BalanceStatus,
        Self::PersonDetected,
        Self::FacePosition,
        Self::LookAt,
    ];

    pub fn group(self) -> CommandGroup {
        // every variant sits inside a defined range
        CommandGroup::of(self as u8).unwrap_or(CommandGroup::System)
    }
}

impl From<CommandId> for u8 {
    fn from(id: CommandId) -> Self {
        id as u8
    }
}

impl TryFrom<u8> for CommandId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| *id as u8 == value)
            .ok_or(ProtocolError::UnknownCommand(value))
    }
}
