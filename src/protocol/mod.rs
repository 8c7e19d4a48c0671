// Inter-board serial protocol
//
// Provides:
// - Packet framing, validation and encoding
// - Command id table grouped by range
// - Fixed-width payload records

pub mod codec;
pub mod command;
pub mod payload;

pub use codec::{checksum, encode, PacketCodec, ValidatedPacket};
pub use command::{CommandGroup, CommandId};
pub use payload::{
    BalanceStatusData, BlinkData, ExpressionData, EyePositionData, ImuData, LipsyncData,
    LookAtData, MouthData, Payload, PersonData, StatusData, TurnData, WalkData,
};

/// Frame start byte
pub const PACKET_START: u8 = 0xAA;
/// Frame end byte
pub const PACKET_END: u8 = 0x55;
/// Largest frame on the wire, header and trailer included
pub const PACKET_MAX_SIZE: usize = 64;
/// Largest payload: max frame minus START, LENGTH, CMD, CHECKSUM, END
pub const PAYLOAD_MAX_SIZE: usize = PACKET_MAX_SIZE - 5;

/// Error types for the wire protocol
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Payload for {record} too short: expected {expected} bytes, got {actual}")]
    PayloadTooShort {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid {field} value: {value}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("Unknown command: 0x{0:02X}")]
    UnknownCommand(u8),
}
