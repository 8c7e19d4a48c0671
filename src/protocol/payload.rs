// Fixed-width payload records, little-endian and packed
//
// Angles and accelerations travel as i16 scaled by 100.

use super::ProtocolError;
use crate::hal::Orientation;

/// Fixed-point scale for angles and accelerations on the wire
pub const FIXED_POINT_SCALE: f32 = 100.0;

/// Convert a real value to its x100 wire representation, saturating at the i16 range
pub fn to_fixed(value: f32) -> i16 {
    (value * FIXED_POINT_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Convert a x100 wire value back to a real value
pub fn from_fixed(raw: i16) -> f32 {
    raw as f32 / FIXED_POINT_SCALE
}

fn i16_at(bytes: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// A payload record with a fixed wire size
///
/// `decode` accepts any slice at least `SIZE` long and ignores trailing
/// bytes, so a sender may append fields without breaking older receivers.
pub trait Payload: Sized {
    const SIZE: usize;
    const NAME: &'static str;

    /// Append the record's wire bytes to `out`
    fn write(&self, out: &mut Vec<u8>);

    /// Read the record from a slice already known to hold `SIZE` bytes
    fn read(bytes: &[u8]) -> Self;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.write(&mut out);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < Self::SIZE {
            return Err(ProtocolError::PayloadTooShort {
                record: Self::NAME,
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self::read(bytes))
    }
}

/// Expression change (CMD_EXPRESSION)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpressionData {
    pub expression_id: u8,
    pub intensity: u8, // 0-100
    pub duration_ms: u16,
}

impl Payload for ExpressionData {
    const SIZE: usize = 4;
    const NAME: &'static str = "ExpressionData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.expression_id);
        out.push(self.intensity);
        out.extend_from_slice(&self.duration_ms.to_le_bytes());
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            expression_id: bytes[0],
            intensity: bytes[1],
            duration_ms: u16_at(bytes, 2),
        }
    }
}

/// Eye gaze (CMD_EYE_POSITION)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EyePositionData {
    pub x: i8,     // -50 to 50 (left to right)
    pub y: i8,     // -50 to 50 (down to up)
    pub speed: u8, // 0-100
}

impl Payload for EyePositionData {
    const SIZE: usize = 3;
    const NAME: &'static str = "EyePositionData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.x as u8);
        out.push(self.y as u8);
        out.push(self.speed);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            x: bytes[0] as i8,
            y: bytes[1] as i8,
            speed: bytes[2],
        }
    }
}

/// Mouth aperture (CMD_MOUTH_OPEN)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouthData {
    pub open_amount: u8, // 0-100
}

impl Payload for MouthData {
    const SIZE: usize = 1;
    const NAME: &'static str = "MouthData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.open_amount);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            open_amount: bytes[0],
        }
    }
}

/// Lip-sync sample (CMD_LIPSYNC_DATA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LipsyncData {
    pub amplitude: u8, // 0-100
}

impl Payload for LipsyncData {
    const SIZE: usize = 1;
    const NAME: &'static str = "LipsyncData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.amplitude);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            amplitude: bytes[0],
        }
    }
}

/// Eyelid override (CMD_BLINK)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlinkData {
    pub closed: bool,
}

impl Payload for BlinkData {
    const SIZE: usize = 1;
    const NAME: &'static str = "BlinkData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.closed as u8);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            closed: bytes[0] != 0,
        }
    }
}

/// Gaze target in normalized screen coordinates (CMD_LOOK_AT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LookAtData {
    pub x: i8,
    pub y: i8,
}

impl Payload for LookAtData {
    const SIZE: usize = 2;
    const NAME: &'static str = "LookAtData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.x as u8);
        out.push(self.y as u8);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            x: bytes[0] as i8,
            y: bytes[1] as i8,
        }
    }
}

/// Walking parameters (CMD_WALK_DIRECTION)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkData {
    pub mode: u8,      // WalkMode
    pub speed: u8,     // 0-100
    pub direction: i8, // -90 to 90 degrees
}

impl Payload for WalkData {
    const SIZE: usize = 3;
    const NAME: &'static str = "WalkData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.mode);
        out.push(self.speed);
        out.push(self.direction as u8);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            mode: bytes[0],
            speed: bytes[1],
            direction: bytes[2] as i8,
        }
    }
}

/// Turn request (CMD_TURN): negative turns left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TurnData {
    pub direction: i8,
}

impl Payload for TurnData {
    const SIZE: usize = 1;
    const NAME: &'static str = "TurnData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.direction as u8);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            direction: bytes[0] as i8,
        }
    }
}

/// Orientation sample (CMD_IMU_DATA), every field x100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImuData {
    pub pitch: i16,
    pub roll: i16,
    pub yaw: i16,
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
}

impl ImuData {
    pub fn from_orientation(o: &Orientation) -> Self {
        Self {
            pitch: to_fixed(o.pitch),
            roll: to_fixed(o.roll),
            yaw: to_fixed(o.yaw),
            accel_x: to_fixed(o.accel_x),
            accel_y: to_fixed(o.accel_y),
            accel_z: to_fixed(o.accel_z),
        }
    }

    pub fn to_orientation(&self) -> Orientation {
        Orientation {
            pitch: from_fixed(self.pitch),
            roll: from_fixed(self.roll),
            yaw: from_fixed(self.yaw),
            accel_x: from_fixed(self.accel_x),
            accel_y: from_fixed(self.accel_y),
            accel_z: from_fixed(self.accel_z),
        }
    }
}

impl Payload for ImuData {
    const SIZE: usize = 12;
    const NAME: &'static str = "ImuData";

    fn write(&self, out: &mut Vec<u8>) {
        for v in [
            self.pitch,
            self.roll,
            self.yaw,
            self.accel_x,
            self.accel_y,
            self.accel_z,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            pitch: i16_at(bytes, 0),
            roll: i16_at(bytes, 2),
            yaw: i16_at(bytes, 4),
            accel_x: i16_at(bytes, 6),
            accel_y: i16_at(bytes, 8),
            accel_z: i16_at(bytes, 10),
        }
    }
}

/// Person detection result in camera pixels (CMD_PERSON_DETECTED)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PersonData {
    pub detected: bool,
    pub x: i16,
    pub y: i16,
    pub size: u16,
}

impl Payload for PersonData {
    const SIZE: usize = 7;
    const NAME: &'static str = "PersonData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.detected as u8);
        out.extend_from_slice(&self.x.to_le_bytes());
        out.extend_from_slice(&self.y.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            detected: bytes[0] != 0,
            x: i16_at(bytes, 1),
            y: i16_at(bytes, 3),
            size: u16_at(bytes, 5),
        }
    }
}

/// Balance telemetry (CMD_BALANCE_STATUS), corrections x100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BalanceStatusData {
    pub pitch_correction: i16,
    pub roll_correction: i16,
    pub walking: bool,
}

impl Payload for BalanceStatusData {
    const SIZE: usize = 5;
    const NAME: &'static str = "BalanceStatusData";

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.pitch_correction.to_le_bytes());
        out.extend_from_slice(&self.roll_correction.to_le_bytes());
        out.push(self.walking as u8);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            pitch_correction: i16_at(bytes, 0),
            roll_correction: i16_at(bytes, 2),
            walking: bytes[4] != 0,
        }
    }
}

/// Node status reply (CMD_STATUS_RESP)
///
/// `mode` is the walk mode on the lower board and the expression on the
/// upper board. Bit 0 of `flags` is walking/speaking respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusData {
    pub node: u8,
    pub mode: u8,
    pub flags: u8,
}

impl Payload for StatusData {
    const SIZE: usize = 3;
    const NAME: &'static str = "StatusData";

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.node);
        out.push(self.mode);
        out.push(self.flags);
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            node: bytes[0],
            mode: bytes[1],
            flags: bytes[2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<P: Payload + PartialEq + std::fmt::Debug>(p: P) {
        let bytes = p.encode();
        assert_eq!(bytes.len(), P::SIZE, "{} size", P::NAME);
        assert_eq!(P::decode(&bytes).unwrap(), p);
    }

    #[test]
    fn test_round_trip_every_record() {
        round_trip(ExpressionData {
            expression_id: 3,
            intensity: 100,
            duration_ms: 3000,
        });
        round_trip(EyePositionData {
            x: -50,
            y: 50,
            speed: 70,
        });
        round_trip(MouthData { open_amount: 100 });
        round_trip(LipsyncData { amplitude: 37 });
        round_trip(BlinkData { closed: true });
        round_trip(LookAtData { x: -20, y: 9 });
        round_trip(WalkData {
            mode: 2,
            speed: 80,
            direction: -90,
        });
        round_trip(TurnData { direction: -1 });
        round_trip(ImuData {
            pitch: -1234,
            roll: 567,
            yaw: 17999,
            accel_x: -32768,
            accel_y: 0,
            accel_z: 981,
        });
        round_trip(PersonData {
            detected: true,
            x: 160,
            y: -120,
            size: 100,
        });
        round_trip(BalanceStatusData {
            pitch_correction: -250,
            roll_correction: 75,
            walking: true,
        });
        round_trip(StatusData {
            node: 2,
            mode: 1,
            flags: 1,
        });
    }

    #[test]
    fn test_little_endian_layout() {
        let bytes = ExpressionData {
            expression_id: 1,
            intensity: 100,
            duration_ms: 0x0BB8,
        }
        .encode();
        assert_eq!(bytes, vec![1, 100, 0xB8, 0x0B]);

        let imu = ImuData::read(&[0x10, 0x27, 0xF0, 0xD8, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(imu.pitch, 10000);
        assert_eq!(imu.roll, -10000);
    }

    #[test]
    fn test_undersized_payload_rejected() {
        assert_eq!(
            WalkData::decode(&[1, 80]),
            Err(ProtocolError::PayloadTooShort {
                record: "WalkData",
                expected: 3,
                actual: 2
            })
        );
        assert!(ImuData::decode(&[0; 11]).is_err());
        assert!(MouthData::decode(&[]).is_err());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let walk = WalkData::decode(&[1, 50, 0, 0xEE, 0xEE]).unwrap();
        assert_eq!(walk.mode, 1);
        assert_eq!(walk.speed, 50);
    }

    #[test]
    fn test_fixed_point_conversion() {
        assert_eq!(to_fixed(12.346), 1235);
        assert_eq!(to_fixed(-0.5), -50);
        assert_eq!(to_fixed(1000.0), i16::MAX);
        assert!((from_fixed(-1234) - -12.34).abs() < 1e-4);

        let o = Orientation {
            pitch: 3.5,
            roll: -1.25,
            ..Default::default()
        };
        let back = ImuData::from_orientation(&o).to_orientation();
        assert!((back.pitch - 3.5).abs() < 0.01);
        assert!((back.roll + 1.25).abs() < 0.01);
    }
}
