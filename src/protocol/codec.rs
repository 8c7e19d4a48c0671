// Packet framing for the inter-board serial links
//
// Packet format: [0xAA, LENGTH, CMD, PAYLOAD..., CHECKSUM, 0x55]
// LENGTH = 1 + payload length, CHECKSUM = XOR of LENGTH, CMD and payload.

use tracing::{debug, trace};

use super::{ProtocolError, PACKET_END, PACKET_MAX_SIZE, PACKET_START, PAYLOAD_MAX_SIZE};

/// XOR-fold checksum over LENGTH, CMD and payload bytes
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Build a complete frame for a command and its payload
pub fn encode(cmd: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > PAYLOAD_MAX_SIZE {
        return Err(ProtocolError::PayloadTooLong {
            len: payload.len(),
            max: PAYLOAD_MAX_SIZE,
        });
    }

    let length = (payload.len() + 1) as u8; // cmd + payload
    let mut packet = Vec::with_capacity(payload.len() + 5);

    packet.push(PACKET_START);
    packet.push(length);
    packet.push(cmd);
    packet.extend_from_slice(payload);

    // Checksum over length, cmd, payload
    let sum = checksum(&packet[1..]);
    packet.push(sum);
    packet.push(PACKET_END);

    Ok(packet)
}

/// A frame that passed END and checksum validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPacket {
    pub cmd: u8,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    WaitStart,
    Accumulating,
}

/// Byte-at-a-time frame decoder
///
/// Bytes before a START are discarded. Once LENGTH is known the frame is
/// checked as soon as it is complete; valid or not, the decoder then waits
/// for the next START. Reaching the buffer cap abandons the in-flight frame,
/// which can lose sync if a real START byte was sitting mid-buffer.
pub struct PacketCodec {
    buffer: [u8; PACKET_MAX_SIZE],
    index: usize,
    dropped: u32,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketCodec {
    pub fn new() -> Self {
        Self {
            buffer: [0; PACKET_MAX_SIZE],
            index: 0,
            dropped: 0,
        }
    }

    fn state(&self) -> FrameState {
        if self.index == 0 {
            FrameState::WaitStart
        } else {
            FrameState::Accumulating
        }
    }

    /// Number of frames rejected since creation
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Feed one received byte, returning a packet when a valid frame completes
    pub fn feed(&mut self, byte: u8) -> Option<ValidatedPacket> {
        if self.state() == FrameState::WaitStart && byte != PACKET_START {
            trace!("Discarding 0x{:02X} while waiting for start", byte);
            return None;
        }

        self.buffer[self.index] = byte;
        self.index += 1;

        if self.index >= 4 {
            let expected = self.buffer[1] as usize + 4;
            if self.index >= expected {
                let packet = self.validate();
                if packet.is_none() {
                    self.dropped = self.dropped.wrapping_add(1);
                }
                self.index = 0;
                return packet;
            }
        }

        if self.index >= PACKET_MAX_SIZE {
            debug!("Receive buffer full, abandoning frame");
            self.dropped = self.dropped.wrapping_add(1);
            self.index = 0;
        }

        None
    }

    /// Feed a slice of bytes, collecting every completed packet in order
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<ValidatedPacket> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }

    fn validate(&self) -> Option<ValidatedPacket> {
        let frame = &self.buffer[..self.index];
        let length = frame[1] as usize;

        // LENGTH always covers at least the command byte
        if length == 0 {
            debug!("Dropping frame with zero length");
            return None;
        }

        if frame[frame.len() - 1] != PACKET_END {
            debug!("Dropping frame: bad end byte 0x{:02X}", frame[frame.len() - 1]);
            return None;
        }

        let expected = checksum(&frame[1..frame.len() - 2]);
        let received = frame[frame.len() - 2];
        if expected != received {
            debug!(
                "Dropping frame: checksum mismatch (expected 0x{:02X}, got 0x{:02X})",
                expected, received
            );
            return None;
        }

        Some(ValidatedPacket {
            cmd: frame[2],
            payload: frame[3..frame.len() - 2].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let packet = encode(0x32, &[1, 80, 0]).unwrap();
        // Start + length + cmd + 3 payload + checksum + end = 8 bytes
        assert_eq!(packet.len(), 8);
        assert_eq!(packet[0], 0xAA);
        assert_eq!(packet[1], 4);
        assert_eq!(packet[2], 0x32);
        assert_eq!(packet[6], 4 ^ 0x32 ^ 1 ^ 80 ^ 0);
        assert_eq!(packet[7], 0x55);
    }

    #[test]
    fn test_encode_empty_payload() {
        let packet = encode(0x34, &[]).unwrap();
        assert_eq!(packet, vec![0xAA, 1, 0x34, 1 ^ 0x34, 0x55]);
    }

    #[test]
    fn test_encode_rejects_oversize_payload() {
        assert!(encode(0x10, &[0u8; PAYLOAD_MAX_SIZE]).is_ok());
        assert!(matches!(
            encode(0x10, &[0u8; PAYLOAD_MAX_SIZE + 1]),
            Err(ProtocolError::PayloadTooLong { len: 60, max: 59 })
        ));
    }

    #[test]
    fn test_decode_valid_packet() {
        let mut codec = PacketCodec::new();
        let packets = codec.feed_all(&encode(0x13, &[42]).unwrap());
        assert_eq!(
            packets,
            vec![ValidatedPacket {
                cmd: 0x13,
                payload: vec![42]
            }]
        );
        assert_eq!(codec.dropped(), 0);
    }

    #[test]
    fn test_max_size_packet_decodes() {
        let payload: Vec<u8> = (0..PAYLOAD_MAX_SIZE as u8).collect();
        let frame = encode(0x10, &payload).unwrap();
        assert_eq!(frame.len(), PACKET_MAX_SIZE);

        let mut codec = PacketCodec::new();
        let packets = codec.feed_all(&frame);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload, payload);
    }

    #[test]
    fn test_checksum_sensitivity() {
        let frame = encode(0x50, &[0x10, 0x27, 0xF0, 0xD8, 0, 0]).unwrap();
        let covered = 1..frame.len() - 2;

        for i in covered {
            // LENGTH changes alter framing, so only flip bits that keep it in range
            let flips: &[u8] = if i == 1 { &[0x02] } else { &[0x01, 0x80] };
            for &flip in flips {
                let mut corrupted = frame.clone();
                corrupted[i] ^= flip;

                let mut codec = PacketCodec::new();
                let packets = codec.feed_all(&corrupted);
                assert!(packets.is_empty(), "byte {} flip 0x{:02X} accepted", i, flip);
            }
        }
    }

    #[test]
    fn test_bad_end_byte_dropped() {
        let mut frame = encode(0x00, &[]).unwrap();
        let last = frame.len() - 1;
        frame[last] = 0x56;

        let mut codec = PacketCodec::new();
        assert!(codec.feed_all(&frame).is_empty());
        assert_eq!(codec.dropped(), 1);
    }

    #[test]
    fn test_zero_length_frame_dropped() {
        let mut codec = PacketCodec::new();
        assert!(codec.feed_all(&[0xAA, 0x00, 0x00, 0x55]).is_empty());
        assert_eq!(codec.dropped(), 1);
    }

    #[test]
    fn test_framing_resilience() {
        let mut stream = encode(0x30, &[]).unwrap();
        stream.extend_from_slice(&[0x01, 0x55, 0x13, 0xFF, 0x00]);
        stream.extend(encode(0x32, &[1, 80, 0]).unwrap());

        let mut codec = PacketCodec::new();
        let packets = codec.feed_all(&stream);

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].cmd, 0x30);
        assert!(packets[0].payload.is_empty());
        assert_eq!(packets[1].cmd, 0x32);
        assert_eq!(packets[1].payload, vec![1, 80, 0]);
    }

    #[test]
    fn test_resync_after_corrupt_frame() {
        let mut bad = encode(0x11, &[5, 5, 50]).unwrap();
        bad[4] ^= 0xFF;
        let mut stream = bad;
        stream.extend(encode(0x12, &[1]).unwrap());

        let mut codec = PacketCodec::new();
        let packets = codec.feed_all(&stream);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].cmd, 0x12);
        assert_eq!(codec.dropped(), 1);
    }

    #[test]
    fn test_oversize_length_abandons_frame() {
        // LENGTH of 200 can never complete inside the 64 byte buffer
        let mut stream = vec![0xAA, 200, 0x10];
        stream.extend_from_slice(&[0u8; PACKET_MAX_SIZE]);
        stream.extend(encode(0x21, &[]).unwrap());

        let mut codec = PacketCodec::new();
        let packets = codec.feed_all(&stream);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].cmd, 0x21);
        assert!(codec.dropped() >= 1);
    }
}
