// Per-board node logic
//
// Each board owns its state in one struct, routes inbound packets through
// its dispatch tables and queues outbound frames in an Outbox that the loop
// flushes after every iteration.

pub mod lower;
pub mod main_node;
pub mod upper;

pub use lower::{LowerNode, LowerState};
pub use main_node::{MainNode, MainState};
pub use upper::{UpperNode, UpperState, WaveMotion};

use tracing::{trace, warn};

use crate::config::NodeKind;
use crate::messages::{NodeHealth, RemoteCommand};
use crate::protocol::{encode, CommandId, Payload, ValidatedPacket};

/// Which link a packet came from or goes to
///
/// Upstream is toward the main board, downstream toward the lower board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upstream,
    Downstream,
}

/// Frames queued for transmission during one iteration
#[derive(Debug, Default)]
pub struct Outbox {
    pub upstream: Vec<Vec<u8>>,
    pub downstream: Vec<Vec<u8>>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty() && self.downstream.is_empty()
    }

    /// Queue a raw command byte and payload
    pub fn send_raw(&mut self, direction: Direction, cmd: u8, payload: &[u8]) {
        let frame = match encode(cmd, payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Not sending 0x{:02X}: {}", cmd, e);
                return;
            }
        };
        trace!("Queue 0x{:02X} {:?}", cmd, direction);
        match direction {
            Direction::Upstream => self.upstream.push(frame),
            Direction::Downstream => self.downstream.push(frame),
        }
    }

    pub fn send(&mut self, direction: Direction, cmd: CommandId, payload: &[u8]) {
        self.send_raw(direction, cmd.into(), payload);
    }

    pub fn send_record<P: Payload>(&mut self, direction: Direction, cmd: CommandId, record: &P) {
        self.send(direction, cmd, &record.encode());
    }
}

pub trait Node {
    fn kind(&self) -> NodeKind;

    /// Handle one validated packet received on `from`
    fn on_packet(&mut self, from: Direction, packet: &ValidatedPacket);

    /// Timed work for this iteration
    fn step(&mut self, now_ms: u64);

    /// Hand over everything queued since the last call
    fn take_outbox(&mut self) -> Outbox;

    fn health(&self) -> NodeHealth;

    /// Remote request from the network side; only the main board takes these
    fn on_remote(&mut self, cmd: &RemoteCommand) {
        warn!("{:?} board ignores remote command {:?}", self.kind(), cmd);
    }
}
