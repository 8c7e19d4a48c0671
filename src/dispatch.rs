// Command routing: a per-node lookup table from command id to handler
//
// Handlers receive the node's state and the raw payload and decode it
// themselves. A short or malformed payload makes the handler a no-op, and an
// id with no handler is logged and dropped. Nothing is reported back to the
// sender.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::protocol::{CommandGroup, CommandId, Payload};

/// Handler signature; the id is passed so one handler can serve several ids
pub type Handler<S> = fn(&mut S, CommandId, &[u8]);

/// Range handler; takes the raw byte so ids not yet named still route
pub type GroupHandler<S> = fn(&mut S, u8, &[u8]);

pub struct Dispatcher<S> {
    name: &'static str,
    handlers: HashMap<CommandId, Handler<S>>,
    groups: HashMap<CommandGroup, GroupHandler<S>>,
    dispatched: u32,
    unknown: u32,
}

impl<S> Dispatcher<S> {
    /// `name` identifies the table in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handlers: HashMap::new(),
            groups: HashMap::new(),
            dispatched: 0,
            unknown: 0,
        }
    }

    /// Register a handler, replacing any earlier one for the same id
    pub fn on(mut self, cmd: CommandId, handler: Handler<S>) -> Self {
        self.handlers.insert(cmd, handler);
        self
    }

    /// Register a handler for every byte in a range, defined or not.
    /// Per-id handlers take precedence.
    pub fn on_group(mut self, group: CommandGroup, handler: GroupHandler<S>) -> Self {
        self.groups.insert(group, handler);
        self
    }

    /// Commands that reached a handler
    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    /// Commands dropped for lack of a handler
    pub fn unknown(&self) -> u32 {
        self.unknown
    }

    pub fn dispatch(&mut self, state: &mut S, cmd: u8, payload: &[u8]) {
        let handler = CommandId::try_from(cmd)
            .ok()
            .and_then(|id| self.handlers.get(&id).map(|h| (id, *h)));

        if let Some((id, handler)) = handler {
            trace!("[{}] dispatch {:?} ({} bytes)", self.name, id, payload.len());
            self.dispatched = self.dispatched.wrapping_add(1);
            handler(state, id, payload);
            return;
        }

        let group = CommandGroup::of(cmd).and_then(|g| self.groups.get(&g).copied());
        match group {
            Some(handler) => {
                trace!(
                    "[{}] dispatch 0x{:02X} by range ({} bytes)",
                    self.name,
                    cmd,
                    payload.len()
                );
                self.dispatched = self.dispatched.wrapping_add(1);
                handler(state, cmd, payload);
            }
            None => {
                self.unknown = self.unknown.wrapping_add(1);
                warn!("[{}] unknown command 0x{:02X}", self.name, cmd);
            }
        }
    }
}

/// Decode a payload record, logging and returning None when it does not fit
pub fn decode<P: Payload>(payload: &[u8]) -> Option<P> {
    match P::decode(payload) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!("Ignoring command: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MouthData;

    #[derive(Default)]
    struct Recorder {
        mouth: Option<u8>,
        pings: u32,
        forwarded: Vec<u8>,
    }

    fn recorder_table() -> Dispatcher<Recorder> {
        Dispatcher::<Recorder>::new("recorder")
            .on(CommandId::Ping, |s, _, _| s.pings += 1)
            .on(CommandId::MouthOpen, |s, _, payload| {
                if let Some(m) = decode::<MouthData>(payload) {
                    s.mouth = Some(m.open_amount);
                }
            })
            .on_group(CommandGroup::Locomotion, |s, id, _| s.forwarded.push(id))
    }

    #[test]
    fn test_routes_by_id() {
        let mut table = recorder_table();
        let mut rec = Recorder::default();

        table.dispatch(&mut rec, 0x00, &[]);
        table.dispatch(&mut rec, 0x13, &[42]);
        assert_eq!(rec.pings, 1);
        assert_eq!(rec.mouth, Some(42));
        assert_eq!(table.dispatched(), 2);
    }

    #[test]
    fn test_short_payload_is_noop() {
        let mut table = recorder_table();
        let mut rec = Recorder::default();
        table.dispatch(&mut rec, 0x13, &[]);
        assert_eq!(rec.mouth, None);
    }

    #[test]
    fn test_unknown_ids_dropped_and_counted() {
        let mut table = recorder_table();
        let mut rec = Recorder::default();

        // Undefined id, then a defined id with no handler here
        table.dispatch(&mut rec, 0x7F, &[]);
        table.dispatch(&mut rec, 0x10, &[1, 0, 0, 0]);
        assert_eq!(table.unknown(), 2);
        assert_eq!(table.dispatched(), 0);
    }

    #[test]
    fn test_group_registration_covers_range() {
        let mut table = recorder_table();
        let mut rec = Recorder::default();

        // Named ids and unnamed bytes in the range alike
        for cmd in 0x30..=0x3Fu8 {
            table.dispatch(&mut rec, cmd, &[]);
        }
        assert_eq!(rec.forwarded.len(), 16);
        assert_eq!(rec.forwarded[0], u8::from(CommandId::WalkStart));
        assert_eq!(rec.forwarded[6], 0x36);
        assert_eq!(table.unknown(), 0);

        table.dispatch(&mut rec, 0x50, &[]);
        assert_eq!(table.unknown(), 1);
    }

    #[test]
    fn test_id_handler_wins_over_range() {
        let mut table = recorder_table().on(CommandId::WalkStop, |s, _, _| s.pings += 10);
        let mut rec = Recorder::default();

        table.dispatch(&mut rec, 0x31, &[]);
        assert_eq!(rec.pings, 10);
        assert!(rec.forwarded.is_empty());
    }
}
