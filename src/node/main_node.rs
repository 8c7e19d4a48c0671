// Main board: perception and network side
//
// Originates commands toward the upper board: person-detection follow-up
// every second, a rotating idle behaviour every ten seconds while silent, and
// whatever remote requests arrive over the network.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::{CAMERA_HEIGHT, CAMERA_WIDTH, IDLE_ACTION_MS, NodeKind, PERSON_CHECK_MS};
use crate::dispatch::{decode, Dispatcher};
use crate::expression::Expression;
use crate::hal::{Detection, Orientation, PersonDetector};
use crate::messages::{NodeHealth, RemoteCommand};
use crate::node::{Direction, Node, Outbox};
use crate::protocol::{
    BalanceStatusData, CommandId, ExpressionData, ImuData, LookAtData, PersonData, StatusData,
    ValidatedPacket,
};
use crate::scheduler::Periodic;

/// Replies and telemetry gathered from the boards below
#[derive(Default)]
pub struct MainState {
    pub pongs: u32,
    pub last_status: Option<StatusData>,
    pub lower_orientation: Option<Orientation>,
    pub lower_balance: Option<BalanceStatusData>,
    outbox: Outbox,
}

fn on_pong(state: &mut MainState, _: CommandId, _: &[u8]) {
    state.pongs = state.pongs.wrapping_add(1);
    info!("PONG received");
}

fn on_status_resp(state: &mut MainState, _: CommandId, payload: &[u8]) {
    if let Some(status) = decode::<StatusData>(payload) {
        info!(
            "Status from node {}: mode {} flags 0x{:02X}",
            status.node, status.mode, status.flags
        );
        state.last_status = Some(status);
    }
}

fn on_imu(state: &mut MainState, _: CommandId, payload: &[u8]) {
    if let Some(imu) = decode::<ImuData>(payload) {
        state.lower_orientation = Some(imu.to_orientation());
    }
}

fn on_balance(state: &mut MainState, _: CommandId, payload: &[u8]) {
    if let Some(status) = decode::<BalanceStatusData>(payload) {
        state.lower_balance = Some(status);
    }
}

fn command_table() -> Dispatcher<MainState> {
    Dispatcher::new("main")
        .on(CommandId::Pong, on_pong)
        .on(CommandId::StatusResp, on_status_resp)
        .on(CommandId::ImuData, on_imu)
        .on(CommandId::BalanceStatus, on_balance)
}

/// Map a detection's pixel position onto normalized gaze, y pointing up
pub fn gaze_for(detection: &Detection) -> LookAtData {
    let x = detection.x as i32 * 100 / CAMERA_WIDTH - 50;
    let y = 50 - detection.y as i32 * 100 / CAMERA_HEIGHT;
    LookAtData {
        x: x.clamp(-50, 50) as i8,
        y: y.clamp(-50, 50) as i8,
    }
}

pub struct MainNode<P: PersonDetector> {
    dispatcher: Dispatcher<MainState>,
    state: MainState,
    detector: P,
    rng: StdRng,
    person_timer: Periodic,
    idle_timer: Periodic,
    idle_step: usize,
    person_present: bool,
    speaking: bool,
}

impl<P: PersonDetector> MainNode<P> {
    pub fn new(detector: P, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            dispatcher: command_table(),
            state: MainState::default(),
            detector,
            rng,
            person_timer: Periodic::new(PERSON_CHECK_MS),
            idle_timer: Periodic::new(IDLE_ACTION_MS),
            idle_step: 0,
            person_present: false,
            speaking: false,
        }
    }

    pub fn state(&self) -> &MainState {
        &self.state
    }

    pub fn detector_mut(&mut self) -> &mut P {
        &mut self.detector
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    fn send_expression(&mut self, expression: Expression, intensity: u8, duration_ms: u16) {
        let data = ExpressionData {
            expression_id: expression as u8,
            intensity,
            duration_ms,
        };
        self.state
            .outbox
            .send_record(Direction::Downstream, CommandId::Expression, &data);
    }

    fn send_look(&mut self, look: LookAtData) {
        self.state
            .outbox
            .send_record(Direction::Downstream, CommandId::LookAt, &look);
    }

    /// Announce a newly seen person and turn the eyes toward them
    fn check_person(&mut self) {
        let Some(detection) = self.detector.detect() else {
            self.person_present = false;
            return;
        };
        if self.person_present {
            return;
        }
        self.person_present = true;
        info!("Person detected at ({}, {})", detection.x, detection.y);

        let person = PersonData {
            detected: true,
            x: detection.x,
            y: detection.y,
            size: detection.size,
        };
        self.state
            .outbox
            .send_record(Direction::Downstream, CommandId::PersonDetected, &person);
        self.send_look(gaze_for(&detection));
    }

    /// Five-step idle rotation, one step per call
    fn idle_action(&mut self) {
        match self.idle_step % 5 {
            0 => {
                let look = LookAtData {
                    x: self.rng.gen_range(-30..30),
                    y: self.rng.gen_range(-20..20),
                };
                debug!("Idle: look around ({}, {})", look.x, look.y);
                self.send_look(look);
            }
            1 => self.send_expression(Expression::Thinking, 50, 2000),
            // Head tilt: the upper board has no neck command yet
            2 => debug!("Idle: head tilt"),
            3 => self.send_expression(Expression::Neutral, 100, 0),
            _ => self.send_look(LookAtData { x: 0, y: 0 }),
        }
        self.idle_step = self.idle_step.wrapping_add(1);
    }
}

impl<P: PersonDetector> Node for MainNode<P> {
    fn kind(&self) -> NodeKind {
        NodeKind::Main
    }

    fn on_packet(&mut self, from: Direction, packet: &ValidatedPacket) {
        if from == Direction::Upstream {
            debug!("Main board has no upstream, dropping 0x{:02X}", packet.cmd);
            return;
        }
        self.dispatcher
            .dispatch(&mut self.state, packet.cmd, &packet.payload);
    }

    fn step(&mut self, now_ms: u64) {
        if self.person_timer.ready(now_ms) {
            self.check_person();
        }

        if !self.speaking && self.idle_timer.ready(now_ms) {
            self.idle_action();
        }
    }

    fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.state.outbox)
    }

    fn health(&self) -> NodeHealth {
        NodeHealth {
            packets_dispatched: self.dispatcher.dispatched(),
            unknown_commands: self.dispatcher.unknown(),
            ..NodeHealth::new(NodeKind::Main)
        }
    }

    fn on_remote(&mut self, cmd: &RemoteCommand) {
        match cmd {
            RemoteCommand::SpeakStart | RemoteCommand::Lipsync { .. } => self.speaking = true,
            RemoteCommand::SpeakStop => self.speaking = false,
            _ => {}
        }
        let (id, payload) = cmd.to_packet();
        debug!("Remote {:?} -> {:?}", cmd, id);
        self.state.outbox.send(Direction::Downstream, id, &payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::NoDetector;
    use crate::motion::WalkMode;
    use crate::protocol::{encode, PacketCodec, Payload};

    fn node() -> MainNode<NoDetector> {
        MainNode::new(NoDetector::new(), Some(11))
    }

    fn sent(node: &mut MainNode<NoDetector>) -> Vec<ValidatedPacket> {
        let outbox = node.take_outbox();
        assert!(outbox.upstream.is_empty());
        outbox
            .downstream
            .iter()
            .flat_map(|f| PacketCodec::new().feed_all(f))
            .collect()
    }

    #[test]
    fn test_gaze_mapping() {
        let centre = Detection { x: 160, y: 120, size: 100 };
        assert_eq!(gaze_for(&centre), LookAtData { x: 0, y: 0 });

        let top_right = Detection { x: 320, y: 0, size: 100 };
        assert_eq!(gaze_for(&top_right), LookAtData { x: 50, y: 50 });

        let bottom_left = Detection { x: 0, y: 240, size: 100 };
        assert_eq!(gaze_for(&bottom_left), LookAtData { x: -50, y: -50 });
    }

    #[test]
    fn test_new_person_announced_once() {
        let mut node = node();
        node.detector_mut().queue(Some(Detection { x: 240, y: 60, size: 80 }));

        node.step(PERSON_CHECK_MS);
        let packets = sent(&mut node);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].cmd, u8::from(CommandId::PersonDetected));
        let person = PersonData::decode(&packets[0].payload).unwrap();
        assert_eq!((person.x, person.y, person.size), (240, 60, 80));
        assert_eq!(packets[1].cmd, u8::from(CommandId::LookAt));
        assert_eq!(LookAtData::decode(&packets[1].payload).unwrap(), LookAtData { x: 25, y: 25 });

        // Still there: nothing new
        node.step(2 * PERSON_CHECK_MS);
        assert!(sent(&mut node).is_empty());

        // Gone and back: announced again
        node.detector_mut().queue(None);
        node.step(3 * PERSON_CHECK_MS);
        node.detector_mut().queue(Some(Detection { x: 160, y: 120, size: 80 }));
        node.step(4 * PERSON_CHECK_MS);
        assert_eq!(sent(&mut node).len(), 2);
    }

    #[test]
    fn test_idle_rotation() {
        let mut node = node();
        let mut cmds = Vec::new();
        for i in 1..=6 {
            node.step(i * IDLE_ACTION_MS);
            cmds.push(sent(&mut node).into_iter().map(|p| p.cmd).collect::<Vec<_>>());
        }

        let look = u8::from(CommandId::LookAt);
        let expr = u8::from(CommandId::Expression);
        assert_eq!(
            cmds,
            vec![vec![look], vec![expr], vec![], vec![expr], vec![look], vec![look]]
        );
    }

    #[test]
    fn test_idle_suppressed_while_speaking() {
        let mut node = node();
        node.on_remote(&RemoteCommand::SpeakStart);
        assert!(node.is_speaking());
        sent(&mut node);

        node.step(IDLE_ACTION_MS);
        assert!(sent(&mut node).is_empty());

        node.on_remote(&RemoteCommand::SpeakStop);
        sent(&mut node);
        node.step(IDLE_ACTION_MS + 1);
        assert_eq!(sent(&mut node).len(), 1);
    }

    #[test]
    fn test_remote_commands_encoded_downstream() {
        let mut node = node();
        node.on_remote(&RemoteCommand::Walk {
            mode: WalkMode::Forward,
            speed: 60,
        });
        node.on_remote(&RemoteCommand::Wave);

        let outbox = node.take_outbox();
        assert_eq!(
            outbox.downstream,
            vec![
                encode(CommandId::WalkDirection.into(), &[1, 60, 0]).unwrap(),
                encode(CommandId::Wave.into(), &[]).unwrap(),
            ]
        );
    }

    #[test]
    fn test_replies_recorded() {
        let mut node = node();
        let pong = PacketCodec::new().feed_all(&encode(CommandId::Pong.into(), &[]).unwrap());
        node.on_packet(Direction::Downstream, &pong[0]);
        // Nothing above the main board
        node.on_packet(Direction::Upstream, &pong[0]);
        assert_eq!(node.state().pongs, 1);
        assert_eq!(node.health().packets_dispatched, 1);
    }
}
