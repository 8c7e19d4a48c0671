// Upper board: face, arms, and relay to the lower board
//
// Commands from the main board drive the face; locomotion commands pass
// through unchanged. Telemetry and replies from the lower board are kept
// and relayed back up.

use tracing::{debug, info};

use crate::config::{
    NodeKind, SERVO_ARM_RIGHT_SHOULDER, SERVO_CENTER_ANGLE, SERVO_UPDATE_INTERVAL_MS,
    WAVE_CYCLES, WAVE_HIGH_ANGLE, WAVE_LOW_ANGLE, WAVE_SWING_MS,
};
use crate::dispatch::{decode, Dispatcher};
use crate::expression::{Expression, ExpressionController};
use crate::hal::{ActuatorDriver, IndicatorDriver, Orientation};
use crate::messages::NodeHealth;
use crate::motion::ActuatorState;
use crate::node::{Direction, Node, Outbox};
use crate::protocol::{
    BalanceStatusData, BlinkData, CommandGroup, CommandId, ExpressionData, EyePositionData,
    ImuData, LipsyncData, LookAtData, MouthData, PersonData, StatusData, ValidatedPacket,
};
use crate::scheduler::Periodic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum WavePhase {
    #[default]
    Idle,
    Starting,
    Swinging { remaining: u8, high: bool },
}

/// Right-arm wave: shoulder alternates low/high every 300ms for three
/// cycles, then returns to center
#[derive(Debug, Clone)]
pub struct WaveMotion {
    phase: WavePhase,
    timer: Periodic,
}

impl Default for WaveMotion {
    fn default() -> Self {
        Self {
            phase: WavePhase::Idle,
            timer: Periodic::new(WAVE_SWING_MS),
        }
    }
}

impl WaveMotion {
    /// Begin (or restart) on the next tick
    pub fn start(&mut self) {
        self.phase = WavePhase::Starting;
    }

    pub fn is_active(&self) -> bool {
        self.phase != WavePhase::Idle
    }

    pub fn tick(&mut self, now_ms: u64, actuators: &mut ActuatorState) {
        match self.phase {
            WavePhase::Idle => {}
            WavePhase::Starting => {
                actuators.set_target(SERVO_ARM_RIGHT_SHOULDER, WAVE_LOW_ANGLE);
                self.timer.restart(now_ms);
                self.phase = WavePhase::Swinging {
                    remaining: WAVE_CYCLES * 2 - 1,
                    high: false,
                };
            }
            WavePhase::Swinging { remaining, high } => {
                if !self.timer.ready(now_ms) {
                    return;
                }
                if remaining == 0 {
                    actuators.set_target(SERVO_ARM_RIGHT_SHOULDER, SERVO_CENTER_ANGLE);
                    self.phase = WavePhase::Idle;
                    return;
                }
                let high = !high;
                let angle = if high { WAVE_HIGH_ANGLE } else { WAVE_LOW_ANGLE };
                actuators.set_target(SERVO_ARM_RIGHT_SHOULDER, angle);
                self.phase = WavePhase::Swinging {
                    remaining: remaining - 1,
                    high,
                };
            }
        }
    }
}

/// State mutated by command handlers
pub struct UpperState {
    pub actuators: ActuatorState,
    pub face: ExpressionController,
    pub wave: WaveMotion,
    /// Last detection announced by the main board
    pub person: Option<PersonData>,
    /// Latest telemetry from the lower board
    pub lower_orientation: Option<Orientation>,
    pub lower_balance: Option<BalanceStatusData>,
    outbox: Outbox,
}

impl UpperState {
    /// Starts in the neutral pose
    pub fn new(seed: Option<u64>) -> Self {
        let mut actuators = ActuatorState::new();
        let mut face = ExpressionController::new(seed);
        face.set_expression(Expression::Neutral, &mut actuators);
        Self {
            actuators,
            face,
            wave: WaveMotion::default(),
            person: None,
            lower_orientation: None,
            lower_balance: None,
            outbox: Outbox::default(),
        }
    }
}

fn on_ping(state: &mut UpperState, _: CommandId, _: &[u8]) {
    state.outbox.send(Direction::Upstream, CommandId::Pong, &[]);
}

fn on_status(state: &mut UpperState, _: CommandId, _: &[u8]) {
    let face = state.face.state();
    let status = StatusData {
        node: NodeKind::Upper.wire_id(),
        mode: face.current as u8,
        flags: face.speaking as u8,
    };
    state
        .outbox
        .send_record(Direction::Upstream, CommandId::StatusResp, &status);
}

fn on_expression(state: &mut UpperState, _: CommandId, payload: &[u8]) {
    let Some(data) = decode::<ExpressionData>(payload) else { return };
    match Expression::try_from(data.expression_id) {
        Ok(expression) => state.face.set_expression(expression, &mut state.actuators),
        Err(e) => debug!("Ignoring expression: {}", e),
    }
}

fn on_eye_position(state: &mut UpperState, _: CommandId, payload: &[u8]) {
    if let Some(eye) = decode::<EyePositionData>(payload) {
        state.face.set_eye_position(eye.x, eye.y, &mut state.actuators);
    }
}

fn on_look_at(state: &mut UpperState, _: CommandId, payload: &[u8]) {
    if let Some(look) = decode::<LookAtData>(payload) {
        state.face.set_eye_position(look.x, look.y, &mut state.actuators);
    }
}

fn on_blink(state: &mut UpperState, _: CommandId, payload: &[u8]) {
    if let Some(blink) = decode::<BlinkData>(payload) {
        state.face.set_blink(blink.closed, &mut state.actuators);
    }
}

fn on_mouth_open(state: &mut UpperState, _: CommandId, payload: &[u8]) {
    if let Some(mouth) = decode::<MouthData>(payload) {
        state.face.set_mouth_open(mouth.open_amount, &mut state.actuators);
    }
}

fn on_speak_start(state: &mut UpperState, _: CommandId, _: &[u8]) {
    state.face.speak_start();
}

fn on_speak_stop(state: &mut UpperState, _: CommandId, _: &[u8]) {
    state.face.speak_stop(&mut state.actuators);
}

fn on_lipsync(state: &mut UpperState, _: CommandId, payload: &[u8]) {
    if let Some(sample) = decode::<LipsyncData>(payload) {
        state.face.lipsync(sample.amplitude, &mut state.actuators);
    }
}

fn on_wave(state: &mut UpperState, _: CommandId, _: &[u8]) {
    info!("Wave");
    state.wave.start();
}

fn on_person(state: &mut UpperState, _: CommandId, payload: &[u8]) {
    if let Some(person) = decode::<PersonData>(payload) {
        debug!("Person at ({}, {})", person.x, person.y);
        state.person = person.detected.then_some(person);
    }
}

fn forward_down(state: &mut UpperState, cmd: u8, payload: &[u8]) {
    state.outbox.send_raw(Direction::Downstream, cmd, payload);
}

fn relay_up(state: &mut UpperState, cmd: CommandId, payload: &[u8]) {
    state.outbox.send(Direction::Upstream, cmd, payload);
}

fn on_lower_imu(state: &mut UpperState, cmd: CommandId, payload: &[u8]) {
    if let Some(imu) = decode::<ImuData>(payload) {
        state.lower_orientation = Some(imu.to_orientation());
        relay_up(state, cmd, payload);
    }
}

fn on_lower_balance(state: &mut UpperState, cmd: CommandId, payload: &[u8]) {
    if let Some(status) = decode::<BalanceStatusData>(payload) {
        state.lower_balance = Some(status);
        relay_up(state, cmd, payload);
    }
}

/// Commands arriving from the main board
fn main_table() -> Dispatcher<UpperState> {
    Dispatcher::new("upper")
        .on(CommandId::Ping, on_ping)
        .on(CommandId::Status, on_status)
        .on(CommandId::Expression, on_expression)
        .on(CommandId::EyePosition, on_eye_position)
        .on(CommandId::Blink, on_blink)
        .on(CommandId::MouthOpen, on_mouth_open)
        .on(CommandId::SpeakStart, on_speak_start)
        .on(CommandId::SpeakStop, on_speak_stop)
        .on(CommandId::LipsyncData, on_lipsync)
        .on(CommandId::Wave, on_wave)
        .on(CommandId::PersonDetected, on_person)
        .on(CommandId::LookAt, on_look_at)
        .on_group(CommandGroup::Locomotion, forward_down)
}

/// Telemetry and replies arriving from the lower board
fn lower_table() -> Dispatcher<UpperState> {
    Dispatcher::new("upper<-lower")
        .on(CommandId::ImuData, on_lower_imu)
        .on(CommandId::BalanceStatus, on_lower_balance)
        .on(CommandId::Pong, relay_up)
        .on(CommandId::StatusResp, relay_up)
}

pub struct UpperNode<D: ActuatorDriver, I: IndicatorDriver> {
    from_main: Dispatcher<UpperState>,
    from_lower: Dispatcher<UpperState>,
    state: UpperState,
    servo: D,
    leds: I,
    servo_timer: Periodic,
}

impl<D: ActuatorDriver, I: IndicatorDriver> UpperNode<D, I> {
    pub fn new(servo: D, leds: I, seed: Option<u64>) -> Self {
        Self {
            from_main: main_table(),
            from_lower: lower_table(),
            state: UpperState::new(seed),
            servo,
            leds,
            servo_timer: Periodic::new(SERVO_UPDATE_INTERVAL_MS),
        }
    }

    pub fn state(&self) -> &UpperState {
        &self.state
    }

    pub fn leds(&self) -> &I {
        &self.leds
    }

    pub fn servo(&self) -> &D {
        &self.servo
    }
}

impl<D: ActuatorDriver, I: IndicatorDriver> Node for UpperNode<D, I> {
    fn kind(&self) -> NodeKind {
        NodeKind::Upper
    }

    fn on_packet(&mut self, from: Direction, packet: &ValidatedPacket) {
        let table = match from {
            Direction::Upstream => &mut self.from_main,
            Direction::Downstream => &mut self.from_lower,
        };
        table.dispatch(&mut self.state, packet.cmd, &packet.payload);
    }

    fn step(&mut self, now_ms: u64) {
        let state = &mut self.state;
        state.wave.tick(now_ms, &mut state.actuators);
        state.face.update_blink(now_ms, &mut state.actuators);
        state.face.tick(now_ms, &mut state.actuators, &mut self.leds);

        if self.servo_timer.ready(now_ms) {
            state.actuators.tick(&mut self.servo);
        }
    }

    fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.state.outbox)
    }

    fn health(&self) -> NodeHealth {
        NodeHealth {
            packets_dispatched: self
                .from_main
                .dispatched()
                .wrapping_add(self.from_lower.dispatched()),
            unknown_commands: self.from_main.unknown().wrapping_add(self.from_lower.unknown()),
            driver_faults: self.state.actuators.faults(),
            ..NodeHealth::new(NodeKind::Upper)
        }
    }
}
