// Lower board: legs and waist
//
// Per iteration after dispatch: IMU at 100Hz (balance only while walking),
// gait at 100Hz while walking, servo interpolation at 50Hz, then telemetry
// upstream at 10Hz.

use tracing::{debug, info, warn};

use crate::config::{
    IMU_UPDATE_INTERVAL_MS, NodeKind, SERVO_UPDATE_INTERVAL_MS, TELEMETRY_INTERVAL_MS,
    WALK_UPDATE_INTERVAL_MS,
};
use crate::dispatch::{decode, Dispatcher};
use crate::hal::{ActuatorDriver, Orientation, OrientationSensor};
use crate::messages::NodeHealth;
use crate::motion::{
    gait::apply_sit, ActuatorState, BalanceController, GaitGenerator, JointTargets, WalkMode,
    WalkState,
};
use crate::node::{Direction, Node, Outbox};
use crate::protocol::{
    payload::to_fixed, BalanceStatusData, CommandId, ImuData, StatusData, TurnData,
    ValidatedPacket, WalkData,
};
use crate::scheduler::Periodic;

/// State mutated by command handlers
#[derive(Default)]
pub struct LowerState {
    pub actuators: ActuatorState,
    pub walk: WalkState,
    outbox: Outbox,
}

fn on_ping(state: &mut LowerState, _: CommandId, _: &[u8]) {
    state.outbox.send(Direction::Upstream, CommandId::Pong, &[]);
}

fn on_status(state: &mut LowerState, _: CommandId, _: &[u8]) {
    let status = StatusData {
        node: NodeKind::Lower.wire_id(),
        mode: state.walk.mode as u8,
        flags: state.walk.walking as u8,
    };
    state
        .outbox
        .send_record(Direction::Upstream, CommandId::StatusResp, &status);
}

fn on_walk_start(state: &mut LowerState, _: CommandId, _: &[u8]) {
    info!("Walk start");
    state.walk.walking = true;
    state.walk.mode = WalkMode::Forward;
    state.walk.phase = 0.0;
}

fn on_walk_stop(state: &mut LowerState, _: CommandId, _: &[u8]) {
    info!("Walk stop");
    state.walk.mode = WalkMode::Stop;
    state.walk.walking = false;
    JointTargets::stand().apply(&mut state.actuators);
}

fn on_walk_direction(state: &mut LowerState, _: CommandId, payload: &[u8]) {
    let Some(data) = decode::<WalkData>(payload) else { return };
    let mode = match WalkMode::try_from(data.mode) {
        Ok(mode) => mode,
        Err(e) => {
            debug!("Ignoring walk direction: {}", e);
            return;
        }
    };

    state.walk.mode = mode;
    state.walk.speed = data.speed.min(100);
    // A Stop mode is left for the gait tick to wind down
    if mode != WalkMode::Stop {
        state.walk.walking = true;
    }
    info!("Walk mode {:?} at speed {}", mode, state.walk.speed);
}

fn on_turn(state: &mut LowerState, _: CommandId, payload: &[u8]) {
    let Some(turn) = decode::<TurnData>(payload) else { return };
    state.walk.mode = if turn.direction < 0 {
        WalkMode::TurnLeft
    } else {
        WalkMode::TurnRight
    };
    state.walk.walking = true;
}

fn on_stand(state: &mut LowerState, _: CommandId, _: &[u8]) {
    state.walk.walking = false;
    JointTargets::stand().apply(&mut state.actuators);
}

fn on_sit(state: &mut LowerState, _: CommandId, _: &[u8]) {
    state.walk.walking = false;
    apply_sit(&mut state.actuators);
}

fn command_table() -> Dispatcher<LowerState> {
    Dispatcher::new("lower")
        .on(CommandId::Ping, on_ping)
        .on(CommandId::Status, on_status)
        .on(CommandId::WalkStart, on_walk_start)
        .on(CommandId::WalkStop, on_walk_stop)
        .on(CommandId::WalkDirection, on_walk_direction)
        .on(CommandId::Turn, on_turn)
        .on(CommandId::Stand, on_stand)
        .on(CommandId::Sit, on_sit)
}

pub struct LowerNode<D: ActuatorDriver, S: OrientationSensor> {
    dispatcher: Dispatcher<LowerState>,
    state: LowerState,
    gait: GaitGenerator,
    balance: BalanceController,
    servo: D,
    imu: S,
    /// Last good sample; kept when a read fails
    orientation: Orientation,
    sensor_faults: u32,
    imu_timer: Periodic,
    walk_timer: Periodic,
    servo_timer: Periodic,
    telemetry_timer: Periodic,
}

impl<D: ActuatorDriver, S: OrientationSensor> LowerNode<D, S> {
    pub fn new(servo: D, imu: S) -> Self {
        Self {
            dispatcher: command_table(),
            state: LowerState::default(),
            gait: GaitGenerator::default(),
            balance: BalanceController::default(),
            servo,
            imu,
            orientation: Orientation::default(),
            sensor_faults: 0,
            imu_timer: Periodic::new(IMU_UPDATE_INTERVAL_MS),
            walk_timer: Periodic::new(WALK_UPDATE_INTERVAL_MS),
            servo_timer: Periodic::new(SERVO_UPDATE_INTERVAL_MS),
            telemetry_timer: Periodic::new(TELEMETRY_INTERVAL_MS),
        }
    }

    pub fn walk(&self) -> &WalkState {
        &self.state.walk
    }

    pub fn actuators(&self) -> &ActuatorState {
        &self.state.actuators
    }

    pub fn balance(&self) -> &BalanceController {
        &self.balance
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn servo(&self) -> &D {
        &self.servo
    }

    pub fn imu_mut(&mut self) -> &mut S {
        &mut self.imu
    }

    fn update_imu(&mut self) {
        match self.imu.sample() {
            Ok(sample) => self.orientation = sample,
            Err(e) => {
                self.sensor_faults = self.sensor_faults.wrapping_add(1);
                warn!("IMU read failed, skipping balance: {}", e);
                return;
            }
        }

        if self.state.walk.walking {
            let correction = self.balance.tick(&self.orientation);
            BalanceController::apply(&correction, &mut self.state.actuators);
        }
    }

    fn update_walk(&mut self) {
        let step = self.gait.tick(&mut self.state.walk);
        step.targets.apply(&mut self.state.actuators);
        if step.stopped {
            debug!("Gait stopped, standing");
            self.state.walk.walking = false;
        }
    }

    fn send_telemetry(&mut self) {
        let imu = ImuData::from_orientation(&self.orientation);
        let last = self.balance.last_correction();
        let status = BalanceStatusData {
            pitch_correction: to_fixed(last.pitch),
            roll_correction: to_fixed(last.roll),
            walking: self.state.walk.walking,
        };
        let outbox = &mut self.state.outbox;
        outbox.send_record(Direction::Upstream, CommandId::ImuData, &imu);
        outbox.send_record(Direction::Upstream, CommandId::BalanceStatus, &status);
    }
}

impl<D: ActuatorDriver, S: OrientationSensor> Node for LowerNode<D, S> {
    fn kind(&self) -> NodeKind {
        NodeKind::Lower
    }

    fn on_packet(&mut self, from: Direction, packet: &ValidatedPacket) {
        if from == Direction::Downstream {
            debug!("Lower board has no downstream, dropping 0x{:02X}", packet.cmd);
            return;
        }
        self.dispatcher
            .dispatch(&mut self.state, packet.cmd, &packet.payload);
    }

    fn step(&mut self, now_ms: u64) {
        if self.imu_timer.ready(now_ms) {
            self.update_imu();
        }

        if self.state.walk.walking && self.walk_timer.ready(now_ms) {
            self.update_walk();
        }

        if self.servo_timer.ready(now_ms) {
            self.state.actuators.tick(&mut self.servo);
        }

        if self.telemetry_timer.ready(now_ms) {
            self.send_telemetry();
        }
    }

    fn take_outbox(&mut self) -> Outbox {
        std::mem::take(&mut self.state.outbox)
    }

    fn health(&self) -> NodeHealth {
        NodeHealth {
            packets_dispatched: self.dispatcher.dispatched(),
            unknown_commands: self.dispatcher.unknown(),
            driver_faults: self.state.actuators.faults().wrapping_add(self.sensor_faults),
            ..NodeHealth::new(NodeKind::Lower)
        }
    }
}
