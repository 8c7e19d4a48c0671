// Keyboard teleop: WASD walk, Z/X turn, T stand, G sit, 1-8 expressions,
// V wave, P ping, R/F speed, Q quit
use corosuke_runtime::config::TOPIC_CMD_MAIN;
use corosuke_runtime::expression::Expression;
use corosuke_runtime::messages::RemoteCommand;
use corosuke_runtime::motion::WalkMode;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [u8; 3] = [30, 60, 100];
const INPUT_TIMEOUT_MS: u64 = 500; // Stop walking after this much time with no movement key

const EXPRESSIONS: [Expression; 8] = [
    Expression::Neutral,
    Expression::Happy,
    Expression::Sad,
    Expression::Surprised,
    Expression::Angry,
    Expression::Sleepy,
    Expression::Thinking,
    Expression::Excited,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_MAIN).await?;

    info!("Controls: WASD=walk, Z/X=turn, T=stand, G=sit, 1-8=expression, V=wave, P=ping, R/F=speed, Q=quit");
    info!("Speed: {}", SPEEDS[0]);

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn publish(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: &RemoteCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(cmd)?).await?;
    Ok(())
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    // Mode last sent, so a held key does not flood the link
    let mut walking: Option<WalkMode> = None;
    let mut last_movement_input = Instant::now();

    loop {
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                let mode = match code {
                    KeyCode::Char('w') if pressed => Some(WalkMode::Forward),
                    KeyCode::Char('s') if pressed => Some(WalkMode::Backward),
                    KeyCode::Char('a') if pressed => Some(WalkMode::Left),
                    KeyCode::Char('d') if pressed => Some(WalkMode::Right),
                    KeyCode::Char('z') if pressed => Some(WalkMode::TurnLeft),
                    KeyCode::Char('x') if pressed => Some(WalkMode::TurnRight),
                    _ => None,
                };

                if let Some(mode) = mode {
                    last_movement_input = Instant::now();
                    if walking != Some(mode) {
                        let speed = SPEEDS[speed_idx];
                        publish(publisher, &RemoteCommand::Walk { mode, speed }).await?;
                        walking = Some(mode);
                    }
                    continue;
                }

                let cmd = match code {
                    KeyCode::Char('t') if pressed => Some(RemoteCommand::Stand),
                    KeyCode::Char('g') if pressed => Some(RemoteCommand::Sit),
                    KeyCode::Char('v') if pressed => Some(RemoteCommand::Wave),
                    KeyCode::Char('p') if pressed => Some(RemoteCommand::Ping),
                    KeyCode::Char(c @ '1'..='8') if pressed => {
                        let expression = EXPRESSIONS[(c as u8 - b'1') as usize];
                        Some(RemoteCommand::Expression { expression })
                    }

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(SPEEDS.len() - 1);
                        info!("Speed: {}", SPEEDS[speed_idx]);
                        walking.map(|mode| RemoteCommand::Walk {
                            mode,
                            speed: SPEEDS[speed_idx],
                        })
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        info!("Speed: {}", SPEEDS[speed_idx]);
                        walking.map(|mode| RemoteCommand::Walk {
                            mode,
                            speed: SPEEDS[speed_idx],
                        })
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => None,
                };

                if let Some(cmd) = cmd {
                    if matches!(cmd, RemoteCommand::Stand | RemoteCommand::Sit) {
                        walking = None;
                    }
                    publish(publisher, &cmd).await?;
                }
            }
        }

        // Stop walking if no movement input for INPUT_TIMEOUT_MS
        if walking.is_some()
            && last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS)
        {
            publish(publisher, &RemoteCommand::Stop).await?;
            walking = None;
        }
    }

    Ok(())
}
