// Async host for one board's control loop
//
// A 1ms tokio interval drives the cooperative loop. On the main board zenoh
// carries remote commands in; every board publishes its health once a second.

use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::clock::{MonotonicClock, TimeSource};
use crate::config::{
    HEALTH_INTERVAL_MS, LOOP_PERIOD_MS, NodeConfig, NodeKind, TOPIC_CMD_MAIN, TOPIC_HEALTH,
};
use crate::hal::{NoDetector, SimImu, SimIndicator, SimServoBoard};
use crate::link::{Link, LinkError, SerialLink};
use crate::messages::RemoteCommand;
use crate::node::{LowerNode, MainNode, Node, UpperNode};
use crate::scheduler::NodeLoop;

fn open_link(port: Option<&str>, baud_rate: u32) -> Result<Option<Box<dyn Link + Send>>, LinkError> {
    let Some(port) = port else { return Ok(None) };
    let link: Box<dyn Link + Send> = Box::new(SerialLink::open(port, baud_rate)?);
    Ok(Some(link))
}

pub async fn run(config: NodeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let upstream = open_link(config.upstream_port.as_deref(), config.baud_rate)?;
    let downstream = open_link(config.downstream_port.as_deref(), config.baud_rate)?;
    let clock = MonotonicClock::new();

    // Chip bindings are not part of this runtime; boards run on the simulated drivers
    match config.node {
        NodeKind::Main => {
            let node = MainNode::new(NoDetector::new(), config.seed);
            drive(NodeLoop::new(clock, node, upstream, downstream), &config).await
        }
        NodeKind::Upper => {
            let node = UpperNode::new(SimServoBoard::new(), SimIndicator::new(), config.seed);
            drive(NodeLoop::new(clock, node, upstream, downstream), &config).await
        }
        NodeKind::Lower => {
            let node = LowerNode::new(SimServoBoard::new(), SimImu::new());
            drive(NodeLoop::new(clock, node, upstream, downstream), &config).await
        }
    }
}

async fn drive<N: Node, C: TimeSource>(
    mut node_loop: NodeLoop<N, C>,
    config: &NodeConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let session = if config.zenoh {
        info!("Opening Zenoh session...");
        Some(zenoh::open(zenoh::Config::default()).await?)
    } else {
        None
    };

    let subscriber = match &session {
        Some(session) if config.node == NodeKind::Main => {
            info!("Subscribed to: {}", TOPIC_CMD_MAIN);
            Some(session.declare_subscriber(TOPIC_CMD_MAIN).await?)
        }
        _ => None,
    };
    let pub_health = match &session {
        Some(session) => {
            info!("Publishing to: {}", TOPIC_HEALTH);
            Some(session.declare_publisher(TOPIC_HEALTH).await?)
        }
        None => None,
    };

    let mut tick = interval(Duration::from_millis(LOOP_PERIOD_MS));
    let mut health_tick = interval(Duration::from_millis(HEALTH_INTERVAL_MS));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "{:?} board running: {}ms loop, {}ms health",
        config.node, LOOP_PERIOD_MS, HEALTH_INTERVAL_MS
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                // 1. Drain remote commands (non-blocking)
                if let Some(subscriber) = &subscriber {
                    while let Ok(Some(sample)) = subscriber.try_recv() {
                        let payload = sample.payload().to_bytes();
                        match serde_json::from_slice::<RemoteCommand>(&payload) {
                            Ok(cmd) => node_loop.node_mut().on_remote(&cmd),
                            Err(e) => warn!("Failed to parse remote command: {}", e),
                        }
                    }
                }

                // 2. One cooperative iteration
                node_loop.run_once();
            }
            _ = health_tick.tick() => {
                if let Some(publisher) = &pub_health {
                    let health_json = serde_json::to_string(&node_loop.health())?;
                    if let Err(e) = publisher.put(health_json).await {
                        warn!("Failed to publish health: {}", e);
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
