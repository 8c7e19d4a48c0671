pub mod clock;
pub mod config;
pub mod dispatch;
pub mod expression;
pub mod hal;
pub mod link;
pub mod messages;
pub mod motion;
pub mod node;
pub mod protocol;
pub mod runtime;
pub mod scheduler;
