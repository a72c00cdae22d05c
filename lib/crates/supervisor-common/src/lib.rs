pub mod health;
pub mod types;

pub use health::{ChannelHealth, ChannelSelf, HealthReport};
pub use types::*;
