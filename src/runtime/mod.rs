mod channel;
mod context;
mod tracker;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::{Context, GatewayTarget, Inbound, Services, Trigger};
pub use tracker::Tracker;
