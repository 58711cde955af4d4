//! Seams between channel proxies and the routing core.

use crate::control_plane::{InputChannels, OutputChannels};
use crate::wire_message::MeshMessage;
use async_trait::async_trait;
use std::sync::Arc;

/// The single outbound routing function a proxy posts through.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(&self, channel: &str, message: MeshMessage);
}

/// A local output channel as seen by the route-refresh loop.
pub trait OutputEndpoint: Send + Sync {
    fn alias(&self) -> &str;

    /// Called once per newly established connection to a subscriber of this channel.
    fn on_connect(&self, address: &str);
}

/// Something that owns channel aliases and can be wired into a manager.
pub trait RouteRegister: Send + Sync {
    fn register_receiver_channels(self: Arc<Self>, inputs: &InputChannels);

    fn register_publisher_channels(self: Arc<Self>, outputs: &OutputChannels);

    fn attach_publisher(&self, publisher: Arc<dyn ChannelPublisher>);
}
