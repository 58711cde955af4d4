//! Discovery messages and the contracts between the discovery protocol and the route table.

use crate::error::MeshResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DiscoveryPhase {
    Connect,
    ConnectResponse,
    QueueData,
    Error,
}

/// The channel aliases one service consumes (`inputs`) and produces (`outputs`).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceAnnouncement {
    pub service_address: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryMessage {
    pub phase: DiscoveryPhase,
    /// Transport port of the sender, or the port assigned by the discovery server in a
    /// `ConnectResponse`.
    pub port: u16,
    pub host: String,
    #[serde(default)]
    pub services: Vec<ServiceAnnouncement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Send/receive hooks the manager wires from the discovery state into the monitor.
#[async_trait]
pub trait DiscoveryHandler: Send + Sync {
    /// The message this service should announce next.
    fn next_announcement(&self) -> DiscoveryMessage;

    async fn on_discovery_message(&self, message: DiscoveryMessage);
}

/// Runs the peer-announcement protocol against a discovery address.
///
/// Implementations exchange [`DiscoveryMessage`]s over their own connection and feed
/// every received message to the attached [`DiscoveryHandler`].
#[async_trait]
pub trait DiscoveryMonitor: Send + Sync {
    fn attach_handler(&self, handler: Arc<dyn DiscoveryHandler>);

    /// Runs until `cancel` fires or the protocol fails.
    async fn start_listening_services(
        &self,
        discovery_address: &str,
        cancel: CancellationToken,
    ) -> MeshResult<()>;

    async fn dispose(&self) {}
}
