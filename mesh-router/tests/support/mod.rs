#![allow(dead_code)]

use integration_test_utils::{DelayedDiscovery, RecordingTransport};
use mesh_router::control_plane::{DiscoveryState, ServiceAnnouncement};
use mesh_router::{MeshConfig, MeshServiceManager};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SELF_ADDRESS: &str = "tcp://10.0.0.1:5000";
pub(crate) const DISCOVERY_ADDRESS: &str = "tcp://10.0.0.254:4999";

pub(crate) struct MeshService {
    pub(crate) manager: MeshServiceManager,
    pub(crate) state: Arc<DiscoveryState>,
    pub(crate) transport: Arc<RecordingTransport>,
    pub(crate) discovery: Arc<DelayedDiscovery>,
}

pub(crate) fn fast_config() -> MeshConfig {
    MeshConfig {
        service_name: "integration".to_string(),
        connect_backoff_ms: 1,
        refresh_interval_ms: 10,
        message_queue_size: 64,
        ..MeshConfig::default()
    }
}

pub(crate) fn make_service(
    discovery_delay: Duration,
    assigned_port: u16,
    peers: Vec<ServiceAnnouncement>,
) -> MeshService {
    let config = fast_config();
    let state = DiscoveryState::new(SELF_ADDRESS, &config);
    let transport = RecordingTransport::new(SELF_ADDRESS);
    transport.observe_gate(state.clone());
    let discovery = DelayedDiscovery::new(discovery_delay, assigned_port, peers);
    let manager = MeshServiceManager::new(config, state.clone(), discovery.clone(), transport.clone());

    MeshService {
        manager,
        state,
        transport,
        discovery,
    }
}

pub(crate) async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}
