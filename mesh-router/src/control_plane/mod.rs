//! Control-plane layer.
//!
//! Owns the route table (channel alias to local queue, channel alias to remote
//! subscriber addresses), the discovery contracts that keep it current, and the
//! one-shot registration gate that holds back network I/O until routes are known.
//!
//! ```
//! use mesh_router::channel::MeshChannelProxy;
//! use mesh_router::control_plane::{DiscoveryState, ServiceAnnouncement};
//! use mesh_router::MeshConfig;
//!
//! let state = DiscoveryState::new("tcp://10.0.0.1:5000", &MeshConfig::default());
//! let proxy = MeshChannelProxy::<u32>::output("updates");
//! proxy.register_dependencies(None, Some(state.output_channels()));
//! state.apply_announcements(&[ServiceAnnouncement {
//!     service_address: "tcp://10.0.0.2:5000".to_string(),
//!     inputs: vec!["updates".to_string()],
//!     outputs: vec![],
//! }]);
//!
//! let routes = state.output_routes();
//! assert_eq!(routes.len(), 1);
//! assert_eq!(routes[0].addresses, vec!["tcp://10.0.0.2:5000".to_string()]);
//! ```

pub(crate) mod channel_tables;
pub(crate) mod discovery;
pub(crate) mod discovery_state;
pub(crate) mod registration_gate;

pub use channel_tables::{InputChannels, OutputChannels};
pub use discovery::{
    DiscoveryHandler, DiscoveryMessage, DiscoveryMonitor, DiscoveryPhase, ServiceAnnouncement,
};
pub use discovery_state::{ChannelRoute, DiscoveryState};
pub use registration_gate::RegistrationGate;
