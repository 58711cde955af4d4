//! Channel layer.
//!
//! Local queues, typed channel proxies and the observer plumbing between them. A
//! proxy is the only place where business payloads are turned into wire messages and
//! back.
//!
//! ```
//! use std::sync::Arc;
//! use mesh_router::channel::MeshChannelProxy;
//! use mesh_router::control_plane::{InputChannels, OutputChannels};
//!
//! let inputs = InputChannels::new(16);
//! let outputs = OutputChannels::new();
//! let proxy: Arc<MeshChannelProxy<u32>> = MeshChannelProxy::new(Some("prices"), Some("updates"));
//!
//! proxy.register_dependencies(Some(&inputs), Some(&outputs));
//! // A second registration is a no-op: still one queue per alias.
//! proxy.register_dependencies(Some(&inputs), Some(&outputs));
//!
//! assert_eq!(inputs.len(), 1);
//! assert!(outputs.contains("updates"));
//! ```

pub mod metrics;
pub mod monitor;
pub mod observer;
pub mod proxy;
pub mod queue;
pub mod route_register;

pub use metrics::{ChannelMetrics, ChannelMetricsSnapshot};
pub use monitor::{Monitor, TracingMonitor};
pub use observer::{MessageObserver, ObserverList, PayloadObserver, Subscription};
pub use proxy::MeshChannelProxy;
pub use queue::ChannelQueue;
pub use route_register::{ChannelPublisher, OutputEndpoint, RouteRegister};
