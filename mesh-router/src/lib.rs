/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # mesh-router
//!
//! `mesh-router` is the routing and connection-orchestration core of a lightweight
//! service mesh. Services expose named input and output channels; discovery tells each
//! service which peer addresses serve which channel; the [`MeshServiceManager`] moves
//! typed messages between local business logic and those peers over a
//! [`MeshTransport`].
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use mesh_router::channel::MeshChannelProxy;
//! use mesh_router::control_plane::{DiscoveryState, ServiceAnnouncement};
//! use mesh_router::MeshConfig;
//!
//! let config = MeshConfig::from_json5_str(
//!     r#"{ service_name: "pricer", listening_port: 5000, refresh_interval_ms: 500 }"#,
//! )
//! .unwrap();
//! let state = DiscoveryState::new("tcp://10.0.0.1:5000", &config);
//!
//! let prices: Arc<MeshChannelProxy<f64>> = MeshChannelProxy::new(Some("prices"), Some("quotes"));
//! prices.register_dependencies(Some(state.input_channels()), Some(state.output_channels()));
//!
//! state.apply_announcements(&[ServiceAnnouncement {
//!     service_address: "tcp://10.0.0.2:5000".to_string(),
//!     inputs: vec!["quotes".to_string()],
//!     outputs: vec!["prices".to_string()],
//! }]);
//!
//! assert!(state.is_known_input_source("prices", "tcp://10.0.0.2:5000"));
//! assert_eq!(state.output_routes()[0].channel, "quotes");
//! ```
//!
//! ## Internal architecture map
//!
//! - Channel: local queues, typed proxies, observer lists, metrics and monitors
//! - Control plane: route table, discovery contracts and the registration gate
//! - Transport: the connect/listen/publish contract implemented outside this crate
//! - Manager: outbound routing decision, inbound delivery and the discovery,
//!   listening and publish/refresh lifecycles
//!
//! ## Observability model
//!
//! The crate uses `tracing` for logs/events with stable `event`/`component` fields.
//! Library code never initializes a global subscriber; binaries and tests do that
//! once at process boundaries.

pub mod channel;
pub mod config;
pub mod control_plane;
pub mod error;
mod manager;
#[doc(hidden)]
pub mod observability;
pub mod transport;
pub mod wire_message;

pub use config::MeshConfig;
pub use error::{MeshError, MeshResult, ObserverError};
pub use manager::{ManagerState, MeshServiceManager, ServiceHandle};
pub use transport::MeshTransport;
pub use wire_message::{MeshMessage, DEFAULT_GRAPH_ID};
