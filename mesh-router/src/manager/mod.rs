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

//! Mesh Service Manager: outbound routing, inbound delivery and the three service
//! lifecycles (discovery, listening, publish/refresh).

pub(crate) mod lifecycle;
pub(crate) mod routing;
mod service_handle;

pub use service_handle::ServiceHandle;

use crate::channel::{ChannelPublisher, MessageObserver, RouteRegister};
use crate::config::MeshConfig;
use crate::control_plane::{DiscoveryHandler, DiscoveryMonitor, DiscoveryState};
use crate::error::{MeshError, MeshResult};
use crate::observability::{events, fields};
use crate::transport::MeshTransport;
use crate::wire_message::MeshMessage;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COMPONENT: &str = "mesh_service_manager";

/// Coarse lifecycle position of a [`MeshServiceManager`].
///
/// States only move forward; `Cancelled` and `Disposed` are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ManagerState {
    Constructed,
    Registering,
    GateOpen,
    Running,
    Cancelled,
    Disposed,
}

impl Display for ManagerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ManagerState::Constructed => "constructed",
            ManagerState::Registering => "registering",
            ManagerState::GateOpen => "gate_open",
            ManagerState::Running => "running",
            ManagerState::Cancelled => "cancelled",
            ManagerState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

pub(crate) struct ManagerInner {
    pub(crate) config: MeshConfig,
    pub(crate) state: Arc<DiscoveryState>,
    pub(crate) discovery: Arc<dyn DiscoveryMonitor>,
    pub(crate) transport: Arc<dyn MeshTransport>,
    pub(crate) cancel: CancellationToken,
    lifecycle: Mutex<ManagerState>,
    handle: Mutex<Option<ServiceHandle>>,
    disposed: AtomicBool,
}

impl ManagerInner {
    pub(crate) fn lifecycle_state(&self) -> ManagerState {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next` when it lies ahead of the current state.
    pub(crate) fn advance(&self, next: ManagerState) {
        let mut current = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if next > *current {
            let previous = *current;
            debug!(
                component = COMPONENT,
                from = %previous,
                to = %next,
                "manager state transition"
            );
            *current = next;
        }
    }

    /// Address stamped on outbound messages and excluded from peer connections.
    pub(crate) fn own_address(&self) -> &str {
        self.transport.url()
    }
}

/// Orchestrates routing between locally registered channel proxies, the discovery
/// route table and the transport.
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use mesh_router::channel::{MeshChannelProxy, MessageObserver};
/// use mesh_router::control_plane::{DiscoveryHandler, DiscoveryMonitor, DiscoveryState};
/// use mesh_router::{MeshConfig, MeshMessage, MeshResult, MeshServiceManager, MeshTransport};
///
/// struct SilentDiscovery;
///
/// #[async_trait]
/// impl DiscoveryMonitor for SilentDiscovery {
///     fn attach_handler(&self, _handler: Arc<dyn DiscoveryHandler>) {}
///     async fn start_listening_services(&self, _address: &str, _cancel: CancellationToken) -> MeshResult<()> {
///         Ok(())
///     }
/// }
///
/// struct LoopbackTransport;
///
/// #[async_trait]
/// impl MeshTransport for LoopbackTransport {
///     fn url(&self) -> &str { "tcp://127.0.0.1:5000" }
///     async fn start_listening_services(&self, _port: u16, _cancel: CancellationToken) -> MeshResult<()> { Ok(()) }
///     async fn service_connect(&self, _address: &str, _cancel: CancellationToken) -> MeshResult<bool> { Ok(false) }
///     async fn on_next(&self, _message: MeshMessage) -> MeshResult<()> { Ok(()) }
///     fn subscribe(&self, _observer: Arc<dyn MessageObserver>) {}
///     async fn cancel(&self) {}
/// }
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let config = MeshConfig::default();
/// let state = DiscoveryState::new("tcp://127.0.0.1:5000", &config);
/// let manager = MeshServiceManager::new(
///     config,
///     state.clone(),
///     Arc::new(SilentDiscovery),
///     Arc::new(LoopbackTransport),
/// );
///
/// let prices = MeshChannelProxy::<u32>::input("prices");
/// manager.register_channels(prices);
///
/// let delivered = manager
///     .on_next(MeshMessage::new("1").with_channel("prices"))
///     .await;
/// assert!(delivered.is_ok());
/// assert_eq!(state.input_channels().get("prices").unwrap().len(), 1);
/// # });
/// ```
pub struct MeshServiceManager {
    inner: Arc<ManagerInner>,
}

impl MeshServiceManager {
    /// Wires the manager into the transport's inbound stream and hands the route table
    /// to the discovery monitor as its send/receive handler.
    pub fn new(
        config: MeshConfig,
        state: Arc<DiscoveryState>,
        discovery: Arc<dyn DiscoveryMonitor>,
        transport: Arc<dyn MeshTransport>,
    ) -> Self {
        let inner = Arc::new(ManagerInner {
            config,
            state,
            discovery,
            transport,
            cancel: CancellationToken::new(),
            lifecycle: Mutex::new(ManagerState::Constructed),
            handle: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        inner.transport.subscribe(Arc::new(InboundRelay {
            manager: Arc::downgrade(&inner),
        }));
        let handler: Arc<dyn DiscoveryHandler> = inner.state.clone();
        inner.discovery.attach_handler(handler);

        Self { inner }
    }

    pub fn state(&self) -> ManagerState {
        self.inner.lifecycle_state()
    }

    pub fn discovery_state(&self) -> &Arc<DiscoveryState> {
        &self.inner.state
    }

    pub fn config(&self) -> &MeshConfig {
        &self.inner.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Registers a route's input queues and output endpoints in the shared tables and
    /// points its publish path at this manager.
    pub fn register_channels<R>(&self, route: Arc<R>)
    where
        R: RouteRegister + 'static,
    {
        self.inner.advance(ManagerState::Registering);
        route.clone().register_receiver_channels(self.inner.state.input_channels());
        route.clone().register_publisher_channels(self.inner.state.output_channels());
        route.attach_publisher(Arc::new(RoutePublisher {
            manager: Arc::downgrade(&self.inner),
        }));
    }

    /// Routing decision for a message posted on a local output channel.
    pub async fn on_publish(&self, channel: &str, message: MeshMessage) {
        self.inner.on_publish(channel, message).await;
    }

    /// Appends an inbound message onto the local queue named by its channel.
    pub async fn on_next(&self, message: MeshMessage) -> MeshResult<()> {
        self.inner.deliver_inbound(message).await
    }

    /// Inbound delivery preceded by a known-source check. Returns `true` when the
    /// message was enqueued.
    pub async fn service_subscriber(&self, message: MeshMessage) -> bool {
        self.inner.service_subscriber(message).await
    }

    /// Spawns the discovery, listening and publish/refresh lifecycles.
    ///
    /// `token` cancels all three. Calling this again while the lifecycles run returns
    /// the existing handle; a disposed manager returns a handle resolving to
    /// [`MeshError::Disposed`].
    pub fn start_service(&self, discovery_address: &str, token: CancellationToken) -> ServiceHandle {
        if self.inner.disposed.load(Ordering::Acquire) {
            return ServiceHandle::ready(Err(MeshError::Disposed));
        }

        let mut handle = self
            .inner
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = handle.as_ref() {
            debug!(
                component = COMPONENT,
                "service already started; returning existing handle"
            );
            return existing.clone();
        }

        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => cancel.cancel(),
                _ = cancel.cancelled() => {}
            }
        });

        let started = lifecycle::spawn_lifecycles(self.inner.clone(), discovery_address.to_string());
        *handle = Some(started.clone());
        started
    }

    /// Handle of the running lifecycles, if [`start_service`](Self::start_service) was
    /// called.
    pub fn service_handle(&self) -> Option<ServiceHandle> {
        self.inner
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Signals every lifecycle to stop and closes transport connections.
    pub async fn cancel(&self) {
        self.inner.advance(ManagerState::Cancelled);
        self.inner.cancel.cancel();
        self.inner.transport.cancel().await;
    }

    /// Cancels, waits for all lifecycles to finish, then releases discovery and
    /// transport resources. Only the first call does anything.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.cancel().await;
        if let Some(handle) = self.service_handle() {
            if let Err(err) = handle.await {
                warn!(
                    component = COMPONENT,
                    err = %err,
                    "lifecycle finished with an error during dispose"
                );
            }
        }

        self.inner.discovery.dispose().await;
        self.inner.transport.dispose().await;
        self.inner.advance(ManagerState::Disposed);
        info!(
            event = events::MANAGER_DISPOSED,
            component = COMPONENT,
            address = self.inner.own_address(),
            "mesh service manager disposed"
        );
    }
}

/// Transport-facing observer feeding inbound messages back into the manager.
struct InboundRelay {
    manager: Weak<ManagerInner>,
}

#[async_trait]
impl MessageObserver for InboundRelay {
    async fn on_next(&self, message: &MeshMessage) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        let channel = fields::format_message_channel(message);
        if let Err(err) = manager.deliver_inbound(message.clone()).await {
            warn!(
                event = events::INBOUND_UNKNOWN_CHANNEL,
                component = COMPONENT,
                channel,
                xid = message.transaction_id.as_str(),
                err = %err,
                "dropping inbound message"
            );
        }
    }
}

/// Publish target attached to every registered route.
struct RoutePublisher {
    manager: Weak<ManagerInner>,
}

#[async_trait]
impl ChannelPublisher for RoutePublisher {
    async fn publish(&self, channel: &str, message: MeshMessage) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_publish(channel, message).await;
        }
    }
}
