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

use async_trait::async_trait;
use mesh_router::channel::MessageObserver;
use mesh_router::control_plane::DiscoveryState;
use mesh_router::{MeshError, MeshMessage, MeshResult, MeshTransport};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportCallKind {
    Listen(u16),
    Connect(String),
    Send,
    Cancel,
    Dispose,
}

/// One recorded call, stamped with whether the registration gate was open at that time.
#[derive(Clone, Debug)]
pub struct TransportCall {
    pub kind: TransportCallKind,
    pub gate_open: bool,
    pub at: Instant,
}

/// In-memory transport that records every call made by the routing core.
///
/// `service_connect` reports a new connection only the first time an address is seen.
/// Addresses registered through [`fail_connections_to`](Self::fail_connections_to)
/// always fail.
pub struct RecordingTransport {
    url: String,
    state: Mutex<Option<Arc<DiscoveryState>>>,
    calls: Mutex<Vec<TransportCall>>,
    sent: Mutex<Vec<MeshMessage>>,
    connected: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    observers: Mutex<Vec<Arc<dyn MessageObserver>>>,
}

impl RecordingTransport {
    pub fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            state: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            connected: Mutex::new(HashSet::new()),
            failing: Mutex::new(HashSet::new()),
            observers: Mutex::new(Vec::new()),
        })
    }

    /// Lets the transport sample the registration gate on every call.
    pub fn observe_gate(&self, state: Arc<DiscoveryState>) {
        *self.state.lock().unwrap() = Some(state);
    }

    pub fn fail_connections_to(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<MeshMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn connect_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call.kind {
                TransportCallKind::Connect(address) => Some(address),
                _ => None,
            })
            .collect()
    }

    pub fn listen_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call.kind, TransportCallKind::Listen(_)))
            .count()
    }

    /// Network calls (listen/connect) made while the registration gate was still closed.
    pub fn calls_before_gate(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    call.kind,
                    TransportCallKind::Listen(_) | TransportCallKind::Connect(_)
                ) && !call.gate_open
            })
            .count()
    }

    /// Feeds `message` to every subscribed inbound observer, as if it had arrived
    /// from a peer.
    pub async fn inject(&self, message: MeshMessage) {
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.on_next(&message).await;
        }
    }

    fn record(&self, kind: TransportCallKind) {
        let gate_open = self
            .state
            .lock()
            .unwrap()
            .as_ref()
            .map(|state| state.registration_gate().is_open())
            .unwrap_or(false);
        debug!(url = self.url.as_str(), ?kind, gate_open, "transport call");
        self.calls.lock().unwrap().push(TransportCall {
            kind,
            gate_open,
            at: Instant::now(),
        });
    }
}

#[async_trait]
impl MeshTransport for RecordingTransport {
    fn url(&self) -> &str {
        &self.url
    }

    async fn start_listening_services(&self, port: u16, cancel: CancellationToken) -> MeshResult<()> {
        self.record(TransportCallKind::Listen(port));
        cancel.cancelled().await;
        Ok(())
    }

    async fn service_connect(&self, address: &str, _cancel: CancellationToken) -> MeshResult<bool> {
        self.record(TransportCallKind::Connect(address.to_string()));
        if self.failing.lock().unwrap().contains(address) {
            return Err(MeshError::Transport(format!("connection refused by {address}")));
        }
        Ok(self.connected.lock().unwrap().insert(address.to_string()))
    }

    async fn on_next(&self, message: MeshMessage) -> MeshResult<()> {
        self.record(TransportCallKind::Send);
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    fn subscribe(&self, observer: Arc<dyn MessageObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    async fn cancel(&self) {
        self.record(TransportCallKind::Cancel);
        self.connected.lock().unwrap().clear();
    }

    async fn dispose(&self) {
        self.record(TransportCallKind::Dispose);
    }
}

