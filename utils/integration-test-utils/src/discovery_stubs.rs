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
use mesh_router::control_plane::{
    DiscoveryHandler, DiscoveryMessage, DiscoveryMonitor, DiscoveryPhase, ServiceAnnouncement,
};
use mesh_router::{MeshError, MeshResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Discovery stub that registers the service only after `delay`, then publishes a fixed
/// peer list together with the service's own announcement.
pub struct DelayedDiscovery {
    delay: Duration,
    assigned_port: u16,
    peers: Vec<ServiceAnnouncement>,
    handler: Mutex<Option<Arc<dyn DiscoveryHandler>>>,
    announcements: Mutex<Vec<DiscoveryMessage>>,
    registered_at: Mutex<Option<Instant>>,
    disposals: AtomicUsize,
}

impl DelayedDiscovery {
    pub fn new(delay: Duration, assigned_port: u16, peers: Vec<ServiceAnnouncement>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            assigned_port,
            peers,
            handler: Mutex::new(None),
            announcements: Mutex::new(Vec::new()),
            registered_at: Mutex::new(None),
            disposals: AtomicUsize::new(0),
        })
    }

    /// Announcements pulled from the attached handler, in order.
    pub fn announcements(&self) -> Vec<DiscoveryMessage> {
        self.announcements.lock().unwrap().clone()
    }

    /// Instant just before the peer list was handed to the route table.
    pub fn registered_at(&self) -> Option<Instant> {
        *self.registered_at.lock().unwrap()
    }

    pub fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }

    fn announce(&self, handler: &Arc<dyn DiscoveryHandler>) -> DiscoveryMessage {
        let announcement = handler.next_announcement();
        self.announcements.lock().unwrap().push(announcement.clone());
        announcement
    }
}

pub fn announcement(address: &str, inputs: &[&str], outputs: &[&str]) -> ServiceAnnouncement {
    ServiceAnnouncement {
        service_address: address.to_string(),
        inputs: inputs.iter().map(|alias| alias.to_string()).collect(),
        outputs: outputs.iter().map(|alias| alias.to_string()).collect(),
    }
}

#[async_trait]
impl DiscoveryMonitor for DelayedDiscovery {
    fn attach_handler(&self, handler: Arc<dyn DiscoveryHandler>) {
        *self.handler.lock().unwrap() = Some(handler);
    }

    async fn start_listening_services(
        &self,
        discovery_address: &str,
        cancel: CancellationToken,
    ) -> MeshResult<()> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(self.delay) => {}
        }

        let Some(handler) = self.handler.lock().unwrap().clone() else {
            return Err(MeshError::Discovery("no discovery handler attached".to_string()));
        };

        let connect = self.announce(&handler);
        debug!(address = discovery_address, phase = ?connect.phase, "stub discovery connect");
        handler
            .on_discovery_message(DiscoveryMessage {
                phase: DiscoveryPhase::ConnectResponse,
                port: self.assigned_port,
                host: discovery_address.to_string(),
                services: Vec::new(),
                error: None,
            })
            .await;

        let mut services = self.peers.clone();
        services.extend(self.announce(&handler).services);
        *self.registered_at.lock().unwrap() = Some(Instant::now());
        handler
            .on_discovery_message(DiscoveryMessage {
                phase: DiscoveryPhase::QueueData,
                port: self.assigned_port,
                host: discovery_address.to_string(),
                services,
                error: None,
            })
            .await;

        cancel.cancelled().await;
        Ok(())
    }

    async fn dispose(&self) {
        self.disposals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Discovery stub whose protocol loop fails immediately.
#[derive(Default)]
pub struct FailingDiscovery;

#[async_trait]
impl DiscoveryMonitor for FailingDiscovery {
    fn attach_handler(&self, _handler: Arc<dyn DiscoveryHandler>) {}

    async fn start_listening_services(
        &self,
        discovery_address: &str,
        _cancel: CancellationToken,
    ) -> MeshResult<()> {
        Err(MeshError::Discovery(format!(
            "discovery server {discovery_address} unreachable"
        )))
    }
}
