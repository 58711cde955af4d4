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

//! Discovery, listening and publish/refresh lifecycles.

use crate::control_plane::RegistrationGate;
use crate::error::MeshResult;
use crate::manager::{ManagerInner, ManagerState, ServiceHandle};
use crate::observability::{events, fields};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "lifecycle";

pub(crate) fn spawn_lifecycles(inner: Arc<ManagerInner>, discovery_address: String) -> ServiceHandle {
    let discovery = tokio::spawn(run_discovery(inner.clone(), discovery_address));
    let listening = tokio::spawn(run_listener(inner.clone()));
    let publishing = tokio::spawn(run_publisher(inner));
    ServiceHandle::join(discovery, listening, publishing)
}

/// Suspends until the gate opens. Returns `false` when cancelled first.
async fn wait_for_gate(gate: &RegistrationGate, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = gate.wait() => true,
    }
}

async fn run_discovery(inner: Arc<ManagerInner>, discovery_address: String) -> MeshResult<()> {
    info!(
        event = events::DISCOVERY_STARTED,
        component = COMPONENT,
        address = discovery_address.as_str(),
        "discovery lifecycle started"
    );
    let result = inner
        .discovery
        .start_listening_services(&discovery_address, inner.cancel.clone())
        .await;
    match &result {
        Ok(()) => info!(
            event = events::DISCOVERY_STOPPED,
            component = COMPONENT,
            "discovery lifecycle stopped"
        ),
        Err(err) => warn!(
            event = events::DISCOVERY_STOPPED,
            component = COMPONENT,
            err = %err,
            "discovery lifecycle failed"
        ),
    }
    result
}

async fn run_listener(inner: Arc<ManagerInner>) -> MeshResult<()> {
    if !wait_for_gate(inner.state.registration_gate(), &inner.cancel).await {
        info!(
            event = events::LIFECYCLE_CANCELLED_BEFORE_GATE,
            component = COMPONENT,
            lifecycle = "listening",
            "cancelled before registration completed"
        );
        return Ok(());
    }
    inner.advance(ManagerState::GateOpen);

    let port = inner.state.port();
    info!(
        event = events::LISTENER_ENABLED,
        component = COMPONENT,
        port,
        "listener enabled"
    );
    inner.advance(ManagerState::Running);
    let result = inner
        .transport
        .start_listening_services(port, inner.cancel.clone())
        .await;
    match &result {
        Ok(()) => info!(
            event = events::LISTENER_STOPPED,
            component = COMPONENT,
            port,
            "listener stopped"
        ),
        Err(err) => warn!(
            event = events::LISTENER_STOPPED,
            component = COMPONENT,
            port,
            err = %err,
            "listener failed"
        ),
    }
    result
}

async fn run_publisher(inner: Arc<ManagerInner>) -> MeshResult<()> {
    if !wait_for_gate(inner.state.registration_gate(), &inner.cancel).await {
        info!(
            event = events::LIFECYCLE_CANCELLED_BEFORE_GATE,
            component = COMPONENT,
            lifecycle = "publishing",
            "cancelled before registration completed"
        );
        return Ok(());
    }
    inner.advance(ManagerState::GateOpen);
    info!(
        event = events::PUBLISHER_ENABLED,
        component = COMPONENT,
        "publisher enabled"
    );
    inner.advance(ManagerState::Running);

    while !inner.cancel.is_cancelled() {
        refresh_connections(&inner).await;
        tokio::time::sleep(inner.config.refresh_interval()).await;
    }

    info!(
        event = events::PUBLISHER_STOPPED,
        component = COMPONENT,
        "publisher stopped"
    );
    Ok(())
}

/// One publish/refresh cycle: log the route snapshot, then connect to every distinct
/// remote subscriber address with a back-off after each attempt.
pub(crate) async fn refresh_connections(inner: &ManagerInner) {
    log_route_snapshot(inner);

    let own_address = inner.own_address();
    let peers: BTreeSet<String> = inner
        .state
        .output_routes()
        .into_iter()
        .flat_map(|route| route.addresses)
        .filter(|address| address != own_address && address != inner.state.service_address())
        .collect();

    for address in peers {
        match inner
            .transport
            .service_connect(&address, inner.cancel.clone())
            .await
        {
            Ok(true) => notify_on_connect(inner, &address),
            Ok(false) => debug!(
                component = COMPONENT,
                address = address.as_str(),
                "peer already connected"
            ),
            Err(err) => warn!(
                event = events::PEER_CONNECT_FAILED,
                component = COMPONENT,
                address = address.as_str(),
                err = %err,
                "peer connection failed"
            ),
        }
        tokio::time::sleep(inner.config.connect_backoff()).await;
    }
}

fn notify_on_connect(inner: &ManagerInner, address: &str) {
    let channels: Vec<String> = inner
        .state
        .output_routes()
        .into_iter()
        .filter(|route| route.addresses.iter().any(|route_address| route_address == address))
        .map(|route| route.channel)
        .collect();

    info!(
        event = events::PEER_CONNECT_NEW,
        component = COMPONENT,
        address,
        channels = fields::format_routes(&channels),
        "new peer connection"
    );

    for channel in &channels {
        if let Some(endpoint) = inner.state.output_channels().get(channel) {
            endpoint.on_connect(address);
        }
    }
}

fn log_route_snapshot(inner: &ManagerInner) {
    if !tracing::enabled!(Level::INFO) {
        return;
    }
    let own_address = inner.own_address();
    let routable = inner.state.routable_input_channels();
    for route in inner.state.input_routes() {
        info!(
            event = events::ROUTE_SNAPSHOT_INPUT,
            component = COMPONENT,
            channel = route.channel.as_str(),
            routes = fields::format_routes(&route.addresses),
            address = own_address,
            "input route"
        );
    }
    for route in inner.state.output_routes() {
        info!(
            event = events::ROUTE_SNAPSHOT_OUTPUT,
            component = COMPONENT,
            channel = route.channel.as_str(),
            routes = fields::format_routes(&route.addresses),
            address = own_address,
            "output route"
        );
    }
    debug!(
        component = COMPONENT,
        routable_inputs = fields::format_routes(&routable),
        "routable input channels"
    );
}
