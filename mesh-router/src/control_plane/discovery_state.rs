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

//! Route-table owner and the state side of the discovery protocol.

use crate::config::MeshConfig;
use crate::control_plane::channel_tables::{InputChannels, OutputChannels};
use crate::control_plane::discovery::{
    DiscoveryHandler, DiscoveryMessage, DiscoveryPhase, ServiceAnnouncement,
};
use crate::control_plane::registration_gate::RegistrationGate;
use crate::observability::{events, fields};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

const COMPONENT: &str = "discovery_state";

type AddressTable = DashMap<String, BTreeSet<String>>;

/// One channel alias with the peer addresses on the other side of it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelRoute {
    pub channel: String,
    pub addresses: Vec<String>,
}

/// Channel routing state of one service.
///
/// Local queues and output endpoints are registered by channel proxies. Remote
/// subscriber and source sets are written only from discovery announcements (or the
/// direct mutators below); everything else reads them through methods.
pub struct DiscoveryState {
    service_address: String,
    port: AtomicU16,
    registered: AtomicBool,
    registration_gate: RegistrationGate,
    input_channels: InputChannels,
    output_channels: OutputChannels,
    /// channel -> addresses consuming it
    external_subscribers: AddressTable,
    /// channel -> addresses producing it
    input_sources: AddressTable,
}

impl DiscoveryState {
    pub fn new(service_address: impl Into<String>, config: &MeshConfig) -> Arc<Self> {
        Arc::new(Self {
            service_address: service_address.into(),
            port: AtomicU16::new(config.listening_port),
            registered: AtomicBool::new(false),
            registration_gate: RegistrationGate::new(),
            input_channels: InputChannels::new(config.message_queue_size),
            output_channels: OutputChannels::new(),
            external_subscribers: DashMap::new(),
            input_sources: DashMap::new(),
        })
    }

    pub fn service_address(&self) -> &str {
        &self.service_address
    }

    pub fn port(&self) -> u16 {
        self.port.load(Ordering::Acquire)
    }

    pub fn set_port(&self, port: u16) {
        self.port.store(port, Ordering::Release);
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub fn registration_gate(&self) -> &RegistrationGate {
        &self.registration_gate
    }

    pub fn input_channels(&self) -> &InputChannels {
        &self.input_channels
    }

    pub fn output_channels(&self) -> &OutputChannels {
        &self.output_channels
    }

    /// Subscriber set for `channel`; `None` when discovery never announced a consumer.
    pub fn external_subscribers(&self, channel: &str) -> Option<BTreeSet<String>> {
        self.external_subscribers
            .get(channel)
            .map(|entry| entry.value().clone())
    }

    pub fn has_external_subscription(&self, channel: &str) -> bool {
        self.external_subscribers.contains_key(channel)
    }

    pub fn is_known_input_source(&self, channel: &str, address: &str) -> bool {
        self.input_sources
            .get(channel)
            .is_some_and(|sources| sources.contains(address))
    }

    /// Local input channels paired with the addresses known to produce them.
    pub fn input_routes(&self) -> Vec<ChannelRoute> {
        Self::routes_for(&self.input_channels.aliases(), &self.input_sources)
    }

    /// Local output channels paired with the addresses subscribing to them.
    pub fn output_routes(&self) -> Vec<ChannelRoute> {
        Self::routes_for(&self.output_channels.aliases(), &self.external_subscribers)
    }

    /// Local input channels with at least one known remote producer.
    pub fn routable_input_channels(&self) -> Vec<String> {
        self.input_routes()
            .into_iter()
            .map(|route| route.channel)
            .collect()
    }

    fn routes_for(aliases: &[String], table: &AddressTable) -> Vec<ChannelRoute> {
        aliases
            .iter()
            .filter_map(|alias| {
                let addresses = table.get(alias)?;
                if addresses.is_empty() {
                    return None;
                }
                Some(ChannelRoute {
                    channel: alias.clone(),
                    addresses: addresses.iter().cloned().collect(),
                })
            })
            .collect()
    }

    pub fn add_external_subscriber(&self, channel: &str, address: &str) {
        self.external_subscribers
            .entry(channel.to_string())
            .or_default()
            .insert(address.to_string());
    }

    pub fn add_input_source(&self, channel: &str, address: &str) {
        self.input_sources
            .entry(channel.to_string())
            .or_default()
            .insert(address.to_string());
    }

    /// Forgets every route through `address`. Returns `true` when anything was removed.
    pub fn remove_peer(&self, address: &str) -> bool {
        let removed_subscriber = Self::remove_address(&self.external_subscribers, address);
        let removed_source = Self::remove_address(&self.input_sources, address);
        let removed = removed_subscriber || removed_source;
        if removed {
            info!(
                event = events::DISCOVERY_PEER_REMOVED,
                component = COMPONENT,
                address,
                "peer removed from route table"
            );
        }
        removed
    }

    fn remove_address(table: &AddressTable, address: &str) -> bool {
        let mut removed = false;
        for mut entry in table.iter_mut() {
            removed |= entry.value_mut().remove(address);
        }
        table.retain(|_, addresses| !addresses.is_empty());
        removed
    }

    /// Rebuilds both remote address tables from a complete list of announcements.
    ///
    /// Peers absent from `services` disappear from every route. This service's own
    /// address is never recorded as a remote peer.
    pub fn apply_announcements(&self, services: &[ServiceAnnouncement]) {
        let mut subscribers: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut sources: HashMap<String, BTreeSet<String>> = HashMap::new();

        for service in services
            .iter()
            .filter(|service| service.service_address != self.service_address)
        {
            for input in &service.inputs {
                subscribers
                    .entry(input.clone())
                    .or_default()
                    .insert(service.service_address.clone());
            }
            for output in &service.outputs {
                sources
                    .entry(output.clone())
                    .or_default()
                    .insert(service.service_address.clone());
            }
        }

        Self::replace_table(&self.external_subscribers, subscribers);
        Self::replace_table(&self.input_sources, sources);

        if tracing::enabled!(Level::DEBUG) {
            let outputs = self.output_routes();
            debug!(
                event = events::DISCOVERY_ROUTES_REBUILT,
                component = COMPONENT,
                services = services.len(),
                output_routes = fields::format_routes(outputs.iter().map(|r| r.channel.as_str())),
                "route table rebuilt from announcements"
            );
        }
    }

    fn replace_table(table: &AddressTable, next: HashMap<String, BTreeSet<String>>) {
        table.retain(|channel, _| next.contains_key(channel));
        for (channel, addresses) in next {
            table.insert(channel, addresses);
        }
    }

    fn announcement(&self) -> ServiceAnnouncement {
        ServiceAnnouncement {
            service_address: self.service_address.clone(),
            inputs: self.input_channels.aliases(),
            outputs: self.output_channels.aliases(),
        }
    }
}

#[async_trait]
impl DiscoveryHandler for DiscoveryState {
    fn next_announcement(&self) -> DiscoveryMessage {
        let phase = if self.is_registered() {
            DiscoveryPhase::QueueData
        } else {
            DiscoveryPhase::Connect
        };
        DiscoveryMessage {
            phase,
            port: self.port(),
            host: self.service_address.clone(),
            services: vec![self.announcement()],
            error: None,
        }
    }

    async fn on_discovery_message(&self, message: DiscoveryMessage) {
        match message.phase {
            DiscoveryPhase::ConnectResponse => {
                if self.port() == 0 && message.port != 0 {
                    self.set_port(message.port);
                    info!(
                        event = events::DISCOVERY_PORT_ASSIGNED,
                        component = COMPONENT,
                        port = message.port,
                        "listening port assigned by discovery"
                    );
                }
                self.registered.store(true, Ordering::Release);
            }
            DiscoveryPhase::QueueData => {
                self.apply_announcements(&message.services);
                if self.registration_gate.open().await {
                    info!(
                        event = events::REGISTRATION_GATE_OPEN,
                        component = COMPONENT,
                        port = self.port(),
                        "registration complete"
                    );
                }
            }
            DiscoveryPhase::Error => {
                warn!(
                    event = events::DISCOVERY_ERROR,
                    component = COMPONENT,
                    err = fields::format_optional(message.error.as_deref()),
                    "discovery reported an error; re-registering"
                );
                self.registered.store(false, Ordering::Release);
            }
            DiscoveryPhase::Connect => {
                debug!(
                    component = COMPONENT,
                    host = message.host.as_str(),
                    "ignoring server-side connect message"
                );
            }
        }
    }
}
