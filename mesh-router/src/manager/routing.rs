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

//! Outbound route resolution and inbound delivery.

use crate::error::{MeshError, MeshResult};
use crate::manager::ManagerInner;
use crate::observability::{events, fields};
use crate::wire_message::MeshMessage;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const COMPONENT: &str = "routing";

/// Destination decision for one outbound message on a channel with live subscribers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum RouteResolution {
    /// No hint on the message; the full subscriber set becomes its routes.
    Adopted(Vec<String>),
    /// The hint overlaps the subscriber set; carries the overlap.
    Confirmed(Vec<String>),
    /// The hint shares no address with the subscriber set.
    NotFound,
}

pub(crate) fn resolve_routes(
    subscribers: &BTreeSet<String>,
    hint: Option<&[String]>,
) -> RouteResolution {
    match hint {
        None => RouteResolution::Adopted(subscribers.iter().cloned().collect()),
        Some(hint) => {
            let overlap: Vec<String> = hint
                .iter()
                .filter(|address| subscribers.contains(*address))
                .cloned()
                .collect();
            if overlap.is_empty() {
                RouteResolution::NotFound
            } else {
                RouteResolution::Confirmed(overlap)
            }
        }
    }
}

impl ManagerInner {
    pub(crate) async fn on_publish(&self, channel: &str, mut message: MeshMessage) {
        if !self.state.output_channels().contains(channel) {
            info!(
                event = events::ROUTE_UNKNOWN,
                component = COMPONENT,
                channel,
                xid = message.transaction_id.as_str(),
                "unknown route; dropping message"
            );
            return;
        }

        let Some(subscribers) = self
            .state
            .external_subscribers(channel)
            .filter(|subscribers| !subscribers.is_empty())
        else {
            info!(
                event = events::ROUTE_NONE,
                component = COMPONENT,
                channel,
                xid = message.transaction_id.as_str(),
                "no route; dropping message"
            );
            return;
        };

        message.service_address = Some(self.own_address().to_string());
        message.channel = Some(channel.to_string());

        match resolve_routes(&subscribers, message.routes.as_deref()) {
            RouteResolution::Adopted(routes) => message.routes = Some(routes),
            RouteResolution::Confirmed(overlap) => {
                info!(
                    event = events::ROUTE_CONFIRMED,
                    component = COMPONENT,
                    channel,
                    graph_id = message.graph_id,
                    xid = message.transaction_id.as_str(),
                    routes = fields::format_routes(&overlap),
                    "route confirmed"
                );
            }
            RouteResolution::NotFound => {
                warn!(
                    event = events::ROUTE_NOT_FOUND,
                    component = COMPONENT,
                    channel,
                    graph_id = message.graph_id,
                    xid = message.transaction_id.as_str(),
                    routes = fields::format_message_routes(&message),
                    "route not found; forwarding with caller routes"
                );
            }
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                event = events::PUBLISH_FORWARD,
                component = COMPONENT,
                channel,
                xid = message.transaction_id.as_str(),
                routes = fields::format_message_routes(&message),
                "forwarding message to transport"
            );
        }

        let xid = message.transaction_id.clone();
        if let Err(err) = self.transport.on_next(message).await {
            warn!(
                event = events::PUBLISH_FORWARD_FAILED,
                component = COMPONENT,
                channel,
                xid = xid.as_str(),
                err = %err,
                "transport rejected outbound message"
            );
        }
    }

    pub(crate) async fn deliver_inbound(&self, message: MeshMessage) -> MeshResult<()> {
        let channel = message.channel.clone().unwrap_or_default();
        let Some(queue) = self.state.input_channels().get(&channel) else {
            return Err(MeshError::UnknownChannel(channel));
        };

        debug!(
            event = events::INBOUND_DELIVER,
            component = COMPONENT,
            channel = channel.as_str(),
            xid = message.transaction_id.as_str(),
            "delivering inbound message"
        );
        queue.add(message).await;
        Ok(())
    }

    pub(crate) async fn service_subscriber(&self, message: MeshMessage) -> bool {
        let channel = message.channel.clone().unwrap_or_default();
        let source = message.service_address.as_deref().unwrap_or_default();
        if !self.state.is_known_input_source(&channel, source) {
            debug!(
                event = events::INBOUND_UNKNOWN_SOURCE,
                component = COMPONENT,
                channel = channel.as_str(),
                address = fields::format_optional(message.service_address.as_deref()),
                "message from unannounced source"
            );
        }

        match self.state.input_channels().get(&channel) {
            Some(queue) => {
                queue.add(message).await;
                true
            }
            None => false,
        }
    }
}
