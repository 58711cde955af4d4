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

//! Contract the routing core requires from the byte-level transport.

use crate::channel::MessageObserver;
use crate::error::MeshResult;
use crate::wire_message::MeshMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Connection-oriented transport carrying [`MeshMessage`]s between services.
///
/// Implementations own sockets and framing. The routing core only decides which
/// addresses a message travels to and when connections should be attempted.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Address peers use to reach this service.
    fn url(&self) -> &str;

    /// Accepts inbound connections on `port` until `cancel` fires or the listener fails.
    async fn start_listening_services(&self, port: u16, cancel: CancellationToken)
        -> MeshResult<()>;

    /// Ensures a connection to `address`.
    ///
    /// Returns `true` only when a new connection was established; an already open
    /// connection yields `false`.
    async fn service_connect(&self, address: &str, cancel: CancellationToken) -> MeshResult<bool>;

    /// Sends `message` to every address listed in its routes.
    async fn on_next(&self, message: MeshMessage) -> MeshResult<()>;

    /// Registers the observer receiving every inbound message.
    fn subscribe(&self, observer: Arc<dyn MessageObserver>);

    /// Closes every open connection.
    async fn cancel(&self);

    async fn dispose(&self) {
        self.cancel().await;
    }
}
