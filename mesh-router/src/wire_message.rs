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

//! The envelope moved between mesh services.

use crate::error::MeshResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved workflow id. Every message currently belongs to graph `1`.
pub const DEFAULT_GRAPH_ID: u32 = 1;

/// One unit of cross-process transport.
///
/// `channel` and `service_address` are stamped by the sending manager just before the
/// message is handed to the transport; `routes` is either a caller-pinned target or the
/// subscriber set resolved at routing time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshMessage {
    pub graph_id: u32,
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_address: Option<String>,
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<String>>,
}

impl MeshMessage {
    /// Builds an unaddressed message around an already serialized payload.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            graph_id: DEFAULT_GRAPH_ID,
            transaction_id: new_transaction_id(),
            channel: None,
            service_address: None,
            payload: payload.into(),
            routes: None,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = Some(routes.into_iter().map(Into::into).collect());
        self
    }

    /// Envelope codec for byte-oriented transports.
    pub fn to_bytes(&self) -> MeshResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> MeshResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub fn new_transaction_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

#[cfg(test)]
mod tests {
    use super::{MeshMessage, DEFAULT_GRAPH_ID};
    use crate::MeshError;

    #[test]
    fn new_message_is_unaddressed_and_uses_reserved_graph() {
        let message = MeshMessage::new("{\"v\":1}");

        assert_eq!(message.graph_id, DEFAULT_GRAPH_ID);
        assert!(message.channel.is_none());
        assert!(message.service_address.is_none());
        assert!(message.routes.is_none());
    }

    #[test]
    fn transaction_ids_are_unique_per_message() {
        let first = MeshMessage::new("a");
        let second = MeshMessage::new("a");

        assert_ne!(first.transaction_id, second.transaction_id);
    }

    #[test]
    fn envelope_keeps_variable_length_routes() {
        let message = MeshMessage::new("x")
            .with_channel("updates")
            .with_routes(["tcp://a:1", "tcp://b:2", "tcp://c:3"]);

        let decoded = MeshMessage::from_bytes(&message.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded, message);
        assert_eq!(decoded.routes.map(|r| r.len()), Some(3));
    }

    #[test]
    fn envelope_without_optional_fields_omits_them() {
        let bytes = MeshMessage::new("x").to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(!text.contains("routes"));
        assert!(!text.contains("service_address"));
    }

    #[test]
    fn garbage_bytes_fail_with_serialization_error() {
        let result = MeshMessage::from_bytes(b"\x00\x01");

        assert!(matches!(result, Err(MeshError::Serialization(_))));
    }
}
