/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
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

//! Value-format helpers for structured log fields.

use crate::wire_message::MeshMessage;

pub const NONE: &str = "none";

/// Joins addresses the way route snapshots are logged: `a,b,c`.
pub fn format_routes<I, S>(routes: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = routes
        .into_iter()
        .map(|route| route.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",");
    if joined.is_empty() {
        NONE.to_string()
    } else {
        joined
    }
}

pub fn format_optional(value: Option<&str>) -> String {
    value.unwrap_or(NONE).to_string()
}

pub fn format_message_routes(message: &MeshMessage) -> String {
    message
        .routes
        .as_ref()
        .map(format_routes)
        .unwrap_or_else(|| NONE.to_string())
}

pub fn format_message_channel(message: &MeshMessage) -> String {
    format_optional(message.channel.as_deref())
}
