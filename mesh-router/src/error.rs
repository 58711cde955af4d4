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

//! Error model shared by the routing core, the channel proxies and the lifecycles.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure reported by a subscriber while handling a delivered payload.
pub type ObserverError = Box<dyn Error + Send + Sync>;

pub type MeshResult<T> = Result<T, MeshError>;

/// Failures surfaced by the mesh routing core.
///
/// Values are cloneable so one combined lifecycle outcome can be handed to every
/// party awaiting a [`ServiceHandle`][crate::ServiceHandle].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MeshError {
    /// A message referenced a channel alias absent from the relevant table.
    UnknownChannel(String),
    /// A proxy without an output alias was asked to post.
    MissingOutputAlias,
    Serialization(String),
    Transport(String),
    Discovery(String),
    Config(String),
    /// The manager was disposed and can no longer run lifecycles.
    Disposed,
    /// A lifecycle task panicked or was aborted.
    LifecycleJoin(String),
}

impl Display for MeshError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshError::UnknownChannel(channel) => write!(f, "unknown channel '{channel}'"),
            MeshError::MissingOutputAlias => write!(f, "channel proxy has no output alias"),
            MeshError::Serialization(err) => write!(f, "payload serialization failed: {err}"),
            MeshError::Transport(err) => write!(f, "transport failure: {err}"),
            MeshError::Discovery(err) => write!(f, "discovery failure: {err}"),
            MeshError::Config(err) => write!(f, "invalid configuration: {err}"),
            MeshError::Disposed => write!(f, "mesh service manager already disposed"),
            MeshError::LifecycleJoin(err) => write!(f, "lifecycle task failed to join: {err}"),
        }
    }
}

impl Error for MeshError {}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::MeshError;
    use std::error::Error;

    #[test]
    fn unknown_channel_display_names_the_channel() {
        let error = MeshError::UnknownChannel("prices".to_string());

        assert_eq!(error.to_string(), "unknown channel 'prices'");
        assert!(error.source().is_none());
    }

    #[test]
    fn serde_errors_convert_into_serialization_failures() {
        let err = serde_json::from_str::<u32>("not-a-number").unwrap_err();
        let error: MeshError = err.into();

        assert!(matches!(error, MeshError::Serialization(_)));
        assert!(error.to_string().starts_with("payload serialization failed"));
    }
}
