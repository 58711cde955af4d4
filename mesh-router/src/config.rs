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

//! Service configuration, loaded from JSON5 the same way the streamer binaries load theirs.

use crate::error::{MeshError, MeshResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONNECT_BACKOFF_MS: u64 = 1_000;
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;
const DEFAULT_MESSAGE_QUEUE_SIZE: usize = 1_024;

/// Tunables for one mesh service process.
///
/// `connect_backoff_ms` is the pause after every per-address connection attempt and
/// `refresh_interval_ms` the pause between full route-refresh cycles.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MeshConfig {
    pub service_name: String,
    /// Port the transport listens on. `0` means "use the port assigned during discovery".
    pub listening_port: u16,
    pub discovery_address: String,
    pub connect_backoff_ms: u64,
    pub refresh_interval_ms: u64,
    /// Retained history per local input queue.
    pub message_queue_size: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            service_name: "mesh-service".to_string(),
            listening_port: 0,
            discovery_address: "tcp://127.0.0.1:4999".to_string(),
            connect_backoff_ms: DEFAULT_CONNECT_BACKOFF_MS,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            message_queue_size: DEFAULT_MESSAGE_QUEUE_SIZE,
        }
    }
}

impl MeshConfig {
    pub fn from_json5_str(contents: &str) -> MeshResult<Self> {
        let config: MeshConfig = json5::from_str(contents)
            .map_err(|e| MeshError::Config(format!("Unable to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json5_file(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MeshError::Config(format!("Unable to read config file {}: {e}", path.display()))
        })?;
        Self::from_json5_str(&contents)
    }

    pub fn connect_backoff(&self) -> Duration {
        Duration::from_millis(self.connect_backoff_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    fn validate(&self) -> MeshResult<()> {
        if self.message_queue_size == 0 {
            return Err(MeshError::Config(
                "message_queue_size must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval_ms == 0 {
            return Err(MeshError::Config(
                "refresh_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MeshConfig;
    use crate::MeshError;
    use std::time::Duration;

    #[test]
    fn partial_json5_keeps_defaults_for_missing_fields() {
        let config = MeshConfig::from_json5_str(
            r#"{
                // shrink intervals for a local run
                service_name: "prices-feed",
                connect_backoff_ms: 10,
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.service_name, "prices-feed");
        assert_eq!(config.connect_backoff(), Duration::from_millis(10));
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.message_queue_size, 1_024);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = MeshConfig::from_json5_str(r#"{ retry_forever: true }"#);

        assert!(matches!(result, Err(MeshError::Config(_))));
    }

    #[test]
    fn zero_queue_size_is_rejected() {
        let result = MeshConfig::from_json5_str(r#"{ message_queue_size: 0 }"#);

        assert!(matches!(result, Err(MeshError::Config(_))));
    }

    #[test]
    fn bundled_default_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/DEFAULT_CONFIG.json5");
        let config = MeshConfig::from_json5_file(path).expect("bundled config should parse");

        assert_eq!(config, MeshConfig::default());
    }

    #[test]
    fn missing_file_reports_config_error() {
        let result = MeshConfig::from_json5_file("/definitely/not/here.json5");

        assert!(matches!(result, Err(MeshError::Config(msg)) if msg.contains("Unable to read")));
    }
}
