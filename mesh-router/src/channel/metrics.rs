//! Per-proxy counters, read for observability only.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct ChannelMetrics {
    name: String,
    payload_type: &'static str,
    sent: AtomicU64,
    received: AtomicU64,
    errors: AtomicU64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ChannelMetricsSnapshot {
    pub name: String,
    pub payload_type: String,
    pub sent: u64,
    pub received: u64,
    pub errors: u64,
}

impl ChannelMetrics {
    pub fn new(name: impl Into<String>, payload_type: &'static str) -> Self {
        Self {
            name: name.into(),
            payload_type,
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload_type(&self) -> &'static str {
        self.payload_type
    }

    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ChannelMetricsSnapshot {
        ChannelMetricsSnapshot {
            name: self.name.clone(),
            payload_type: self.payload_type.to_string(),
            sent: self.sent(),
            received: self.received(),
            errors: self.errors(),
        }
    }
}
