//! Error reporting sink for channel proxies.

use crate::observability::events;
use std::error::Error;
use tracing::warn;

const COMPONENT: &str = "monitor";

/// Receives `(error, alias)` pairs from proxies. Implementations must not panic.
pub trait Monitor: Send + Sync {
    fn on_error(&self, error: &(dyn Error + 'static), alias: &str);
}

/// Monitor that forwards every report to the log stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn on_error(&self, error: &(dyn Error + 'static), alias: &str) {
        warn!(
            event = events::PROXY_ERROR_REPORTED,
            component = COMPONENT,
            channel = alias,
            err = %error,
            "channel proxy reported an error"
        );
    }
}
