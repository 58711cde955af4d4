//! Canonical structured event names used across `mesh-router`.

// Outbound routing decision events.
pub const ROUTE_UNKNOWN: &str = "route_unknown";
pub const ROUTE_NONE: &str = "route_none";
pub const ROUTE_CONFIRMED: &str = "route_confirmed";
pub const ROUTE_NOT_FOUND: &str = "route_not_found";
pub const PUBLISH_FORWARD: &str = "publish_forward";
pub const PUBLISH_FORWARD_FAILED: &str = "publish_forward_failed";
pub const PUBLISH_NO_PUBLISHER: &str = "publish_no_publisher";

// Inbound delivery events.
pub const INBOUND_DELIVER: &str = "inbound_deliver";
pub const INBOUND_UNKNOWN_CHANNEL: &str = "inbound_unknown_channel";
pub const INBOUND_UNKNOWN_SOURCE: &str = "inbound_unknown_source";

// Lifecycle events.
pub const DISCOVERY_STARTED: &str = "discovery_started";
pub const DISCOVERY_STOPPED: &str = "discovery_stopped";
pub const LISTENER_ENABLED: &str = "listener_enabled";
pub const LISTENER_STOPPED: &str = "listener_stopped";
pub const PUBLISHER_ENABLED: &str = "publisher_enabled";
pub const PUBLISHER_STOPPED: &str = "publisher_stopped";
pub const LIFECYCLE_CANCELLED_BEFORE_GATE: &str = "lifecycle_cancelled_before_gate";
pub const ROUTE_SNAPSHOT_INPUT: &str = "route_snapshot_input";
pub const ROUTE_SNAPSHOT_OUTPUT: &str = "route_snapshot_output";
pub const PEER_CONNECT_NEW: &str = "peer_connect_new";
pub const PEER_CONNECT_FAILED: &str = "peer_connect_failed";
pub const MANAGER_DISPOSED: &str = "manager_disposed";

// Discovery-state events.
pub const REGISTRATION_GATE_OPEN: &str = "registration_gate_open";
pub const DISCOVERY_PORT_ASSIGNED: &str = "discovery_port_assigned";
pub const DISCOVERY_ROUTES_REBUILT: &str = "discovery_routes_rebuilt";
pub const DISCOVERY_PEER_REMOVED: &str = "discovery_peer_removed";
pub const DISCOVERY_ERROR: &str = "discovery_error";

// Channel proxy events.
pub const PROXY_DESERIALIZE_FAILED: &str = "proxy_deserialize_failed";
pub const PROXY_OBSERVER_FAILED: &str = "proxy_observer_failed";
pub const PROXY_ERROR_REPORTED: &str = "proxy_error_reported";
pub const PROXY_SERIALIZE_FAILED: &str = "proxy_serialize_failed";
