// -
// Database namespaces

/// Sled tree holding config revisions keyed by big-endian version
pub(crate) const CONFIG_REVISION_TREE: &str = "_config_revisions";
/// Sled tree holding registered agents keyed by agent id
pub(crate) const AGENT_TREE: &str = "_agents";

// -
// HTTP protocol

pub const AGENT_ID_HEADER: &str = "x-agent-id";
pub const IF_NONE_MATCH_HEADER: &str = "if-none-match";
pub const ETAG_HEADER: &str = "etag";

/// Version tags are rendered as `v<N>`
pub const VERSION_TAG_PREFIX: &str = "v";

/// Upper bound a watch request stays parked before answering 304
pub const DEFAULT_WATCH_TIMEOUT_MS: u64 = 60_000;

/// Poll interval used when the controller assigned none
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 30;

/// An agent is inactive once `now - last_seen` exceeds this many poll intervals
pub const LIVENESS_INTERVAL_FACTOR: u64 = 2;

/// Message published on the broker channel for every accepted save
pub const BROKER_UPDATE_MESSAGE: &str = "updated";

pub(crate) const DEFAULT_HOSTNAME: &str = "unknown";
