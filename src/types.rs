use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::constants::LIVENESS_INTERVAL_FACTOR;
use crate::constants::VERSION_TAG_PREFIX;

/// One immutable, monotonically numbered snapshot of the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRevision {
    /// Starts at 1, +1 per accepted save
    pub version: u64,
    /// Opaque structured document
    pub data: Value,
    /// Unix millis
    pub created_at: u64,
}

impl ConfigRevision {
    pub fn tag(&self) -> String {
        format_version_tag(self.version)
    }
}

/// Registered agent as tracked by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub host: String,
    pub poll_interval_seconds: u64,
    /// Unix millis
    pub created_at: u64,
    /// Unix millis of the last successful authenticated poll
    pub last_seen: u64,
}

impl Agent {
    /// Inactive once more than two poll intervals passed since `last_seen`.
    pub fn is_stale(
        &self,
        now_ms: u64,
    ) -> bool {
        let window_ms = self
            .poll_interval_seconds
            .saturating_mul(LIVENESS_INTERVAL_FACTOR)
            .saturating_mul(1000);
        now_ms.saturating_sub(self.last_seen) > window_ms
    }
}

/// Body of `POST /register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
}

/// Answer to a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub agent_id: String,
    pub poll_url: String,
    pub poll_interval_seconds: u64,
}

/// `{status, message}` acknowledgement body used by save endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
        }
    }
}

/// Renders a version as the `v<N>` tag used for `ETag` / `If-None-Match`.
pub fn format_version_tag(version: u64) -> String {
    format!("{VERSION_TAG_PREFIX}{version}")
}

/// Extracts the first run of digits from a tag; malformed tags parse to 0.
///
/// `"v12"` → 12, `"W/\"v3\""` → 3, `""` → 0, `"latest"` → 0.
pub fn parse_version_tag(tag: &str) -> u64 {
    let digits: String = tag
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_tags_round_trip_through_header_form() {
        assert_eq!(format_version_tag(7), "v7");
        assert_eq!(parse_version_tag("v7"), 7);
        assert_eq!(parse_version_tag("W/\"v3\""), 3);
    }

    #[test]
    fn malformed_tags_parse_to_zero() {
        assert_eq!(parse_version_tag(""), 0);
        assert_eq!(parse_version_tag("latest"), 0);
        assert_eq!(parse_version_tag("v"), 0);
        assert_eq!(parse_version_tag("v99999999999999999999999"), 0);
    }

    #[test]
    fn agent_staleness_uses_twice_the_poll_interval() {
        let agent = Agent {
            id: "a".into(),
            name: "n".into(),
            host: "h".into(),
            poll_interval_seconds: 30,
            created_at: 0,
            last_seen: 1_000_000,
        };

        assert!(!agent.is_stale(1_000_000 + 60_000));
        assert!(agent.is_stale(1_000_000 + 60_001));
        // clock skew backwards is never stale
        assert!(!agent.is_stale(0));
    }
}
