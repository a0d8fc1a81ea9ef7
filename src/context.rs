//! Access Context
//!
//! The observable attributes of an access request: who, where, on what
//! device, when. Missing fields never propagate as null downstream -
//! string fields default to "unknown", `client_id` falls back to the
//! username, and the hour can be derived from the timestamp.

use chrono::{TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

fn unknown() -> String {
    "unknown".to_string()
}

/// Per-request security context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessContext {
    #[serde(default = "unknown")]
    pub username: String,

    #[serde(default = "unknown")]
    pub location: String,

    /// Device identifier. The upload/download path historically used
    /// `device_id` for the same field.
    #[serde(default = "unknown", alias = "device_id")]
    pub device: String,

    #[serde(default = "unknown")]
    pub department: String,

    /// Hour of day [0, 23]. Derived from `timestamp` when absent.
    #[serde(default)]
    pub hour: Option<u32>,

    /// Unix timestamp (seconds). Defaults to now when absent.
    #[serde(default, alias = "ts")]
    pub timestamp: Option<f64>,

    /// Behavioral grouping key. Defaults to `username` when absent.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Default for AccessContext {
    fn default() -> Self {
        Self {
            username: unknown(),
            location: unknown(),
            device: unknown(),
            department: unknown(),
            hour: None,
            timestamp: None,
            client_id: None,
        }
    }
}

impl AccessContext {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Default::default()
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_device(mut self, device: &str) -> Self {
        self.device = device.to_string();
        self
    }

    pub fn with_department(mut self, department: &str) -> Self {
        self.department = department.to_string();
        self
    }

    pub fn with_hour(mut self, hour: u32) -> Self {
        self.hour = Some(hour.min(23));
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self
    }

    /// Behavioral grouping key; the username when no explicit id was sent.
    pub fn client_id(&self) -> &str {
        match &self.client_id {
            Some(id) if !id.is_empty() => id,
            _ => &self.username,
        }
    }

    /// Unix timestamp in seconds, now when the request carried none.
    pub fn epoch_seconds(&self) -> f64 {
        self.timestamp
            .unwrap_or_else(|| Utc::now().timestamp() as f64)
    }

    /// Hour of day [0, 23], derived from the timestamp when absent.
    pub fn hour_of_day(&self) -> u32 {
        if let Some(hour) = self.hour {
            return hour.min(23);
        }
        match Utc.timestamp_opt(self.epoch_seconds() as i64, 0).single() {
            Some(dt) => dt.hour(),
            None => 0,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_on_missing_fields() {
        let ctx: AccessContext = serde_json::from_str("{}").unwrap();
        assert_eq!(ctx.username, "unknown");
        assert_eq!(ctx.location, "unknown");
        assert_eq!(ctx.device, "unknown");
        assert_eq!(ctx.department, "unknown");
    }

    #[test]
    fn test_device_id_alias() {
        let ctx: AccessContext =
            serde_json::from_str(r#"{"device_id": "laptop1"}"#).unwrap();
        assert_eq!(ctx.device, "laptop1");
    }

    #[test]
    fn test_client_id_falls_back_to_username() {
        let ctx = AccessContext::new("alice");
        assert_eq!(ctx.client_id(), "alice");

        let ctx = ctx.with_client_id("client-7");
        assert_eq!(ctx.client_id(), "client-7");
    }

    #[test]
    fn test_hour_derived_from_timestamp() {
        // 2024-01-01 14:30:00 UTC
        let ctx = AccessContext::new("alice").with_timestamp(1_704_119_400.0);
        assert_eq!(ctx.hour_of_day(), 14);

        let ctx = ctx.with_hour(3);
        assert_eq!(ctx.hour_of_day(), 3);
    }

    #[test]
    fn test_hour_clamped() {
        let ctx = AccessContext::new("alice").with_hour(99);
        assert_eq!(ctx.hour_of_day(), 23);
    }
}
