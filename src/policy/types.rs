//! Policy Types
//!
//! Data structures only - no decision logic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ============================================================================
// TIME WINDOW
// ============================================================================

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Allowed daily time window, inclusive of both boundary minutes.
/// `end < start` means the window spans midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// "HH:MM"
    pub start: String,
    /// "HH:MM"
    pub end: String,
    /// Fixed-offset timezone: "UTC", "UTC+05:30", "-07:00", ...
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl TimeWindow {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            timezone: default_timezone(),
        }
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = timezone.to_string();
        self
    }
}

// ============================================================================
// FILE POLICY
// ============================================================================

/// Per-file declarative context policy. A conjunction over the present
/// fields; an absent (or empty) field places no constraint on that
/// dimension, and an empty policy always passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_locations: Option<BTreeSet<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_devices: Option<BTreeSet<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_departments: Option<BTreeSet<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
}

impl FilePolicy {
    /// True when no dimension is constrained.
    pub fn is_empty(&self) -> bool {
        fn unconstrained(set: &Option<BTreeSet<String>>) -> bool {
            set.as_ref().map_or(true, |s| s.is_empty())
        }
        unconstrained(&self.allowed_locations)
            && unconstrained(&self.allowed_devices)
            && unconstrained(&self.allowed_departments)
            && self.time_window.is_none()
    }

    pub fn with_locations<I: IntoIterator<Item = S>, S: Into<String>>(mut self, locs: I) -> Self {
        self.allowed_locations = Some(locs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_devices<I: IntoIterator<Item = S>, S: Into<String>>(mut self, devs: I) -> Self {
        self.allowed_devices = Some(devs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_departments<I: IntoIterator<Item = S>, S: Into<String>>(mut self, deps: I) -> Self {
        self.allowed_departments = Some(deps.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    /// Parse a policy from untrusted JSON. Malformed input degrades to the
    /// empty policy (logged), it never fails a request. Accepts both the
    /// canonical shape and the registration path's shorthand fields
    /// (`allowed_locations` as a CSV string, `required_device`,
    /// `required_department`).
    pub fn parse_lenient(raw: &str) -> FilePolicy {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("malformed context policy, treating as empty: {}", e);
                return FilePolicy::default();
            }
        };
        Self::from_value_lenient(&value)
    }

    /// Lenient conversion from an already-parsed JSON value.
    pub fn from_value_lenient(value: &serde_json::Value) -> FilePolicy {
        let obj = match value.as_object() {
            Some(o) => o,
            None => {
                log::warn!("context policy is not a JSON object, treating as empty");
                return FilePolicy::default();
            }
        };

        let mut policy = FilePolicy::default();

        policy.allowed_locations = read_string_set(obj.get("allowed_locations"));
        policy.allowed_devices = read_string_set(obj.get("allowed_devices"));
        policy.allowed_departments = read_string_set(obj.get("allowed_departments"));

        // Shorthand single-value forms from the upload path.
        if policy.allowed_devices.is_none() {
            if let Some(dev) = obj.get("required_device").and_then(|v| v.as_str()) {
                policy.allowed_devices = Some([dev.to_string()].into_iter().collect());
            }
        }
        if policy.allowed_departments.is_none() {
            if let Some(dep) = obj.get("required_department").and_then(|v| v.as_str()) {
                policy.allowed_departments = Some([dep.to_string()].into_iter().collect());
            }
        }

        if let Some(tw) = obj.get("time_window") {
            match serde_json::from_value::<TimeWindow>(tw.clone()) {
                Ok(window) => policy.time_window = Some(window),
                Err(e) => log::warn!("malformed time_window, ignoring: {}", e),
            }
        }

        policy
    }
}

/// Accepts a JSON array of strings or a comma-separated string.
fn read_string_set(value: Option<&serde_json::Value>) -> Option<BTreeSet<String>> {
    match value {
        Some(serde_json::Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Some(serde_json::Value::String(csv)) => Some(
            csv.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

// ============================================================================
// VERDICT
// ============================================================================

/// Why the policy evaluator allowed or denied a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyReason {
    /// Empty/absent policy - nothing to check.
    NoPolicy,
    /// All present constraints passed.
    Passed,
    LocationDenied,
    DeviceDenied,
    DepartmentDenied,
    TimeWindowDenied,
}

impl PolicyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyReason::NoPolicy => "no_policy",
            PolicyReason::Passed => "policy_passed",
            PolicyReason::LocationDenied => "location_denied",
            PolicyReason::DeviceDenied => "device_denied",
            PolicyReason::DepartmentDenied => "department_denied",
            PolicyReason::TimeWindowDenied => "time_window_denied",
        }
    }
}

impl std::fmt::Display for PolicyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evaluation outcome: pass/fail plus the first failing check's reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub allowed: bool,
    pub reason: PolicyReason,
}

impl PolicyVerdict {
    pub fn allow(reason: PolicyReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    pub fn deny(reason: PolicyReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
