//! Policy Engine
//!
//! Pure evaluation of a `FilePolicy` against an `AccessContext`. No side
//! effects, no clock reads - the context's own timestamp drives the time
//! window check, so a given (policy, context) pair always evaluates the
//! same way.
//!
//! Check order is fixed: location -> device -> department -> time_window;
//! the first failing check's reason is returned.

use chrono::{FixedOffset, TimeZone, Timelike};

use crate::context::AccessContext;
use super::types::{FilePolicy, PolicyReason, PolicyVerdict, TimeWindow};

// ============================================================================
// MAIN EVALUATION
// ============================================================================

/// Evaluate a policy against a context.
pub fn evaluate(policy: &FilePolicy, context: &AccessContext) -> PolicyVerdict {
    if policy.is_empty() {
        return PolicyVerdict::allow(PolicyReason::NoPolicy);
    }

    if let Some(locations) = &policy.allowed_locations {
        if !locations.is_empty() && !locations.contains(&context.location) {
            return PolicyVerdict::deny(PolicyReason::LocationDenied);
        }
    }

    if let Some(devices) = &policy.allowed_devices {
        if !devices.is_empty() && !devices.contains(&context.device) {
            return PolicyVerdict::deny(PolicyReason::DeviceDenied);
        }
    }

    if let Some(departments) = &policy.allowed_departments {
        if !departments.is_empty() && !departments.contains(&context.department) {
            return PolicyVerdict::deny(PolicyReason::DepartmentDenied);
        }
    }

    if let Some(window) = &policy.time_window {
        if !window_contains(window, context.epoch_seconds()) {
            return PolicyVerdict::deny(PolicyReason::TimeWindowDenied);
        }
    }

    PolicyVerdict::allow(PolicyReason::Passed)
}

// ============================================================================
// TIME WINDOW
// ============================================================================

/// Does the timestamp fall inside the window, in the window's timezone?
/// Boundary minutes are inclusive; `end < start` spans midnight and is
/// treated as [start, 24:00) ∪ [00:00, end].
fn window_contains(window: &TimeWindow, epoch_seconds: f64) -> bool {
    let (start, end) = match (parse_hhmm(&window.start), parse_hhmm(&window.end)) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            // Malformed boundaries degrade to "no constraint".
            log::warn!(
                "malformed time window {}..{}, skipping check",
                window.start,
                window.end
            );
            return true;
        }
    };

    let offset = parse_offset(&window.timezone);
    let local = match offset.timestamp_opt(epoch_seconds as i64, 0).single() {
        Some(dt) => dt,
        None => return true,
    };
    let minute_of_day = local.hour() * 60 + local.minute();

    if start <= end {
        minute_of_day >= start && minute_of_day <= end
    } else {
        minute_of_day >= start || minute_of_day <= end
    }
}

/// "HH:MM" -> minute of day.
fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Fixed-offset timezone: "UTC", "Z", "UTC+05:30", "+05:30", "-07:00",
/// "UTC-7". Anything unparseable degrades to UTC with a warning - a bad
/// timezone string must not deny every request against this policy.
fn parse_offset(tz: &str) -> FixedOffset {
    let utc = FixedOffset::east_opt(0).expect("zero offset is always valid");
    let trimmed = tz.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return utc;
    }

    let rest = trimmed
        .strip_prefix("UTC")
        .or_else(|| trimmed.strip_prefix("utc"))
        .unwrap_or(trimmed);

    let (sign, body) = match rest.as_bytes().first() {
        Some(b'+') => (1i32, &rest[1..]),
        Some(b'-') => (-1i32, &rest[1..]),
        _ => {
            log::warn!("unknown timezone {:?}, falling back to UTC", tz);
            return utc;
        }
    };

    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok(), m.parse::<i32>().ok()),
        None => (body.parse::<i32>().ok(), Some(0)),
    };

    match (hours, minutes) {
        (Some(h), Some(m)) if h <= 14 && m < 60 => {
            FixedOffset::east_opt(sign * (h * 3600 + m * 60)).unwrap_or(utc)
        }
        _ => {
            log::warn!("unknown timezone {:?}, falling back to UTC", tz);
            utc
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
