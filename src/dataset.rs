//! Labeled access-event datasets.
//!
//! JSONL is the interchange format: one event per line, the context fields
//! flattened alongside an optional label (1 = normal, 0 = anomaly).
//! Includes a seeded synthetic generator for smoke training and tests.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::context::AccessContext;
use crate::error::Result;

pub const LABEL_NORMAL: u8 = 1;
pub const LABEL_ANOMALY: u8 = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    #[serde(flatten)]
    pub context: AccessContext,
    /// 1 = normal, 0 = anomaly. Absent on unlabeled streams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<u8>,
}

impl AccessEvent {
    pub fn new(context: AccessContext, label: u8) -> Self {
        Self {
            context,
            label: Some(label),
        }
    }

    /// Label with unlabeled events treated as normal.
    pub fn label_or_normal(&self) -> u8 {
        self.label.unwrap_or(LABEL_NORMAL)
    }
}

// ============================================================================
// JSONL I/O
// ============================================================================

pub fn read_jsonl(path: &Path) -> Result<Vec<AccessEvent>> {
    let reader = BufReader::new(File::open(path)?);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(event) => events.push(event),
            Err(err) => log::warn!("skipping malformed event line: {err}"),
        }
    }
    log::info!("loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

pub fn write_jsonl(path: &Path, events: &[AccessEvent]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for event in events {
        serde_json::to_writer(&mut writer, event)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Deterministic shuffle-then-cut split. `train_fraction` of the events
/// land in the first returned vector.
pub fn train_test_split(
    mut events: Vec<AccessEvent>,
    train_fraction: f64,
    seed: u64,
) -> (Vec<AccessEvent>, Vec<AccessEvent>) {
    use rand::seq::SliceRandom;

    let mut rng = StdRng::seed_from_u64(seed);
    events.shuffle(&mut rng);
    let cut = ((events.len() as f64) * train_fraction).round() as usize;
    let cut = cut.min(events.len());
    let test = events.split_off(cut);
    (events, test)
}

// ============================================================================
// SYNTHETIC GENERATOR
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub users: usize,
    pub events_per_user: usize,
    pub anomaly_rate: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            users: 8,
            events_per_user: 40,
            anomaly_rate: 0.1,
            seed: 42,
        }
    }
}

pub mod synthetic {
    use super::*;

    const LOCATIONS: &[&str] = &["nyc", "london", "berlin", "tokyo"];
    const FOREIGN_LOCATIONS: &[&str] = &["unknown_vpn", "sydney", "lagos"];
    const DEVICES: &[&str] = &["laptop-a", "laptop-b", "desktop-1", "desktop-2"];
    const FOREIGN_DEVICES: &[&str] = &["burner-phone", "kiosk-7"];
    const DEPARTMENTS: &[&str] = &["engineering", "finance", "legal", "hr"];

    /// Monday 2024-01-01 00:00:00 UTC.
    const BASE_TS: f64 = 1_704_067_200.0;

    /// Generate a labeled batch: each user gets a stable home profile and
    /// mostly business-hours activity; anomalies come from foreign
    /// locations and devices at night.
    pub fn generate(config: &SyntheticConfig) -> Vec<AccessEvent> {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut events = Vec::with_capacity(config.users * config.events_per_user);

        for u in 0..config.users {
            let username = format!("user{u:02}");
            let home_location = LOCATIONS[rng.gen_range(0..LOCATIONS.len())];
            let home_device = DEVICES[rng.gen_range(0..DEVICES.len())];
            let department = DEPARTMENTS[rng.gen_range(0..DEPARTMENTS.len())];

            for _ in 0..config.events_per_user {
                let anomalous = rng.gen::<f64>() < config.anomaly_rate;

                let (location, device, hour) = if anomalous {
                    (
                        FOREIGN_LOCATIONS[rng.gen_range(0..FOREIGN_LOCATIONS.len())],
                        FOREIGN_DEVICES[rng.gen_range(0..FOREIGN_DEVICES.len())],
                        // Deep-night hours only.
                        rng.gen_range(0..5),
                    )
                } else {
                    (home_location, home_device, rng.gen_range(9..18))
                };

                // Weekdays only, so weekend flags stay informative.
                let day = rng.gen_range(0..5) as f64;
                let ts = BASE_TS + day * 86_400.0 + hour as f64 * 3_600.0
                    + rng.gen_range(0..3_600) as f64;

                let context = AccessContext::new(&username)
                    .with_location(location)
                    .with_device(device)
                    .with_department(department)
                    .with_hour(hour)
                    .with_timestamp(ts);

                let label = if anomalous { LABEL_ANOMALY } else { LABEL_NORMAL };
                events.push(AccessEvent::new(context, label));
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_deterministic() {
        let config = SyntheticConfig::default();
        let a = synthetic::generate(&config);
        let b = synthetic::generate(&config);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.context.username, y.context.username);
            assert_eq!(x.context.location, y.context.location);
            assert_eq!(x.label, y.label);
        }
    }

    #[test]
    fn test_generator_mixes_labels() {
        let events = synthetic::generate(&SyntheticConfig {
            users: 10,
            events_per_user: 50,
            anomaly_rate: 0.2,
            seed: 3,
        });
        let anomalies = events.iter().filter(|e| e.label == Some(LABEL_ANOMALY)).count();
        assert!(anomalies > 0);
        assert!(anomalies < events.len());
    }

    #[test]
    fn test_jsonl_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let events = synthetic::generate(&SyntheticConfig {
            users: 2,
            events_per_user: 5,
            ..Default::default()
        });

        write_jsonl(&path, &events).unwrap();
        let back = read_jsonl(&path).unwrap();
        assert_eq!(back.len(), events.len());
        assert_eq!(back[0].context.username, events[0].context.username);
        assert_eq!(back[0].label, events[0].label);
    }

    #[test]
    fn test_read_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(
            &path,
            "{\"username\":\"a\",\"location\":\"nyc\",\"device\":\"laptop\",\"label\":1}\nnot json\n",
        )
        .unwrap();
        let events = read_jsonl(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, Some(1));
    }

    #[test]
    fn test_split_fractions() {
        let events = synthetic::generate(&SyntheticConfig {
            users: 5,
            events_per_user: 20,
            ..Default::default()
        });
        let total = events.len();
        let (train, test) = train_test_split(events, 0.8, 1);
        assert_eq!(train.len() + test.len(), total);
        assert_eq!(train.len(), 80);
    }

    #[test]
    fn test_unlabeled_defaults_to_normal() {
        let event = AccessEvent {
            context: AccessContext::new("a"),
            label: None,
        };
        assert_eq!(event.label_or_normal(), LABEL_NORMAL);
    }
}
