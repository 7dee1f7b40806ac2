//! Stats document persistence.
//!
//! This module merges a fresh run with the previously written document and
//! writes the result, plus the console summary printed after a run.

use crate::models::{ChallengeRecord, StatsDocument};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// The parts of a previous document that are carried forward.
///
/// Challenge records stay raw so a record this program would not have
/// written itself is still carried unchanged.
#[derive(Debug, Default, Deserialize)]
struct PreviousDocument {
    #[serde(default)]
    challenge_stats: Option<Vec<Value>>,
}

/// Load challenge records from a previously written document.
///
/// A missing file means no prior state. A document that is not JSON is
/// logged and treated the same way, since it is about to be replaced.
/// Individual records without a `challenge_id` are logged and skipped.
pub fn load_previous_challenges(path: &Path) -> Result<Vec<ChallengeRecord>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No previous stats at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read previous stats: {}", path.display()))
        }
    };

    let previous = match serde_json::from_str::<PreviousDocument>(&content) {
        Ok(previous) => previous,
        Err(e) => {
            warn!(
                "Ignoring unparseable previous stats at {}: {}",
                path.display(),
                e
            );
            return Ok(Vec::new());
        }
    };

    let values = previous.challenge_stats.unwrap_or_default();
    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match ChallengeRecord::carried(value) {
            Some(record) => records.push(record),
            None => warn!(
                "Skipping previous challenge record {} in {}: no challenge_id",
                index,
                path.display()
            ),
        }
    }

    Ok(records)
}

/// Append previous challenge records whose id is absent from `current`.
///
/// New records always win; previous duplicates collapse to their first entry.
pub fn merge_challenge_stats(
    mut current: Vec<ChallengeRecord>,
    previous: Vec<ChallengeRecord>,
) -> Vec<ChallengeRecord> {
    let mut seen: HashSet<String> = current
        .iter()
        .filter_map(ChallengeRecord::challenge_id)
        .map(str::to_string)
        .collect();

    for record in previous {
        let fresh = match record.challenge_id() {
            Some(id) => seen.insert(id.to_string()),
            None => false,
        };
        if fresh {
            current.push(record);
        }
    }

    current
}

/// Generate the JSON text of a document.
pub fn generate_json(document: &StatsDocument) -> Result<String> {
    let mut json = serde_json::to_string_pretty(document)?;
    json.push('\n');
    Ok(json)
}

/// Write the document, replacing any existing file in one rename.
pub fn write_document(document: &StatsDocument, path: &Path) -> Result<()> {
    let content = generate_json(document)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    file.write_all(content.as_bytes())?;
    file.persist(path)
        .with_context(|| format!("Failed to write stats to {}", path.display()))?;

    Ok(())
}

/// Generate a text summary of a document for the console.
pub fn generate_summary_text(document: &StatsDocument) -> String {
    let count = |len: Option<usize>| match len {
        Some(n) => n.to_string(),
        None => "none".to_string(),
    };
    let present = |is_some: bool| if is_some { "yes" } else { "withheld" };

    let mut lines = Vec::new();
    lines.push(format!("Challenges: {}", document.challenge_stats.len()));
    lines.push(format!(
        "Tools: {}",
        count(document.tool_stats.as_ref().map(Vec::len))
    ));
    lines.push(format!(
        "Tool categories: {}",
        count(document.tool_category_stats.as_ref().map(Vec::len))
    ));
    lines.push(format!(
        "Stages: {}",
        count(document.stage_stats.as_ref().map(Vec::len))
    ));
    lines.push(format!(
        "Community stats: {}",
        present(document.community_stats.is_some())
    ));
    lines.push(format!(
        "Effectiveness stats: {}",
        present(document.effectiveness_stats.is_some())
    ));
    lines.push(format!("Last updated: {}", document.last_updated));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::models::ChallengeStat;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn stat(id: &str, rate: f64) -> ChallengeRecord {
        ChallengeRecord::Computed(ChallengeStat {
            challenge_id: id.to_string(),
            completion_rate: rate,
            total_starts: 10,
            total_completions: (rate * 10.0) as u64,
            average_days_to_complete: None,
        })
    }

    fn carried(value: Value) -> ChallengeRecord {
        ChallengeRecord::carried(value).unwrap()
    }

    fn create_test_document() -> StatsDocument {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
        let mut doc = StatsDocument::new(Thresholds::default(), now);
        doc.challenge_stats = vec![stat("movement_7day", 0.4)];
        doc
    }

    fn write_previous(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("stats.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_merge_prefers_new_and_carries_old() {
        let current = vec![stat("movement_7day", 0.5)];
        let previous = vec![
            carried(json!({"challenge_id": "movement_7day", "completion_rate": 0.1})),
            carried(json!({"challenge_id": "hydration_30day", "completion_rate": 0.3})),
        ];

        let merged = merge_challenge_stats(current, previous);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], stat("movement_7day", 0.5));
        assert_eq!(
            merged[1],
            carried(json!({"challenge_id": "hydration_30day", "completion_rate": 0.3}))
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = write_previous(
            &dir,
            r#"{"challenge_stats": [
                {"challenge_id": "hydration_30day", "completion_rate": 0.3},
                {"challenge_id": "hydration_30day", "completion_rate": 0.9}
            ]}"#,
        );

        let mut doc = create_test_document();
        let current = doc.challenge_stats.clone();

        let previous = load_previous_challenges(&path).unwrap();
        doc.challenge_stats = merge_challenge_stats(current.clone(), previous);
        write_document(&doc, &path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let previous = load_previous_challenges(&path).unwrap();
        doc.challenge_stats = merge_challenge_stats(current, previous);
        write_document(&doc, &path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(doc.challenge_stats.len(), 2);
        assert!(!second.contains("0.9"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let loaded = load_previous_challenges(&dir.path().join("stats.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = write_previous(&dir, "{ not json");

        assert!(load_previous_challenges(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_keeps_partial_records() {
        let dir = TempDir::new().unwrap();
        let path = write_previous(
            &dir,
            r#"{"challenge_stats": [
                {"challenge_id": "hydration_30day", "completion_rate": 0.3,
                 "total_starts": 10, "total_completions": 3},
                {"challenge_id": "seeded", "completion_rate": 0.5}
            ]}"#,
        );

        let loaded = load_previous_challenges(&path).unwrap();

        let ids: Vec<_> = loaded.iter().filter_map(ChallengeRecord::challenge_id).collect();
        assert_eq!(ids, vec!["hydration_30day", "seeded"]);
        assert_eq!(
            loaded[1],
            carried(json!({"challenge_id": "seeded", "completion_rate": 0.5}))
        );
    }

    #[test]
    fn test_load_skips_records_without_id() {
        let dir = TempDir::new().unwrap();
        let path = write_previous(
            &dir,
            r#"{"challenge_stats": [
                {"completion_rate": 0.5},
                "seeded",
                {"challenge_id": "sleep_14day", "completion_rate": 0.2}
            ]}"#,
        );

        let loaded = load_previous_challenges(&path).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].challenge_id(), Some("sleep_14day"));
    }

    #[test]
    fn test_load_null_challenge_stats() {
        let dir = TempDir::new().unwrap();
        let path = write_previous(&dir, r#"{"challenge_stats": null, "tool_stats": []}"#);

        assert!(load_previous_challenges(&path).unwrap().is_empty());
    }

    #[test]
    fn test_carried_record_keeps_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let record = r#"{"challenge_id":"hydration_30day","display_name":"Hydrate","completion_rate":0.3,"total_starts":10,"total_completions":3}"#;
        let path = write_previous(&dir, &format!(r#"{{"challenge_stats": [{}]}}"#, record));

        let mut doc = create_test_document();
        let previous = load_previous_challenges(&path).unwrap();
        doc.challenge_stats = merge_challenge_stats(doc.challenge_stats, previous);
        write_document(&doc, &path).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let carried = &written["challenge_stats"][1];
        assert_eq!(carried["display_name"], "Hydrate");
        assert_eq!(
            serde_json::to_string(carried).unwrap(),
            record,
            "carried record must keep its keys and their order"
        );
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("stats.json");
        let doc = create_test_document();

        write_document(&doc, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"challenge_stats\""));
        assert!(written.contains("\"path_stats\": null"));
        assert!(written.contains("\"last_updated\": \"2026-10-19T06:00:00Z\""));

        let loaded = load_previous_challenges(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded[0],
            carried(json!({
                "challenge_id": "movement_7day",
                "completion_rate": 0.4,
                "total_starts": 10,
                "total_completions": 4
            }))
        );
    }

    #[test]
    fn test_field_order_is_stable() {
        let json = generate_json(&create_test_document()).unwrap();
        let keys = [
            "challenge_stats",
            "path_stats",
            "tool_stats",
            "tool_category_stats",
            "stage_stats",
            "community_stats",
            "effectiveness_stats",
            "thresholds",
            "last_updated",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|k| json.find(&format!("\"{}\"", k)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_generate_summary_text() {
        let summary = generate_summary_text(&create_test_document());
        assert!(summary.contains("Challenges: 1"));
        assert!(summary.contains("Tools: none"));
        assert!(summary.contains("Community stats: withheld"));
    }
}
