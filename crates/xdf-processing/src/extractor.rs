//! Event & metadata extractor
//!
//! Walks marker and metadata streams, parses every non-empty payload, drops
//! near-simultaneous duplicates coming from redundant marker streams and
//! returns the records sorted by onset.

use crate::config::ProcessingConfig;
use crate::parser::EventParser;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use xdf_core::{sort_by_onset, EventFields, MetaRecord, RawEvent, SampleValue, StreamDescriptor};

/// Leading columns of the events table
pub const EVENT_TABLE_ORDER: &[&str] = &["onset", "duration", "label"];

/// Leading columns of the metadata table, when present
pub const META_TABLE_ORDER: &[&str] = &[
    "onset",
    "duration",
    "trial_name",
    "trial_type",
    "has_perturbations",
    "has_movement",
];

/// Record keys parsed fields may not overwrite
const RESERVED_KEYS: &[&str] = &["onset", "event_type", "source"];

/// Extracts events and metadata records from marker streams
#[derive(Debug, Clone)]
pub struct EventExtractor {
    parser: EventParser,
    dedup_decimals: u32,
}

impl EventExtractor {
    /// Create an extractor from the processing configuration
    pub fn new(config: &ProcessingConfig) -> Self {
        EventExtractor {
            parser: EventParser::new(config.parser.clone()),
            dedup_decimals: config.dedup_decimals,
        }
    }

    /// Parser used for every payload
    pub fn parser(&self) -> &EventParser {
        &self.parser
    }

    /// Extract, deduplicate and sort events from marker streams
    pub fn extract_events(&self, streams: &[&StreamDescriptor]) -> Vec<RawEvent> {
        let mut events = Vec::new();

        for stream in streams {
            for (onset, sample) in stream.timestamps.iter().zip(stream.samples.iter()) {
                let Some(payload) = first_payload(sample) else {
                    continue;
                };

                let mut event = RawEvent::new(*onset, &payload, &stream.name);
                let parsed = self.parser.parse(&payload);
                merge_fields(&mut event.fields, &mut event.duration, parsed, self.parser.fallback_key());
                events.push(event);
            }
        }

        let extracted = events.len();
        let mut events = dedup_events(events, self.dedup_decimals);
        sort_by_onset(&mut events);

        if extracted > events.len() {
            debug!("Dropped {} duplicate events", extracted - events.len());
        }
        info!("Extracted {} events", events.len());
        events
    }

    /// Extract, deduplicate and sort records from metadata streams
    pub fn extract_meta(&self, streams: &[&StreamDescriptor]) -> Vec<MetaRecord> {
        let mut records = Vec::new();

        for stream in streams {
            for (onset, sample) in stream.timestamps.iter().zip(stream.samples.iter()) {
                let Some(payload) = first_payload(sample) else {
                    continue;
                };

                let mut record = MetaRecord::new(*onset, &stream.name);
                let parsed = self.parser.parse(&payload);
                merge_fields(&mut record.fields, &mut record.duration, parsed, "");
                records.push(record);
            }
        }

        if records.is_empty() {
            warn!("No meta events found in the streams");
            return records;
        }

        let mut records = dedup_meta(records, self.dedup_decimals, self.parser.fallback_key());
        for record in &mut records {
            record.fields.shift_remove(self.parser.fallback_key());
        }
        sort_by_onset(&mut records);

        info!("Extracted {} meta events", records.len());
        records
    }
}

/// First channel of a marker sample as text, if it carries anything
fn first_payload(sample: &[SampleValue]) -> Option<String> {
    sample
        .first()
        .filter(|value| !value.is_blank())
        .map(ToString::to_string)
}

/// Merge parsed fields into a record
///
/// A numeric `duration` replaces the record duration; reserved keys and the
/// `skip` key are left out.
fn merge_fields(target: &mut EventFields, duration: &mut f64, parsed: EventFields, skip: &str) {
    for (key, value) in parsed {
        if key == skip || RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if key == "duration" {
            if let Some(d) = value.as_f64() {
                *duration = d;
            }
            continue;
        }
        target.insert(key, value);
    }
}

/// Onset rounded to `decimals`, as an integer bucket
fn onset_bucket(onset: f64, decimals: u32) -> i64 {
    (onset * 10f64.powi(decimals as i32)).round() as i64
}

fn field_key(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_default()
}

/// Collapse events with equal rounded onset and equal label
///
/// The first occurrence in input order is kept.
pub fn dedup_events(events: Vec<RawEvent>, decimals: u32) -> Vec<RawEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| {
            seen.insert((onset_bucket(event.onset, decimals), event.dedup_label().to_string()))
        })
        .collect()
}

/// Collapse metadata records with equal rounded onset and equal trial name
///
/// When no record carries a `trial_name`, the raw payload under
/// `payload_key` distinguishes records instead.
pub fn dedup_meta(records: Vec<MetaRecord>, decimals: u32, payload_key: &str) -> Vec<MetaRecord> {
    let by_trial_name = records.iter().any(|r| r.field("trial_name").is_some());
    let key = if by_trial_name { "trial_name" } else { payload_key };

    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            seen.insert((onset_bucket(record.onset, decimals), field_key(record.field(key))))
        })
        .collect()
}

fn push_unique(columns: &mut Vec<String>, column: &str) {
    if !columns.iter().any(|c| c == column) {
        columns.push(column.to_string());
    }
}

/// Column order of the events table
pub fn event_columns(events: &[RawEvent]) -> Vec<String> {
    let mut columns: Vec<String> = EVENT_TABLE_ORDER.iter().map(|c| c.to_string()).collect();
    if !events.is_empty() {
        push_unique(&mut columns, "event_type");
        push_unique(&mut columns, "source");
    }
    for event in events {
        for key in event.fields.keys() {
            push_unique(&mut columns, key);
        }
    }
    columns
}

/// Column order of the metadata table
pub fn meta_columns(records: &[MetaRecord]) -> Vec<String> {
    let mut discovered = vec!["onset".to_string(), "duration".to_string()];
    if !records.is_empty() {
        push_unique(&mut discovered, "source");
    }
    for record in records {
        for key in record.fields.keys() {
            push_unique(&mut discovered, key);
        }
    }

    let mut columns: Vec<String> = META_TABLE_ORDER
        .iter()
        .filter(|c| discovered.iter().any(|d| d == *c))
        .map(|c| c.to_string())
        .collect();
    for column in discovered {
        push_unique(&mut columns, &column);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extractor() -> EventExtractor {
        EventExtractor::new(&ProcessingConfig::default())
    }

    #[test]
    fn test_redundant_streams_are_collapsed() {
        let a = StreamDescriptor::markers(
            "UnityMarkers",
            "Markers",
            &[(10.0, "TRIAL_START:1"), (20.0, "PERTURBATION_START")],
        )
        .unwrap();
        let b = StreamDescriptor::markers(
            "UnityMarkers_backup",
            "Markers",
            &[(10.0001, "TRIAL_START:1"), (20.0002, "PERTURBATION_START")],
        )
        .unwrap();

        let events = extractor().extract_events(&[&a, &b]);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.source == "UnityMarkers"));
    }

    #[test]
    fn test_distinct_labels_at_same_time_survive() {
        let a = StreamDescriptor::markers(
            "markers",
            "Markers",
            &[(5.0, "TRIAL_END:1:duration=4.0"), (5.0, "PERTURBATION_END")],
        )
        .unwrap();
        assert_eq!(extractor().extract_events(&[&a]).len(), 2);
    }

    #[test]
    fn test_events_sorted_for_out_of_order_input() {
        let a = StreamDescriptor::markers("m1", "Markers", &[(3.0, "c"), (1.0, "a")]).unwrap();
        let b = StreamDescriptor::markers("m2", "Markers", &[(2.0, "b"), (0.5, "z")]).unwrap();

        let events = extractor().extract_events(&[&a, &b]);
        let onsets: Vec<f64> = events.iter().map(|e| e.onset).collect();
        assert_eq!(onsets, vec![0.5, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_event_fields_are_merged() {
        let a = StreamDescriptor::markers(
            "markers",
            "Markers",
            &[(100.0, "TRIAL_END:1:time=100.0:duration=10.0"), (101.0, "")],
        )
        .unwrap();

        let events = extractor().extract_events(&[&a]);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.onset, 100.0);
        assert_eq!(event.duration, 10.0);
        assert_eq!(event.event_type, "TRIAL_END:1:time=100.0:duration=10.0");
        assert_eq!(event.label(), Some("TRIAL_END"));
        assert_eq!(event.field("time"), Some(&json!(100.0)));
        assert!(event.field("data").is_none());
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let a = StreamDescriptor::markers(
            "m1",
            "Markers",
            &[(1.0, "a"), (1.0004, "a"), (2.0, "b"), (2.0, "c")],
        )
        .unwrap();

        let once = extractor().extract_events(&[&a]);
        let twice = dedup_events(once.clone(), 3);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_meta_dedup_by_trial_name_and_payload_removed() {
        let a = StreamDescriptor::markers(
            "trial_meta",
            "Meta",
            &[
                (5.0, "trial_name=walk;trial_type=gait;has_perturbations=True"),
                (1.0, "trial_name=stand;trial_type=balance;has_perturbations=False"),
            ],
        )
        .unwrap();
        let b = StreamDescriptor::markers(
            "trial_meta_copy",
            "Meta",
            &[(5.0002, "trial_name=walk;trial_type=gait;has_perturbations=True")],
        )
        .unwrap();

        let meta = extractor().extract_meta(&[&a, &b]);
        assert_eq!(meta.len(), 2);
        assert_eq!(meta[0].trial_name(), Some("stand"));
        assert_eq!(meta[1].field("has_perturbations"), Some(&json!(true)));
        assert!(meta.iter().all(|m| m.field("data").is_none()));
    }

    #[test]
    fn test_meta_dedup_by_payload_without_trial_names() {
        let a = StreamDescriptor::markers(
            "trial_meta",
            "Meta",
            &[(5.0, "walking"), (5.0, "standing"), (5.0001, "walking")],
        )
        .unwrap();

        let meta = extractor().extract_meta(&[&a]);
        assert_eq!(meta.len(), 2);
    }

    #[test]
    fn test_no_meta_streams() {
        assert!(extractor().extract_meta(&[]).is_empty());
    }

    #[test]
    fn test_column_order() {
        let a = StreamDescriptor::markers(
            "markers",
            "Markers",
            &[(1.0, "PERTURBATION_START:speed=0.4"), (2.0, "TRIAL_END:1:duration=1.0")],
        )
        .unwrap();
        let events = extractor().extract_events(&[&a]);
        assert_eq!(
            event_columns(&events),
            vec!["onset", "duration", "label", "event_type", "source", "speed", "arg1"]
        );

        let m = StreamDescriptor::markers(
            "trial_meta",
            "Meta",
            &[(1.0, "participant=p01;trial_type=gait;trial_name=walk")],
        )
        .unwrap();
        let meta = extractor().extract_meta(&[&m]);
        assert_eq!(
            meta_columns(&meta),
            vec!["onset", "duration", "trial_name", "trial_type", "source", "participant"]
        );
    }
}
