//! Event, metadata, trial and perturbation records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed payload fields in discovery order
pub type EventFields = Map<String, Value>;

/// Anything positioned on the recording time axis by an onset
pub trait Onset {
    /// Onset in seconds (absolute or rebased)
    fn onset(&self) -> f64;

    /// Move the onset by `offset` seconds
    fn shift_onset(&mut self, offset: f64);
}

/// One marker sample turned into a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Marker timestamp
    pub onset: f64,
    /// Duration in seconds (0.0 unless the payload carries one)
    pub duration: f64,
    /// Raw marker payload
    pub event_type: String,
    /// Name of the marker stream the event came from
    pub source: String,
    /// Fields parsed out of the payload
    #[serde(flatten)]
    pub fields: EventFields,
}

impl RawEvent {
    /// Create an event with no parsed fields
    pub fn new(onset: f64, event_type: &str, source: &str) -> Self {
        RawEvent {
            onset,
            duration: 0.0,
            event_type: event_type.to_string(),
            source: source.to_string(),
            fields: EventFields::new(),
        }
    }

    /// Parsed `label` field, if the payload had one
    pub fn label(&self) -> Option<&str> {
        self.fields.get("label").and_then(Value::as_str)
    }

    /// Label used to recognize duplicate markers
    pub fn dedup_label(&self) -> &str {
        self.label().unwrap_or(&self.event_type)
    }

    /// Look up a parsed field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl Onset for RawEvent {
    fn onset(&self) -> f64 {
        self.onset
    }

    fn shift_onset(&mut self, offset: f64) {
        self.onset += offset;
    }
}

/// One sample of a metadata-marker stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    /// Marker timestamp
    pub onset: f64,
    /// Duration in seconds (0.0 unless the payload carries one)
    pub duration: f64,
    /// Name of the metadata stream
    pub source: String,
    /// Fields parsed out of the payload
    #[serde(flatten)]
    pub fields: EventFields,
}

impl MetaRecord {
    /// Create a metadata record with no parsed fields
    pub fn new(onset: f64, source: &str) -> Self {
        MetaRecord {
            onset,
            duration: 0.0,
            source: source.to_string(),
            fields: EventFields::new(),
        }
    }

    /// Parsed `trial_name`, if present
    pub fn trial_name(&self) -> Option<&str> {
        self.fields.get("trial_name").and_then(Value::as_str)
    }

    /// Look up a parsed field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl Onset for MetaRecord {
    fn onset(&self) -> f64 {
        self.onset
    }

    fn shift_onset(&mut self, offset: f64) {
        self.onset += offset;
    }
}

/// A reconstructed trial interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Trial start (end marker time minus duration)
    pub onset: f64,
    /// Trial length in seconds
    pub duration: f64,
    /// `trial_<n>`
    pub trial_type: String,
    /// Trial index carried by the end marker
    pub trial_number: i64,
}

impl Trial {
    /// Build a trial from its end-marker time and embedded duration
    pub fn from_end_marker(end_onset: f64, trial_number: i64, duration: f64) -> Self {
        Trial {
            onset: end_onset - duration,
            duration,
            trial_type: format!("trial_{}", trial_number),
            trial_number,
        }
    }
}

impl Onset for Trial {
    fn onset(&self) -> f64 {
        self.onset
    }

    fn shift_onset(&mut self, offset: f64) {
        self.onset += offset;
    }
}

/// A paired perturbation interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perturbation {
    /// Onset of the start marker
    pub onset: f64,
    /// End marker onset minus start marker onset
    pub duration: f64,
    /// Always `perturbation`
    pub event_type: String,
    /// Stream the start marker came from
    pub source: String,
}

impl Perturbation {
    /// Pair a start marker with its end marker
    pub fn from_pair(start: &RawEvent, end: &RawEvent) -> Self {
        Perturbation {
            onset: start.onset,
            duration: end.onset - start.onset,
            event_type: "perturbation".to_string(),
            source: start.source.clone(),
        }
    }
}

impl Onset for Perturbation {
    fn onset(&self) -> f64 {
        self.onset
    }

    fn shift_onset(&mut self, offset: f64) {
        self.onset += offset;
    }
}

/// Sort records ascending by onset, keeping input order for ties
pub fn sort_by_onset<T: Onset>(records: &mut [T]) {
    records.sort_by(|a, b| a.onset().total_cmp(&b.onset()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trial_from_end_marker() {
        let trial = Trial::from_end_marker(100.0, 1, 10.0);
        assert_eq!(trial.onset, 90.0);
        assert_eq!(trial.trial_type, "trial_1");
    }

    #[test]
    fn test_dedup_label_falls_back_to_payload() {
        let mut event = RawEvent::new(1.0, "perturbation_start", "markers");
        assert_eq!(event.dedup_label(), "perturbation_start");

        event.fields.insert("label".to_string(), json!("PERTURBATION_START"));
        assert_eq!(event.dedup_label(), "PERTURBATION_START");
    }

    #[test]
    fn test_event_serializes_flat() {
        let mut event = RawEvent::new(2.5, "TRIAL_START:3", "markers");
        event.fields.insert("label".to_string(), json!("TRIAL_START"));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["onset"], json!(2.5));
        assert_eq!(value["label"], json!("TRIAL_START"));
    }

    #[test]
    fn test_sort_by_onset_is_stable() {
        let mut events = vec![
            RawEvent::new(2.0, "b", "s1"),
            RawEvent::new(1.0, "a", "s1"),
            RawEvent::new(2.0, "c", "s2"),
        ];
        sort_by_onset(&mut events);
        let order: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
