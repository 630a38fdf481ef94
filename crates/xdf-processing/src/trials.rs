//! Trial reconstructor
//!
//! Trials are recovered from end markers of the form
//! `TRIAL_END:<n>:time=<t>:duration=<d>`: the trial starts `d` seconds
//! before the marker.

use std::collections::HashMap;
use tracing::{debug, info};
use xdf_core::{sort_by_onset, RawEvent, Trial};

/// Parse the trial number and duration out of a trial-end payload
///
/// Returns `None` when the payload is not a trial-end marker with an
/// embedded duration, or when either number fails to parse.
pub fn parse_trial_end(payload: &str, marker: &str) -> Option<(i64, f64)> {
    let prefix = format!("{}:", marker);
    if !payload.contains(&prefix) || !payload.contains(":duration=") {
        return None;
    }

    let parts: Vec<&str> = payload.split(':').collect();
    let marker_idx = parts.iter().position(|p| p.trim() == marker)?;
    let trial_number = parts.get(marker_idx + 1)?.trim().parse::<i64>().ok()?;
    let duration = parts[marker_idx + 1..]
        .iter()
        .find_map(|p| p.trim().strip_prefix("duration="))?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())?;

    Some((trial_number, duration))
}

/// Reconstruct trials from trial-end events
///
/// When several end markers share a trial number, the one giving the latest
/// trial onset is kept. The result is sorted by onset.
pub fn reconstruct_trials(events: &[RawEvent], marker: &str) -> Vec<Trial> {
    let mut by_number: HashMap<i64, Trial> = HashMap::new();
    let mut candidates = 0usize;

    for event in events {
        if !event.event_type.contains(marker) {
            continue;
        }
        let Some((trial_number, duration)) = parse_trial_end(&event.event_type, marker) else {
            debug!("Skipping trial marker without usable trial info: '{}'", event.event_type);
            continue;
        };

        candidates += 1;
        let trial = Trial::from_end_marker(event.onset, trial_number, duration);
        match by_number.get(&trial_number) {
            Some(existing) if existing.onset >= trial.onset => {}
            _ => {
                by_number.insert(trial_number, trial);
            }
        }
    }

    let mut trials: Vec<Trial> = by_number.into_values().collect();
    trials.sort_by_key(|t| t.trial_number);
    sort_by_onset(&mut trials);

    info!(
        "Extracted {} trials ({} duplicates removed)",
        trials.len(),
        candidates - trials.len()
    );
    trials
}
