//! Perturbation pairer
//!
//! Start and end markers are paired index-for-index after sorting. A single
//! missing end marker is tolerated; any other count mismatch drops the
//! perturbation table for the run.

use crate::config::ProcessingConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use xdf_core::{sort_by_onset, Perturbation, RawEvent};

/// How the start/end markers of a run were paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairingStatus {
    /// No perturbation markers at all
    None,
    /// Equal start and end counts
    Matched,
    /// One start had no end; the last perturbation has zero duration
    PaddedOrphanStart,
    /// Counts could not be reconciled; no perturbations were emitted
    CountMismatch { starts: usize, ends: usize },
}

impl PairingStatus {
    /// Check if the pairing lost or invented information
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            PairingStatus::PaddedOrphanStart | PairingStatus::CountMismatch { .. }
        )
    }
}

/// Perturbations of one run together with how they were paired
#[derive(Debug, Clone, PartialEq)]
pub struct PairingOutcome {
    pub perturbations: Vec<Perturbation>,
    pub status: PairingStatus,
}

/// Marker conventions and tolerance for pairing
#[derive(Debug, Clone)]
pub struct PerturbationPairer {
    start_marker: String,
    end_marker: String,
    tolerance: f64,
}

impl PerturbationPairer {
    /// Create a pairer; markers are matched case-insensitively as substrings
    pub fn new(start_marker: &str, end_marker: &str, tolerance: f64) -> Self {
        PerturbationPairer {
            start_marker: start_marker.to_lowercase(),
            end_marker: end_marker.to_lowercase(),
            tolerance,
        }
    }

    /// Pair start and end markers into perturbation intervals
    pub fn pair(&self, events: &[RawEvent]) -> PairingOutcome {
        let mut starts = Vec::new();
        let mut ends = Vec::new();

        for event in events {
            let payload = event.event_type.to_lowercase();
            if payload.contains(&self.start_marker) {
                starts.push(event.clone());
            } else if payload.contains(&self.end_marker) {
                ends.push(event.clone());
            }
        }

        sort_by_onset(&mut starts);
        sort_by_onset(&mut ends);
        let starts = dedup_close_onsets(starts, self.tolerance);
        let mut ends = dedup_close_onsets(ends, self.tolerance);

        let status = if starts.is_empty() && ends.is_empty() {
            PairingStatus::None
        } else if starts.len() == ends.len() {
            PairingStatus::Matched
        } else if starts.len() == ends.len() + 1 {
            warn!(
                "Mismatched perturbation start/end counts ({} starts, {} ends), using last start as end",
                starts.len(),
                ends.len()
            );
            if let Some(last) = starts.last() {
                ends.push(last.clone());
            }
            PairingStatus::PaddedOrphanStart
        } else {
            warn!(
                "Unable to resolve perturbation events due to mismatched counts: {} starts, {} ends",
                starts.len(),
                ends.len()
            );
            return PairingOutcome {
                perturbations: Vec::new(),
                status: PairingStatus::CountMismatch {
                    starts: starts.len(),
                    ends: ends.len(),
                },
            };
        };

        let perturbations: Vec<Perturbation> = starts
            .iter()
            .zip(ends.iter())
            .map(|(start, end)| Perturbation::from_pair(start, end))
            .collect();

        info!("Extracted {} perturbation events", perturbations.len());
        PairingOutcome { perturbations, status }
    }
}

/// Pair perturbation markers using the configured marker conventions
pub fn pair_perturbations(events: &[RawEvent], config: &ProcessingConfig) -> PairingOutcome {
    PerturbationPairer::new(
        &config.perturbation_start_marker,
        &config.perturbation_end_marker,
        config.perturbation_tolerance,
    )
    .pair(events)
}

/// Drop events closer than `tolerance` to an already kept one
///
/// Expects events sorted by onset; the first of each cluster is kept.
pub fn dedup_close_onsets(events: Vec<RawEvent>, tolerance: f64) -> Vec<RawEvent> {
    let mut kept: Vec<RawEvent> = Vec::with_capacity(events.len());
    for event in events {
        let duplicate = kept
            .last()
            .map(|prev| (event.onset - prev.onset).abs() < tolerance)
            .unwrap_or(false);
        if !duplicate {
            kept.push(event);
        }
    }
    kept
}
