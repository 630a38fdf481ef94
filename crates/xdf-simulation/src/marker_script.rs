//! Experiment scripts: the trial and perturbation markers a task program
//! would emit, together with the intervals they describe

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Trial end marker prefix used by the simulated task program
pub const TRIAL_END: &str = "TRIAL_END";

/// Layout of trials and perturbations in a simulated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialScript {
    /// Number of trials
    pub trials: usize,
    /// Start of the first trial, seconds after recording start
    pub first_trial_at: f64,
    /// Length of every trial in seconds
    pub trial_duration: f64,
    /// Pause between the end of one trial and the start of the next
    pub inter_trial_gap: f64,
    /// Perturbations evenly spread over each trial
    pub perturbations_per_trial: usize,
    /// Length of each perturbation in seconds
    pub perturbation_duration: f64,
    /// Trial type written to the metadata stream
    pub trial_type: String,
    /// Leave out the final perturbation end marker
    pub drop_last_perturbation_end: bool,
}

impl Default for TrialScript {
    fn default() -> Self {
        Self {
            trials: 3,
            first_trial_at: 5.0,
            trial_duration: 10.0,
            inter_trial_gap: 5.0,
            perturbations_per_trial: 2,
            perturbation_duration: 0.5,
            trial_type: "walking".to_string(),
            drop_last_perturbation_end: false,
        }
    }
}

/// A trial as the task program ran it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedTrial {
    pub trial_number: i64,
    pub onset: f64,
    pub duration: f64,
}

/// A perturbation as the task program ran it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScriptedPerturbation {
    pub onset: f64,
    pub duration: f64,
}

/// Marker payloads and the ground truth behind them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerScript {
    /// (timestamp, payload) for the event marker stream, in time order
    pub markers: Vec<(f64, String)>,
    /// (timestamp, payload) for the metadata stream, in time order
    pub meta: Vec<(f64, String)>,
    pub trials: Vec<ScriptedTrial>,
    pub perturbations: Vec<ScriptedPerturbation>,
}

/// Round to whole milliseconds, the resolution markers are emitted at
pub fn round_ms(t: f64) -> f64 {
    (t * 1000.0).round() / 1000.0
}

impl TrialScript {
    /// Check that the script describes a realizable session
    pub fn validate(&self) -> Result<()> {
        ensure!(self.trial_duration > 0.0, "trial duration must be positive");
        ensure!(self.inter_trial_gap >= 0.0, "inter-trial gap cannot be negative");
        ensure!(self.first_trial_at >= 0.0, "first trial cannot start before the recording");
        let slot = self.trial_duration / (self.perturbations_per_trial + 1) as f64;
        ensure!(
            self.perturbations_per_trial == 0 || self.perturbation_duration < slot,
            "perturbations of {}s do not fit {} per {}s trial",
            self.perturbation_duration,
            self.perturbations_per_trial,
            self.trial_duration
        );
        Ok(())
    }

    /// Time after recording start at which the last trial ends
    pub fn session_length(&self) -> f64 {
        if self.trials == 0 {
            return self.first_trial_at;
        }
        self.first_trial_at
            + self.trials as f64 * self.trial_duration
            + (self.trials - 1) as f64 * self.inter_trial_gap
    }

    /// Lay out markers on an absolute clock starting at `recording_start`
    pub fn script(&self, recording_start: f64) -> MarkerScript {
        let mut script = MarkerScript::default();
        let slot = self.trial_duration / (self.perturbations_per_trial + 1) as f64;

        for idx in 0..self.trials {
            let trial_number = idx as i64 + 1;
            let start = round_ms(
                recording_start
                    + self.first_trial_at
                    + idx as f64 * (self.trial_duration + self.inter_trial_gap),
            );
            let end = round_ms(start + self.trial_duration);
            let duration = end - start;

            script.markers.push((start, format!("TRIAL_START:{}", trial_number)));
            script.meta.push((
                start,
                format!(
                    "trial_name=trial_{};trial_type={};has_perturbations={}",
                    trial_number,
                    self.trial_type,
                    if self.perturbations_per_trial > 0 { "True" } else { "False" }
                ),
            ));

            for p in 0..self.perturbations_per_trial {
                let p_start = round_ms(start + (p + 1) as f64 * slot);
                let p_end = round_ms(p_start + self.perturbation_duration);
                script.markers.push((p_start, "PERTURBATION_START".to_string()));
                script.markers.push((p_end, "PERTURBATION_END".to_string()));
                script.perturbations.push(ScriptedPerturbation {
                    onset: p_start,
                    duration: p_end - p_start,
                });
            }

            script.markers.push((
                end,
                format!("{}:{}:time={}:duration={}", TRIAL_END, trial_number, end, duration),
            ));
            script.trials.push(ScriptedTrial { trial_number, onset: start, duration });
        }

        if self.drop_last_perturbation_end {
            if let Some(pos) = script.markers.iter().rposition(|(_, m)| m == "PERTURBATION_END") {
                script.markers.remove(pos);
                if let Some(last) = script.perturbations.last_mut() {
                    last.duration = 0.0;
                }
            }
        }

        script
    }
}
