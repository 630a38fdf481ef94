//! Result bundle: everything one processing run derives from a recording
//!
//! The bundle returned by the engine is in absolute time. Relative-time
//! copies are produced with [`rebase`]; the source bundle is never touched.

use crate::perturbations::PairingStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use xdf_core::{
    backward_jumps, MetaRecord, Onset, Perturbation, RawEvent, SampleValue, StreamDescriptor,
    TimeBase, TimeWindow, TimingInfo, Trial, XdfError, XdfResult,
};

/// Descriptive metadata of one windowed data stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub name: String,
    pub stream_type: String,
    pub channel_count: usize,
    pub nominal_srate: f64,
    /// Rate measured over the windowed timestamps
    pub effective_srate: f64,
    pub channel_labels: Vec<String>,
    /// Number of samples inside the window
    pub samples: usize,
    /// Whether the windowed timestamps never step backwards
    pub monotonic: bool,
}

impl StreamMetadata {
    /// Describe a stream after windowing
    pub fn from_windowed(
        stream: &StreamDescriptor,
        timestamps: &[f64],
        channel_labels: Vec<String>,
    ) -> Self {
        StreamMetadata {
            name: stream.name.clone(),
            stream_type: stream.stream_type.clone(),
            channel_count: stream.channel_count,
            nominal_srate: stream.nominal_srate,
            effective_srate: effective_srate(timestamps),
            channel_labels,
            samples: timestamps.len(),
            monotonic: backward_jumps(timestamps) == 0,
        }
    }
}

/// `(n - 1) / (last - first)`, or 0.0 when that is undefined
pub fn effective_srate(timestamps: &[f64]) -> f64 {
    match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) if timestamps.len() > 1 && last > first => {
            (timestamps.len() - 1) as f64 / (last - first)
        }
        _ => 0.0,
    }
}

/// Windowed (and possibly transformed) samples of one data stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedStream {
    /// Unique role key, `<role>_2` etc. for repeated roles
    pub role: String,
    pub timestamps: Vec<f64>,
    pub samples: Vec<Vec<SampleValue>>,
    pub metadata: StreamMetadata,
}

/// Stage counts of one processing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub data_streams_processed: usize,
    pub events_found: usize,
    pub meta_found: usize,
    pub trials_found: usize,
    pub perturbations_found: usize,
    /// Length of the alignment window in seconds
    pub duration: f64,
    /// Wall-clock time spent in the engine
    pub elapsed: Duration,
}

/// Aligned, labeled output of one processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Identifier of the processing run; shared by rebased copies
    pub id: Uuid,
    /// Origin of the processed recording
    pub source: Option<String>,
    /// Data streams in recording order
    pub streams: Vec<ProcessedStream>,
    pub events: Vec<RawEvent>,
    pub event_columns: Vec<String>,
    pub meta: Vec<MetaRecord>,
    pub meta_columns: Vec<String>,
    pub trials: Vec<Trial>,
    pub perturbations: Vec<Perturbation>,
    pub perturbation_status: PairingStatus,
    pub time_window: TimeWindow,
    /// Start of the overlap window in absolute time
    pub global_t0: f64,
    pub time_base: TimeBase,
    pub info: ProcessingInfo,
}

impl ResultBundle {
    /// Processed stream stored under a role key
    pub fn stream(&self, role: &str) -> Option<&ProcessedStream> {
        self.streams.iter().find(|s| s.role == role)
    }

    /// Role keys in recording order
    pub fn roles(&self) -> Vec<&str> {
        self.streams.iter().map(|s| s.role.as_str()).collect()
    }

    /// Check if any stage fell back to a degraded result
    pub fn is_degraded(&self) -> bool {
        self.time_window.degraded || self.perturbation_status.is_degraded()
    }

    /// Copy of the bundle with every onset relative to `global_t0`
    pub fn to_relative(&self) -> XdfResult<ResultBundle> {
        if self.time_base.is_relative() {
            return Err(XdfError::AlreadyRelative);
        }
        Ok(rebase(self, self.global_t0))
    }

    /// Copy of the bundle back in absolute time
    pub fn to_absolute(&self) -> ResultBundle {
        match self.time_base {
            TimeBase::Absolute => self.clone(),
            TimeBase::Relative { global_t0 } => {
                let mut bundle = self.clone();
                bundle.shift(global_t0);
                bundle.time_base = TimeBase::Absolute;
                bundle
            }
        }
    }

    /// Timing block for export sidecars
    ///
    /// `global_t0` is the origin the bundle's times are measured from; the
    /// window is reported in the same time base as the data.
    pub fn timing_info(&self) -> TimingInfo {
        let global_t0 = match self.time_base {
            TimeBase::Absolute => self.global_t0,
            TimeBase::Relative { global_t0 } => global_t0,
        };
        TimingInfo {
            use_relative_time: self.time_base.is_relative(),
            time_description: self.time_base.description().to_string(),
            global_t0,
            time_window: (self.time_window.start, self.time_window.end),
        }
    }

    fn shift(&mut self, offset: f64) {
        for stream in &mut self.streams {
            for t in &mut stream.timestamps {
                *t += offset;
            }
        }
        shift_all(&mut self.events, offset);
        shift_all(&mut self.meta, offset);
        shift_all(&mut self.trials, offset);
        shift_all(&mut self.perturbations, offset);
        self.time_window = self.time_window.shifted(offset);
    }
}

fn shift_all<T: Onset>(records: &mut [T], offset: f64) {
    for record in records {
        record.shift_onset(offset);
    }
}

/// Deep copy of `bundle` with `t0` subtracted from every timestamp and onset
///
/// Rebasing an already relative bundle moves its origin further by `t0`.
pub fn rebase(bundle: &ResultBundle, t0: f64) -> ResultBundle {
    let mut rebased = bundle.clone();
    rebased.shift(-t0);
    rebased.time_base = match bundle.time_base {
        TimeBase::Absolute => TimeBase::Relative { global_t0: t0 },
        TimeBase::Relative { global_t0 } => TimeBase::Relative {
            global_t0: global_t0 + t0,
        },
    };
    rebased
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> ResultBundle {
        let stream = StreamDescriptor::numeric(
            "wii_board",
            "MoCap",
            100.0,
            vec![1000.0, 1000.01, 1000.02],
            vec![vec![1.0], vec![2.0], vec![3.0]],
        )
        .unwrap();
        let metadata =
            StreamMetadata::from_windowed(&stream, &stream.timestamps, vec!["Channel_1".to_string()]);

        ResultBundle {
            id: Uuid::new_v4(),
            source: Some("session.xdf".to_string()),
            streams: vec![ProcessedStream {
                role: "wii".to_string(),
                timestamps: stream.timestamps.clone(),
                samples: stream.samples.clone(),
                metadata,
            }],
            events: vec![RawEvent::new(1000.015, "TRIAL_START:1", "markers")],
            event_columns: vec!["onset".to_string()],
            meta: vec![MetaRecord::new(1000.001, "trial_meta")],
            meta_columns: vec!["onset".to_string()],
            trials: vec![Trial::from_end_marker(1000.02, 1, 0.01)],
            perturbations: vec![Perturbation {
                onset: 1000.005,
                duration: 0.01,
                event_type: "perturbation".to_string(),
                source: "markers".to_string(),
            }],
            perturbation_status: PairingStatus::Matched,
            time_window: TimeWindow::new(1000.0, 1000.02),
            global_t0: 1000.0,
            time_base: TimeBase::Absolute,
            info: ProcessingInfo::default(),
        }
    }

    fn onsets(bundle: &ResultBundle) -> Vec<f64> {
        let mut all: Vec<f64> = bundle.streams.iter().flat_map(|s| s.timestamps.clone()).collect();
        all.extend(bundle.events.iter().map(|e| e.onset));
        all.extend(bundle.meta.iter().map(|m| m.onset));
        all.extend(bundle.trials.iter().map(|t| t.onset));
        all.extend(bundle.perturbations.iter().map(|p| p.onset));
        all.push(bundle.time_window.start);
        all.push(bundle.time_window.end);
        all
    }

    #[test]
    fn test_rebase_does_not_mutate_source() {
        let original = bundle();
        let snapshot = original.clone();
        let relative = original.to_relative().unwrap();

        assert_eq!(original, snapshot);
        assert_eq!(relative.streams[0].timestamps[0], 0.0);
        assert!((relative.trials[0].onset - 0.01).abs() < 1e-9);
        assert_eq!(relative.time_base, TimeBase::Relative { global_t0: 1000.0 });
        assert_eq!(relative.id, original.id);
    }

    #[test]
    fn test_rebase_round_trip() {
        let original = bundle();
        let restored = rebase(&original, 1000.0).to_absolute();

        assert_eq!(restored.time_base, TimeBase::Absolute);
        for (a, b) in onsets(&original).iter().zip(onsets(&restored).iter()) {
            assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_relative_twice_rejected() {
        let relative = bundle().to_relative().unwrap();
        assert_eq!(relative.to_relative(), Err(XdfError::AlreadyRelative));
    }

    #[test]
    fn test_timing_info() {
        let original = bundle();
        let info = original.timing_info();
        assert!(!info.use_relative_time);
        assert_eq!(info.time_description, "Absolute LSL timestamps");

        let info = original.to_relative().unwrap().timing_info();
        assert!(info.use_relative_time);
        assert_eq!(info.global_t0, 1000.0);
    }

    #[test]
    fn test_timing_info_follows_rebase_origin() {
        let original = bundle();
        let rebased = rebase(&original, 1000.01);
        let info = rebased.timing_info();
        assert_eq!(info.global_t0, 1000.01);
        assert!((info.time_window.0 + 0.01).abs() < 1e-9);
        assert!((info.time_window.1 - 0.01).abs() < 1e-9);

        let twice = rebase(&original.to_relative().unwrap(), 1.0);
        assert_eq!(twice.timing_info().global_t0, 1001.0);

        // origin plus relative window start gives back the absolute start
        let info = twice.timing_info();
        assert!((info.global_t0 + info.time_window.0 - original.time_window.start).abs() < 1e-9);
    }

    #[test]
    fn test_effective_srate() {
        assert_eq!(effective_srate(&[0.0, 0.5, 1.0]), 2.0);
        assert_eq!(effective_srate(&[3.0]), 0.0);
        assert_eq!(effective_srate(&[]), 0.0);
    }

    #[test]
    fn test_degraded_flags() {
        let mut degraded = bundle();
        assert!(!degraded.is_degraded());
        degraded.perturbation_status = PairingStatus::PaddedOrphanStart;
        assert!(degraded.is_degraded());
    }
}
