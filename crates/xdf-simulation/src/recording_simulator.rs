//! Multi-stream recording simulator
//!
//! Produces a fully loaded [`Recording`] the way the container loader would:
//! continuous data streams with staggered start and stop times, an event
//! marker stream mirrored onto redundant copies with sub-millisecond jitter,
//! and a trial metadata stream.

use crate::marker_script::{MarkerScript, TrialScript};
use crate::waveforms::Waveform;
use anyhow::{ensure, Context, Result};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use xdf_core::{Recording, SampleValue, StreamDescriptor};

/// Largest jitter applied to redundant marker copies, seconds
pub const MAX_MARKER_JITTER: f64 = 0.0004;

/// One simulated continuous stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStreamConfig {
    pub name: String,
    pub stream_type: String,
    pub sampling_rate: f64,
    pub channel_count: usize,
    /// Seconds after recording start at which the stream begins
    pub start_offset: f64,
    /// Length of the stream in seconds
    pub duration: f64,
    pub waveform: Waveform,
    #[serde(default)]
    pub channel_labels: Option<Vec<String>>,
}

impl DataStreamConfig {
    /// Stream with default waveform and no labels
    pub fn new(name: &str, stream_type: &str, sampling_rate: f64, channel_count: usize) -> Self {
        DataStreamConfig {
            name: name.to_string(),
            stream_type: stream_type.to_string(),
            sampling_rate,
            channel_count,
            start_offset: 0.0,
            duration: 60.0,
            waveform: Waveform::default(),
            channel_labels: None,
        }
    }

    /// Set when the stream starts and how long it runs
    pub fn spanning(mut self, start_offset: f64, duration: f64) -> Self {
        self.start_offset = start_offset;
        self.duration = duration;
        self
    }

    /// Attach channel labels
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.channel_labels = Some(labels.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Use a specific waveform
    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }
}

/// Marker stream naming and redundancy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStreamConfig {
    /// Name of the primary event marker stream
    pub name: String,
    pub stream_type: String,
    /// Additional streams carrying the same markers
    pub redundant_copies: usize,
    /// Standard deviation of copy jitter before clamping, seconds
    pub jitter_std: f64,
    /// Name of the trial metadata stream, if one is recorded
    pub meta_name: Option<String>,
}

impl Default for MarkerStreamConfig {
    fn default() -> Self {
        Self {
            name: "UnityMarkers".to_string(),
            stream_type: "Markers".to_string(),
            redundant_copies: 1,
            jitter_std: 0.0001,
            meta_name: Some("trial_meta".to_string()),
        }
    }
}

/// Full description of a simulated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Recorder clock value at recording start
    pub recording_start: f64,
    pub data_streams: Vec<DataStreamConfig>,
    pub markers: MarkerStreamConfig,
    pub script: TrialScript,
    /// Gaussian noise standard deviation added to data channels
    pub noise_std: f64,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            recording_start: 1250.0,
            data_streams: vec![
                DataStreamConfig::new("wii_board", "MoCap", 100.0, 4)
                    .spanning(0.0, 60.0)
                    .with_labels(&["top_left", "top_right", "bottom_left", "bottom_right"]),
                DataStreamConfig::new("kinect_skeleton", "MoCap", 30.0, 3).spanning(0.5, 59.0),
                DataStreamConfig::new("vr_bodysway", "TimeSeries", 60.0, 1)
                    .spanning(1.0, 58.0)
                    .with_waveform(Waveform::Sinusoidal {
                        frequency: 0.1,
                        amplitude: 0.2,
                        baseline: 0.0,
                    }),
            ],
            markers: MarkerStreamConfig::default(),
            script: TrialScript::default(),
            noise_std: 0.01,
            seed: Some(42),
        }
    }
}

impl ScenarioConfig {
    /// Check the scenario for settings no recorder would produce
    pub fn validate(&self) -> Result<()> {
        ensure!(self.recording_start.is_finite(), "recording start must be finite");
        ensure!(self.noise_std >= 0.0, "noise standard deviation cannot be negative");
        ensure!(self.markers.jitter_std >= 0.0, "jitter cannot be negative");
        for stream in &self.data_streams {
            ensure!(
                stream.sampling_rate > 0.0,
                "stream '{}' needs a positive sampling rate",
                stream.name
            );
            ensure!(stream.duration >= 0.0, "stream '{}' has a negative duration", stream.name);
        }
        self.script.validate()
    }

    /// Load a scenario from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse scenario")?;
        config.validate()?;
        Ok(config)
    }

    /// Export the scenario to JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize scenario")
    }

    /// Absolute window in which all configured data streams overlap
    pub fn expected_window(&self) -> Option<(f64, f64)> {
        let start = self
            .data_streams
            .iter()
            .map(|s| self.recording_start + s.start_offset)
            .reduce(f64::max)?;
        let end = self
            .data_streams
            .iter()
            .map(|s| self.recording_start + s.start_offset + s.duration)
            .reduce(f64::min)?;
        Some((start, end))
    }
}

/// A simulated recording together with the script it was generated from
#[derive(Debug, Clone)]
pub struct SimulatedRecording {
    pub recording: Recording,
    pub script: MarkerScript,
}

/// Recording simulator
pub struct RecordingSimulator {
    config: ScenarioConfig,
    rng: rand::rngs::StdRng,
    noise: Normal<f64>,
    jitter: Normal<f64>,
}

impl RecordingSimulator {
    /// Create a simulator for a scenario
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let rng = rand::rngs::StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, config.noise_std).context("Invalid noise distribution")?;
        let jitter =
            Normal::new(0.0, config.markers.jitter_std).context("Invalid jitter distribution")?;

        Ok(RecordingSimulator { config, rng, noise, jitter })
    }

    /// Scenario being simulated
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Generate the recording
    pub fn generate(&mut self) -> Result<SimulatedRecording> {
        let script = self.config.script.script(self.config.recording_start);
        let mut recording = Recording::default().with_source("simulated");

        for idx in 0..self.config.data_streams.len() {
            let stream = self.data_stream(idx)?;
            recording.push(stream);
        }

        let markers: Vec<(f64, &str)> =
            script.markers.iter().map(|(t, m)| (*t, m.as_str())).collect();
        recording.push(StreamDescriptor::markers(
            &self.config.markers.name,
            &self.config.markers.stream_type,
            &markers,
        )?);

        for copy in 1..=self.config.markers.redundant_copies {
            let jittered: Vec<(f64, &str)> = markers
                .iter()
                .map(|(t, m)| (t + self.marker_jitter(), *m))
                .collect();
            let name = format!("{}_{}", self.config.markers.name, copy);
            recording.push(StreamDescriptor::markers(
                &name,
                &self.config.markers.stream_type,
                &jittered,
            )?);
        }

        if let Some(meta_name) = &self.config.markers.meta_name {
            let meta: Vec<(f64, &str)> = script.meta.iter().map(|(t, m)| (*t, m.as_str())).collect();
            recording.push(StreamDescriptor::markers(
                meta_name,
                &self.config.markers.stream_type,
                &meta,
            )?);
        }

        info!(
            "Simulated recording: {} streams, {} trials, {} perturbations",
            recording.len(),
            script.trials.len(),
            script.perturbations.len()
        );

        Ok(SimulatedRecording { recording, script })
    }

    fn data_stream(&mut self, idx: usize) -> Result<StreamDescriptor> {
        let config = self.config.data_streams[idx].clone();
        let count = (config.duration * config.sampling_rate).floor() as usize + 1;
        let start = self.config.recording_start + config.start_offset;

        let mut timestamps = Vec::with_capacity(count);
        let mut rows = Vec::with_capacity(count);
        for i in 0..count {
            let elapsed = i as f64 / config.sampling_rate;
            timestamps.push(start + elapsed);
            let row: Vec<f64> = (0..config.channel_count)
                .map(|ch| config.waveform.value_at(elapsed, ch) + self.noise.sample(&mut self.rng))
                .collect();
            rows.push(row);
        }

        debug!(
            "Simulated '{}' ({}): {} samples, {}",
            config.name,
            config.stream_type,
            count,
            config.waveform.description()
        );

        let samples: Vec<Vec<SampleValue>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(SampleValue::Number).collect())
            .collect();
        let mut stream = StreamDescriptor::new(
            &config.name,
            &config.stream_type,
            config.channel_count,
            config.sampling_rate,
            timestamps,
            samples,
        )
        .with_context(|| format!("Simulated stream '{}' is invalid", config.name))?;

        if let Some(labels) = config.channel_labels {
            stream = stream.with_channel_labels(labels);
        }
        Ok(stream)
    }

    /// Non-negative jitter kept inside the same millisecond
    fn marker_jitter(&mut self) -> f64 {
        self.jitter.sample(&mut self.rng).abs().min(MAX_MARKER_JITTER)
    }
}

/// Generate the default scenario with a fixed seed
pub fn default_recording() -> Result<SimulatedRecording> {
    RecordingSimulator::new(ScenarioConfig::default())?.generate()
}
