//! StreamDescriptor: loader-owned container for one recorded stream

use crate::error::{XdfError, XdfResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One channel value of a sample
///
/// Continuous streams carry numbers, marker streams carry free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    /// Numeric value, if this channel carries one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            SampleValue::Text(_) => None,
        }
    }

    /// Check if the value carries no payload
    pub fn is_blank(&self) -> bool {
        match self {
            SampleValue::Number(v) => v.is_nan(),
            SampleValue::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Number(v) => write!(f, "{}", v),
            SampleValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Number(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        SampleValue::Text(value.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        SampleValue::Text(value)
    }
}

/// A single stream as produced by the container loader
///
/// Read-only to the engine. `timestamps` and `samples` always have equal
/// length; each sample holds one value per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Stream name from the stream header
    pub name: String,
    /// Stream type tag from the stream header
    pub stream_type: String,
    /// Declared number of channels
    pub channel_count: usize,
    /// Declared sampling rate in Hz (0.0 for irregular streams)
    pub nominal_srate: f64,
    /// Absolute sample timestamps in seconds
    pub timestamps: Vec<f64>,
    /// Sample values, one row per timestamp
    pub samples: Vec<Vec<SampleValue>>,
    /// Channel labels from the stream description, when the loader found any
    #[serde(default)]
    pub channel_labels: Option<Vec<String>>,
}

impl StreamDescriptor {
    /// Create a new stream descriptor, validating the loader contract
    pub fn new(
        name: &str,
        stream_type: &str,
        channel_count: usize,
        nominal_srate: f64,
        timestamps: Vec<f64>,
        samples: Vec<Vec<SampleValue>>,
    ) -> XdfResult<Self> {
        if timestamps.len() != samples.len() {
            return Err(XdfError::InvalidStream {
                name: name.to_string(),
                reason: format!(
                    "{} timestamps for {} samples",
                    timestamps.len(),
                    samples.len()
                ),
            });
        }

        if let Some(idx) = timestamps.iter().position(|t| !t.is_finite()) {
            return Err(XdfError::InvalidStream {
                name: name.to_string(),
                reason: format!("non-finite timestamp at sample {}", idx),
            });
        }

        Ok(StreamDescriptor {
            name: name.to_string(),
            stream_type: stream_type.to_string(),
            channel_count,
            nominal_srate,
            timestamps,
            samples,
            channel_labels: None,
        })
    }

    /// Create a continuous numeric stream
    pub fn numeric(
        name: &str,
        stream_type: &str,
        nominal_srate: f64,
        timestamps: Vec<f64>,
        rows: Vec<Vec<f64>>,
    ) -> XdfResult<Self> {
        let channel_count = rows.first().map(|r| r.len()).unwrap_or(0);
        let samples = rows
            .into_iter()
            .map(|row| row.into_iter().map(SampleValue::Number).collect())
            .collect();
        Self::new(name, stream_type, channel_count, nominal_srate, timestamps, samples)
    }

    /// Create a single-channel marker stream from (timestamp, payload) pairs
    pub fn markers(name: &str, stream_type: &str, markers: &[(f64, &str)]) -> XdfResult<Self> {
        let timestamps = markers.iter().map(|(t, _)| *t).collect();
        let samples = markers
            .iter()
            .map(|(_, payload)| vec![SampleValue::from(*payload)])
            .collect();
        Self::new(name, stream_type, 1, 0.0, timestamps, samples)
    }

    /// Attach channel labels read from the stream description
    pub fn with_channel_labels(mut self, labels: Vec<String>) -> Self {
        self.channel_labels = Some(labels);
        self
    }

    /// Number of samples in the stream
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if the stream holds no samples
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Timestamp of the first recorded sample
    pub fn first_timestamp(&self) -> Option<f64> {
        self.timestamps.first().copied()
    }

    /// Timestamp of the last recorded sample
    pub fn last_timestamp(&self) -> Option<f64> {
        self.timestamps.last().copied()
    }

    /// (first, last) timestamps of the stream
    pub fn span(&self) -> Option<(f64, f64)> {
        Some((self.first_timestamp()?, self.last_timestamp()?))
    }

    /// Copy the samples whose timestamps fall inside `[start, end]`
    pub fn crop(&self, start: f64, end: f64) -> (Vec<f64>, Vec<Vec<SampleValue>>) {
        self.timestamps
            .iter()
            .zip(self.samples.iter())
            .filter(|(t, _)| **t >= start && **t <= end)
            .map(|(t, s)| (*t, s.clone()))
            .unzip()
    }
}

/// A fully materialized recording: every stream the loader produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Where the recording came from (file name, session id)
    pub source: Option<String>,
    /// Streams in container order
    pub streams: Vec<StreamDescriptor>,
}

impl Recording {
    /// Create a recording from loaded streams
    pub fn new(streams: Vec<StreamDescriptor>) -> Self {
        Recording { source: None, streams }
    }

    /// Tag the recording with its origin
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Append a stream
    pub fn push(&mut self, stream: StreamDescriptor) {
        self.streams.push(stream);
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if the recording has no streams
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
