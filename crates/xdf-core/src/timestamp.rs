//! Time window and time-base types
//!
//! Timestamps are seconds on the recorder's shared clock (f64). A bundle is
//! either in absolute time or rebased so that `global_t0` becomes zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Interval in which every data stream has samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Latest first timestamp across data streams
    pub start: f64,
    /// Earliest last timestamp across data streams
    pub end: f64,
    /// Set when the streams did not overlap and the full span was used
    pub degraded: bool,
}

impl TimeWindow {
    /// Create a true overlap window
    #[inline]
    pub const fn new(start: f64, end: f64) -> Self {
        TimeWindow { start, end, degraded: false }
    }

    /// Create a fallback window; cross-stream alignment is unreliable
    #[inline]
    pub const fn degraded(start: f64, end: f64) -> Self {
        TimeWindow { start, end, degraded: true }
    }

    /// Window length in seconds
    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Check if `t` lies inside the window (bounds included)
    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// Shift both bounds by `offset` seconds
    pub fn shifted(&self, offset: f64) -> Self {
        TimeWindow {
            start: self.start + offset,
            end: self.end + offset,
            degraded: self.degraded,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3} to {:.3} seconds ({:.3}s duration)",
            self.start,
            self.end,
            self.duration()
        )?;
        if self.degraded {
            write!(f, " [degraded]")?;
        }
        Ok(())
    }
}

/// Time base a bundle's onsets are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimeBase {
    /// Recorder clock timestamps
    Absolute,
    /// Seconds since `global_t0`
    Relative { global_t0: f64 },
}

impl TimeBase {
    /// Check if onsets are relative to a time origin
    pub fn is_relative(&self) -> bool {
        matches!(self, TimeBase::Relative { .. })
    }

    /// Human-readable description for export sidecars
    pub fn description(&self) -> &'static str {
        match self {
            TimeBase::Absolute => "Absolute LSL timestamps",
            TimeBase::Relative { .. } => "Time relative to recording start",
        }
    }
}

/// Timing block carried by every export sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingInfo {
    pub use_relative_time: bool,
    pub time_description: String,
    pub global_t0: f64,
    pub time_window: (f64, f64),
}

/// Subtract `global_t0` from every timestamp
pub fn to_relative(timestamps: &[f64], global_t0: f64) -> Vec<f64> {
    timestamps.iter().map(|t| t - global_t0).collect()
}

/// Add `global_t0` back to every relative timestamp
pub fn to_absolute(timestamps: &[f64], global_t0: f64) -> Vec<f64> {
    timestamps.iter().map(|t| t + global_t0).collect()
}

/// Count places where timestamps step backwards
pub fn backward_jumps(timestamps: &[f64]) -> usize {
    timestamps.windows(2).filter(|w| w[1] < w[0]).count()
}
