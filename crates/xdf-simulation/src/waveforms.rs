//! Waveforms for simulated continuous streams

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Shape of a simulated data channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Waveform {
    /// Flat signal
    Constant { level: f64 },
    /// Sine around a baseline
    Sinusoidal {
        frequency: f64,
        amplitude: f64,
        baseline: f64,
    },
    /// Slow postural sway: two incommensurate low-frequency components
    Sway { amplitude: f64, frequency: f64 },
    /// Linear ramp from `start` with `slope` units per second
    Ramp { start: f64, slope: f64 },
}

impl Waveform {
    /// Noise-free value at `time` seconds after stream start
    ///
    /// Channels are phase-shifted so that they are not identical.
    pub fn value_at(&self, time: f64, channel: usize) -> f64 {
        let phase = channel as f64 * PI / 4.0;
        match self {
            Waveform::Constant { level } => *level,
            Waveform::Sinusoidal { frequency, amplitude, baseline } => {
                baseline + amplitude * (2.0 * PI * frequency * time + phase).sin()
            }
            Waveform::Sway { amplitude, frequency } => {
                let slow = (2.0 * PI * frequency * time + phase).sin();
                let slower = (2.0 * PI * frequency * 0.37 * time).cos();
                amplitude * (0.7 * slow + 0.3 * slower)
            }
            Waveform::Ramp { start, slope } => start + slope * time + channel as f64,
        }
    }

    /// Short description for logs
    pub fn description(&self) -> &'static str {
        match self {
            Waveform::Constant { .. } => "constant level",
            Waveform::Sinusoidal { .. } => "sinusoid around a baseline",
            Waveform::Sway { .. } => "low-frequency postural sway",
            Waveform::Ramp { .. } => "linear ramp",
        }
    }
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Sway {
            amplitude: 1.0,
            frequency: 0.2,
        }
    }
}
