//! XDF-Simulation: Synthetic multi-stream recordings
//!
//! Deterministic recordings with continuous data streams, redundant jittered
//! marker streams and a trial metadata stream, for tests and benchmarks.

pub mod marker_script;
pub mod recording_simulator;
pub mod waveforms;

pub use marker_script::*;
pub use recording_simulator::*;
pub use waveforms::*;
