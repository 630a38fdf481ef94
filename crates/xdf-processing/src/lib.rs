//! XDF-Processing: Stream classification, event reconstruction and alignment
//!
//! Turns a loaded multi-stream recording into role-keyed, windowed data
//! streams plus event, metadata, trial and perturbation tables sharing one
//! time origin.

pub mod bundle;
pub mod config;
pub mod engine;
pub mod extractor;
pub mod matcher;
pub mod organizer;
pub mod parser;
pub mod perturbations;
pub mod transform;
pub mod trials;
pub mod window;

pub use bundle::{rebase, ProcessedStream, ProcessingInfo, ResultBundle, StreamMetadata};
pub use config::{
    ClassificationRule, ClassificationRuleSet, ClassificationRuleSetBuilder, MatchMode,
    ParserConfig, ProcessingConfig,
};
pub use engine::{AlignmentEngine, EngineBuilder, ProcessingSession};
pub use extractor::{event_columns, meta_columns, EventExtractor};
pub use matcher::{classify, Classification};
pub use organizer::{organize, OrganizedStreams};
pub use parser::EventParser;
pub use perturbations::{pair_perturbations, PairingOutcome, PairingStatus, PerturbationPairer};
pub use transform::{RoleSamples, SampleTransform, SelectChannels, TransformRegistry};
pub use trials::reconstruct_trials;
pub use window::overlap_window;
