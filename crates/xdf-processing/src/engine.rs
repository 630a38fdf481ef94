//! Alignment engine: runs every stage over a loaded recording

use crate::bundle::{ProcessedStream, ProcessingInfo, ResultBundle, StreamMetadata};
use crate::config::{ClassificationRuleSet, ProcessingConfig};
use crate::extractor::{event_columns, meta_columns, EventExtractor};
use crate::matcher::role_for;
use crate::organizer::organize;
use crate::perturbations::PerturbationPairer;
use crate::transform::{RoleSamples, SampleTransform, TransformRegistry};
use crate::trials::reconstruct_trials;
use crate::window::overlap_window;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;
use xdf_core::{
    backward_jumps, resolve_channel_labels, ChannelLabelSource, DescriptorLabels, Recording,
    StreamDescriptor, TimeBase, TimeWindow, XdfError, XdfResult,
};

/// Classification, extraction and alignment over one recording
///
/// Rules, configuration, transforms and the label source are fixed at
/// construction; `process` is a pure function of the recording.
pub struct AlignmentEngine {
    rules: ClassificationRuleSet,
    config: ProcessingConfig,
    extractor: EventExtractor,
    pairer: PerturbationPairer,
    transforms: TransformRegistry,
    labels: Box<dyn ChannelLabelSource>,
}

/// Builder for [`AlignmentEngine`]
pub struct EngineBuilder {
    rules: ClassificationRuleSet,
    config: ProcessingConfig,
    transforms: TransformRegistry,
    labels: Box<dyn ChannelLabelSource>,
}

impl EngineBuilder {
    /// Start from the built-in rules and default configuration
    pub fn new() -> Self {
        EngineBuilder {
            rules: ClassificationRuleSet::default(),
            config: ProcessingConfig::default(),
            transforms: TransformRegistry::new(),
            labels: Box::new(DescriptorLabels),
        }
    }

    /// Use a custom rule set
    pub fn rules(mut self, rules: ClassificationRuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Use a custom processing configuration
    pub fn config(mut self, config: ProcessingConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a sample transform for a role
    pub fn transform(mut self, role: &str, transform: Box<dyn SampleTransform>) -> Self {
        self.transforms.register(role, transform);
        self
    }

    /// Use a custom channel label source
    pub fn label_source(mut self, labels: Box<dyn ChannelLabelSource>) -> Self {
        self.labels = labels;
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> XdfResult<AlignmentEngine> {
        self.config.validate()?;

        let extractor = EventExtractor::new(&self.config);
        let pairer = PerturbationPairer::new(
            &self.config.perturbation_start_marker,
            &self.config.perturbation_end_marker,
            self.config.perturbation_tolerance,
        );

        Ok(AlignmentEngine {
            rules: self.rules,
            config: self.config,
            extractor,
            pairer,
            transforms: self.transforms,
            labels: self.labels,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentEngine {
    /// Start building an engine
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Classification rules in use
    pub fn rules(&self) -> &ClassificationRuleSet {
        &self.rules
    }

    /// Processing configuration in use
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Run every stage and assemble an absolute-time result bundle
    pub fn process(&self, recording: &Recording) -> XdfResult<ResultBundle> {
        if recording.is_empty() {
            return Err(XdfError::EmptyRecording);
        }

        let start = Instant::now();
        info!(
            "Processing {} streams from {}",
            recording.len(),
            recording.source.as_deref().unwrap_or("<memory>")
        );

        let organized = organize(&recording.streams, &self.rules);

        let events = self.extractor.extract_events(&organized.markers);
        let meta = self.extractor.extract_meta(&organized.meta);
        let trials = reconstruct_trials(&events, &self.config.trial_end_marker);
        let pairing = self.pairer.pair(&events);

        let time_window = overlap_window(&organized.data);
        let streams = self.process_data_streams(&organized.data, &time_window);

        let info = ProcessingInfo {
            data_streams_processed: streams.len(),
            events_found: events.len(),
            meta_found: meta.len(),
            trials_found: trials.len(),
            perturbations_found: pairing.perturbations.len(),
            duration: time_window.duration(),
            elapsed: start.elapsed(),
        };
        info!(
            "Processing complete: {} data streams, {} events, {} meta, {} trials, {} perturbations over {:.3}s window in {:?}",
            info.data_streams_processed,
            info.events_found,
            info.meta_found,
            info.trials_found,
            info.perturbations_found,
            info.duration,
            info.elapsed
        );

        Ok(ResultBundle {
            id: Uuid::new_v4(),
            source: recording.source.clone(),
            streams,
            event_columns: event_columns(&events),
            events,
            meta_columns: meta_columns(&meta),
            meta,
            trials,
            perturbations: pairing.perturbations,
            perturbation_status: pairing.status,
            global_t0: time_window.start,
            time_window,
            time_base: TimeBase::Absolute,
            info,
        })
    }

    fn process_data_streams(
        &self,
        streams: &[&StreamDescriptor],
        window: &TimeWindow,
    ) -> Vec<ProcessedStream> {
        let mut role_counts: HashMap<String, usize> = HashMap::new();
        let mut processed = Vec::with_capacity(streams.len());

        for stream in streams {
            let (timestamps, samples) = stream.crop(window.start, window.end);
            if timestamps.is_empty() {
                warn!("Stream '{}' has no samples inside the time window, skipping", stream.name);
                continue;
            }

            let jumps = backward_jumps(&timestamps);
            if jumps > 0 {
                warn!(
                    "Stream '{}' has {} backward timestamp jumps inside the time window",
                    stream.name, jumps
                );
            }

            let role = unique_role(role_for(stream, &self.rules), &mut role_counts, &stream.name);
            let channel_labels = resolve_channel_labels(stream, self.labels.as_ref());

            let output = self.transforms.apply(RoleSamples {
                role: role.clone(),
                channel_labels,
                timestamps,
                samples,
            });

            let metadata =
                StreamMetadata::from_windowed(stream, &output.timestamps, output.channel_labels);
            debug!(
                "Stream '{}' as '{}': {} samples, effective rate {:.2} Hz",
                stream.name, role, metadata.samples, metadata.effective_srate
            );

            processed.push(ProcessedStream {
                role,
                timestamps: output.timestamps,
                samples: output.samples,
                metadata,
            });
        }

        processed
    }
}

impl Default for AlignmentEngine {
    fn default() -> Self {
        let config = ProcessingConfig::default();
        AlignmentEngine {
            rules: ClassificationRuleSet::default(),
            extractor: EventExtractor::new(&config),
            pairer: PerturbationPairer::new(
                &config.perturbation_start_marker,
                &config.perturbation_end_marker,
                config.perturbation_tolerance,
            ),
            config,
            transforms: TransformRegistry::new(),
            labels: Box::new(DescriptorLabels),
        }
    }
}

impl std::fmt::Debug for AlignmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentEngine")
            .field("rules", &self.rules.len())
            .field("config", &self.config)
            .field("transforms", &self.transforms)
            .finish()
    }
}

/// Key a role so that repeated roles stay distinct: `wii`, `wii_2`, ...
fn unique_role(role: String, counts: &mut HashMap<String, usize>, stream_name: &str) -> String {
    let count = counts.entry(role.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        role
    } else {
        let key = format!("{}_{}", role, count);
        warn!(
            "Role '{}' already used, storing stream '{}' as '{}'",
            role, stream_name, key
        );
        key
    }
}

/// A loaded recording and the time origin of its last processing run
#[derive(Debug, Default)]
pub struct ProcessingSession {
    engine: AlignmentEngine,
    recording: Option<Recording>,
    global_t0: Option<f64>,
}

impl ProcessingSession {
    /// Create a session around an engine
    pub fn new(engine: AlignmentEngine) -> Self {
        ProcessingSession {
            engine,
            recording: None,
            global_t0: None,
        }
    }

    /// Load a recording, replacing any previous one
    ///
    /// The time origin of an earlier run is discarded.
    pub fn load(&mut self, recording: Recording) {
        info!("Loaded recording with {} streams", recording.len());
        self.recording = Some(recording);
        self.global_t0 = None;
    }

    /// Currently loaded recording
    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    /// Time origin of the last processing run
    pub fn global_t0(&self) -> Option<f64> {
        self.global_t0
    }

    /// Engine used for processing
    pub fn engine(&self) -> &AlignmentEngine {
        &self.engine
    }

    /// Process the loaded recording
    pub fn process(&mut self) -> XdfResult<ResultBundle> {
        let recording = self.recording.as_ref().ok_or(XdfError::NoRecordingLoaded)?;
        let bundle = self.engine.process(recording)?;
        self.global_t0 = Some(bundle.global_t0);
        Ok(bundle)
    }

    /// Convert absolute timestamps to seconds since the stored time origin
    pub fn to_relative_times(&self, timestamps: &[f64]) -> XdfResult<Vec<f64>> {
        let global_t0 = self.global_t0.ok_or(XdfError::NotProcessed)?;
        Ok(xdf_core::to_relative(timestamps, global_t0))
    }

    /// Convert relative timestamps back to absolute time
    pub fn to_absolute_times(&self, timestamps: &[f64]) -> XdfResult<Vec<f64>> {
        let global_t0 = self.global_t0.ok_or(XdfError::NotProcessed)?;
        Ok(xdf_core::to_absolute(timestamps, global_t0))
    }
}
