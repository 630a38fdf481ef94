//! Role-keyed sample transforms
//!
//! Device-specific post-processing plugs in here instead of being hard-coded
//! in the engine. A transform sees the windowed samples of one stream and
//! returns replacement samples; a failing transform is bypassed.

use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};
use xdf_core::{SampleValue, XdfError, XdfResult};

/// Windowed samples of one data stream as handed to a transform
#[derive(Debug, Clone, PartialEq)]
pub struct RoleSamples {
    pub role: String,
    pub channel_labels: Vec<String>,
    pub timestamps: Vec<f64>,
    pub samples: Vec<Vec<SampleValue>>,
}

impl RoleSamples {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Check if there are no samples
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Post-processing capability for the samples of one role
pub trait SampleTransform: Send + Sync {
    /// Transform identifier used in logs
    fn name(&self) -> &str;

    /// Produce transformed samples
    fn apply(&self, input: &RoleSamples) -> XdfResult<RoleSamples>;
}

/// Transforms keyed by the role they apply to
#[derive(Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Box<dyn SampleTransform>>,
}

impl TransformRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform for a role, replacing any previous one
    pub fn register(&mut self, role: &str, transform: Box<dyn SampleTransform>) {
        if let Some(previous) = self.transforms.insert(role.to_string(), transform) {
            debug!("Replaced transform '{}' for role '{}'", previous.name(), role);
        }
    }

    /// Transform registered for a role
    pub fn get(&self, role: &str) -> Option<&dyn SampleTransform> {
        self.transforms.get(role).map(|t| t.as_ref())
    }

    /// Roles with a registered transform
    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }

    /// Number of registered transforms
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if no transform is registered
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Run the transform for `input.role`, if any
    ///
    /// On failure the input is returned unchanged and a warning is logged.
    pub fn apply(&self, input: RoleSamples) -> RoleSamples {
        let Some(transform) = self.get(&input.role) else {
            return input;
        };

        let start = Instant::now();
        match transform.apply(&input) {
            Ok(output) => {
                debug!(
                    "Transform '{}' for role '{}' took {}μs",
                    transform.name(),
                    input.role,
                    start.elapsed().as_micros()
                );
                output
            }
            Err(e) => {
                warn!("Transform '{}' failed: {}, bypassing", transform.name(), e);
                input
            }
        }
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("roles", &self.roles())
            .finish()
    }
}

/// Keeps only the named channels, in the given order
#[derive(Debug, Clone)]
pub struct SelectChannels {
    channels: Vec<String>,
}

impl SelectChannels {
    pub fn new(channels: &[&str]) -> Self {
        SelectChannels {
            channels: channels.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl SampleTransform for SelectChannels {
    fn name(&self) -> &str {
        "select_channels"
    }

    fn apply(&self, input: &RoleSamples) -> XdfResult<RoleSamples> {
        let indices = self
            .channels
            .iter()
            .map(|wanted| {
                input
                    .channel_labels
                    .iter()
                    .position(|label| label == wanted)
                    .ok_or_else(|| XdfError::TransformFailed {
                        role: input.role.clone(),
                        reason: format!("channel '{}' not present", wanted),
                    })
            })
            .collect::<XdfResult<Vec<usize>>>()?;

        let samples = input
            .samples
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(SampleValue::Number(f64::NAN)))
                    .collect()
            })
            .collect();

        Ok(RoleSamples {
            role: input.role.clone(),
            channel_labels: self.channels.clone(),
            timestamps: input.timestamps.clone(),
            samples,
        })
    }
}
