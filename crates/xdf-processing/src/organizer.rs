//! Stream organizer: partitions a recording into data, marker and meta streams

use crate::config::{ClassificationRuleSet, MARKER_ROLE, META_ROLE};
use crate::matcher::has_role;
use tracing::info;
use xdf_core::StreamDescriptor;

/// Streams grouped by the extraction pipeline they enter
///
/// Every input stream lands in exactly one group; input order is kept.
#[derive(Debug, Clone, Default)]
pub struct OrganizedStreams<'a> {
    pub data: Vec<&'a StreamDescriptor>,
    pub markers: Vec<&'a StreamDescriptor>,
    pub meta: Vec<&'a StreamDescriptor>,
}

impl<'a> OrganizedStreams<'a> {
    /// Total number of organized streams
    pub fn len(&self) -> usize {
        self.data.len() + self.markers.len() + self.meta.len()
    }

    /// Check if no streams were organized
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition streams; meta is checked before marker
pub fn organize<'a>(
    streams: &'a [StreamDescriptor],
    rules: &ClassificationRuleSet,
) -> OrganizedStreams<'a> {
    let mut organized = OrganizedStreams::default();

    for stream in streams {
        if has_role(stream, META_ROLE, rules) {
            organized.meta.push(stream);
        } else if has_role(stream, MARKER_ROLE, rules) {
            organized.markers.push(stream);
        } else {
            organized.data.push(stream);
        }
    }

    info!(
        "Found {} data streams, {} marker streams, {} meta streams",
        organized.data.len(),
        organized.markers.len(),
        organized.meta.len()
    );

    organized
}
