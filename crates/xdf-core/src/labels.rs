//! Channel label resolution
//!
//! Labels come from an external accessor; whatever it returns is padded,
//! truncated and sanitized so that every data stream ends up with exactly
//! `channel_count` column names.

use crate::stream::StreamDescriptor;
use tracing::warn;

/// Label reserved for the timestamp column of exported tables
pub const TIME_COLUMN: &str = "time";

/// Replacement for data channels that collide with [`TIME_COLUMN`]
pub const RENAMED_TIME_CHANNEL: &str = "trial_time";

/// Capability that looks up channel labels for a stream
pub trait ChannelLabelSource: Send + Sync {
    /// Labels for `stream`, or `None` when its description has none
    fn channel_labels(&self, stream: &StreamDescriptor) -> Option<Vec<String>>;
}

/// Reads the labels the loader attached to the descriptor
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorLabels;

impl ChannelLabelSource for DescriptorLabels {
    fn channel_labels(&self, stream: &StreamDescriptor) -> Option<Vec<String>> {
        stream.channel_labels.clone()
    }
}

/// Resolve the final channel labels for a stream
pub fn resolve_channel_labels(
    stream: &StreamDescriptor,
    source: &dyn ChannelLabelSource,
) -> Vec<String> {
    let mut labels: Vec<String> = source
        .channel_labels(stream)
        .unwrap_or_default()
        .into_iter()
        .filter(|label| !label.is_empty())
        .collect();

    while labels.len() < stream.channel_count {
        labels.push(format!("Channel_{}", labels.len() + 1));
    }
    labels.truncate(stream.channel_count);

    labels
        .into_iter()
        .map(|label| {
            if label.eq_ignore_ascii_case(TIME_COLUMN) {
                warn!(
                    "Renamed data channel '{}' of stream '{}' to '{}' to avoid collision with timestamps",
                    label, stream.name, RENAMED_TIME_CHANNEL
                );
                RENAMED_TIME_CHANNEL.to_string()
            } else {
                label
            }
        })
        .collect()
}
