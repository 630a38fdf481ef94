//! Overlap-window resolver

use tracing::{info, warn};
use xdf_core::{StreamDescriptor, TimeWindow};

/// Placeholder window used when there is no data stream to align
pub const EMPTY_WINDOW: (f64, f64) = (0.0, 1.0);

/// Compute the interval in which every data stream has samples
///
/// Streams without samples are ignored. When the streams do not overlap the
/// full span across all of them is returned, flagged as degraded.
pub fn overlap_window(streams: &[&StreamDescriptor]) -> TimeWindow {
    let spans: Vec<(f64, f64)> = streams.iter().filter_map(|s| s.span()).collect();

    if spans.is_empty() {
        warn!("No data streams with samples, using placeholder time window");
        return TimeWindow::degraded(EMPTY_WINDOW.0, EMPTY_WINDOW.1);
    }

    let start = spans.iter().map(|(first, _)| *first).fold(f64::NEG_INFINITY, f64::max);
    let end = spans.iter().map(|(_, last)| *last).fold(f64::INFINITY, f64::min);

    let window = if start <= end {
        TimeWindow::new(start, end)
    } else {
        let union_start = spans.iter().map(|(first, _)| *first).fold(f64::INFINITY, f64::min);
        let union_end = spans.iter().map(|(_, last)| *last).fold(f64::NEG_INFINITY, f64::max);
        warn!(
            "Data streams do not overlap (latest start {:.3} > earliest end {:.3}), using full span; cross-stream alignment is unreliable",
            start, end
        );
        TimeWindow::degraded(union_start, union_end)
    };

    info!("Time window: {}", window);
    window
}
