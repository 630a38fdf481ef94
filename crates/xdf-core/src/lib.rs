//! XDF-Core: Foundation types for multi-stream recording alignment
//!
//! Stream descriptors handed over by the container loader, the records the
//! engine derives from them, and the time-window/time-base vocabulary shared
//! by every stage.

pub mod error;
pub mod event;
pub mod labels;
pub mod stream;
pub mod timestamp;

pub use error::{XdfError, XdfResult};
pub use event::*;
pub use labels::{resolve_channel_labels, ChannelLabelSource, DescriptorLabels};
pub use stream::*;
pub use timestamp::*;
