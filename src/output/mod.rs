pub mod compose;
mod directory;

pub use directory::{timestamp_name, DirectorySink};

use crate::segmentation::SegmentationOutput;
use anyhow::Result;
use std::path::PathBuf;

/// Trait for output destinations
pub trait OutputSink {
    /// Persist the renderings of one segmentation run, returning what was written
    fn write_result(&mut self, result: &SegmentationOutput) -> Result<Vec<PathBuf>>;
}
