use thiserror::Error;

/// Errors raised by the segmentation pipeline
#[derive(Debug, Error)]
pub enum SegmentError {
    /// The input image has zero width or height
    #[error("input image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The refinement backend failed
    #[error("refinement failed: {0}")]
    Refinement(String),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
