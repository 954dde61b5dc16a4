//! Error taxonomy.
//!
//! `ShadowError` covers failures that make a whole run meaningless (missing
//! input, broken metadata, no location). They travel inside `anyhow::Error`
//! and can be recovered with `downcast_ref::<ShadowError>()`.
//!
//! `SkipReason` is the per-surface outcome: a surface that cannot be sampled
//! is recorded and skipped, its siblings are processed as usual.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors aborting a run.
#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("coordinate transform failed: {0}")]
    Transform(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("run cancelled")]
    Cancelled,
}

/// Why a surface produced no sample points.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Fewer than 3 points, or the first three are collinear/coincident.
    DegenerateGeometry,
    /// Projection to the surface plane produced NaN coordinates.
    InvalidProjection,
    /// The projected polygon failed the validity check.
    InvalidPolygon(String),
    /// Area above the sampling cap.
    Oversized { area: f64 },
    /// Bounding box narrower than the grid spacing.
    Undersized,
    /// Estimated grid size above the configured point cap.
    TooManyPoints { estimated: usize },
    /// The surface had no rings.
    Empty,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DegenerateGeometry => write!(f, "degenerate geometry"),
            SkipReason::InvalidProjection => write!(f, "invalid projection"),
            SkipReason::InvalidPolygon(msg) => write!(f, "invalid polygon: {}", msg),
            SkipReason::Oversized { area } => write!(f, "area {:.1} above cap", area),
            SkipReason::Undersized => write!(f, "smaller than grid spacing"),
            SkipReason::TooManyPoints { estimated } => {
                write!(f, "about {} grid nodes, above cap", estimated)
            }
            SkipReason::Empty => write!(f, "empty surface"),
        }
    }
}

impl SkipReason {
    /// Size-based skips are expected for tiny or huge surfaces and are not
    /// geometry problems.
    pub fn is_size_filter(&self) -> bool {
        matches!(
            self,
            SkipReason::Oversized { .. } | SkipReason::Undersized | SkipReason::TooManyPoints { .. }
        )
    }
}
