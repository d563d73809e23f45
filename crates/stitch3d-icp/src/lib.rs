#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pairwise iterative closest point alignment.
pub mod align;

/// Alignment configuration.
pub mod context;

/// Correspondence search and rejection.
pub mod correspondence;

/// Incremental rigid transform estimation.
pub mod estimate;

/// Merging of aligned clouds.
pub mod merge;

/// Surface normal estimation.
pub mod normals;

/// Two-phase stitching of a pair of scans.
pub mod pipeline;

/// Alignment results.
pub mod result;

/// Nearest-neighbor search.
pub mod spatial;

pub use align::{align, align_with_index};
pub use context::{AlignmentContext, ContextError, ErrorMetric, Subsampling};
pub use merge::{merge, MergeError};
pub use pipeline::{PipelineConfig, PipelineError, RefinementInput, StitchReport, StitchingPipeline};
pub use result::{Convergence, Registration, RegistrationResult, RegistrationStatus};
