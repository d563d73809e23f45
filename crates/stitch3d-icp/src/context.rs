use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stitch3d_cloud::{subsample::Subsampler, CloudError};

/// Error types for alignment configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ContextError {
    /// Overlap must lie in (0, 100].
    #[error("overlap must be in (0, 100] percent, got {0}")]
    InvalidOverlap(f64),

    /// A convergence threshold is negative or not finite.
    #[error("{name} must be finite and non-negative, got {value}")]
    InvalidThreshold {
        /// Name of the threshold.
        name: &'static str,
        /// Provided value.
        value: f64,
    },

    /// At least one iteration is required.
    #[error("max_iterations must be at least 1")]
    ZeroIterations,

    /// Normal estimation needs at least three neighbors.
    #[error("normal_neighbors must be at least 3, got {0}")]
    InvalidNormalNeighbors(usize),

    /// The correspondence distance gate must be positive.
    #[error("max_pair_distance must be positive and finite, got {0}")]
    InvalidPairDistance(f64),

    /// Unknown error metric name.
    #[error("unknown error metric {0:?}, expected point-to-point or point-to-plane")]
    UnknownMetric(String),

    /// Invalid subsampling parameters.
    #[error(transparent)]
    Subsampling(#[from] CloudError),
}

/// Distance minimized by the aligner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorMetric {
    /// Euclidean distance between paired points.
    #[default]
    PointToPoint,
    /// Distance from the moving point to the tangent plane of its fixed partner.
    PointToPlane,
}

impl ErrorMetric {
    /// Minimum number of pairs the estimator needs.
    pub fn min_pairs(&self) -> usize {
        match self {
            ErrorMetric::PointToPoint => 3,
            ErrorMetric::PointToPlane => 6,
        }
    }
}

impl FromStr for ErrorMetric {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "point-to-point" => Ok(ErrorMetric::PointToPoint),
            "point-to-plane" => Ok(ErrorMetric::PointToPlane),
            other => Err(ContextError::UnknownMetric(other.to_string())),
        }
    }
}

impl std::fmt::Display for ErrorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorMetric::PointToPoint => write!(f, "point-to-point"),
            ErrorMetric::PointToPlane => write!(f, "point-to-plane"),
        }
    }
}

/// Decimation applied to both clouds before aligning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subsampling {
    /// Whether to subsample at all.
    pub enabled: bool,
    /// Cell edge length for unorganized clouds.
    pub grid_size: f64,
    /// Column step for organized clouds.
    pub step_x: usize,
    /// Row step for organized clouds.
    pub step_y: usize,
}

impl Default for Subsampling {
    fn default() -> Self {
        Self {
            enabled: true,
            grid_size: 1.0,
            step_x: 8,
            step_y: 8,
        }
    }
}

impl Subsampling {
    /// Subsampling turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Configuration of one alignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentContext {
    /// Decimation applied before aligning.
    pub subsampling: Subsampling,
    /// Maximum number of iterations.
    pub max_iterations: usize,
    /// Absolute RMS error below which the alignment has converged.
    pub rms_error_threshold: f64,
    /// Relative RMS improvement, in percent, below which the alignment has converged.
    pub rms_error_relative_threshold: f64,
    /// Percentage of the moving points expected to overlap the fixed cloud.
    pub overlap: f64,
    /// Distance minimized by the aligner.
    pub error_metric: ErrorMetric,
    /// Fewest pairs an iteration may keep.
    pub min_point_pairs: usize,
    /// Neighbors used to estimate fixed-cloud normals.
    pub normal_neighbors: usize,
    /// Pairs farther apart are rejected. `None` uses the diagonal of the fixed cloud bounds.
    pub max_pair_distance: Option<f64>,
}

impl Default for AlignmentContext {
    fn default() -> Self {
        Self {
            subsampling: Subsampling::default(),
            max_iterations: 100,
            rms_error_threshold: 1e-9,
            rms_error_relative_threshold: 0.5,
            overlap: 95.0,
            error_metric: ErrorMetric::PointToPoint,
            min_point_pairs: 3,
            normal_neighbors: 10,
            max_pair_distance: None,
        }
    }
}

impl AlignmentContext {
    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), ContextError> {
        if !(self.overlap > 0.0 && self.overlap <= 100.0) {
            return Err(ContextError::InvalidOverlap(self.overlap));
        }
        if self.max_iterations == 0 {
            return Err(ContextError::ZeroIterations);
        }
        for (name, value) in [
            ("rms_error_threshold", self.rms_error_threshold),
            (
                "rms_error_relative_threshold",
                self.rms_error_relative_threshold,
            ),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ContextError::InvalidThreshold { name, value });
            }
        }
        if self.normal_neighbors < 3 {
            return Err(ContextError::InvalidNormalNeighbors(self.normal_neighbors));
        }
        if let Some(d) = self.max_pair_distance {
            if !(d > 0.0 && d.is_finite()) {
                return Err(ContextError::InvalidPairDistance(d));
            }
        }
        self.subsampler()?;
        Ok(())
    }

    /// The subsampler to run before aligning, if enabled.
    pub fn subsampler(&self) -> Result<Option<Subsampler>, ContextError> {
        if !self.subsampling.enabled {
            return Ok(None);
        }
        let Subsampling {
            grid_size,
            step_x,
            step_y,
            ..
        } = self.subsampling;
        Ok(Some(Subsampler::new(step_x, step_y, grid_size)?))
    }

    /// Fewest pairs an iteration may keep for the configured metric.
    pub fn required_pairs(&self) -> usize {
        self.min_point_pairs.max(self.error_metric.min_pairs())
    }

    /// Set the overlap percentage.
    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    /// Set the error metric.
    pub fn with_error_metric(mut self, error_metric: ErrorMetric) -> Self {
        self.error_metric = error_metric;
        self
    }

    /// Set the subsampling.
    pub fn with_subsampling(mut self, subsampling: Subsampling) -> Self {
        self.subsampling = subsampling;
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}
