/// Error types for point cloud construction and processing.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CloudError {
    /// A per-point attribute does not have one entry per point.
    #[error("{attribute} has {actual} entries but the cloud has {expected} points")]
    AttributeLength {
        /// Name of the attribute.
        attribute: &'static str,
        /// Number of points in the cloud.
        expected: usize,
        /// Number of attribute entries provided.
        actual: usize,
    },

    /// The organized grid size does not match the number of points.
    #[error("organized layout {width}x{height} does not hold {len} points")]
    LayoutMismatch {
        /// Grid width.
        width: usize,
        /// Grid height.
        height: usize,
        /// Number of points provided.
        len: usize,
    },

    /// Decimation step must be at least one.
    #[error("decimation step must be at least 1, got {0}")]
    InvalidStep(usize),

    /// Grid cell size must be positive and finite.
    #[error("grid size must be positive and finite, got {0}")]
    InvalidGridSize(f64),

    /// Rotation axis has zero length.
    #[error("cannot compute rotation matrix from a zero vector")]
    ZeroAxis,

    /// The matrix is not a proper rotation (orthonormal, determinant +1).
    #[error("matrix is not a rigid rotation (orthonormality error {0:e})")]
    NotRigid(f64),
}
