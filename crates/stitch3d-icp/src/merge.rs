use stitch3d_cloud::pointcloud::PointCloud;

use crate::result::{RegistrationResult, RegistrationStatus};

/// Error types for merging.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MergeError {
    /// The registration did not produce a transform.
    #[error("cannot merge clouds: registration status is '{0}'")]
    NoTransform(RegistrationStatus),
}

/// Merge the moving cloud into the fixed cloud using a registration result.
///
/// The valid fixed points are followed by the valid moving points mapped into
/// the fixed frame; normals are rotated along. Colors and normals are kept
/// only when both clouds carry them. No point is removed as a duplicate.
///
/// Results that reached the iteration cap are merged with a warning.
///
/// # Errors
///
/// Returns [`MergeError::NoTransform`] for results without a transform.
pub fn merge(
    result: &RegistrationResult,
    fixed: &PointCloud,
    moving: &PointCloud,
) -> Result<PointCloud, MergeError> {
    let transform = result
        .transform()
        .ok_or(MergeError::NoTransform(result.status()))?;

    if let RegistrationResult::MaxIterationsReached(registration) = result {
        log::warn!(
            "merging a registration that did not converge (rms {:.6e} after {} iterations)",
            registration.rms_error,
            registration.num_iterations
        );
    }

    let moved = moving.compact().transform(transform);
    let merged = fixed.compact().concat(&moved);

    log::debug!(
        "merged {} fixed and {} moving points",
        fixed.num_valid(),
        moving.num_valid()
    );

    Ok(merged)
}
