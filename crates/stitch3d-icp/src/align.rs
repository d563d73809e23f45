use std::borrow::Cow;

use stitch3d_cloud::{pointcloud::PointCloud, transforms::RigidTransform};

use crate::{
    context::{AlignmentContext, ContextError, ErrorMetric},
    correspondence::{bounds_diagonal, find_correspondences, reject_by_overlap, rms_error},
    estimate::{estimate_point_to_plane, estimate_point_to_point},
    normals::estimate_normals,
    result::{Convergence, Registration, RegistrationResult},
    spatial::{KdTreeIndex, SpatialIndex},
};

/// Iterative Closest Point (ICP) alignment of two point clouds.
///
/// Both clouds are subsampled when the context enables it and stripped of
/// invalid points, a k-d tree is built over the fixed cloud and the iterations of
/// [`align_with_index`] run from `initial` (identity by default).
///
/// # Arguments
///
/// * `context` - The alignment configuration.
/// * `fixed` - The reference cloud.
/// * `moving` - The cloud to align onto `fixed`.
/// * `initial` - Initial transform from the moving to the fixed frame.
///
/// # Returns
///
/// The alignment outcome. Failures to align are reported in the result;
/// only an invalid context is an error. A cloud left without points by the
/// subsampling reports [`RegistrationResult::NotEnoughPointPairs`].
pub fn align(
    context: &AlignmentContext,
    fixed: &PointCloud,
    moving: &PointCloud,
    initial: Option<&RigidTransform>,
) -> Result<RegistrationResult, ContextError> {
    context.validate()?;

    let prepared = prepare(context, fixed)?;
    if prepared.is_empty() && fixed.num_valid() > 0 {
        log::warn!("subsampling left no fixed point");
        return Ok(no_point_pairs(context));
    }
    let index = KdTreeIndex::new(prepared.points().to_vec());

    align_with_index(context, &index, prepared.normals(), moving, initial)
}

/// ICP alignment against a prebuilt index over the fixed points.
///
/// The moving cloud is subsampled per context and stripped of invalid points.
/// `fixed_normals`, when given, holds one unit normal per indexed point and is
/// used by the point-to-plane metric; otherwise normals are estimated.
///
/// Each iteration pairs every moving point with its closest fixed point,
/// keeps the closest `overlap` percent, estimates the incremental transform
/// and composes it into the current estimate. The RMS error of the kept pairs
/// decides convergence.
pub fn align_with_index<I: SpatialIndex + ?Sized>(
    context: &AlignmentContext,
    index: &I,
    fixed_normals: Option<&[[f64; 3]]>,
    moving: &PointCloud,
    initial: Option<&RigidTransform>,
) -> Result<RegistrationResult, ContextError> {
    context.validate()?;

    let prepared = prepare(context, moving)?;
    if prepared.is_empty() && moving.num_valid() > 0 {
        log::warn!("subsampling left no moving point");
        return Ok(no_point_pairs(context));
    }
    let moving = prepared;
    if index.is_empty() || moving.is_empty() {
        log::warn!(
            "cannot align: {} fixed and {} moving points",
            index.len(),
            moving.len()
        );
        return Ok(RegistrationResult::NotInitialized);
    }

    let fixed_points = index.points();
    let normals: Option<Cow<[[f64; 3]]>> = match context.error_metric {
        ErrorMetric::PointToPoint => None,
        ErrorMetric::PointToPlane => Some(match fixed_normals {
            Some(normals) if normals.len() == index.len() => Cow::Borrowed(normals),
            _ => Cow::Owned(estimate_normals(index, context.normal_neighbors)),
        }),
    };

    let max_distance = context
        .max_pair_distance
        .or_else(|| bounds_diagonal(fixed_points).filter(|d| *d > 0.0));
    let required = context.required_pairs();

    log::debug!(
        "aligning {} moving points onto {} fixed points ({}, overlap {}%, max pair distance {:?})",
        moving.len(),
        index.len(),
        context.error_metric,
        context.overlap,
        max_distance
    );

    let mut transform = initial.copied().unwrap_or_default();
    let mut transformed = vec![[0.0; 3]; moving.len()];
    let mut prev_rms: Option<f64> = None;
    let mut last = None;

    for iteration in 1..=context.max_iterations {
        let now = std::time::Instant::now();

        // transform the moving points with the current estimate
        transform.transform_points(moving.points(), &mut transformed);

        // pair and keep the closest overlap percent
        let pairs = find_correspondences(&transformed, index, max_distance);
        let pairs = reject_by_overlap(pairs, transformed.len(), context.overlap);
        if pairs.len() < required {
            log::warn!(
                "iteration {}: {} point pairs, {} required",
                iteration,
                pairs.len(),
                required
            );
            return Ok(RegistrationResult::NotEnoughPointPairs {
                pairs: pairs.len(),
                required,
            });
        }
        let rms = rms_error(&pairs);

        // estimate the increment and update the estimate
        let increment = match normals.as_deref() {
            Some(normals) => estimate_point_to_plane(&transformed, fixed_points, normals, &pairs),
            None => estimate_point_to_point(&transformed, fixed_points, &pairs),
        };
        transform = increment.compose(&transform).orthonormalized();

        log::debug!(
            "iteration {}: {} pairs, rms {:.6e}, elapsed {:?}",
            iteration,
            pairs.len(),
            rms,
            now.elapsed()
        );

        let registration = Registration {
            transform,
            rms_error: rms,
            num_iterations: iteration,
            num_pairs: pairs.len(),
        };

        let criterion = if rms <= context.rms_error_threshold {
            Some(Convergence::RmsErrorThreshold)
        } else {
            prev_rms
                .filter(|prev| relative_improvement(*prev, rms) < context.rms_error_relative_threshold)
                .map(|_| Convergence::RmsErrorRelativeThreshold)
        };

        if let Some(criterion) = criterion {
            log::debug!(
                "converged after {} iterations ({:?}), rms {:.6e}",
                iteration,
                criterion,
                rms
            );
            return Ok(RegistrationResult::Converged {
                criterion,
                registration,
            });
        }

        prev_rms = Some(rms);
        last = Some(registration);
    }

    // max_iterations >= 1 was validated, so the loop ran at least once
    Ok(match last {
        Some(registration) => {
            log::warn!(
                "no convergence after {} iterations, rms {:.6e}",
                registration.num_iterations,
                registration.rms_error
            );
            RegistrationResult::MaxIterationsReached(registration)
        }
        None => RegistrationResult::NotInitialized,
    })
}

/// Relative RMS improvement in percent; a worsening counts as no improvement.
fn relative_improvement(prev: f64, rms: f64) -> f64 {
    if prev <= 0.0 {
        return 0.0;
    }
    (prev - rms) / prev * 100.0
}

/// The result of an alignment where one cloud has no point left to pair.
pub(crate) fn no_point_pairs(context: &AlignmentContext) -> RegistrationResult {
    RegistrationResult::NotEnoughPointPairs {
        pairs: 0,
        required: context.required_pairs(),
    }
}

/// Subsample per context, then drop invalid points.
///
/// Organized clouds are decimated on their grid before compaction loses it.
fn prepare(context: &AlignmentContext, cloud: &PointCloud) -> Result<PointCloud, ContextError> {
    Ok(match context.subsampler()? {
        Some(subsampler) => subsampler.subsample(cloud).compact(),
        None => cloud.compact(),
    })
}
