use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stitch3d_cloud::{
    bbox::BoundingBox, crop::crop, pointcloud::PointCloud, statistics::count_points_in_region,
    transforms::RigidTransform,
};

use crate::{
    align::{align, no_point_pairs},
    context::{AlignmentContext, ContextError, Subsampling},
    merge::{merge, MergeError},
    result::{RegistrationResult, RegistrationStatus},
};

/// Error types for the stitching pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid alignment configuration.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// A box overlap ratio is outside (0, 1].
    #[error("{name} must be in (0, 1], got {value}")]
    InvalidBoxOverlap {
        /// Name of the ratio.
        name: &'static str,
        /// Provided value.
        value: f64,
    },

    /// Merging failed.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The configuration file could not be read.
    #[error("failed to read configuration")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Clouds aligned by the refinement phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefinementInput {
    /// The complete clouds.
    #[default]
    FullClouds,
    /// Both clouds cropped to the overlap box.
    OverlapRegion,
}

/// Configuration of the two-phase stitching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Alignment configuration of the pre-registration.
    pub context: AlignmentContext,
    /// Center of the extraction box.
    pub box_center: [f64; 3],
    /// Size of the region scanned by each acquisition; negative extents count as positive.
    pub extraction_box_size: [f64; 3],
    /// Fraction of the extraction box height shared by the two scans.
    pub box_overlap: f64,
    /// Fraction of the extraction box height cropped for the pre-registration.
    pub box_used_overlap: f64,
    /// Clouds aligned by the refinement phase.
    pub refinement_input: RefinementInput,
    /// Disable subsampling during the refinement phase.
    pub refine_full_resolution: bool,
    /// Build the merged cloud.
    pub merge: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let box_overlap = 0.20;
        Self {
            context: AlignmentContext::default(),
            box_center: [0.0; 3],
            extraction_box_size: [170.0, 200.0, -66.0],
            box_overlap,
            box_used_overlap: 0.9 * box_overlap,
            refinement_input: RefinementInput::default(),
            refine_full_resolution: true,
            merge: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration; missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.context.validate()?;
        for (name, value) in [
            ("box_overlap", self.box_overlap),
            ("box_used_overlap", self.box_used_overlap),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipelineError::InvalidBoxOverlap { name, value });
            }
        }
        Ok(())
    }

    /// The region scanned by one acquisition.
    pub fn extraction_box(&self) -> BoundingBox {
        BoundingBox::from_center_size(self.box_center, self.extraction_box_size)
    }

    /// The region cropped for the pre-registration.
    pub fn pre_registration_box(&self) -> BoundingBox {
        self.extraction_box()
            .with_scaled_size([1.0, self.box_used_overlap, 1.0])
    }

    /// The region shared by the two scans.
    pub fn overlap_box(&self) -> BoundingBox {
        self.extraction_box()
            .with_scaled_size([1.0, self.box_overlap, 1.0])
    }
}

/// Outcome of a stitching run.
#[derive(Debug, Clone)]
pub struct StitchReport {
    /// Result of the coarse alignment of the cropped clouds.
    pub pre_registration: RegistrationResult,
    /// Result of the refinement, absent when the pre-registration failed.
    pub registration: Option<RegistrationResult>,
    /// Overlap percentage used by the refinement.
    pub refined_overlap: Option<f64>,
    /// Valid fixed points inside the overlap box.
    pub overlap_count: usize,
    /// Valid fixed points.
    pub total: usize,
    /// Time spent aligning and merging.
    pub elapsed: Duration,
    /// The merged cloud, when a transform was found and merging is enabled.
    pub merged: Option<PointCloud>,
}

impl StitchReport {
    /// The result of the last phase that ran.
    pub fn final_result(&self) -> &RegistrationResult {
        self.registration.as_ref().unwrap_or(&self.pre_registration)
    }

    /// The status of the last phase that ran.
    pub fn status(&self) -> RegistrationStatus {
        self.final_result().status()
    }
}

/// Refine the overlap percentage by the share of fixed points in the overlap region.
///
/// Returns `None` when the fixed cloud holds no valid point or no point lies
/// in the overlap region. The result is capped at 100.
pub fn refined_overlap(count: usize, total: usize, overlap: f64) -> Option<f64> {
    if total == 0 || count == 0 {
        return None;
    }
    Some((count as f64 / total as f64 * overlap).min(100.0))
}

/// Two-phase registration and merge of a pair of scans.
///
/// The pre-registration aligns the slices of both clouds inside a thin box
/// around the expected overlap. The refinement starts from that transform with
/// the overlap percentage scaled by the share of fixed points in the overlap
/// box.
#[derive(Debug, Clone)]
pub struct StitchingPipeline {
    config: PipelineConfig,
}

impl StitchingPipeline {
    /// Create a pipeline after validating its configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stitch `moving` onto `fixed`.
    ///
    /// Alignment failures are reported in the returned [`StitchReport`].
    pub fn run(&self, fixed: &PointCloud, moving: &PointCloud) -> Result<StitchReport, PipelineError> {
        let start = std::time::Instant::now();
        let config = &self.config;
        let total = fixed.num_valid();

        // phase 1: coarse alignment of the thin slices
        let pre_box = config.pre_registration_box();
        let fixed_slice = crop(fixed, &pre_box);
        let moving_slice = crop(moving, &pre_box);
        log::info!(
            "pre-registration on {} fixed and {} moving points",
            fixed_slice.num_valid(),
            moving_slice.num_valid()
        );
        let pre_registration = align_crops(
            &config.context,
            (fixed, &fixed_slice),
            (moving, &moving_slice),
            None,
        )?;
        log::info!("pre-registration: {}", describe(&pre_registration));

        let overlap_box = config.overlap_box();
        let overlap_count = count_points_in_region(fixed, &overlap_box);

        let mut report = StitchReport {
            pre_registration,
            registration: None,
            refined_overlap: None,
            overlap_count,
            total,
            elapsed: Duration::ZERO,
            merged: None,
        };

        let Some(initial) = pre_registration.transform() else {
            log::warn!("pre-registration failed, skipping refinement");
            report.elapsed = start.elapsed();
            return Ok(report);
        };

        // phase 2: refinement with the overlap scaled to the shared region
        let Some(overlap) = refined_overlap(overlap_count, total, config.context.overlap) else {
            log::warn!("no fixed point in the overlap region ({overlap_count} of {total})");
            report.registration = Some(no_point_pairs(&config.context));
            report.elapsed = start.elapsed();
            return Ok(report);
        };
        report.refined_overlap = Some(overlap);

        let mut context = config.context.clone().with_overlap(overlap);
        if config.refine_full_resolution {
            context = context.with_subsampling(Subsampling::disabled());
        }

        log::info!(
            "refinement with overlap {:.2}% ({} of {} fixed points in the overlap region)",
            overlap,
            overlap_count,
            total
        );
        let registration = match config.refinement_input {
            RefinementInput::FullClouds => align(&context, fixed, moving, Some(initial))?,
            RefinementInput::OverlapRegion => align_crops(
                &context,
                (fixed, &crop(fixed, &overlap_box)),
                (moving, &crop(moving, &overlap_box)),
                Some(initial),
            )?,
        };
        log::info!("refinement: {}", describe(&registration));
        report.registration = Some(registration);

        if config.merge && registration.transform().is_some() {
            report.merged = Some(merge(&registration, fixed, moving)?);
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }
}

/// Align two crops given with the clouds they were cut from.
///
/// A crop left without points while its cloud has some means the scans do not
/// overlap, reported as [`RegistrationResult::NotEnoughPointPairs`].
fn align_crops(
    context: &AlignmentContext,
    (fixed, fixed_crop): (&PointCloud, &PointCloud),
    (moving, moving_crop): (&PointCloud, &PointCloud),
    initial: Option<&RigidTransform>,
) -> Result<RegistrationResult, ContextError> {
    let emptied =
        |cloud: &PointCloud, cropped: &PointCloud| cloud.num_valid() > 0 && cropped.num_valid() == 0;
    if emptied(fixed, fixed_crop) || emptied(moving, moving_crop) {
        context.validate()?;
        log::warn!(
            "point clouds are not overlapping ({} fixed and {} moving points in the box)",
            fixed_crop.num_valid(),
            moving_crop.num_valid()
        );
        return Ok(no_point_pairs(context));
    }
    align(context, fixed_crop, moving_crop, initial)
}

fn describe(result: &RegistrationResult) -> String {
    match result.registration() {
        Some(r) => format!(
            "{} (rms {:.6}, {} iterations, {} pairs)",
            result.status(),
            r.rms_error,
            r.num_iterations,
            r.num_pairs
        ),
        None => result.status().to_string(),
    }
}
