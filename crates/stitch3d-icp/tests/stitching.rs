use std::ops::Range;

use stitch3d_cloud::{pointcloud::PointCloud, transforms::RigidTransform};
use stitch3d_icp::{
    align, merge, AlignmentContext, ErrorMetric, MergeError, PipelineConfig, RegistrationResult,
    RegistrationStatus, StitchingPipeline, Subsampling,
};

/// Smooth relief with broad features along both axes.
fn relief(x: f64, y: f64) -> f64 {
    12.0 * (x / 9.0).sin() + 10.0 * (y / 11.0).cos()
}

/// An organized scan over a unit lattice, one row per `y`.
fn scan(
    xs: Range<i32>,
    ys: Range<i32>,
    height: impl Fn(f64, f64) -> f64,
    pose: &RigidTransform,
) -> PointCloud {
    let width = xs.len();
    let rows = ys.len();
    let points = ys
        .flat_map(|y| xs.clone().map(move |x| (x as f64, y as f64)))
        .map(|(x, y)| pose.apply(&[x, y, height(x, y)]))
        .collect();
    PointCloud::organized(width, rows, points, None, None).unwrap()
}

/// Moving scans are taken from a pose rotated 5 degrees about z and shifted by 2 along x.
fn perturbation() -> RigidTransform {
    RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], 5.0_f64.to_radians(), [2.0, 0.0, 0.0])
        .unwrap()
}

fn z_angle_degrees(transform: &RigidTransform) -> f64 {
    let r = transform.rotation();
    r[1][0].atan2(r[0][0]).to_degrees()
}

#[test]
fn recovers_perturbation_of_overlapping_scans() -> Result<(), Box<dyn std::error::Error>> {
    let identity = RigidTransform::IDENTITY;
    let fixed = scan(-50..50, -50..50, |x, y| relief(x, y), &identity);
    // 80 of the 100 columns are shared with the fixed scan
    let moving = scan(-30..70, -50..50, |x, y| relief(x, y), &perturbation());
    assert_eq!(fixed.len(), 10_000);
    assert_eq!(moving.len(), 10_000);

    let context = AlignmentContext {
        overlap: 80.0,
        max_iterations: 100,
        rms_error_relative_threshold: 0.5,
        ..Default::default()
    }
    .with_error_metric(ErrorMetric::PointToPlane)
    .with_subsampling(Subsampling::disabled());

    let result = align(&context, &fixed, &moving, None)?;
    assert!(result.is_converged(), "status: {}", result.status());

    let registration = result.registration().ok_or("no registration")?;
    assert!(registration.num_iterations < 100);

    let expected = perturbation().inverse();
    let transform = registration.transform;
    assert!(transform.angular_distance(&expected).to_degrees() < 0.1);
    assert!(transform.translation_distance(&expected) < 0.01);
    assert!((z_angle_degrees(&transform) + 5.0).abs() < 0.1);

    let merged = merge(&result, &fixed, &moving)?;
    assert_eq!(merged.len(), 20_000);
    Ok(())
}

#[test]
fn flat_scans_still_produce_a_transform() -> Result<(), Box<dyn std::error::Error>> {
    // in-plane motion of a flat plane is unobservable, only check that stitching goes through
    let identity = RigidTransform::IDENTITY;
    let fixed = scan(-50..50, -50..50, |_, _| 0.0, &identity);
    let moving = scan(-30..70, -50..50, |_, _| 0.0, &perturbation());

    let context = AlignmentContext::default()
        .with_overlap(80.0)
        .with_subsampling(Subsampling::disabled());

    let result = align(&context, &fixed, &moving, None)?;
    assert!(result.status().has_transform(), "status: {}", result.status());

    let merged = merge(&result, &fixed, &moving)?;
    assert_eq!(merged.len(), 20_000);
    Ok(())
}

#[test]
fn non_overlapping_scans_cannot_be_merged() -> Result<(), Box<dyn std::error::Error>> {
    let identity = RigidTransform::IDENTITY;
    let fixed = scan(-20..20, -20..20, |x, y| relief(x, y), &identity);
    let far = RigidTransform::from_translation([1000.0, 0.0, 0.0]);
    let moving = scan(-20..20, -20..20, |x, y| relief(x, y), &far);

    let result = align(&AlignmentContext::default(), &fixed, &moving, None)?;
    assert!(matches!(
        result,
        RegistrationResult::NotEnoughPointPairs { pairs: 0, .. }
    ));
    assert_eq!(
        merge(&result, &fixed, &moving),
        Err(MergeError::NoTransform(
            RegistrationStatus::NotEnoughPointPairs
        ))
    );
    Ok(())
}

#[test]
fn two_phase_pipeline_stitches_scans() -> Result<(), Box<dyn std::error::Error>> {
    let identity = RigidTransform::IDENTITY;
    let fixed = scan(-40..40, -60..20, |x, y| relief(x, y), &identity);
    // rows -20..20 are seen by both scans
    let moving = scan(-40..40, -20..60, |x, y| relief(x, y), &perturbation());

    let mut config = PipelineConfig::default();
    config.context = config
        .context
        .with_error_metric(ErrorMetric::PointToPlane)
        .with_subsampling(Subsampling::disabled());

    let pipeline = StitchingPipeline::new(config)?;
    let report = pipeline.run(&fixed, &moving)?;

    assert!(report.pre_registration.status().has_transform());
    assert_eq!(report.total, 6400);
    assert_eq!(report.overlap_count, 3200);
    let refined = report.refined_overlap.ok_or("no refined overlap")?;
    assert!((refined - 47.5).abs() < 1e-9);

    let result = report.final_result();
    assert!(result.is_converged(), "status: {}", result.status());
    let transform = result.transform().ok_or("no transform")?;
    let expected = perturbation().inverse();
    assert!(transform.angular_distance(&expected).to_degrees() < 0.1);
    assert!(transform.translation_distance(&expected) < 0.01);

    let merged = report.merged.as_ref().ok_or("no merged cloud")?;
    assert_eq!(merged.len(), 12_800);
    Ok(())
}

#[test]
fn pipeline_reports_failure_without_overlap() -> Result<(), Box<dyn std::error::Error>> {
    let identity = RigidTransform::IDENTITY;
    let fixed = scan(-40..40, -60..20, |x, y| relief(x, y), &identity);
    // the moving scan lies entirely outside the boxes
    let moving = scan(-40..40, 150..200, |x, y| relief(x, y), &identity);

    let pipeline = StitchingPipeline::new(PipelineConfig::default())?;
    let report = pipeline.run(&fixed, &moving)?;

    assert_eq!(report.status(), RegistrationStatus::NotEnoughPointPairs);
    assert!(report.registration.is_none());
    assert!(report.merged.is_none());
    Ok(())
}

#[test]
fn pipeline_keeps_not_initialized_for_empty_input() -> Result<(), Box<dyn std::error::Error>> {
    let identity = RigidTransform::IDENTITY;
    let fixed = scan(-40..40, -60..20, |x, y| relief(x, y), &identity);

    let pipeline = StitchingPipeline::new(PipelineConfig::default())?;
    let report = pipeline.run(&fixed, &PointCloud::default())?;

    assert_eq!(report.status(), RegistrationStatus::NotInitialized);
    assert!(report.merged.is_none());
    Ok(())
}
