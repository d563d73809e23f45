use argh::FromArgs;
use std::{path::PathBuf, process::ExitCode};

use stitch3d::{
    cloud::io::ply::{read_ply, write_ply},
    icp::{ErrorMetric, PipelineConfig, RegistrationStatus, StitchingPipeline},
};

mod viewer;
use viewer::{LogViewer, RerunViewer, Style, Viewer};

#[derive(FromArgs)]
/// Stitch two partial scans of an object into a single point cloud
struct Args {
    /// path to the fixed PLY point cloud
    #[argh(option)]
    fixed: PathBuf,

    /// path to the moving PLY point cloud
    #[argh(option)]
    moving: PathBuf,

    /// path to a JSON pipeline configuration
    #[argh(option)]
    config: Option<PathBuf>,

    /// cell size used to subsample unorganized clouds
    #[argh(option)]
    grid_size: Option<f64>,

    /// row and column step used to subsample organized clouds
    #[argh(option)]
    decimation_step: Option<usize>,

    /// maximum number of ICP iterations
    #[argh(option)]
    max_iterations: Option<usize>,

    /// relative RMS error improvement threshold, in percent
    #[argh(option)]
    rms_threshold: Option<f64>,

    /// expected overlap between the clouds, in percent
    #[argh(option)]
    overlap: Option<f64>,

    /// error metric: point-to-point or point-to-plane
    #[argh(option)]
    metric: Option<ErrorMetric>,

    /// path to write the merged point cloud
    #[argh(option)]
    output: Option<PathBuf>,

    /// log the clouds to a Rerun viewer
    #[argh(switch)]
    rerun: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        let context = &mut config.context;
        if let Some(grid_size) = self.grid_size {
            context.subsampling.grid_size = grid_size;
        }
        if let Some(step) = self.decimation_step {
            context.subsampling.step_x = step;
            context.subsampling.step_y = step;
        }
        if let Some(max_iterations) = self.max_iterations {
            context.max_iterations = max_iterations;
        }
        if let Some(threshold) = self.rms_threshold {
            context.rms_error_relative_threshold = threshold;
        }
        if let Some(overlap) = self.overlap {
            context.overlap = overlap;
        }
        if let Some(metric) = self.metric {
            context.error_metric = metric;
        }

        Ok(config)
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let pipeline = StitchingPipeline::new(args.pipeline_config()?)?;

    let fixed = read_ply(&args.fixed)?;
    let moving = read_ply(&args.moving)?;
    println!(
        "Read #{} fixed and #{} moving points",
        fixed.num_valid(),
        moving.num_valid()
    );

    let mut viewer: Box<dyn Viewer> = if args.rerun {
        Box::new(RerunViewer::spawn()?)
    } else {
        Box::new(LogViewer)
    };
    viewer.display("fixed", &fixed, Style::Fixed)?;
    viewer.display("moving", &moving, Style::Moving)?;

    let report = pipeline.run(&fixed, &moving)?;

    let result = report.final_result();
    println!("Registration status: {}", result.status());
    if let Some(registration) = result.registration() {
        let (axis, angle) = registration.transform.to_axis_angle();
        println!("RMS error: {:.6}", registration.rms_error);
        println!(
            "Iterations: {}, point pairs: {}",
            registration.num_iterations, registration.num_pairs
        );
        println!(
            "Rotation: {:.4} deg about {:?}, translation: {:?}",
            angle.to_degrees(),
            axis,
            registration.transform.translation()
        );
    }
    println!("Stitching time: {} ms", report.elapsed.as_millis());

    match report.status() {
        RegistrationStatus::NotInitialized | RegistrationStatus::NotEnoughPointPairs => {
            eprintln!("Point clouds could not be aligned");
            return Ok(ExitCode::FAILURE);
        }
        RegistrationStatus::MaxIterationsReached => {
            log::warn!("alignment stopped at the iteration limit, stitching anyway");
        }
        _ => {}
    }

    if let Some(merged) = &report.merged {
        println!("Merged #{} points", merged.len());
        viewer.display("merged", merged, Style::Merged)?;

        if let Some(output) = &args.output {
            write_ply(output, merged)?;
            println!("Wrote {}", output.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
