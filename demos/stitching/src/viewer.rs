use stitch3d::cloud::{pointcloud::PointCloud, statistics::CloudStatistics};

/// How a displayed cloud is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Fixed,
    Moving,
    Merged,
}

impl Style {
    /// Fallback color for clouds without per-point colors.
    fn color(&self) -> [u8; 3] {
        match self {
            Style::Fixed => [0, 160, 255],
            Style::Moving => [255, 140, 0],
            Style::Merged => [200, 200, 200],
        }
    }
}

/// Fire-and-forget display of point clouds.
pub trait Viewer {
    fn display(
        &mut self,
        name: &str,
        cloud: &PointCloud,
        style: Style,
    ) -> Result<(), Box<dyn std::error::Error>>;
}

/// Logs a summary of every displayed cloud.
pub struct LogViewer;

impl Viewer for LogViewer {
    fn display(
        &mut self,
        name: &str,
        cloud: &PointCloud,
        style: Style,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let stats = CloudStatistics::compute(cloud);
        match (stats.bounds, stats.centroid) {
            (Some(bounds), Some(centroid)) => log::info!(
                "{name} ({style:?}): {} valid points, min {:?}, max {:?}, centroid {:?}",
                stats.num_valid,
                bounds.min(),
                bounds.max(),
                centroid
            ),
            _ => log::info!("{name} ({style:?}): no valid point"),
        }
        Ok(())
    }
}

/// Logs the clouds to a spawned Rerun viewer.
pub struct RerunViewer {
    rec: rerun::RecordingStream,
}

impl RerunViewer {
    pub fn spawn() -> Result<Self, Box<dyn std::error::Error>> {
        let rec = rerun::RecordingStreamBuilder::new("Point Cloud Stitching").spawn()?;
        Ok(Self { rec })
    }
}

impl Viewer for RerunViewer {
    fn display(
        &mut self,
        name: &str,
        cloud: &PointCloud,
        style: Style,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let cloud = cloud.compact();

        let points = cloud
            .points()
            .iter()
            .map(|p| rerun::Position3D::new(p[0] as f32, p[1] as f32, p[2] as f32))
            .collect::<Vec<_>>();

        let colors = match cloud.colors() {
            Some(colors) => colors
                .iter()
                .map(|c| rerun::Color::from_rgb(c[0], c[1], c[2]))
                .collect::<Vec<_>>(),
            None => {
                let [r, g, b] = style.color();
                vec![rerun::Color::from_rgb(r, g, b); points.len()]
            }
        };

        self.rec
            .log(name, &rerun::Points3D::new(points).with_colors(colors))?;

        Ok(())
    }
}
