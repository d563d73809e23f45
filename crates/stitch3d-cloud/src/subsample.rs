use std::collections::HashSet;

use crate::{
    pointcloud::{is_valid_point, CloudLayout, PointCloud},
    CloudError,
};

/// Point cloud decimation.
///
/// Organized clouds are decimated on their grid; unorganized clouds are
/// decimated by keeping the first point falling in each cubic cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subsampler {
    step_x: usize,
    step_y: usize,
    grid_size: f64,
}

impl Subsampler {
    /// Creates a new subsampler.
    ///
    /// # Arguments
    ///
    /// * `step_x` - Column step for organized clouds.
    /// * `step_y` - Row step for organized clouds.
    /// * `grid_size` - Edge length of the cells used for unorganized clouds.
    ///
    /// # Errors
    ///
    /// Fails if a step is zero or the grid size is not positive and finite.
    pub fn new(step_x: usize, step_y: usize, grid_size: f64) -> Result<Self, CloudError> {
        if step_x == 0 {
            return Err(CloudError::InvalidStep(step_x));
        }
        if step_y == 0 {
            return Err(CloudError::InvalidStep(step_y));
        }
        if !(grid_size > 0.0 && grid_size.is_finite()) {
            return Err(CloudError::InvalidGridSize(grid_size));
        }
        Ok(Self {
            step_x,
            step_y,
            grid_size,
        })
    }

    /// Decimate a point cloud, returning a new cloud.
    pub fn subsample(&self, cloud: &PointCloud) -> PointCloud {
        match cloud.layout() {
            CloudLayout::Organized { width, height } => self.decimate_grid(cloud, width, height),
            CloudLayout::Unorganized => self.decimate_cells(cloud),
        }
    }

    fn decimate_grid(&self, cloud: &PointCloud, width: usize, height: usize) -> PointCloud {
        let new_width = width.div_ceil(self.step_x);
        let new_height = height.div_ceil(self.step_y);

        let indices = (0..height)
            .step_by(self.step_y)
            .flat_map(|row| (0..width).step_by(self.step_x).map(move |col| row * width + col))
            .collect::<Vec<_>>();

        cloud
            .select(&indices)
            .with_layout(CloudLayout::Organized {
                width: new_width,
                height: new_height,
            })
    }

    fn decimate_cells(&self, cloud: &PointCloud) -> PointCloud {
        let mut occupied = HashSet::new();
        let indices = cloud
            .points()
            .iter()
            .enumerate()
            .filter(|(_, p)| is_valid_point(p))
            .filter(|(_, p)| occupied.insert(self.cell_of(p)))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        log::trace!(
            "grid decimation kept {} of {} points",
            indices.len(),
            cloud.len()
        );

        cloud.select(&indices)
    }

    fn cell_of(&self, point: &[f64; 3]) -> (i64, i64, i64) {
        (
            (point[0] / self.grid_size).floor() as i64,
            (point[1] / self.grid_size).floor() as i64,
            (point[2] / self.grid_size).floor() as i64,
        )
    }
}
