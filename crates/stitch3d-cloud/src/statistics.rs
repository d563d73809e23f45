use crate::{
    bbox::BoundingBox,
    pointcloud::{is_valid_point, PointCloud},
};

/// Count the valid points of a cloud inside a region.
///
/// A point counts when its signed distance to the box is not positive,
/// so points on the boundary are included.
pub fn count_points_in_region(cloud: &PointCloud, region: &BoundingBox) -> usize {
    cloud
        .points()
        .iter()
        .filter(|p| is_valid_point(p) && region.signed_distance(p) <= 0.0)
        .count()
}

/// Summary of the valid points of a cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudStatistics {
    /// Number of valid points.
    pub num_valid: usize,
    /// Number of stored entries, invalid grid cells included.
    pub num_entries: usize,
    /// Tight bounds of the valid points, `None` for clouds without valid points.
    pub bounds: Option<BoundingBox>,
    /// Mean of the valid points, `None` for clouds without valid points.
    pub centroid: Option<[f64; 3]>,
}

impl CloudStatistics {
    /// Compute the statistics of a cloud in a single pass.
    pub fn compute(cloud: &PointCloud) -> Self {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        let mut sum = [0.0; 3];
        let mut num_valid = 0;

        for p in cloud.points().iter().filter(|p| is_valid_point(p)) {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
                sum[i] += p[i];
            }
            num_valid += 1;
        }

        let (bounds, centroid) = if num_valid > 0 {
            let n = num_valid as f64;
            (
                Some(BoundingBox::from_corners(min, max)),
                Some(sum.map(|s| s / n)),
            )
        } else {
            (None, None)
        };

        Self {
            num_valid,
            num_entries: cloud.len(),
            bounds,
            centroid,
        }
    }
}
