use glam::DVec3;
use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rayon::prelude::*;

use crate::spatial::SpatialIndex;

/// Estimate the unit normal of every indexed point by PCA of its neighborhood.
///
/// The normal is the eigenvector of the smallest eigenvalue of the covariance
/// of the `k` nearest neighbors, oriented towards +z (the scanner side).
/// Points with fewer than three neighbors get `[0, 0, 1]`.
/// The computation is parallelized across points using rayon.
pub fn estimate_normals<I: SpatialIndex + ?Sized>(index: &I, k: usize) -> Vec<[f64; 3]> {
    let points = index.points();
    points
        .par_iter()
        .map(|p| {
            let neighbors = index.nearest_k(p, k);
            if neighbors.len() < 3 {
                return [0.0, 0.0, 1.0];
            }

            let centroid = neighbors
                .iter()
                .map(|nn| DVec3::from_array(points[nn.index]))
                .sum::<DVec3>()
                / neighbors.len() as f64;

            let mut covariance = Matrix3::<f64>::zeros();
            for nn in &neighbors {
                let d = DVec3::from_array(points[nn.index]) - centroid;
                let d = Vector3::new(d.x, d.y, d.z);
                covariance += d * d.transpose();
            }

            let eigen = SymmetricEigen::new(covariance);
            let smallest = eigen
                .eigenvalues
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map_or(2, |(i, _)| i);
            let normal = eigen.eigenvectors.column(smallest);
            let mut normal = DVec3::new(normal[0], normal[1], normal[2]).normalize_or_zero();
            if normal == DVec3::ZERO {
                return [0.0, 0.0, 1.0];
            }
            if normal.z < 0.0 {
                normal = -normal;
            }
            normal.to_array()
        })
        .collect()
}
