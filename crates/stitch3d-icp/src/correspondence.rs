use glam::DVec3;
use rayon::prelude::*;

use crate::spatial::SpatialIndex;

/// A moving point paired with its closest fixed point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the moving points.
    pub moving_index: usize,
    /// Index into the fixed index points.
    pub fixed_index: usize,
    /// Squared distance between the two points.
    pub distance_squared: f64,
}

/// Pair every moving point with its nearest fixed point.
///
/// The search runs in parallel over the moving points. Pairs farther apart
/// than `max_distance` are dropped. The result is ordered by moving index.
pub fn find_correspondences<I: SpatialIndex + ?Sized>(
    moving_points: &[[f64; 3]],
    index: &I,
    max_distance: Option<f64>,
) -> Vec<Correspondence> {
    let max_distance_squared = max_distance.map_or(f64::INFINITY, |d| d * d);
    moving_points
        .par_iter()
        .enumerate()
        .filter_map(|(moving_index, p)| {
            let nn = index.nearest(p)?;
            (nn.distance_squared <= max_distance_squared).then_some(Correspondence {
                moving_index,
                fixed_index: nn.index,
                distance_squared: nn.distance_squared,
            })
        })
        .collect()
}

/// Keep the closest pairs covering `overlap` percent of the moving points.
///
/// The kept count is `round(num_moving * overlap / 100)`, capped at the number
/// of pairs. Ties are broken by moving index so the selection is deterministic.
pub fn reject_by_overlap(
    mut pairs: Vec<Correspondence>,
    num_moving: usize,
    overlap: f64,
) -> Vec<Correspondence> {
    let keep = ((num_moving as f64 * overlap / 100.0).round() as usize).min(pairs.len());
    if keep == pairs.len() {
        return pairs;
    }
    pairs.sort_by(|a, b| {
        a.distance_squared
            .total_cmp(&b.distance_squared)
            .then(a.moving_index.cmp(&b.moving_index))
    });
    pairs.truncate(keep);
    pairs
}

/// Root mean square distance of a set of pairs, zero when empty.
pub fn rms_error(pairs: &[Correspondence]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    (pairs.iter().map(|c| c.distance_squared).sum::<f64>() / pairs.len() as f64).sqrt()
}

/// Diagonal of the axis-aligned bounds of a set of points, `None` when empty.
///
/// Two points of overlapping scans are never farther apart than this, so it
/// serves as the default pair distance gate.
pub fn bounds_diagonal(points: &[[f64; 3]]) -> Option<f64> {
    let first = DVec3::from_array(*points.first()?);
    let (min, max) = points
        .iter()
        .map(|p| DVec3::from_array(*p))
        .fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
    Some(min.distance(max))
}
