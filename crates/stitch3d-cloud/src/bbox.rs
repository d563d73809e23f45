use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box defined by its center and full extents.
///
/// Negative extents describe the same box as their absolute value, so a box
/// configured with a size of `[170.0, 200.0, -66.0]` spans 66 units along z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    center: [f64; 3],
    size: [f64; 3],
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            center: [0.0; 3],
            size: [0.0; 3],
        }
    }
}

impl BoundingBox {
    /// Create a box from its center and full size along each axis.
    pub fn from_center_size(center: [f64; 3], size: [f64; 3]) -> Self {
        Self { center, size }
    }

    /// Create the smallest box containing two opposite corners.
    pub fn from_corners(a: [f64; 3], b: [f64; 3]) -> Self {
        let center = std::array::from_fn(|i| 0.5 * (a[i] + b[i]));
        let size = std::array::from_fn(|i| (b[i] - a[i]).abs());
        Self { center, size }
    }

    /// The box center.
    pub fn center(&self) -> [f64; 3] {
        self.center
    }

    /// The full extents along each axis, always non-negative.
    pub fn size(&self) -> [f64; 3] {
        self.size.map(f64::abs)
    }

    /// Half the extents along each axis.
    pub fn half_size(&self) -> [f64; 3] {
        self.size().map(|s| 0.5 * s)
    }

    /// The corner with the smallest coordinates.
    pub fn min(&self) -> [f64; 3] {
        let h = self.half_size();
        std::array::from_fn(|i| self.center[i] - h[i])
    }

    /// The corner with the largest coordinates.
    pub fn max(&self) -> [f64; 3] {
        let h = self.half_size();
        std::array::from_fn(|i| self.center[i] + h[i])
    }

    /// Check whether a point lies inside or on the boundary of the box.
    ///
    /// Non-finite points are never contained.
    #[inline]
    pub fn contains(&self, point: &[f64; 3]) -> bool {
        let (min, max) = (self.min(), self.max());
        (0..3).all(|i| point[i] >= min[i] && point[i] <= max[i])
    }

    /// Signed distance from a point to the box surface.
    ///
    /// Negative inside, zero on the boundary, positive outside.
    pub fn signed_distance(&self, point: &[f64; 3]) -> f64 {
        let h = self.half_size();
        let q: [f64; 3] = std::array::from_fn(|i| (point[i] - self.center[i]).abs() - h[i]);
        let outside = q.iter().map(|v| v.max(0.0).powi(2)).sum::<f64>().sqrt();
        let inside = q[0].max(q[1]).max(q[2]).min(0.0);
        outside + inside
    }

    /// A box with the same center and each extent multiplied by `scale`.
    pub fn with_scaled_size(&self, scale: [f64; 3]) -> Self {
        Self {
            center: self.center,
            size: std::array::from_fn(|i| self.size[i] * scale[i]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_negative_extent_is_absolute() {
        let bbox = BoundingBox::from_center_size([0.0; 3], [170.0, 200.0, -66.0]);
        assert_eq!(bbox.size(), [170.0, 200.0, 66.0]);
        assert_eq!(bbox.min(), [-85.0, -100.0, -33.0]);
        assert_eq!(bbox.max(), [85.0, 100.0, 33.0]);
        assert!(bbox.contains(&[0.0, 0.0, -33.0]));
        assert!(!bbox.contains(&[0.0, 0.0, -33.1]));
    }

    #[test]
    fn test_contains_rejects_nan() {
        let bbox = BoundingBox::from_center_size([0.0; 3], [1.0; 3]);
        assert!(!bbox.contains(&[f64::NAN, 0.0, 0.0]));
    }

    #[test]
    fn test_signed_distance() {
        let bbox = BoundingBox::from_corners([0.0; 3], [2.0, 2.0, 2.0]);
        assert_relative_eq!(bbox.signed_distance(&[1.0, 1.0, 1.0]), -1.0);
        assert_relative_eq!(bbox.signed_distance(&[2.0, 1.0, 1.0]), 0.0);
        assert_relative_eq!(bbox.signed_distance(&[5.0, 1.0, 1.0]), 3.0);
        assert_relative_eq!(bbox.signed_distance(&[3.0, 3.0, 1.0]), 2.0_f64.sqrt());
    }

    #[test]
    fn test_with_scaled_size() {
        let bbox = BoundingBox::from_center_size([1.0, 2.0, 3.0], [170.0, 200.0, -66.0]);
        let scaled = bbox.with_scaled_size([1.0, 0.2, 1.0]);
        assert_eq!(scaled.center(), [1.0, 2.0, 3.0]);
        assert_relative_eq!(scaled.size()[1], 40.0);
        assert_relative_eq!(scaled.size()[2], 66.0);
    }
}
