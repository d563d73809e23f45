use crate::{transforms::RigidTransform, CloudError};

/// Placeholder stored in organized clouds for samples without a measurement.
pub const INVALID_POINT: [f64; 3] = [f64::NAN; 3];

/// Check whether a point holds a measurement (all coordinates finite).
#[inline]
pub fn is_valid_point(point: &[f64; 3]) -> bool {
    point.iter().all(|v| v.is_finite())
}

/// Memory layout of a point cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloudLayout {
    /// Flat list of points.
    #[default]
    Unorganized,
    /// Row-major grid of points, as produced by structured-light or laser profile scanners.
    Organized {
        /// Number of columns.
        width: usize,
        /// Number of rows.
        height: usize,
    },
}

/// A point cloud with points, colors, and normals.
///
/// Organized clouds keep one entry per grid cell; cells without a measurement
/// hold [`INVALID_POINT`]. Every processing stage skips invalid entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in the point cloud.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The normals of the points.
    normals: Option<Vec<[f64; 3]>>,
    // Flat list or grid.
    layout: CloudLayout,
}

impl PointCloud {
    /// Create a new unorganized point cloud from points, colors (optional), and normals (optional).
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::AttributeLength`] if an attribute does not have one entry per point.
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, CloudError> {
        check_attributes(points.len(), colors.as_deref(), normals.as_deref())?;
        Ok(Self {
            points,
            colors,
            normals,
            layout: CloudLayout::Unorganized,
        })
    }

    /// Create an unorganized point cloud holding positions only.
    pub fn from_points(points: Vec<[f64; 3]>) -> Self {
        Self {
            points,
            colors: None,
            normals: None,
            layout: CloudLayout::Unorganized,
        }
    }

    /// Create an organized point cloud from a row-major grid of `height` rows and `width` columns.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::LayoutMismatch`] if `width * height != points.len()` and
    /// [`CloudError::AttributeLength`] if an attribute does not have one entry per point.
    pub fn organized(
        width: usize,
        height: usize,
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
    ) -> Result<Self, CloudError> {
        if width.checked_mul(height) != Some(points.len()) {
            return Err(CloudError::LayoutMismatch {
                width,
                height,
                len: points.len(),
            });
        }
        check_attributes(points.len(), colors.as_deref(), normals.as_deref())?;
        Ok(Self {
            points,
            colors,
            normals,
            layout: CloudLayout::Organized { width, height },
        })
    }

    pub(crate) fn from_parts(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        normals: Option<Vec<[f64; 3]>>,
        layout: CloudLayout,
    ) -> Self {
        debug_assert!(check_attributes(points.len(), colors.as_deref(), normals.as_deref()).is_ok());
        Self {
            points,
            colors,
            normals,
            layout,
        }
    }

    pub(crate) fn with_layout(mut self, layout: CloudLayout) -> Self {
        debug_assert!(match layout {
            CloudLayout::Organized { width, height } => width * height == self.points.len(),
            CloudLayout::Unorganized => true,
        });
        self.layout = layout;
        self
    }

    /// Attach per-point normals, replacing any existing ones.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::AttributeLength`] if `normals` does not have one entry per point.
    pub fn with_normals(mut self, normals: Vec<[f64; 3]>) -> Result<Self, CloudError> {
        check_attributes(self.points.len(), None, Some(&normals))?;
        self.normals = Some(normals);
        Ok(self)
    }

    /// Get the number of entries in the point cloud, invalid grid cells included.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get the number of valid points.
    pub fn num_valid(&self) -> usize {
        self.points.iter().filter(|p| is_valid_point(p)).count()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the normals of the points in the point cloud.
    pub fn normals(&self) -> Option<&[[f64; 3]]> {
        self.normals.as_deref()
    }

    /// Get the layout of the point cloud.
    pub fn layout(&self) -> CloudLayout {
        self.layout
    }

    /// Check whether the cloud is a grid.
    pub fn is_organized(&self) -> bool {
        matches!(self.layout, CloudLayout::Organized { .. })
    }

    /// Iterate over the indices of the valid points.
    pub fn valid_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| is_valid_point(p))
            .map(|(i, _)| i)
    }

    /// Build a new unorganized cloud from the entries at `indices`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> PointCloud {
        let points = indices.iter().map(|&i| self.points[i]).collect();
        let colors = self
            .colors
            .as_ref()
            .map(|c| indices.iter().map(|&i| c[i]).collect());
        let normals = self
            .normals
            .as_ref()
            .map(|n| indices.iter().map(|&i| n[i]).collect());
        Self::from_parts(points, colors, normals, CloudLayout::Unorganized)
    }

    /// Drop the invalid entries, returning an unorganized cloud of valid points.
    pub fn compact(&self) -> PointCloud {
        if !self.is_organized() && self.points.iter().all(is_valid_point) {
            return self.clone();
        }
        let indices = self.valid_indices().collect::<Vec<_>>();
        self.select(&indices)
    }

    /// Apply a rigid transform to every point and normal, keeping the layout.
    pub fn transform(&self, transform: &RigidTransform) -> PointCloud {
        let mut points = vec![[0.0; 3]; self.points.len()];
        transform.transform_points(&self.points, &mut points);
        let normals = self
            .normals
            .as_ref()
            .map(|n| n.iter().map(|v| transform.rotate_vector(v)).collect());
        Self::from_parts(points, self.colors.clone(), normals, self.layout)
    }

    /// Concatenate two clouds into a new unorganized cloud.
    ///
    /// Colors and normals are kept only when both clouds carry them.
    pub fn concat(&self, other: &PointCloud) -> PointCloud {
        let mut points = Vec::with_capacity(self.len() + other.len());
        points.extend_from_slice(&self.points);
        points.extend_from_slice(&other.points);

        let colors = match (&self.colors, &other.colors) {
            (Some(a), Some(b)) => Some([a.as_slice(), b.as_slice()].concat()),
            _ => None,
        };
        let normals = match (&self.normals, &other.normals) {
            (Some(a), Some(b)) => Some([a.as_slice(), b.as_slice()].concat()),
            _ => None,
        };

        Self::from_parts(points, colors, normals, CloudLayout::Unorganized)
    }
}

fn check_attributes(
    len: usize,
    colors: Option<&[[u8; 3]]>,
    normals: Option<&[[f64; 3]]>,
) -> Result<(), CloudError> {
    if let Some(colors) = colors {
        if colors.len() != len {
            return Err(CloudError::AttributeLength {
                attribute: "colors",
                expected: len,
                actual: colors.len(),
            });
        }
    }
    if let Some(normals) = normals {
        if normals.len() != len {
            return Err(CloudError::AttributeLength {
                attribute: "normals",
                expected: len,
                actual: normals.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointcloud() -> Result<(), CloudError> {
        let pointcloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            Some(vec![[255, 0, 0], [0, 255, 0]]),
            Some(vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
        )?;

        assert_eq!(pointcloud.len(), 2);
        assert_eq!(pointcloud.num_valid(), 2);
        assert_eq!(pointcloud.layout(), CloudLayout::Unorganized);
        assert_eq!(pointcloud.colors().map(|c| c.len()), Some(2));
        assert_eq!(pointcloud.normals().map(|n| n.len()), Some(2));
        assert_eq!(pointcloud.points()[1], [1.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_attribute_length_mismatch() {
        let res = PointCloud::new(vec![[0.0; 3]; 3], Some(vec![[0; 3]; 2]), None);
        assert_eq!(
            res,
            Err(CloudError::AttributeLength {
                attribute: "colors",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_organized_layout_mismatch() {
        let res = PointCloud::organized(2, 2, vec![[0.0; 3]; 3], None, None);
        assert!(matches!(res, Err(CloudError::LayoutMismatch { .. })));
    }

    #[test]
    fn test_compact_drops_invalid() -> Result<(), CloudError> {
        let cloud = PointCloud::organized(
            2,
            2,
            vec![[0.0; 3], INVALID_POINT, [1.0, 1.0, 1.0], INVALID_POINT],
            Some(vec![[1, 1, 1], [0, 0, 0], [2, 2, 2], [0, 0, 0]]),
            None,
        )?;
        assert_eq!(cloud.len(), 4);
        assert_eq!(cloud.num_valid(), 2);

        let compact = cloud.compact();
        assert!(!compact.is_organized());
        assert_eq!(compact.points(), &[[0.0; 3], [1.0, 1.0, 1.0]]);
        assert_eq!(compact.colors(), Some(&[[1, 1, 1], [2, 2, 2]][..]));
        Ok(())
    }

    #[test]
    fn test_transform_is_independent_copy() -> Result<(), CloudError> {
        let cloud = PointCloud::new(vec![[1.0, 0.0, 0.0]], None, Some(vec![[1.0, 0.0, 0.0]]))?;
        let rot = RigidTransform::from_axis_angle(
            &[0.0, 0.0, 1.0],
            std::f64::consts::FRAC_PI_2,
            [0.0, 0.0, 1.0],
        )?;
        let moved = cloud.transform(&rot);

        approx::assert_abs_diff_eq!(moved.points()[0][0], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(moved.points()[0][1], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(moved.points()[0][2], 1.0, epsilon = 1e-12);
        // normals rotate but do not translate
        let n = moved.normals().map(|n| n[0]).unwrap_or_default();
        approx::assert_abs_diff_eq!(n[1], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(n[2], 0.0, epsilon = 1e-12);
        assert_eq!(cloud.points()[0], [1.0, 0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_concat_keeps_shared_attributes_only() -> Result<(), CloudError> {
        let a = PointCloud::new(vec![[0.0; 3]], Some(vec![[9, 9, 9]]), None)?;
        let b = PointCloud::new(vec![[1.0; 3], [2.0; 3]], Some(vec![[1, 2, 3]; 2]), Some(vec![[0.0, 0.0, 1.0]; 2]))?;
        let c = a.concat(&b);
        assert_eq!(c.len(), 3);
        assert_eq!(c.colors().map(|c| c.len()), Some(3));
        assert!(c.normals().is_none());
        Ok(())
    }
}
