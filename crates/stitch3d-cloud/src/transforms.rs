use glam::{DMat3, DQuat, DVec3};

use crate::CloudError;

// Maximum deviation of R^T * R from identity accepted as a rotation.
const RIGIDITY_TOLERANCE: f64 = 1e-6;

/// Compute the rotation matrix from an axis and angle.
///
/// # Arguments
///
/// * `axis` - The axis of rotation. It does not need to be normalized.
/// * `angle` - The angle of rotation in radians.
///
/// # Returns
///
/// The row-major rotation matrix.
///
/// Example:
///
/// ```
/// use stitch3d_cloud::transforms::axis_angle_to_rotation_matrix;
///
/// let axis = [1.0, 0.0, 0.0];
/// let angle = std::f64::consts::PI / 2.0;
/// let rotation = axis_angle_to_rotation_matrix(&axis, angle).unwrap();
/// assert!((rotation[2][1] - 1.0).abs() < 1e-12);
/// ```
pub fn axis_angle_to_rotation_matrix(
    axis: &[f64; 3],
    angle: f64,
) -> Result<[[f64; 3]; 3], CloudError> {
    let rotation = rotation_from_axis_angle(axis, angle)?;
    Ok(rotation.transpose().to_cols_array_2d())
}

fn rotation_from_axis_angle(axis: &[f64; 3], angle: f64) -> Result<DMat3, CloudError> {
    let axis = DVec3::from_array(*axis);
    let length = axis.length();
    if !(length >= 1e-10 && length.is_finite()) {
        return Err(CloudError::ZeroAxis);
    }
    Ok(DMat3::from_axis_angle(axis / length, angle))
}

/// A rigid transform: rotation followed by translation, `p' = R * p + t`.
///
/// Registration results map points from the moving cloud frame into the fixed cloud frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    rotation: DMat3,
    translation: DVec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        rotation: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Create a transform from an axis-angle rotation and a translation.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::ZeroAxis`] if the axis has no direction.
    pub fn from_axis_angle(
        axis: &[f64; 3],
        angle: f64,
        translation: [f64; 3],
    ) -> Result<Self, CloudError> {
        Ok(Self {
            rotation: rotation_from_axis_angle(axis, angle)?,
            translation: DVec3::from_array(translation),
        })
    }

    /// Create a transform from a row-major rotation matrix and a translation.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::NotRigid`] if the matrix is not orthonormal with determinant +1.
    pub fn from_rotation_translation(
        rotation: [[f64; 3]; 3],
        translation: [f64; 3],
    ) -> Result<Self, CloudError> {
        let rotation = mat3_from_rows(&rotation);
        let err = orthonormality_error(&rotation);
        if !(err <= RIGIDITY_TOLERANCE) || rotation.determinant() <= 0.0 {
            return Err(CloudError::NotRigid(err));
        }
        Ok(Self {
            rotation,
            translation: DVec3::from_array(translation),
        })
    }

    /// Create a pure translation.
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            rotation: DMat3::IDENTITY,
            translation: DVec3::from_array(translation),
        }
    }

    /// The row-major rotation matrix.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        self.rotation.transpose().to_cols_array_2d()
    }

    /// The translation vector.
    pub fn translation(&self) -> [f64; 3] {
        self.translation.to_array()
    }

    /// Compose two transforms: the result applies `other` first, then `self`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// The inverse transform, `p = R^T * (p' - t)`.
    pub fn inverse(&self) -> RigidTransform {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Transform a single point.
    #[inline]
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*point) + self.translation).to_array()
    }

    /// Rotate a direction vector, ignoring the translation.
    #[inline]
    pub fn rotate_vector(&self, vector: &[f64; 3]) -> [f64; 3] {
        (self.rotation * DVec3::from_array(*vector)).to_array()
    }

    /// Transform a set of points.
    ///
    /// PRECONDITION: `dst_points` is pre-allocated with the same size as `src_points`.
    pub fn transform_points(&self, src_points: &[[f64; 3]], dst_points: &mut [[f64; 3]]) {
        assert_eq!(src_points.len(), dst_points.len());
        for (dst, src) in dst_points.iter_mut().zip(src_points.iter()) {
            *dst = self.apply(src);
        }
    }

    /// The 4x4 homogeneous matrix, row-major.
    pub fn to_homogeneous(&self) -> [[f64; 4]; 4] {
        let r = self.rotation();
        let t = self.translation;
        [
            [r[0][0], r[0][1], r[0][2], t.x],
            [r[1][0], r[1][1], r[1][2], t.y],
            [r[2][0], r[2][1], r[2][2], t.z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// The rotation as a unit axis and an angle in radians within `[0, pi]`.
    ///
    /// The identity rotation reports the z axis with a zero angle.
    pub fn to_axis_angle(&self) -> ([f64; 3], f64) {
        let (axis, angle) = DQuat::from_mat3(&self.rotation).normalize().to_axis_angle();
        // keep the angle in [0, pi] by flipping the axis
        let (axis, angle) = if angle > std::f64::consts::PI {
            (-axis, 2.0 * std::f64::consts::PI - angle)
        } else {
            (axis, angle)
        };
        if angle.abs() < 1e-15 || !axis.is_finite() {
            return ([0.0, 0.0, 1.0], 0.0);
        }
        (axis.to_array(), angle)
    }

    /// The rotation angle in radians within `[0, pi]`.
    pub fn rotation_angle(&self) -> f64 {
        let m = &self.rotation;
        let cos = (m.x_axis.x + m.y_axis.y + m.z_axis.z - 1.0) / 2.0;
        // |sin| from the skew-symmetric part, accurate for small angles
        let sin = 0.5
            * DVec3::new(
                m.y_axis.z - m.z_axis.y,
                m.z_axis.x - m.x_axis.z,
                m.x_axis.y - m.y_axis.x,
            )
            .length();
        sin.atan2(cos)
    }

    /// The angle in radians of the relative rotation between two transforms.
    pub fn angular_distance(&self, other: &RigidTransform) -> f64 {
        self.inverse().compose(other).rotation_angle()
    }

    /// The euclidean distance between the translations of two transforms.
    pub fn translation_distance(&self, other: &RigidTransform) -> f64 {
        self.translation.distance(other.translation)
    }

    /// Project the rotation back onto the rotation group.
    ///
    /// Composing many incremental rotations accumulates rounding errors; this
    /// keeps the rotation orthonormal.
    pub fn orthonormalized(&self) -> RigidTransform {
        Self {
            rotation: DMat3::from_quat(DQuat::from_mat3(&self.rotation).normalize()),
            translation: self.translation,
        }
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = RigidTransform;

    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        self.compose(&rhs)
    }
}

fn mat3_from_rows(rows: &[[f64; 3]; 3]) -> DMat3 {
    DMat3::from_cols_array_2d(rows).transpose()
}

fn orthonormality_error(m: &DMat3) -> f64 {
    (m.transpose() * *m - DMat3::IDENTITY)
        .to_cols_array()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axis_angle_to_rotation_matrix() -> Result<(), CloudError> {
        let axis = [1.0, 0.0, 0.0];
        let angle = std::f64::consts::PI / 2.0;
        let rotation = axis_angle_to_rotation_matrix(&axis, angle)?;
        let expected = [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]];
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(rotation[i][j], expected[i][j], epsilon = 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_zero_axis() {
        let res = axis_angle_to_rotation_matrix(&[0.0, 0.0, 0.0], 1.0);
        assert_eq!(res, Err(CloudError::ZeroAxis));
        let res = axis_angle_to_rotation_matrix(&[f64::NAN, 0.0, 1.0], 1.0);
        assert_eq!(res, Err(CloudError::ZeroAxis));
    }

    #[test]
    fn test_unnormalized_axis() -> Result<(), CloudError> {
        let angle = std::f64::consts::FRAC_PI_2;
        let rotation = axis_angle_to_rotation_matrix(&[0.0, 0.0, 2.0], angle)?;
        // x is rotated onto y
        assert_relative_eq!(rotation[0][0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(rotation[1][0], 1.0, epsilon = 1e-12);

        let transform = RigidTransform::from_axis_angle(&[0.0, 0.0, 2.0], angle, [0.0; 3])?;
        assert_eq!(transform.rotation(), rotation);
        Ok(())
    }

    #[test]
    fn test_compose_and_inverse() -> Result<(), CloudError> {
        let a = RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], 0.3, [1.0, 2.0, 3.0])?;
        let b = RigidTransform::from_axis_angle(&[1.0, 1.0, 0.0], -0.2, [0.5, 0.0, -1.0])?;
        let p = [0.3, -4.0, 2.5];

        let ab = a.compose(&b).apply(&p);
        let sequential = a.apply(&b.apply(&p));
        for i in 0..3 {
            assert_relative_eq!(ab[i], sequential[i], epsilon = 1e-12);
        }

        let back = a.inverse().apply(&a.apply(&p));
        for i in 0..3 {
            assert_relative_eq!(back[i], p[i], epsilon = 1e-12);
        }
        assert_relative_eq!(a.compose(&a.inverse()).rotation_angle(), 0.0, epsilon = 1e-7);
        Ok(())
    }

    #[test]
    fn test_from_rotation_translation_rejects_shear() {
        let shear = [[1.0, 0.2, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(matches!(
            RigidTransform::from_rotation_translation(shear, [0.0; 3]),
            Err(CloudError::NotRigid(_))
        ));
        let reflection = [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(RigidTransform::from_rotation_translation(reflection, [0.0; 3]).is_err());
    }

    #[test]
    fn test_axis_angle_roundtrip() -> Result<(), CloudError> {
        let t = RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], -0.1, [0.0; 3])?;
        let (axis, angle) = t.to_axis_angle();
        assert_relative_eq!(angle, 0.1, epsilon = 1e-9);
        assert_relative_eq!(axis[2], -1.0, epsilon = 1e-9);
        assert_relative_eq!(t.rotation_angle(), 0.1, epsilon = 1e-9);
        assert_eq!(RigidTransform::IDENTITY.to_axis_angle(), ([0.0, 0.0, 1.0], 0.0));
        Ok(())
    }

    #[test]
    fn test_homogeneous() -> Result<(), CloudError> {
        let t = RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], std::f64::consts::FRAC_PI_2, [1.0, 2.0, 3.0])?;
        let m = t.to_homogeneous();
        assert_relative_eq!(m[0][1], -1.0, epsilon = 1e-12);
        assert_relative_eq!(m[1][0], 1.0, epsilon = 1e-12);
        assert_eq!([m[0][3], m[1][3], m[2][3], m[3][3]], [1.0, 2.0, 3.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_orthonormalized_keeps_rotation() -> Result<(), CloudError> {
        let mut t = RigidTransform::from_axis_angle(&[0.3, -0.2, 1.0], 0.01, [0.1, 0.0, 0.0])?;
        for _ in 0..1000 {
            t = t.compose(&RigidTransform::from_axis_angle(&[0.3, -0.2, 1.0], 0.001, [0.0; 3])?);
        }
        let t = t.orthonormalized();
        assert!(RigidTransform::from_rotation_translation(t.rotation(), t.translation()).is_ok());
        assert_relative_eq!(t.rotation_angle(), 1.01, epsilon = 1e-6);
        Ok(())
    }
}
