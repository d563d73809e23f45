use glam::DVec3;
use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use stitch3d_cloud::transforms::RigidTransform;

use crate::correspondence::Correspondence;

/// Best rigid transform moving the paired moving points onto their fixed partners.
///
/// Closed-form least squares solution from the SVD of the cross-covariance
/// matrix, with the reflection case corrected. Degenerate inputs yield the
/// identity.
///
/// # Arguments
///
/// * `moving` - The moving points, in their current pose.
/// * `fixed` - The fixed points.
/// * `pairs` - Pairs indexing into `moving` and `fixed`.
pub fn estimate_point_to_point(
    moving: &[[f64; 3]],
    fixed: &[[f64; 3]],
    pairs: &[Correspondence],
) -> RigidTransform {
    if pairs.len() < 3 {
        return RigidTransform::IDENTITY;
    }

    // compute centroids
    let n = pairs.len() as f64;
    let (mut src_centroid, mut dst_centroid) = (Vector3::zeros(), Vector3::zeros());
    for c in pairs {
        src_centroid += Vector3::from(moving[c.moving_index]);
        dst_centroid += Vector3::from(fixed[c.fixed_index]);
    }
    src_centroid /= n;
    dst_centroid /= n;

    // compute covariance matrix H = Σ[(src - src_mean) * (dst - dst_mean)^T]
    let mut h = Matrix3::<f64>::zeros();
    for c in pairs {
        let src = Vector3::from(moving[c.moving_index]) - src_centroid;
        let dst = Vector3::from(fixed[c.fixed_index]) - dst_centroid;
        h += src * dst.transpose();
    }

    let svd = h.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        log::warn!("SVD of the cross-covariance matrix failed");
        return RigidTransform::IDENTITY;
    };

    // R = V * U^T, flipping the axis of the smallest singular value on reflection
    let mut v = v_t.transpose();
    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        let flipped = -v.column(2);
        v.set_column(2, &flipped);
        r = v * u.transpose();
    }

    let t = dst_centroid - r * src_centroid;

    RigidTransform::from_rotation_translation(to_rows(&r), [t.x, t.y, t.z])
        .unwrap_or(RigidTransform::IDENTITY)
}

/// Rigid transform minimizing the point-to-plane distances of the pairs.
///
/// Solves the small-angle linearization `[s x n, n] . [w, t] = (d - s) . n`
/// as 6x6 normal equations, centered on the moving centroid and lightly
/// regularized for rank-deficient geometry. Degenerate inputs yield the identity.
///
/// # Arguments
///
/// * `moving` - The moving points, in their current pose.
/// * `fixed` - The fixed points.
/// * `fixed_normals` - Unit normals of the fixed points.
/// * `pairs` - Pairs indexing into `moving` and `fixed`.
pub fn estimate_point_to_plane(
    moving: &[[f64; 3]],
    fixed: &[[f64; 3]],
    fixed_normals: &[[f64; 3]],
    pairs: &[Correspondence],
) -> RigidTransform {
    if pairs.len() < 6 {
        return RigidTransform::IDENTITY;
    }

    let center = pairs
        .iter()
        .map(|c| DVec3::from_array(moving[c.moving_index]))
        .sum::<DVec3>()
        / pairs.len() as f64;

    // build the 6x6 normal equations: A^T A x = A^T b
    let mut ata = Matrix6::<f64>::zeros();
    let mut atb = Vector6::<f64>::zeros();
    for c in pairs {
        let s = DVec3::from_array(moving[c.moving_index]) - center;
        let d = DVec3::from_array(fixed[c.fixed_index]) - center;
        let n = DVec3::from_array(fixed_normals[c.fixed_index]);
        if !n.is_finite() {
            continue;
        }
        let sxn = s.cross(n);
        let a = Vector6::new(sxn.x, sxn.y, sxn.z, n.x, n.y, n.z);
        let b = (d - s).dot(n);
        ata += a * a.transpose();
        atb += a * b;
    }

    // Tikhonov regularization, scaled by the largest diagonal entry
    let diag_max = (0..6).map(|i| ata[(i, i)].abs()).fold(0.0_f64, f64::max);
    let lambda = 1e-6 * diag_max.max(1e-12);
    for i in 0..6 {
        ata[(i, i)] += lambda;
    }

    let x = match ata.cholesky() {
        Some(chol) => chol.solve(&atb),
        None => match ata.lu().solve(&atb) {
            Some(sol) => sol,
            None => {
                log::warn!("point-to-plane normal equations are singular");
                return RigidTransform::IDENTITY;
            }
        },
    };
    if !x.iter().all(|v| v.is_finite()) {
        return RigidTransform::IDENTITY;
    }

    let omega = DVec3::new(x[0], x[1], x[2]);
    let t_centered = DVec3::new(x[3], x[4], x[5]);
    let angle = omega.length();
    let rotation = if angle > 1e-15 {
        RigidTransform::from_axis_angle(&omega.to_array(), angle, [0.0; 3])
            .unwrap_or(RigidTransform::IDENTITY)
    } else {
        RigidTransform::IDENTITY
    };

    // the solution is centered: p' = R (p - c) + c + t
    let rotated_center = DVec3::from_array(rotation.apply(&center.to_array()));
    let translation = center - rotated_center + t_centered;

    RigidTransform::from_translation(translation.to_array()).compose(&rotation)
}

fn to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn identity_pairs(n: usize) -> Vec<Correspondence> {
        (0..n)
            .map(|i| Correspondence {
                moving_index: i,
                fixed_index: i,
                distance_squared: 0.0,
            })
            .collect()
    }

    fn assert_same_transform(a: &RigidTransform, b: &RigidTransform, eps: f64) {
        assert!(a.angular_distance(b) < eps, "rotation differs: {a:?} vs {b:?}");
        assert!(a.translation_distance(b) < eps, "translation differs: {a:?} vs {b:?}");
    }

    #[test]
    fn test_point_to_point_exact() -> Result<(), Box<dyn std::error::Error>> {
        let mut rng = StdRng::seed_from_u64(3);
        let moving = (0..100)
            .map(|_| {
                [
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                    rng.random_range(-5.0..5.0),
                ]
            })
            .collect::<Vec<[f64; 3]>>();
        let expected = RigidTransform::from_axis_angle(&[1.0, 0.5, -0.2], 0.7, [0.1, -2.0, 3.0])?;
        let mut fixed = vec![[0.0; 3]; moving.len()];
        expected.transform_points(&moving, &mut fixed);

        let estimated = estimate_point_to_point(&moving, &fixed, &identity_pairs(moving.len()));
        assert_same_transform(&estimated, &expected, 1e-9);
        Ok(())
    }

    #[test]
    fn test_point_to_point_planar_no_reflection() -> Result<(), Box<dyn std::error::Error>> {
        // coplanar points make the SVD ambiguous up to a reflection
        let moving = (0..5)
            .flat_map(|i| (0..5).map(move |j| [i as f64, j as f64, 0.0]))
            .collect::<Vec<_>>();
        let expected = RigidTransform::from_axis_angle(&[0.0, 0.0, 1.0], 0.3, [1.0, 0.0, 0.0])?;
        let mut fixed = vec![[0.0; 3]; moving.len()];
        expected.transform_points(&moving, &mut fixed);

        let estimated = estimate_point_to_point(&moving, &fixed, &identity_pairs(moving.len()));
        assert_same_transform(&estimated, &expected, 1e-9);
        Ok(())
    }

    #[test]
    fn test_point_to_point_too_few_pairs() {
        let points = vec![[0.0; 3], [1.0, 0.0, 0.0]];
        let t = estimate_point_to_point(&points, &points, &identity_pairs(2));
        assert_eq!(t, RigidTransform::IDENTITY);
    }

    #[test]
    fn test_point_to_plane_small_motion() -> Result<(), Box<dyn std::error::Error>> {
        // a curved surface so every degree of freedom is observable
        let surface = |x: f64, y: f64| 0.05 * x * x - 0.03 * y * y + 0.02 * x * y;
        let normal = |x: f64, y: f64| {
            let n = DVec3::new(-(0.1 * x + 0.02 * y), -(-0.06 * y + 0.02 * x), 1.0).normalize();
            n.to_array()
        };
        let fixed = (-10..=10)
            .flat_map(|i| (-10..=10).map(move |j| [i as f64, j as f64, surface(i as f64, j as f64)]))
            .collect::<Vec<_>>();
        let normals = fixed.iter().map(|p| normal(p[0], p[1])).collect::<Vec<_>>();

        let motion = RigidTransform::from_axis_angle(&[0.2, -0.1, 1.0], 0.002, [0.001, -0.002, 0.001])?;
        let mut moving = vec![[0.0; 3]; fixed.len()];
        motion.inverse().transform_points(&fixed, &mut moving);

        let estimated =
            estimate_point_to_plane(&moving, &fixed, &normals, &identity_pairs(fixed.len()));
        // one linearized step recovers a tiny motion almost exactly
        assert!(estimated.angular_distance(&motion) < 1e-4);
        assert!(estimated.translation_distance(&motion) < 1e-4);
        assert_relative_eq!(estimated.rotation_angle(), 0.002, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn test_point_to_plane_identity_when_aligned() {
        let fixed = (0..10)
            .flat_map(|i| (0..10).map(move |j| [i as f64, j as f64, (i * j) as f64 * 0.1]))
            .collect::<Vec<_>>();
        let normals = vec![[0.0, 0.0, 1.0]; fixed.len()];
        let t = estimate_point_to_plane(&fixed, &fixed, &normals, &identity_pairs(fixed.len()));
        assert!(t.rotation_angle() < 1e-12);
        assert!(t.translation_distance(&RigidTransform::IDENTITY) < 1e-12);
    }
}
