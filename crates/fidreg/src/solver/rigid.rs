//! Closed-form rigid landmark fit (Kabsch / orthogonal Procrustes).

use nalgebra::{Matrix3, Rotation3, Unit, Vector3};

use super::{RigidRequest, RigidSolver, SolverError};
use crate::point::{mean_point, Point3};
use crate::transform::Transform;

/// Minimum pair count accepted by [`KabschSolver`].
pub const MIN_RIGID_PAIRS: usize = 1;

/// SVD of the centred cross-covariance with reflection correction.
///
/// One pair yields a pure translation. Two pairs yield the smallest rotation
/// taking the moving segment onto the fixed segment direction, about the
/// pair midpoints; rotation about the segment axis stays at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct KabschSolver;

impl RigidSolver for KabschSolver {
    fn solve(&self, request: &RigidRequest<'_>) -> Result<Transform, SolverError> {
        let (fixed, moving) = (request.fixed, request.moving);
        if fixed.len() != moving.len() {
            return Err(SolverError::LengthMismatch {
                fixed: fixed.len(),
                moving: moving.len(),
            });
        }
        if fixed.len() < MIN_RIGID_PAIRS {
            return Err(SolverError::TooFewPoints {
                needed: MIN_RIGID_PAIRS,
                got: fixed.len(),
            });
        }
        fit_rigid(fixed, moving)
    }
}

fn vec3(p: &Point3) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

/// Least-squares rotation + translation mapping `moving[i]` onto `fixed[i]`.
pub(crate) fn fit_rigid(fixed: &[Point3], moving: &[Point3]) -> Result<Transform, SolverError> {
    let (Some(cf), Some(cm)) = (mean_point(fixed.iter()), mean_point(moving.iter())) else {
        return Err(SolverError::TooFewPoints {
            needed: 1,
            got: 0,
        });
    };
    let cf = vec3(&cf);
    let cm = vec3(&cm);

    let r = match fixed.len() {
        1 => Matrix3::identity(),
        2 => segment_rotation(
            &(vec3(&moving[1]) - vec3(&moving[0])),
            &(vec3(&fixed[1]) - vec3(&fixed[0])),
        ),
        _ => svd_rotation(fixed, moving, &cf, &cm)?,
    };

    let t = cf - r * cm;
    let out = Transform::from_rotation_translation(&r, &t);
    if !out.is_finite() {
        return Err(SolverError::NumericalFailure(
            "non-finite rigid solution".into(),
        ));
    }
    Ok(out)
}

/// Smallest rotation turning direction `from` onto direction `to`.
fn segment_rotation(from: &Vector3<f64>, to: &Vector3<f64>) -> Matrix3<f64> {
    const EPS: f64 = 1e-12;
    if from.norm() < EPS || to.norm() < EPS {
        return Matrix3::identity();
    }
    if let Some(rot) = Rotation3::rotation_between(from, to) {
        return rot.into_inner();
    }
    // Antiparallel: half turn about any axis perpendicular to `from`.
    let mut axis = from.cross(&Vector3::x());
    if axis.norm() < EPS * from.norm() {
        axis = from.cross(&Vector3::y());
    }
    Rotation3::from_axis_angle(&Unit::new_normalize(axis), std::f64::consts::PI).into_inner()
}

fn svd_rotation(
    fixed: &[Point3],
    moving: &[Point3],
    cf: &Vector3<f64>,
    cm: &Vector3<f64>,
) -> Result<Matrix3<f64>, SolverError> {
    // Cross-covariance H = Σ (m - cm)(f - cf)^T
    let mut h = Matrix3::<f64>::zeros();
    for (f, m) in fixed.iter().zip(moving) {
        h += (vec3(m) - cm) * (vec3(f) - cf).transpose();
    }
    if !h.iter().all(|v| v.is_finite()) {
        return Err(SolverError::NumericalFailure(
            "non-finite cross-covariance".into(),
        ));
    }

    let svd = h.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(SolverError::NumericalFailure("SVD did not converge".into()));
    };

    let v = v_t.transpose();
    let mut r = v * u.transpose();
    if r.determinant() < 0.0 {
        // Flip the axis of the smallest singular value to leave the reflection.
        let mut v_fixed = v;
        let smallest = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(2);
        for row in 0..3 {
            v_fixed[(row, smallest)] = -v_fixed[(row, smallest)];
        }
        r = v_fixed * u.transpose();
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetra() -> Vec<Point3> {
        vec![
            [0.0, 0.0, 0.0],
            [80.0, 0.0, 0.0],
            [0.0, 60.0, 0.0],
            [0.0, 0.0, 50.0],
            [30.0, 30.0, 30.0],
        ]
    }

    #[test]
    fn recovers_known_rigid_motion() {
        let axis = Unit::new_normalize(Vector3::new(1.0, -2.0, 0.5));
        let rot = Rotation3::from_axis_angle(&axis, 0.7);
        let truth =
            Transform::from_rotation_translation(rot.matrix(), &Vector3::new(12.0, -4.0, 30.0));

        let moving = tetra();
        let fixed = truth.apply_all(&moving);
        let est = KabschSolver
            .solve(&RigidRequest {
                fixed: &fixed,
                moving: &moving,
            })
            .unwrap();

        assert!(est.max_abs_diff(&truth) < 1e-9);
    }

    #[test]
    fn identical_sets_give_identity() {
        let pts = tetra();
        let est = KabschSolver
            .solve(&RigidRequest {
                fixed: &pts,
                moving: &pts,
            })
            .unwrap();
        assert!(est.max_abs_diff(&Transform::identity()) < 1e-9);
    }

    #[test]
    fn never_returns_a_reflection() {
        let moving = tetra();
        let fixed: Vec<Point3> = moving.iter().map(|p| [-p[0], p[1], p[2]]).collect();
        let est = KabschSolver
            .solve(&RigidRequest {
                fixed: &fixed,
                moving: &moving,
            })
            .unwrap();
        assert_relative_eq!(est.rotation().determinant(), 1.0, epsilon = 1e-9);
    }

    fn solve(fixed: &[Point3], moving: &[Point3]) -> Transform {
        KabschSolver
            .solve(&RigidRequest { fixed, moving })
            .unwrap()
    }

    #[test]
    fn single_pair_is_a_translation() {
        let est = solve(&[[5.0, -1.0, 2.5]], &[[1.0, 1.0, 1.0]]);
        assert_eq!(est.rotation(), Matrix3::identity());
        assert_eq!(est.apply(&[1.0, 1.0, 1.0]), [5.0, -1.0, 2.5]);
    }

    #[test]
    fn identical_pairs_give_identity() {
        let pts = [[0.5, 0.0, 0.0], [100.5, 0.0, 0.0]];
        let est = solve(&pts, &pts);
        assert!(est.max_abs_diff(&Transform::identity()) < 1e-12);
    }

    #[test]
    fn two_pairs_align_segments() {
        let moving = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]];
        let fixed = [[3.0, 4.0, 5.0], [3.0, 14.0, 5.0]];
        let est = solve(&fixed, &moving);

        for (m, f) in moving.iter().zip(&fixed) {
            let p = est.apply(m);
            for k in 0..3 {
                assert_relative_eq!(p[k], f[k], epsilon = 1e-9);
            }
        }
        assert_relative_eq!(est.rotation().determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn two_antiparallel_pairs_use_a_half_turn() {
        let moving = [[0.0, 0.0, 0.0], [10.0, 0.0, 0.0]];
        let fixed = [[10.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let est = solve(&fixed, &moving);

        let p = est.apply(&moving[1]);
        assert_relative_eq!(p[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(p[1], 0.0, epsilon = 1e-9);
        assert_relative_eq!(p[2], 0.0, epsilon = 1e-9);
        assert_relative_eq!(est.rotation().determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_empty_or_unequal_input() {
        let pts = tetra();
        let err = KabschSolver
            .solve(&RigidRequest {
                fixed: &[],
                moving: &[],
            })
            .unwrap_err();
        assert_eq!(err, SolverError::TooFewPoints { needed: 1, got: 0 });

        let err = KabschSolver
            .solve(&RigidRequest {
                fixed: &pts,
                moving: &pts[..4],
            })
            .unwrap_err();
        assert_eq!(err, SolverError::LengthMismatch { fixed: 5, moving: 4 });
    }
}
