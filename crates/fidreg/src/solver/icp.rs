//! Point-to-point iterative closest point refinement.

use nalgebra::{Rotation3, Vector3};

use super::rigid::fit_rigid;
use super::{IcpRequest, IcpResult, IcpSolver, SolverError};
use crate::point::{distance_sq, Point3};
use crate::transform::Transform;

/// Minimum number of moving points the refinement accepts.
pub const MIN_ICP_POINTS: usize = 1;

/// Iteration cap and convergence tolerances.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Hard cap on iterations; exhausting it is a failure.
    pub max_iterations: usize,
    /// Stop when the per-iteration update (rotation angle in radians plus
    /// translation norm) falls below this value.
    pub gradient_tolerance: f64,
    /// Stop when the RMS error changes by less than this between iterations.
    pub value_tolerance: f64,
    /// Stop as soon as the RMS error drops below this value.
    pub epsilon: f64,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            gradient_tolerance: 1e-4,
            value_tolerance: 1e-4,
            epsilon: 1e-5,
        }
    }
}

impl IcpConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_iterations == 0 {
            return Err("icp max_iterations must be >= 1".to_string());
        }
        for (name, v) in [
            ("gradient_tolerance", self.gradient_tolerance),
            ("value_tolerance", self.value_tolerance),
            ("epsilon", self.epsilon),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("icp {name} must be finite and >= 0"));
            }
        }
        Ok(())
    }
}

/// Brute-force nearest-neighbour ICP.
///
/// Each iteration pairs every transformed moving point with its nearest fixed
/// point and solves the incremental rigid update in closed form. Intended for
/// landmark-sized inputs; the search is O(n·m).
#[derive(Debug, Clone, Copy, Default)]
pub struct PointToPointIcp;

impl IcpSolver for PointToPointIcp {
    fn refine(&self, request: &IcpRequest<'_>) -> Result<IcpResult, SolverError> {
        let cfg = request.config;
        if request.fixed.is_empty() {
            return Err(SolverError::TooFewPoints {
                needed: 1,
                got: 0,
            });
        }
        if request.moving.len() < MIN_ICP_POINTS {
            return Err(SolverError::TooFewPoints {
                needed: MIN_ICP_POINTS,
                got: request.moving.len(),
            });
        }

        let mut current = request.initial.copied().unwrap_or_default();
        let mut prev_error = f64::INFINITY;

        for iteration in 1..=cfg.max_iterations {
            let moved = current.apply_all(request.moving);
            let (matched, error) = closest_points(&moved, request.fixed);
            if !error.is_finite() {
                return Err(SolverError::NumericalFailure(format!(
                    "non-finite residual at iteration {iteration}"
                )));
            }

            if error < cfg.epsilon || (prev_error - error).abs() < cfg.value_tolerance {
                tracing::debug!(iteration, error, "icp converged on residual");
                return Ok(IcpResult {
                    transform: current,
                    error,
                    iterations: iteration,
                });
            }

            let step = fit_rigid(&matched, &moved)?;
            current = step.compose(&current);
            prev_error = error;

            if update_magnitude(&step) < cfg.gradient_tolerance {
                let (_, error) = closest_points(&current.apply_all(request.moving), request.fixed);
                tracing::debug!(iteration, error, "icp converged on update size");
                return Ok(IcpResult {
                    transform: current,
                    error,
                    iterations: iteration,
                });
            }
        }

        let (_, error) = closest_points(&current.apply_all(request.moving), request.fixed);
        Err(SolverError::NotConverged {
            iterations: cfg.max_iterations,
            error,
        })
    }
}

/// Nearest fixed point for each query and the RMS of those distances.
fn closest_points(queries: &[Point3], fixed: &[Point3]) -> (Vec<Point3>, f64) {
    let mut matched = Vec::with_capacity(queries.len());
    let mut sum_sq = 0.0;
    for q in queries {
        let mut best = fixed[0];
        let mut best_d2 = f64::INFINITY;
        for f in fixed {
            let d2 = distance_sq(q, f);
            if d2 < best_d2 {
                best_d2 = d2;
                best = *f;
            }
        }
        sum_sq += best_d2;
        matched.push(best);
    }
    let rms = (sum_sq / queries.len().max(1) as f64).sqrt();
    (matched, rms)
}

fn update_magnitude(step: &Transform) -> f64 {
    let angle = Rotation3::from_matrix_unchecked(step.rotation()).angle();
    let shift: Vector3<f64> = step.translation();
    angle.abs() + shift.norm()
}
