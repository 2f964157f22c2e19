//! Service interfaces for the detector and the two registration solvers.
//!
//! Each collaborator is a synchronous request → result call with an explicit
//! error channel. The pipeline only depends on these traits; the concrete
//! types in this module are reference implementations.

mod detector;
mod icp;
mod rigid;

pub use detector::{
    DetectionError, DetectionParams, DetectionRequest, PrecomputedDetector, VolumeId,
};
pub use icp::{IcpConfig, PointToPointIcp};
pub use rigid::KabschSolver;

use crate::point::{Point3, PointSet};
use crate::transform::Transform;

/// Failure reported by the rigid or ICP solver.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    TooFewPoints { needed: usize, got: usize },
    LengthMismatch { fixed: usize, moving: usize },
    NumericalFailure(String),
    NotConverged { iterations: usize, error: f64 },
}

impl std::fmt::Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::LengthMismatch { fixed, moving } => {
                write!(f, "fixed/moving length mismatch: {} vs {}", fixed, moving)
            }
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
            Self::NotConverged { iterations, error } => write!(
                f,
                "no convergence after {} iterations (error {:.6})",
                iterations, error
            ),
        }
    }
}

impl std::error::Error for SolverError {}

/// Detects landmark candidates in an image volume.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, request: &DetectionRequest<'_>) -> Result<PointSet, DetectionError>;
}

impl<F> LandmarkDetector for F
where
    F: Fn(&DetectionRequest<'_>) -> Result<PointSet, DetectionError> + Send + Sync,
{
    fn detect(&self, request: &DetectionRequest<'_>) -> Result<PointSet, DetectionError> {
        self(request)
    }
}

/// Index-corresponding landmark pairs; the solution maps `moving` onto `fixed`.
#[derive(Debug, Clone, Copy)]
pub struct RigidRequest<'a> {
    pub fixed: &'a [Point3],
    pub moving: &'a [Point3],
}

/// Closed-form rigid alignment of paired landmarks.
pub trait RigidSolver: Send + Sync {
    fn solve(&self, request: &RigidRequest<'_>) -> Result<Transform, SolverError>;
}

/// Correspondence-free refinement request; the solution maps `moving` onto
/// `fixed`.
#[derive(Debug, Clone, Copy)]
pub struct IcpRequest<'a> {
    pub fixed: &'a [Point3],
    pub moving: &'a [Point3],
    pub initial: Option<&'a Transform>,
    pub config: &'a IcpConfig,
}

/// Refined transform with its residual.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IcpResult {
    pub transform: Transform,
    /// RMS distance of transformed moving points to their nearest fixed point.
    pub error: f64,
    pub iterations: usize,
}

/// Iterative closest point refinement.
pub trait IcpSolver: Send + Sync {
    fn refine(&self, request: &IcpRequest<'_>) -> Result<IcpResult, SolverError>;
}
