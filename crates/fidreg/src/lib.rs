//! fidreg — landmark-based rigid registration of a reference fiducial set to
//! fiducials detected in an image volume.
//!
//! The pipeline stages are:
//!
//! 1. **Detect** – an external [`LandmarkDetector`] reports sphere centres in
//!    the volume.
//! 2. **Cluster** – both point sets are grouped by seed proximity and reduced
//!    to per-cluster centroids.
//! 3. **Correspond** – centroid lists are paired positionally, by default
//!    after sorting each by ascending cluster size.
//! 4. **Coarse fit** – a closed-form rigid solver aligns the paired centroids.
//! 5. **Refine** – ICP on the full point sets, seeded with the coarse fit.
//!
//! The resulting transform maps reference coordinates onto detected
//! coordinates and is written into a caller-selected slot of a host
//! [`ArtifactStore`]. Intermediate artifacts never outlive a run.
//!
//! # Public API
//! - [`Registrar`] as the primary entry point
//! - [`RegistrationConfig`] for tuning
//! - service traits for detectors and solvers, with reference implementations
//! - clustering and correspondence primitives for standalone use

mod api;
pub mod cluster;
mod config;
pub mod correspondence;
mod error;
pub mod io;
mod pipeline;
mod point;
mod solver;
mod store;
mod transform;

pub use api::Registrar;
pub use cluster::{
    centroids_of, cluster_centroids, cluster_points, CentroidList, Cluster, ClusterCentroid,
    ClusterConfig,
};
pub use config::{RegistrationConfig, RegistrationMode};
pub use correspondence::{
    correspond, CorrespondenceMethod, CorrespondenceMismatch, CorrespondenceStrategy,
    LandmarkPairs,
};
pub use error::{MissingInput, RegistrationError};
pub use pipeline::{
    run_registration, CancelToken, RegistrationInputs, RegistrationOutcome, RegistrationStage,
    Services,
};
pub use point::{distance, Point3, PointSet};
pub use solver::{
    DetectionError, DetectionParams, DetectionRequest, IcpConfig, IcpRequest, IcpResult,
    IcpSolver, KabschSolver, LandmarkDetector, PointToPointIcp, PrecomputedDetector,
    RigidRequest, RigidSolver, SolverError, VolumeId,
};
pub use store::{
    Artifact, ArtifactId, ArtifactKind, ArtifactScope, ArtifactStore, MemoryStore, StoreError,
};
pub use transform::Transform;
