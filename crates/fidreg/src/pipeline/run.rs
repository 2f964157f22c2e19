//! Top-level orchestrator: validate -> detect -> cluster -> correspond ->
//! coarse fit -> refine -> write output.

use super::stage::StageTrail;
use super::{CancelToken, RegistrationOutcome, RegistrationStage};
use crate::cluster::cluster_centroids;
use crate::config::{RegistrationConfig, RegistrationMode};
use crate::correspondence::{CorrespondenceStrategy, LandmarkPairs};
use crate::error::{MissingInput, RegistrationError};
use crate::point::PointSet;
use crate::solver::{
    DetectionError, DetectionRequest, IcpRequest, IcpResult, IcpSolver, LandmarkDetector,
    RigidRequest, RigidSolver, VolumeId,
};
use crate::store::{ArtifactId, ArtifactScope, ArtifactStore};
use crate::transform::Transform;

/// Display name of the raw detection artifact.
const DETECTED_NAME: &str = "SphericalFiducialsDetected";
const REFERENCE_CENTROIDS_NAME: &str = "ReferenceCentroids";
const DETECTED_CENTROIDS_NAME: &str = "DetectedCentroids";
const COARSE_NAME: &str = "CoarseTransform";

/// Host-supplied inputs of one run. `None` means the user has not selected it.
#[derive(Debug, Clone, Default)]
pub struct RegistrationInputs {
    pub volume: Option<VolumeId>,
    /// Point-set artifact holding the reference landmarks.
    pub reference: Option<ArtifactId>,
    /// Existing transform artifact that receives the result.
    pub output: Option<ArtifactId>,
}

/// External collaborators used by a run.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub detector: &'a dyn LandmarkDetector,
    pub rigid: &'a dyn RigidSolver,
    pub icp: &'a dyn IcpSolver,
    pub strategy: &'a dyn CorrespondenceStrategy,
}

struct Validated<'i> {
    volume: &'i VolumeId,
    reference: PointSet,
    output: ArtifactId,
}

fn validate_inputs<'i, S: ArtifactStore + ?Sized>(
    store: &S,
    inputs: &'i RegistrationInputs,
) -> Result<Validated<'i>, RegistrationError> {
    let volume = inputs
        .volume
        .as_ref()
        .ok_or(RegistrationError::MissingInput(MissingInput::Volume))?;
    let reference = inputs
        .reference
        .and_then(|id| store.point_set(id))
        .filter(|p| !p.is_empty())
        .cloned()
        .ok_or(RegistrationError::MissingInput(
            MissingInput::ReferenceLandmarks,
        ))?;
    let output = inputs
        .output
        .filter(|&id| store.transform(id).is_some())
        .ok_or(RegistrationError::MissingInput(MissingInput::OutputTransform))?;
    Ok(Validated {
        volume,
        reference,
        output,
    })
}

/// Register the reference landmarks against landmarks detected in a volume.
///
/// On success the refined transform (reference → detected) is written into
/// the `output` slot and returned with run statistics. Every intermediate
/// artifact created in `store` is removed before returning, on success and
/// on failure alike; on failure the output slot is left untouched.
pub fn run_registration<S: ArtifactStore + ?Sized>(
    store: &mut S,
    inputs: &RegistrationInputs,
    services: &Services<'_>,
    config: &RegistrationConfig,
    cancel: &CancelToken,
) -> Result<RegistrationOutcome, RegistrationError> {
    config
        .validate()
        .map_err(RegistrationError::InvalidConfig)?;
    let validated = validate_inputs(&*store, inputs)?;

    let mut trail = StageTrail::new(cancel);
    let mut scope = ArtifactScope::new(store);
    let result = execute(&mut scope, &validated, services, config, &mut trail);

    match &result {
        Ok(outcome) => {
            debug_assert_eq!(trail.current(), RegistrationStage::Done);
            tracing::info!(
                "registration done: error={:.4} iterations={} output={}",
                outcome.error,
                outcome.iterations,
                outcome.output
            );
        }
        Err(e) => {
            let failed = trail.abort();
            tracing::warn!("registration aborted during {}: {}", failed, e);
        }
    }
    result
}

fn execute<S: ArtifactStore + ?Sized>(
    scope: &mut ArtifactScope<'_, S>,
    input: &Validated<'_>,
    services: &Services<'_>,
    config: &RegistrationConfig,
    trail: &mut StageTrail<'_>,
) -> Result<RegistrationOutcome, RegistrationError> {
    let reference = &input.reference;

    trail.enter(RegistrationStage::Detecting)?;
    let detected = detect(services.detector, input.volume, reference.len(), config)?;
    scope.add_point_set(DETECTED_NAME, detected.clone());

    let mut reference_clusters = None;
    let mut detected_clusters = None;
    let initial = match config.mode {
        RegistrationMode::Clustered => {
            trail.enter(RegistrationStage::Clustering)?;
            let threshold = config.cluster.threshold;
            let ref_centroids = cluster_centroids(reference.as_slice(), threshold);
            let det_centroids = cluster_centroids(detected.as_slice(), threshold);
            tracing::info!(
                "clustered {} reference points into {} clusters, {} detected points into {}",
                reference.len(),
                ref_centroids.len(),
                detected.len(),
                det_centroids.len()
            );
            reference_clusters = Some(ref_centroids.len());
            detected_clusters = Some(det_centroids.len());
            scope.add_point_set(
                REFERENCE_CENTROIDS_NAME,
                PointSet::new(ref_centroids.points()),
            );
            scope.add_point_set(
                DETECTED_CENTROIDS_NAME,
                PointSet::new(det_centroids.points()),
            );

            trail.enter(RegistrationStage::Correlating)?;
            let (ref_ordered, det_ordered) =
                services.strategy.order(&ref_centroids, &det_centroids);
            let pairs = LandmarkPairs::from_ordered(&det_ordered, &ref_ordered)?;
            tracing::debug!(
                "cluster sizes: reference {:?}, detected {:?}",
                ref_ordered.sizes(),
                det_ordered.sizes()
            );

            trail.enter(RegistrationStage::CoarseRegistering)?;
            let coarse = services
                .rigid
                .solve(&RigidRequest {
                    fixed: &pairs.fixed,
                    moving: &pairs.moving,
                })
                .map_err(|source| RegistrationError::SolverFailure {
                    stage: RegistrationStage::CoarseRegistering,
                    source,
                })?;
            scope.add_transform(COARSE_NAME, coarse);
            Some(coarse)
        }
        RegistrationMode::Direct => None,
    };

    trail.enter(RegistrationStage::Refining)?;
    let refined = refine(services.icp, reference, &detected, initial.as_ref(), config)?;

    trail.enter(RegistrationStage::Done)?;
    scope
        .store_mut()
        .set_transform(input.output, refined.transform)
        .map_err(|_| RegistrationError::MissingInput(MissingInput::OutputTransform))?;

    Ok(RegistrationOutcome {
        transform: refined.transform,
        error: refined.error,
        iterations: refined.iterations,
        detected_points: detected.len(),
        reference_clusters,
        detected_clusters,
        stages: trail.visited().to_vec(),
        output: input.output,
    })
}

fn detect(
    detector: &dyn LandmarkDetector,
    volume: &VolumeId,
    expected_count: usize,
    config: &RegistrationConfig,
) -> Result<PointSet, RegistrationError> {
    let detected = detector.detect(&DetectionRequest {
        volume,
        expected_count,
        params: &config.detection,
    })?;
    if detected.is_empty() {
        return Err(DetectionError::Empty.into());
    }
    if let Some(index) = detected.first_non_finite() {
        return Err(DetectionError::InvalidPoint { index }.into());
    }
    if detected.len() != expected_count {
        tracing::warn!(
            "detector returned {} points for {} reference landmarks",
            detected.len(),
            expected_count
        );
    } else {
        tracing::info!("detected {} landmarks in volume '{}'", detected.len(), volume);
    }
    Ok(detected)
}

fn refine(
    icp: &dyn IcpSolver,
    reference: &PointSet,
    detected: &PointSet,
    initial: Option<&Transform>,
    config: &RegistrationConfig,
) -> Result<IcpResult, RegistrationError> {
    icp.refine(&IcpRequest {
        fixed: detected.as_slice(),
        moving: reference.as_slice(),
        initial,
        config: &config.icp,
    })
    .map_err(|source| RegistrationError::SolverFailure {
        stage: RegistrationStage::Refining,
        source,
    })
}
