use super::RegistrationStage;
use crate::store::ArtifactId;
use crate::transform::Transform;

/// Summary of a successful registration run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegistrationOutcome {
    /// Refined transform mapping reference landmarks onto detected landmarks.
    pub transform: Transform,
    /// RMS nearest-neighbour distance reported by the refinement.
    pub error: f64,
    /// ICP iterations used.
    pub iterations: usize,
    /// Number of detected landmark points.
    pub detected_points: usize,
    /// Cluster count of the reference set (clustered mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_clusters: Option<usize>,
    /// Cluster count of the detected set (clustered mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_clusters: Option<usize>,
    /// Stages visited, starting at `Idle` and ending at `Done`.
    pub stages: Vec<RegistrationStage>,
    /// Store slot the transform was written into.
    pub output: ArtifactId,
}
