use crate::correspondence::CorrespondenceMismatch;
use crate::pipeline::RegistrationStage;
use crate::solver::{DetectionError, SolverError};

/// Which required input was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInput {
    Volume,
    ReferenceLandmarks,
    OutputTransform,
}

impl std::fmt::Display for MissingInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Volume => f.write_str("input volume"),
            Self::ReferenceLandmarks => f.write_str("reference landmark set"),
            Self::OutputTransform => f.write_str("output transform slot"),
        }
    }
}

/// Terminal failure of a registration run. No transform is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationError {
    MissingInput(MissingInput),
    InvalidConfig(String),
    DetectionFailure(DetectionError),
    CorrespondenceMismatch(CorrespondenceMismatch),
    SolverFailure {
        stage: RegistrationStage,
        source: SolverError,
    },
    Cancelled {
        stage: RegistrationStage,
    },
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingInput(what) => write!(f, "missing {}", what),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::DetectionFailure(e) => write!(f, "detection failed: {}", e),
            Self::CorrespondenceMismatch(e) => write!(f, "{}", e),
            Self::SolverFailure { stage, source } => {
                write!(f, "solver failed during {}: {}", stage, source)
            }
            Self::Cancelled { stage } => write!(f, "cancelled before {}", stage),
        }
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DetectionFailure(e) => Some(e),
            Self::CorrespondenceMismatch(e) => Some(e),
            Self::SolverFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DetectionError> for RegistrationError {
    fn from(e: DetectionError) -> Self {
        Self::DetectionFailure(e)
    }
}

impl From<CorrespondenceMismatch> for RegistrationError {
    fn from(e: CorrespondenceMismatch) -> Self {
        Self::CorrespondenceMismatch(e)
    }
}
