use std::collections::HashMap;

use super::LandmarkDetector;
use crate::point::PointSet;

/// Opaque handle of an image volume owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VolumeId(pub String);

impl VolumeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tuning knobs forwarded verbatim to the sphere detector.
///
/// Defaults reproduce the settings the registration tool historically used
/// for 5 mm spherical fiducials.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Intensity threshold applied before detection.
    pub threshold: f64,
    /// Gaussian sigma used for the gradient computation.
    pub sigma_grad: f64,
    /// Minimum normalized gradient magnitude.
    pub grad_threshold: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    pub variance: f64,
    /// Detector response threshold for reporting a sphere.
    pub output_threshold: f64,
    pub sphere_radius_ratio: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Scale-space smoothing range `[min_sigma, max_sigma]` sampled in `step_sigma` steps.
    pub min_sigma: f64,
    pub max_sigma: f64,
    pub step_sigma: f64,
    pub debug: bool,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            sigma_grad: 1.0,
            grad_threshold: 0.1,
            min_radius: 5.0,
            max_radius: 5.0,
            variance: 1.0,
            output_threshold: 0.5,
            sphere_radius_ratio: 1.0,
            alpha: 0.8,
            beta: 0.8,
            gamma: 0.8,
            min_sigma: 3.0,
            max_sigma: 3.0,
            step_sigma: 1.0,
            debug: false,
        }
    }
}

impl DetectionParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_radius > 0.0 && self.min_radius <= self.max_radius) {
            return Err(format!(
                "detection radius bounds must satisfy 0 < min_radius <= max_radius (got {}..{})",
                self.min_radius, self.max_radius
            ));
        }
        if !(self.min_sigma > 0.0 && self.min_sigma <= self.max_sigma) {
            return Err(format!(
                "detection sigma range must satisfy 0 < min_sigma <= max_sigma (got {}..{})",
                self.min_sigma, self.max_sigma
            ));
        }
        if !(self.step_sigma > 0.0) {
            return Err("detection step_sigma must be > 0".to_string());
        }
        Ok(())
    }
}

/// One detector invocation.
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
    pub volume: &'a VolumeId,
    /// Number of reference landmarks; a hint, not a guarantee.
    pub expected_count: usize,
    pub params: &'a DetectionParams,
}

/// Detector failure.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// The detector could not process the volume.
    Failed(String),
    /// The volume is unknown to the detector.
    UnknownVolume(VolumeId),
    /// The detector produced no points.
    Empty,
    /// A detected point has a non-finite coordinate.
    InvalidPoint { index: usize },
}

impl std::fmt::Display for DetectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "detector failed: {}", msg),
            Self::UnknownVolume(id) => write!(f, "unknown volume '{}'", id),
            Self::Empty => write!(f, "detector returned no points"),
            Self::InvalidPoint { index } => {
                write!(f, "detected point {} has a non-finite coordinate", index)
            }
        }
    }
}

impl std::error::Error for DetectionError {}

/// Serves detector output computed ahead of time, keyed by volume.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedDetector {
    results: HashMap<VolumeId, PointSet>,
}

impl PrecomputedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, volume: VolumeId, points: PointSet) -> Self {
        self.insert(volume, points);
        self
    }

    pub fn insert(&mut self, volume: VolumeId, points: PointSet) {
        self.results.insert(volume, points);
    }
}

impl LandmarkDetector for PrecomputedDetector {
    fn detect(&self, request: &DetectionRequest<'_>) -> Result<PointSet, DetectionError> {
        self.results
            .get(request.volume)
            .cloned()
            .ok_or_else(|| DetectionError::UnknownVolume(request.volume.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precomputed_detector_serves_by_volume() {
        let vol = VolumeId::new("ct-01");
        let det = PrecomputedDetector::new()
            .with_result(vol.clone(), PointSet::new(vec![[1.0, 2.0, 3.0]]));
        let params = DetectionParams::default();

        let got = det
            .detect(&DetectionRequest {
                volume: &vol,
                expected_count: 1,
                params: &params,
            })
            .unwrap();
        assert_eq!(got.len(), 1);

        let other = VolumeId::new("mr-02");
        let err = det
            .detect(&DetectionRequest {
                volume: &other,
                expected_count: 1,
                params: &params,
            })
            .unwrap_err();
        assert_eq!(err, DetectionError::UnknownVolume(other));
    }

    #[test]
    fn default_params_match_fiducial_settings() {
        let p = DetectionParams::default();
        assert_eq!(p.min_radius, 5.0);
        assert_eq!(p.output_threshold, 0.5);
        assert_eq!((p.min_sigma, p.max_sigma, p.step_sigma), (3.0, 3.0, 1.0));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn inverted_radius_bounds_are_rejected() {
        let p = DetectionParams {
            min_radius: 6.0,
            max_radius: 4.0,
            ..DetectionParams::default()
        };
        assert!(p.validate().is_err());
    }
}
