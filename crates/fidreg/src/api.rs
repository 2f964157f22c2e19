//! High-level registration API.
//!
//! [`Registrar`] is the primary entry point. It wraps a
//! [`RegistrationConfig`] together with the detector and solver services and
//! runs the pipeline against a host [`ArtifactStore`].

use std::path::Path;

use crate::config::RegistrationConfig;
use crate::correspondence::CorrespondenceStrategy;
use crate::error::RegistrationError;
use crate::pipeline::{self, CancelToken, RegistrationInputs, RegistrationOutcome, Services};
use crate::solver::{IcpSolver, KabschSolver, LandmarkDetector, PointToPointIcp, RigidSolver};
use crate::store::ArtifactStore;

/// Primary registration interface.
///
/// Create once, register many volumes. The default solvers are
/// [`KabschSolver`] for the coarse fit and [`PointToPointIcp`] for refinement;
/// the correspondence rule comes from [`RegistrationConfig::correspondence`]
/// unless a custom strategy is installed.
///
/// # Examples
///
/// ```
/// use fidreg::{
///     MemoryStore, ArtifactStore, PointSet, PrecomputedDetector, Registrar,
///     RegistrationInputs, Transform, VolumeId,
/// };
///
/// let landmarks = vec![
///     [0.0, 0.0, 0.0],
///     [100.0, 0.0, 0.0],
///     [0.0, 100.0, 0.0],
///     [0.0, 0.0, 100.0],
///     [3.0, 0.0, 100.0],
/// ];
/// let volume = VolumeId::new("ct-01");
/// let detector = PrecomputedDetector::new()
///     .with_result(volume.clone(), PointSet::new(landmarks.clone()));
///
/// let mut store = MemoryStore::new();
/// let reference = store.add_point_set("reference", PointSet::new(landmarks));
/// let output = store.add_transform("output", Transform::identity());
///
/// let registrar = Registrar::new(detector);
/// let outcome = registrar
///     .register(
///         &mut store,
///         &RegistrationInputs {
///             volume: Some(volume),
///             reference: Some(reference),
///             output: Some(output),
///         },
///     )
///     .unwrap();
/// assert!(outcome.error < 1e-6);
/// ```
pub struct Registrar {
    config: RegistrationConfig,
    detector: Box<dyn LandmarkDetector>,
    rigid: Box<dyn RigidSolver>,
    icp: Box<dyn IcpSolver>,
    strategy: Option<Box<dyn CorrespondenceStrategy>>,
}

impl Registrar {
    /// Create a registrar with default configuration and solvers.
    pub fn new(detector: impl LandmarkDetector + 'static) -> Self {
        Self::with_config(detector, RegistrationConfig::default())
    }

    /// Create with full config control.
    pub fn with_config(detector: impl LandmarkDetector + 'static, config: RegistrationConfig) -> Self {
        Self {
            config,
            detector: Box::new(detector),
            rigid: Box::new(KabschSolver),
            icp: Box::new(PointToPointIcp),
            strategy: None,
        }
    }

    /// Load configuration JSON and create a registrar in one step.
    pub fn from_config_file(
        detector: impl LandmarkDetector + 'static,
        path: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::with_config(
            detector,
            RegistrationConfig::from_json_file(path)?,
        ))
    }

    /// Replace the coarse rigid solver.
    pub fn with_rigid_solver(mut self, solver: impl RigidSolver + 'static) -> Self {
        self.rigid = Box::new(solver);
        self
    }

    /// Replace the ICP refinement solver.
    pub fn with_icp_solver(mut self, solver: impl IcpSolver + 'static) -> Self {
        self.icp = Box::new(solver);
        self
    }

    /// Override the configured correspondence rule with a custom strategy.
    pub fn with_strategy(mut self, strategy: impl CorrespondenceStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    /// Access the current configuration.
    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut RegistrationConfig {
        &mut self.config
    }

    /// Run one registration to completion.
    pub fn register<S: ArtifactStore + ?Sized>(
        &self,
        store: &mut S,
        inputs: &RegistrationInputs,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        self.register_with_cancel(store, inputs, &CancelToken::new())
    }

    /// Run one registration that can be stopped between stages via `cancel`.
    pub fn register_with_cancel<S: ArtifactStore + ?Sized>(
        &self,
        store: &mut S,
        inputs: &RegistrationInputs,
        cancel: &CancelToken,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let strategy: &dyn CorrespondenceStrategy = match &self.strategy {
            Some(custom) => custom.as_ref(),
            None => &self.config.correspondence,
        };
        let services = Services {
            detector: self.detector.as_ref(),
            rigid: self.rigid.as_ref(),
            icp: self.icp.as_ref(),
            strategy,
        };
        pipeline::run_registration(store, inputs, &services, &self.config, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::CentroidList;
    use crate::correspondence::{CorrespondenceMethod, SizeOrder};
    use crate::point::{Point3, PointSet};
    use crate::solver::{PrecomputedDetector, VolumeId};
    use crate::store::MemoryStore;
    use crate::transform::Transform;
    use nalgebra::{Rotation3, Vector3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn landmarks() -> Vec<Point3> {
        vec![
            [0.0, 0.0, 0.0],
            [100.0, 0.0, 0.0],
            [102.0, 3.0, 0.0],
            [0.0, 100.0, 0.0],
            [4.0, 101.0, 2.0],
            [1.0, 97.0, 5.0],
            [0.0, 0.0, 100.0],
            [3.0, 3.0, 102.0],
            [-4.0, 1.0, 99.0],
            [2.0, -3.0, 97.0],
        ]
    }

    fn setup(detected: Vec<Point3>) -> (MemoryStore, RegistrationInputs, PrecomputedDetector) {
        let mut store = MemoryStore::new();
        let reference = store.add_point_set("reference", PointSet::new(landmarks()));
        let output = store.add_transform("output", Transform::identity());
        let volume = VolumeId::new("vol");
        let detector =
            PrecomputedDetector::new().with_result(volume.clone(), PointSet::new(detected));
        let inputs = RegistrationInputs {
            volume: Some(volume),
            reference: Some(reference),
            output: Some(output),
        };
        (store, inputs, detector)
    }

    /// Size order that counts its invocations.
    struct Counted(Arc<AtomicUsize>);

    impl CorrespondenceStrategy for Counted {
        fn order(
            &self,
            reference: &CentroidList,
            detected: &CentroidList,
        ) -> (CentroidList, CentroidList) {
            self.0.fetch_add(1, Ordering::SeqCst);
            SizeOrder.order(reference, detected)
        }
    }

    #[test]
    fn registers_with_default_services() {
        let motion = Transform::from_rotation_translation(
            Rotation3::from_euler_angles(0.0, 0.0, 0.2).matrix(),
            &Vector3::new(-20.0, 5.0, 1.0),
        );
        let (mut store, inputs, detector) = setup(motion.apply_all(&landmarks()));
        let registrar = Registrar::new(detector);

        let outcome = registrar.register(&mut store, &inputs).unwrap();
        assert!(outcome.transform.max_abs_diff(&motion) < 1e-6);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn configured_method_and_custom_strategy_are_used() {
        let (mut store, inputs, detector) = setup(landmarks());
        let mut registrar = Registrar::new(detector);
        registrar.config_mut().correspondence = CorrespondenceMethod::NearestCentroid;
        assert!(registrar.register(&mut store, &inputs).is_ok());

        let calls = Arc::new(AtomicUsize::new(0));
        let (mut store, inputs, detector) = setup(landmarks());
        let registrar = Registrar::new(detector).with_strategy(Counted(Arc::clone(&calls)));
        registrar.register(&mut store, &inputs).unwrap();
        registrar.register(&mut store, &inputs).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancelled_token_is_honoured() {
        let (mut store, inputs, detector) = setup(landmarks());
        let registrar = Registrar::new(detector);
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            registrar.register_with_cancel(&mut store, &inputs, &token),
            Err(RegistrationError::Cancelled { .. })
        ));
    }
}
