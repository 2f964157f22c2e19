//! Registration orchestrator.
//!
//! Wires the detector, clustering, correspondence and both solvers into a
//! single sequential run:
//! detect -> cluster -> correspond -> coarse rigid fit -> ICP refine.
//!
//! Algorithmic primitives live in `crate::cluster`, `crate::correspondence`
//! and `crate::solver`. This layer owns stage order, input validation,
//! cancellation and cleanup of intermediate store artifacts.

mod result;
mod run;
mod stage;

pub use result::RegistrationOutcome;
pub use run::{run_registration, RegistrationInputs, Services};
pub use stage::{CancelToken, RegistrationStage};
