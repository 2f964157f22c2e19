use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::RegistrationError;

/// Orchestrator state.
///
/// Clustered runs walk `Idle → Detecting → Clustering → Correlating →
/// CoarseRegistering → Refining → Done`; direct runs go from `Detecting`
/// straight to `Refining`. Any non-terminal state may move to `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStage {
    Idle,
    Detecting,
    Clustering,
    Correlating,
    CoarseRegistering,
    Refining,
    Done,
    Aborted,
}

impl RegistrationStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: Self) -> bool {
        use RegistrationStage::*;
        if next == Aborted {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Detecting)
                | (Detecting, Clustering)
                | (Detecting, Refining)
                | (Clustering, Correlating)
                | (Correlating, CoarseRegistering)
                | (CoarseRegistering, Refining)
                | (Refining, Done)
        )
    }
}

impl std::fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Detecting => "detection",
            Self::Clustering => "clustering",
            Self::Correlating => "correspondence",
            Self::CoarseRegistering => "coarse registration",
            Self::Refining => "ICP refinement",
            Self::Done => "completion",
            Self::Aborted => "abort",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation flag shared between a caller and a running
/// registration. Checked before each stage.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Current stage plus the path taken to reach it.
#[derive(Debug)]
pub(crate) struct StageTrail<'c> {
    cancel: &'c CancelToken,
    current: RegistrationStage,
    visited: Vec<RegistrationStage>,
}

impl<'c> StageTrail<'c> {
    pub(crate) fn new(cancel: &'c CancelToken) -> Self {
        Self {
            cancel,
            current: RegistrationStage::Idle,
            visited: vec![RegistrationStage::Idle],
        }
    }

    pub(crate) fn current(&self) -> RegistrationStage {
        self.current
    }

    pub(crate) fn visited(&self) -> &[RegistrationStage] {
        &self.visited
    }

    /// Enter `next` unless the run was cancelled.
    pub(crate) fn enter(&mut self, next: RegistrationStage) -> Result<(), RegistrationError> {
        if self.cancel.is_cancelled() {
            return Err(RegistrationError::Cancelled { stage: next });
        }
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal stage transition {:?} -> {:?}",
            self.current,
            next
        );
        tracing::debug!(stage = %next, "entering stage");
        self.current = next;
        self.visited.push(next);
        Ok(())
    }

    /// Record the abort; returns the stage that failed.
    pub(crate) fn abort(&mut self) -> RegistrationStage {
        let failed = self.current;
        if self.current.can_advance_to(RegistrationStage::Aborted) {
            self.current = RegistrationStage::Aborted;
            self.visited.push(RegistrationStage::Aborted);
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegistrationStage::*;

    #[test]
    fn clustered_and_direct_paths_are_legal() {
        let clustered = [
            Idle,
            Detecting,
            Clustering,
            Correlating,
            CoarseRegistering,
            Refining,
            Done,
        ];
        assert!(clustered.windows(2).all(|w| w[0].can_advance_to(w[1])));
        assert!(Detecting.can_advance_to(Refining));
        assert!(!Idle.can_advance_to(Refining));
        assert!(!Clustering.can_advance_to(CoarseRegistering));
    }

    #[test]
    fn terminal_states_do_not_abort() {
        assert!(Correlating.can_advance_to(Aborted));
        assert!(!Done.can_advance_to(Aborted));
        assert!(!Aborted.can_advance_to(Aborted));
    }

    #[test]
    fn cancelled_trail_refuses_next_stage() {
        let token = CancelToken::new();
        let mut trail = StageTrail::new(&token);
        trail.enter(Detecting).unwrap();
        token.clone().cancel();
        assert_eq!(
            trail.enter(Clustering),
            Err(RegistrationError::Cancelled { stage: Clustering })
        );
        assert_eq!(trail.abort(), Detecting);
        assert_eq!(trail.visited(), &[Idle, Detecting, Aborted]);
        assert_eq!(trail.current(), Aborted);
    }
}
