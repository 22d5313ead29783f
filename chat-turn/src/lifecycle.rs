//! Turn lifecycle state machine.

use thiserror::Error;
use tracing::debug;

/// Phases a conversation turn moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Input guardrails run before any state is touched.
    Validating,
    /// The conversation is loaded (or created) and its context derived.
    ContextLoading,
    /// The message is rewritten into a standalone search query.
    Rewriting,
    /// Both knowledge partitions are searched and merged.
    Retrieving,
    /// The prompt is assembled and tokens stream from the model.
    Generating,
    /// The completed turn is appended atomically.
    Persisting,
    /// Context compaction runs if thresholds are crossed.
    Compacting,
    /// Terminal: the turn completed and the done event was emitted.
    Done,
    /// Terminal: the input was rejected; nothing was created or mutated.
    Rejected,
    /// Terminal: an unexpected failure halted the turn.
    Failed,
}

impl TurnPhase {
    /// Returns `true` for terminal phases.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::Failed)
    }
}

/// Tracks and validates phase transitions for one turn.
#[derive(Debug, Clone, Copy)]
pub struct TurnLifecycle {
    phase: TurnPhase,
}

impl TurnLifecycle {
    /// Creates a lifecycle in the validating phase.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: TurnPhase::Validating,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub const fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Advances to the next phase.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the move is not
    /// permitted from the current phase. `Rejected` is reachable only from
    /// `Validating`; `Failed` is reachable from any non-terminal phase after
    /// `Validating`.
    pub fn advance(&mut self, next: TurnPhase) -> Result<TurnPhase, LifecycleError> {
        use TurnPhase as P;

        let allowed = match (self.phase, next) {
            (P::Validating, P::ContextLoading | P::Rejected)
            | (P::ContextLoading, P::Rewriting)
            | (P::Rewriting, P::Retrieving)
            | (P::Retrieving, P::Generating)
            | (P::Generating, P::Persisting)
            | (P::Persisting, P::Compacting)
            | (P::Compacting, P::Done) => true,
            (from, P::Failed) => !matches!(from, P::Validating) && !from.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(LifecycleError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        debug!(from = ?self.phase, to = ?next, "turn phase transition");
        self.phase = next;
        Ok(self.phase)
    }
}

impl Default for TurnLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors emitted by the lifecycle tracker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Transition was not permitted from the current phase.
    #[error("invalid turn transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Phase prior to the attempted transition.
        from: TurnPhase,
        /// Phase that was requested.
        to: TurnPhase,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_done() {
        let mut lifecycle = TurnLifecycle::new();
        for phase in [
            TurnPhase::ContextLoading,
            TurnPhase::Rewriting,
            TurnPhase::Retrieving,
            TurnPhase::Generating,
            TurnPhase::Persisting,
            TurnPhase::Compacting,
            TurnPhase::Done,
        ] {
            lifecycle.advance(phase).unwrap();
        }
        assert!(lifecycle.phase().is_terminal());
    }

    #[test]
    fn rejection_only_from_validating() {
        let mut lifecycle = TurnLifecycle::new();
        lifecycle.advance(TurnPhase::Rejected).unwrap();
        assert_eq!(lifecycle.phase(), TurnPhase::Rejected);

        let mut lifecycle = TurnLifecycle::new();
        lifecycle.advance(TurnPhase::ContextLoading).unwrap();
        let err = lifecycle
            .advance(TurnPhase::Rejected)
            .expect_err("rejection past validation must fail");
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn failure_reachable_from_any_running_phase() {
        for target in [
            TurnPhase::ContextLoading,
            TurnPhase::Rewriting,
            TurnPhase::Retrieving,
            TurnPhase::Generating,
            TurnPhase::Persisting,
            TurnPhase::Compacting,
        ] {
            let mut lifecycle = TurnLifecycle::new();
            lifecycle.advance(TurnPhase::ContextLoading).unwrap();
            let mut phase = TurnPhase::ContextLoading;
            while phase != target {
                let next = match phase {
                    TurnPhase::ContextLoading => TurnPhase::Rewriting,
                    TurnPhase::Rewriting => TurnPhase::Retrieving,
                    TurnPhase::Retrieving => TurnPhase::Generating,
                    TurnPhase::Generating => TurnPhase::Persisting,
                    TurnPhase::Persisting => TurnPhase::Compacting,
                    _ => unreachable!(),
                };
                lifecycle.advance(next).unwrap();
                phase = next;
            }
            lifecycle.advance(TurnPhase::Failed).unwrap();
            assert_eq!(lifecycle.phase(), TurnPhase::Failed);
        }
    }

    #[test]
    fn failure_not_reachable_from_validating() {
        let mut lifecycle = TurnLifecycle::new();
        let err = lifecycle
            .advance(TurnPhase::Failed)
            .expect_err("validating cannot fail directly");
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_phases_accept_nothing() {
        let mut lifecycle = TurnLifecycle::new();
        lifecycle.advance(TurnPhase::Rejected).unwrap();
        assert!(lifecycle.advance(TurnPhase::ContextLoading).is_err());
        assert!(lifecycle.advance(TurnPhase::Failed).is_err());
    }

    #[test]
    fn phases_cannot_be_skipped() {
        let mut lifecycle = TurnLifecycle::new();
        lifecycle.advance(TurnPhase::ContextLoading).unwrap();
        let err = lifecycle
            .advance(TurnPhase::Generating)
            .expect_err("skipping phases must fail");
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }
}
