use statig::blocking::IntoStateMachineExt as _;

use super::events::{InteractorStatus, LifecycleApplyStatus, LifecycleCommand, LifecycleSnapshot};
use super::machine::{DispatchContext, LifecycleMachine};

#[derive(Clone, Copy, Debug)]
pub struct LifecycleApplyResult {
    pub before: LifecycleSnapshot,
    pub after: LifecycleSnapshot,
    pub status: LifecycleApplyStatus,
}

impl LifecycleApplyResult {
    pub fn changed(self) -> bool {
        matches!(self.status, LifecycleApplyStatus::Applied)
    }

    pub fn left_pool(self) -> bool {
        self.before.is_candidate() && !self.after.is_candidate()
    }
}

pub struct LifecycleEngine {
    machine: statig::blocking::StateMachine<LifecycleMachine>,
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Default for LifecycleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleEngine {
    pub fn new() -> Self {
        Self {
            machine: LifecycleMachine::new().state_machine(),
        }
    }

    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.machine.inner().snapshot
    }

    pub fn status(&self) -> InteractorStatus {
        self.snapshot().status
    }

    pub fn apply(&mut self, command: LifecycleCommand) -> LifecycleApplyResult {
        let before = self.snapshot();
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&command, &mut context);
        let after = self.snapshot();
        if matches!(context.status, LifecycleApplyStatus::InvalidTransition) {
            log::debug!(
                "lifecycle_invalid_transition status={:?} command={:?}",
                before.status,
                command
            );
        }
        LifecycleApplyResult {
            before,
            after,
            status: context.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_in(commands: &[LifecycleCommand]) -> LifecycleEngine {
        let mut engine = LifecycleEngine::new();
        for command in commands {
            let _ = engine.apply(*command);
        }
        engine
    }

    #[test]
    fn promotion_and_determination() {
        let mut engine = LifecycleEngine::new();
        let result = engine.apply(LifecycleCommand::Promote);
        assert!(result.changed());
        assert_eq!(result.after.status, InteractorStatus::Candidate);

        let result = engine.apply(LifecycleCommand::Determine);
        assert!(result.changed());
        assert_eq!(engine.status(), InteractorStatus::Determined);

        let result = engine.apply(LifecycleCommand::Determine);
        assert_eq!(result.status, LifecycleApplyStatus::Unchanged);
    }

    #[test]
    fn idle_cannot_be_determined() {
        let mut engine = LifecycleEngine::new();
        let result = engine.apply(LifecycleCommand::Determine);
        assert_eq!(result.status, LifecycleApplyStatus::InvalidTransition);
        assert_eq!(engine.status(), InteractorStatus::Idle);
    }

    #[test]
    fn exclusion_clears_claim_and_leaves_pool() {
        let mut engine = engine_in(&[LifecycleCommand::Promote, LifecycleCommand::Claim]);
        assert!(engine.snapshot().claiming);
        let result = engine.apply(LifecycleCommand::Exclude);
        assert!(result.left_pool());
        assert!(!result.after.claiming);
        assert_eq!(
            engine.apply(LifecycleCommand::Exclude).status,
            LifecycleApplyStatus::Unchanged
        );
    }

    #[test]
    fn self_exclusion_is_granted_or_withdrawn() {
        let mut engine = engine_in(&[LifecycleCommand::Promote, LifecycleCommand::SelfExclude]);
        assert_eq!(engine.status(), InteractorStatus::SelfExcluded);
        assert!(engine.snapshot().is_candidate());
        let result = engine.apply(LifecycleCommand::ResetSelfExcluded);
        assert_eq!(result.after.status, InteractorStatus::Candidate);

        let _ = engine.apply(LifecycleCommand::SelfExclude);
        let result = engine.apply(LifecycleCommand::GrantSelfExclude);
        assert_eq!(result.after.status, InteractorStatus::Idle);
        assert_eq!(
            engine.apply(LifecycleCommand::GrantSelfExclude).status,
            LifecycleApplyStatus::InvalidTransition
        );
    }

    #[test]
    fn claim_withdraws_self_exclusion() {
        let mut engine = engine_in(&[LifecycleCommand::Promote, LifecycleCommand::SelfExclude]);
        let result = engine.apply(LifecycleCommand::Claim);
        assert_eq!(result.after.status, InteractorStatus::Candidate);
        assert!(result.after.claiming);
    }

    #[test]
    fn undetermine_returns_to_idle() {
        let mut engine = engine_in(&[LifecycleCommand::Promote, LifecycleCommand::Determine]);
        let result = engine.apply(LifecycleCommand::Undetermine);
        assert_eq!(result.after.status, InteractorStatus::Idle);
        assert_eq!(
            engine.apply(LifecycleCommand::Undetermine).status,
            LifecycleApplyStatus::InvalidTransition
        );
    }
}
