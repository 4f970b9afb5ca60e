use statig::prelude::*;

use super::events::{InteractorStatus, LifecycleApplyStatus, LifecycleCommand, LifecycleSnapshot};

#[derive(Clone, Copy, Debug)]
pub(super) struct LifecycleMachine {
    pub(super) snapshot: LifecycleSnapshot,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct DispatchContext {
    pub(super) status: LifecycleApplyStatus,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            status: LifecycleApplyStatus::Unchanged,
        }
    }
}

impl LifecycleMachine {
    pub(super) fn new() -> Self {
        Self {
            snapshot: LifecycleSnapshot::default(),
        }
    }

    fn set_claiming(&mut self, claiming: bool) -> LifecycleApplyStatus {
        if self.snapshot.claiming == claiming {
            return LifecycleApplyStatus::Unchanged;
        }
        self.snapshot.claiming = claiming;
        LifecycleApplyStatus::Applied
    }

    fn enter(&mut self, context: &mut DispatchContext, status: InteractorStatus) {
        self.snapshot.status = status;
        if matches!(status, InteractorStatus::Idle) {
            self.snapshot.claiming = false;
        }
        context.status = LifecycleApplyStatus::Applied;
    }
}

#[state_machine(initial = "State::idle()")]
impl LifecycleMachine {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &LifecycleCommand) -> Outcome<State> {
        match event {
            LifecycleCommand::Promote => {
                self.enter(context, InteractorStatus::Candidate);
                Transition(State::candidate())
            }
            LifecycleCommand::Exclude => {
                context.status = self.set_claiming(false);
                Handled
            }
            LifecycleCommand::Claim => {
                context.status = self.set_claiming(true);
                Handled
            }
            LifecycleCommand::ResetSelfExcluded => Handled,
            _ => {
                context.status = LifecycleApplyStatus::InvalidTransition;
                Handled
            }
        }
    }

    #[state]
    fn candidate(
        &mut self,
        context: &mut DispatchContext,
        event: &LifecycleCommand,
    ) -> Outcome<State> {
        match event {
            LifecycleCommand::Determine => {
                self.enter(context, InteractorStatus::Determined);
                Transition(State::determined())
            }
            LifecycleCommand::Exclude => {
                self.enter(context, InteractorStatus::Idle);
                Transition(State::idle())
            }
            LifecycleCommand::SelfExclude => {
                self.enter(context, InteractorStatus::SelfExcluded);
                Transition(State::self_excluded())
            }
            LifecycleCommand::Claim => {
                context.status = self.set_claiming(true);
                Handled
            }
            LifecycleCommand::Promote | LifecycleCommand::ResetSelfExcluded => Handled,
            LifecycleCommand::GrantSelfExclude | LifecycleCommand::Undetermine => {
                context.status = LifecycleApplyStatus::InvalidTransition;
                Handled
            }
        }
    }

    #[state]
    fn determined(
        &mut self,
        context: &mut DispatchContext,
        event: &LifecycleCommand,
    ) -> Outcome<State> {
        match event {
            LifecycleCommand::Exclude | LifecycleCommand::Undetermine => {
                self.enter(context, InteractorStatus::Idle);
                Transition(State::idle())
            }
            LifecycleCommand::SelfExclude => {
                self.enter(context, InteractorStatus::SelfExcluded);
                Transition(State::self_excluded())
            }
            LifecycleCommand::GrantSelfExclude => {
                context.status = LifecycleApplyStatus::InvalidTransition;
                Handled
            }
            _ => Handled,
        }
    }

    #[state]
    fn self_excluded(
        &mut self,
        context: &mut DispatchContext,
        event: &LifecycleCommand,
    ) -> Outcome<State> {
        match event {
            LifecycleCommand::GrantSelfExclude | LifecycleCommand::Exclude => {
                self.enter(context, InteractorStatus::Idle);
                Transition(State::idle())
            }
            LifecycleCommand::ResetSelfExcluded => {
                self.enter(context, InteractorStatus::Candidate);
                Transition(State::candidate())
            }
            LifecycleCommand::Claim => {
                self.enter(context, InteractorStatus::Candidate);
                self.snapshot.claiming = true;
                Transition(State::candidate())
            }
            LifecycleCommand::SelfExclude => Handled,
            LifecycleCommand::Promote
            | LifecycleCommand::Determine
            | LifecycleCommand::Undetermine => {
                context.status = LifecycleApplyStatus::InvalidTransition;
                Handled
            }
        }
    }
}
