/// Arbitration status of one interactor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractorStatus {
    #[default]
    Idle,
    Candidate,
    Determined,
    SelfExcluded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleCommand {
    /// Mediator admits the interactor to the candidate pool.
    Promote,
    Determine,
    /// Mediator rules the interactor out; valid from every state.
    Exclude,
    /// The interactor asks to leave the pool.
    SelfExclude,
    GrantSelfExclude,
    Claim,
    ResetSelfExcluded,
    Undetermine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleApplyStatus {
    Applied,
    Unchanged,
    InvalidTransition,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LifecycleSnapshot {
    pub status: InteractorStatus,
    pub claiming: bool,
}

impl LifecycleSnapshot {
    /// Candidates stay in the pool while determined or self-excluded.
    pub fn is_candidate(&self) -> bool {
        !matches!(self.status, InteractorStatus::Idle)
    }
}
