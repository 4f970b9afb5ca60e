//! Per-element reasoning: behavior posterior, evidence and the arbitration
//! lifecycle.

mod core;
mod executor;
mod lifecycle;

pub use self::core::{InteractorCore, POSTERIOR_SENTINEL};
pub use executor::{CancelToken, DeferredAction, SerialExecutor};
pub use lifecycle::{
    InteractorStatus, LifecycleApplyResult, LifecycleApplyStatus, LifecycleCommand,
    LifecycleEngine, LifecycleSnapshot,
};

/// Position of an interactor in its session.
pub type InteractorId = usize;
