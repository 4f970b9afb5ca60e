mod engine;
mod events;
mod machine;

pub use engine::{LifecycleApplyResult, LifecycleEngine};
pub use events::{LifecycleApplyStatus, LifecycleCommand, LifecycleSnapshot, InteractorStatus};
