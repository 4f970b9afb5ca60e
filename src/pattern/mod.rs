mod checker;
mod types;

pub use checker::check;
pub use types::{
    MarkerTarget, NotificationMarker, PatternCheckResult, PatternState, SequencePattern,
    TokenModifier, TouchEventToken,
};
