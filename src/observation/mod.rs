mod types;

pub use types::{EventKind, Modality, MultiTouchFrame, Observation, TouchSample};
