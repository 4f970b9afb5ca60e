//! Probabilistic touch-input disambiguation: per-element gesture models,
//! rule predicates over their progress and mediation between elements that
//! compete for the same touches.

pub mod arbiter;
pub mod config;
pub mod error;
pub mod gesture;
pub mod grammar;
pub mod interactor;
pub mod observation;
pub mod pattern;
pub mod recognizer;
pub mod rules;
pub mod session;

pub use arbiter::{Arbiter, MediationOutcome};
pub use config::{ConfigError, SceneConfig, SessionConfig};
pub use error::{CompileError, InteractorError, RecognizerError, SceneError};
pub use interactor::{InteractorCore, InteractorId, InteractorStatus};
pub use observation::{EventKind, Observation, TouchSample};
pub use session::Session;
