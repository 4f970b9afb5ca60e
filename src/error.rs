use thiserror::Error;

use crate::observation::Modality;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("gesture model needs at least one state")]
    Empty,
    #[error("transition row {row} has {len} entries, expected {expected}")]
    TransitionShape {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("initial vector has {len} entries, expected {expected}")]
    InitialShape { len: usize, expected: usize },
    #[error("covariance of state {state} is not symmetric positive-definite")]
    NotPositiveDefinite { state: usize },
    #[error("state {state} out of range for a {count}-state model")]
    StateOutOfRange { state: usize, count: usize },
    #[error("cannot fit state: {0}")]
    InvalidFit(&'static str),
}

/// Rejection of a gesture grammar or rule string. Nothing is registered when
/// a compile call fails.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("gesture `{source_text}` rejected at offset {position}: {message}")]
    Grammar {
        source_text: String,
        position: usize,
        message: String,
    },
    #[error("rule `{rule}` rejected: {message}")]
    Rule { rule: String, message: String },
}

impl CompileError {
    pub(crate) fn grammar(source_text: &str, position: usize, message: impl Into<String>) -> Self {
        Self::Grammar {
            source_text: source_text.to_string(),
            position,
            message: message.into(),
        }
    }

    pub(crate) fn rule(rule: &str, message: impl Into<String>) -> Self {
        Self::Rule {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RecognizerError {
    #[error("behavior `{behavior}` only observes touch samples, got {modality:?}")]
    WrongModality { behavior: String, modality: Modality },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum InteractorError {
    #[error("no observations yet")]
    NoObservations,
    #[error("interactor needs at least one behavior")]
    NoBehaviors,
    #[error("prior has {len} entries for {expected} behaviors or is not positive")]
    InvalidPrior { len: usize, expected: usize },
    #[error("unknown behavior `{0}`")]
    UnknownBehavior(String),
    #[error("behavior {behavior} has no marker {marker}")]
    UnknownMarker { behavior: usize, marker: usize },
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A scene interactor that could not be built.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("interactor `{interactor}`: {source}")]
pub struct SceneError {
    pub interactor: String,
    #[source]
    pub source: InteractorError,
}
