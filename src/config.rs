//! Runtime tuning (`session.toml`) and scene descriptions for replay.
//!
//! Both files are parsed with serde and then checked by hand; every
//! validation message names the offending field.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::arbiter::DEFAULT_RULE_OUT_MEAN_EVIDENCE;
use crate::gesture::EmissionMode;
use crate::grammar::{ElementBounds, Surface};
use crate::recognizer::DEFAULT_MAX_OBSERVATIONS;

pub const DEFAULT_MOVE_JITTER_THRESHOLD: f64 = 0.0125;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub recognizer: RecognizerConfig,
    pub grammar: GrammarConfig,
    pub arbiter: ArbiterConfig,
    pub session: InputConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RecognizerConfig {
    /// Samples kept per pointer before the window rolls.
    pub max_observations: usize,
    pub emission: EmissionMode,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            max_observations: DEFAULT_MAX_OBSERVATIONS,
            emission: EmissionMode::Gaussian,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GrammarConfig {
    pub display_density: f64,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            display_density: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ArbiterConfig {
    pub rule_out_mean_evidence: f64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            rule_out_mean_evidence: DEFAULT_RULE_OUT_MEAN_EVIDENCE,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Normalized distance under which a repeated move is dropped.
    pub move_jitter_threshold: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            move_jitter_threshold: DEFAULT_MOVE_JITTER_THRESHOLD,
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config =
            toml::from_str::<Self>(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        validate_session_config(&config)?;
        Ok(config)
    }
}

pub fn parse_session_file(path: &Path) -> Result<SessionConfig, ConfigError> {
    let raw = read(path)?;
    toml::from_str::<SessionConfig>(&raw).map_err(|err| ConfigError::Parse(err.to_string()))
}

pub fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.recognizer.max_observations == 0 {
        return Err(validation("recognizer.max_observations must be > 0"));
    }
    if !(config.grammar.display_density.is_finite() && config.grammar.display_density > 0.0) {
        return Err(validation("grammar.display_density must be > 0"));
    }
    if !config.arbiter.rule_out_mean_evidence.is_finite() {
        return Err(validation("arbiter.rule_out_mean_evidence must be finite"));
    }
    let jitter = config.session.move_jitter_threshold;
    if !(jitter.is_finite() && jitter >= 0.0) {
        return Err(validation("session.move_jitter_threshold must be >= 0"));
    }
    Ok(())
}

/// Parses and validates a session file.
pub fn load_session_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    let config = parse_session_file(path)?;
    validate_session_config(&config)?;
    log::debug!(
        "session_config_loaded path={} max_observations={} emission={:?}",
        path.display(),
        config.recognizer.max_observations,
        config.recognizer.emission
    );
    Ok(config)
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SurfaceConfig {
    pub width: f64,
    pub height: f64,
}

impl From<SurfaceConfig> for Surface {
    fn from(value: SurfaceConfig) -> Self {
        Surface::new(value.width, value.height)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BoundsConfig {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<BoundsConfig> for ElementBounds {
    fn from(value: BoundsConfig) -> Self {
        ElementBounds::new(value.x, value.y, value.width, value.height)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InteractorConfig {
    pub id: String,
    pub bounds: BoundsConfig,
    /// Gesture grammar strings, one behavior each.
    pub behaviors: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    /// Label of the rule that claims determination while it holds.
    #[serde(default)]
    pub claim_on: Option<String>,
    #[serde(default)]
    pub prior: Option<Vec<f64>>,
}

/// Screen layout for a replay: the surface and every interactor on it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    pub surface: SurfaceConfig,
    #[serde(default, rename = "interactor")]
    pub interactors: Vec<InteractorConfig>,
}

impl SceneConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let scene =
            toml::from_str::<Self>(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        validate_scene(&scene)?;
        Ok(scene)
    }
}

pub fn parse_scene_file(path: &Path) -> Result<SceneConfig, ConfigError> {
    let raw = read(path)?;
    toml::from_str::<SceneConfig>(&raw).map_err(|err| ConfigError::Parse(err.to_string()))
}

pub fn validate_scene(scene: &SceneConfig) -> Result<(), ConfigError> {
    if !positive(scene.surface.width) || !positive(scene.surface.height) {
        return Err(validation("surface.width and surface.height must be > 0"));
    }

    let mut seen = HashSet::new();
    for interactor in &scene.interactors {
        let id = interactor.id.trim();
        if id.is_empty() {
            return Err(validation("interactor.id must not be empty"));
        }
        if !seen.insert(id) {
            return Err(validation(format!("interactor.id `{id}` is duplicated")));
        }
        let bounds = interactor.bounds;
        if !(bounds.x.is_finite() && bounds.y.is_finite()) {
            return Err(validation(format!("interactor `{id}` bounds.x/y must be finite")));
        }
        if !positive(bounds.width) || !positive(bounds.height) {
            return Err(validation(format!(
                "interactor `{id}` bounds.width and bounds.height must be > 0"
            )));
        }
        if interactor.behaviors.is_empty() {
            return Err(validation(format!(
                "interactor `{id}` behaviors must list at least one gesture"
            )));
        }
        if let Some(prior) = &interactor.prior {
            if prior.len() != interactor.behaviors.len() {
                return Err(validation(format!(
                    "interactor `{id}` prior has {} entries for {} behaviors",
                    prior.len(),
                    interactor.behaviors.len()
                )));
            }
            if prior.iter().any(|p| !positive(*p)) {
                return Err(validation(format!("interactor `{id}` prior entries must be > 0")));
            }
        }
        if let Some(claim) = &interactor.claim_on {
            if claim.trim().is_empty() {
                return Err(validation(format!("interactor `{id}` claim_on must not be empty")));
            }
        }
    }
    Ok(())
}

/// Parses and validates a scene file.
pub fn load_scene(path: &Path) -> Result<SceneConfig, ConfigError> {
    let scene = parse_scene_file(path)?;
    validate_scene(&scene)?;
    log::debug!(
        "scene_loaded path={} interactors={}",
        path.display(),
        scene.interactors.len()
    );
    Ok(scene)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}
