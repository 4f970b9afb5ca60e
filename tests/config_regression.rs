use std::{fs, path::PathBuf};

use probtouch::config::{
    load_scene, load_session_config, parse_session_file, validate_session_config, ConfigError,
    SessionConfig,
};
use probtouch::gesture::EmissionMode;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn repo_file(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
}

#[test]
fn shipped_config_matches_defaults() {
    let config = load_session_config(&repo_file("config/session.toml"))
        .expect("shipped session config should load");
    assert_eq!(config, SessionConfig::default());
}

#[test]
fn shipped_scene_loads() {
    let scene = load_scene(&repo_file("config/scene.toml")).expect("shipped scene should load");
    assert_eq!(scene.interactors.len(), 3);
    assert_eq!(scene.interactors[0].claim_on.as_deref(), Some("pressed"));
    assert!(scene.interactors[2].claim_on.is_none());
}

#[test]
fn every_key_is_read() {
    let config = load_session_config(&fixture("session_full.toml")).expect("fixture should load");
    assert_eq!(config.recognizer.max_observations, 20);
    assert_eq!(config.recognizer.emission, EmissionMode::Bhattacharyya);
    assert_eq!(config.grammar.display_density, 2.0);
    assert_eq!(config.arbiter.rule_out_mean_evidence, -6.5);
    assert_eq!(config.session.move_jitter_threshold, 0.0);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let config =
        load_session_config(&fixture("session_partial.toml")).expect("fixture should load");
    let defaults = SessionConfig::default();
    assert_eq!(config.arbiter.rule_out_mean_evidence, -4.0);
    assert_eq!(config.recognizer, defaults.recognizer);
    assert_eq!(config.grammar, defaults.grammar);
    assert_eq!(config.session, defaults.session);
    assert_eq!(
        SessionConfig::from_toml_str("").expect("empty file is valid"),
        defaults
    );
}

#[test]
fn semantic_validation_rejects_out_of_range_values() {
    let cases = [
        (
            "invalid/max_observations_zero.toml",
            "recognizer.max_observations must be > 0",
        ),
        (
            "invalid/display_density_negative.toml",
            "grammar.display_density must be > 0",
        ),
        (
            "invalid/rule_out_nan.toml",
            "arbiter.rule_out_mean_evidence must be finite",
        ),
        (
            "invalid/jitter_negative.toml",
            "session.move_jitter_threshold must be >= 0",
        ),
    ];

    for (name, expected) in cases {
        let config = parse_session_file(&fixture(name)).expect("fixture should parse");
        match validate_session_config(&config) {
            Err(ConfigError::Validation(msg)) => assert!(
                msg.contains(expected),
                "fixture {name}: expected `{expected}`, got `{msg}`"
            ),
            other => panic!("fixture {name}: expected validation error, got {other:?}"),
        }
    }
}

#[test]
fn parse_errors_name_the_field() {
    let cases = [
        ("invalid/unknown_emission.toml", "laplace"),
        ("invalid/unknown_key.toml", "rule_out"),
        ("invalid/scene_missing_bounds.toml", "bounds"),
    ];

    for (name, expected) in cases {
        let result = if name.contains("scene") {
            load_scene(&fixture(name)).map(|_| ())
        } else {
            load_session_config(&fixture(name)).map(|_| ())
        };
        match result {
            Err(ConfigError::Parse(msg)) => assert!(
                msg.contains(expected),
                "fixture {name}: expected `{expected}` in `{msg}`"
            ),
            other => panic!("fixture {name}: expected parse error, got {other:?}"),
        }
    }
}

#[test]
fn scene_validation_rejects_bad_layouts() {
    let cases = [
        ("invalid/scene_duplicate_id.toml", "`button` is duplicated"),
        ("invalid/scene_zero_surface.toml", "surface.width"),
        ("invalid/scene_zero_bounds.toml", "bounds.width"),
        ("invalid/scene_no_behaviors.toml", "behaviors must list"),
        ("invalid/scene_prior_length.toml", "prior has 1 entries for 2"),
    ];

    for (name, expected) in cases {
        match load_scene(&fixture(name)) {
            Err(ConfigError::Validation(msg)) => assert!(
                msg.contains(expected),
                "fixture {name}: expected `{expected}`, got `{msg}`"
            ),
            other => panic!("fixture {name}: expected validation error, got {other:?}"),
        }
    }
}

#[test]
fn io_errors_carry_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    match load_session_config(&missing) {
        Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn written_config_round_trips_through_the_loader() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.toml");
    fs::write(&path, "[session]\nmove_jitter_threshold = 0.05\n").expect("write config");
    let config = load_session_config(&path).expect("written config should load");
    assert_eq!(config.session.move_jitter_threshold, 0.05);
}
