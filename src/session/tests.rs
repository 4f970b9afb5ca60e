use crate::config::{SceneConfig, SessionConfig};
use crate::grammar::{ElementBounds, GrammarCompiler, Surface};
use crate::interactor::{InteractorCore, InteractorStatus};
use crate::observation::{EventKind, TouchSample};
use crate::recognizer::BehaviorRecognizer;

use super::Session;

const TWO_BUTTONS: &str = r#"
surface = { width = 1000.0, height = 1000.0 }

[[interactor]]
id = "left"
bounds = { x = 100.0, y = 400.0, width = 200.0, height = 200.0 }
behaviors = ["tap: C"]
rules = ["done: tap on complete"]
claim_on = "done"

[[interactor]]
id = "right"
bounds = { x = 700.0, y = 400.0, width = 200.0, height = 200.0 }
behaviors = ["tap: C"]
rules = ["done: tap on complete"]
claim_on = "done"
"#;

fn centred_button() -> InteractorCore {
    let compiled = GrammarCompiler::new(Surface::new(1000.0, 1000.0))
        .compile("tap: C", ElementBounds::new(400.0, 400.0, 200.0, 200.0))
        .expect("grammar compiles");
    InteractorCore::new(0, vec![BehaviorRecognizer::new(compiled)]).expect("interactor builds")
}

fn sample(kind: EventKind, pointer: u8, x: f64, y: f64, ms: u64) -> TouchSample {
    TouchSample::new(kind, pointer, x, y, ms)
}

fn two_buttons() -> Session {
    let scene = SceneConfig::from_toml_str(TWO_BUTTONS).expect("scene parses");
    Session::from_scene(&SessionConfig::default(), &scene).expect("scene builds")
}

#[test]
fn ids_follow_registration_order() {
    let mut session = Session::new(&SessionConfig::default());
    assert_eq!(session.add_interactor(centred_button()), 0);
    assert_eq!(session.add_interactor(centred_button()), 1);
    assert_eq!(session.interactor(1).map(InteractorCore::id), Some(1));
    assert!(session.interactor(2).is_none());
}

#[test]
fn tap_on_one_button_determines_it() {
    let mut session = two_buttons();
    assert_eq!(session.interactor_by_name("right").map(InteractorCore::id), Some(1));

    let outcome = session
        .handle_event(sample(EventKind::Down, 0, 0.2, 0.5, 0), None)
        .expect("down handled")
        .expect("mediation ran");
    assert_eq!(outcome.promoted, vec![0]);
    assert_eq!(outcome.determined, None);

    let outcome = session
        .handle_event(sample(EventKind::Up, 0, 0.2, 0.5, 60), None)
        .expect("up handled")
        .expect("mediation ran");
    assert_eq!(outcome.determined, Some(0));
    assert_eq!(session.determined().map(InteractorCore::name), Some("left"));
    assert_eq!(session.interactor(1).map(InteractorCore::status), Some(InteractorStatus::Idle));

    let next = session
        .handle_event(sample(EventKind::Down, 0, 0.8, 0.5, 200), None)
        .expect("down handled");
    assert!(next.is_none(), "no mediation while an interactor is determined");
}

#[test]
fn small_repeated_moves_are_filtered() {
    let mut session = Session::new(&SessionConfig::default());
    session.add_interactor(centred_button());
    let count = |session: &Session| session.interactors()[0].behaviors()[0].observation_count();

    session
        .handle(&[sample(EventKind::Down, 0, 0.5, 0.5, 0)])
        .expect("down handled");
    let filtered = session
        .handle(&[sample(EventKind::Move, 0, 0.505, 0.5, 10)])
        .expect("move handled");
    assert!(filtered.is_none());
    assert_eq!(count(&session), 1);

    session
        .handle(&[sample(EventKind::Move, 0, 0.52, 0.5, 20)])
        .expect("move handled");
    assert_eq!(count(&session), 2);
    assert_eq!(session.now_ms(), 20);
}

#[test]
fn second_pointer_only_rides_along_with_moves() {
    let mut session = Session::new(&SessionConfig::default());
    session.add_interactor(centred_button());
    let second = sample(EventKind::Move, 1, 0.55, 0.55, 0);

    session
        .handle_event(sample(EventKind::Down, 0, 0.5, 0.5, 0), Some(second))
        .expect("down handled");
    let window = session.interactors()[0].behaviors()[0].window();
    assert!(window.samples(1).is_empty());

    session
        .handle_event(sample(EventKind::Move, 0, 0.45, 0.5, 10), Some(second))
        .expect("move handled");
    let window = session.interactors()[0].behaviors()[0].window();
    assert_eq!(window.samples(0).len(), 2);
    assert_eq!(window.samples(1).len(), 1);
}

#[test]
fn deferred_self_exclusion_runs_on_the_session_clock() {
    let mut session = Session::new(&SessionConfig::default());
    let id = session.add_interactor(centred_button());
    session
        .handle(&[sample(EventKind::Down, 0, 0.5, 0.5, 0)])
        .expect("down handled");
    assert!(session.interactors()[id].is_candidate());

    assert!(session.self_exclude_after(id, 100));
    assert!(!session.self_exclude_after(9, 100));
    assert_eq!(session.pending_deferred(), 1);

    assert!(session.advance_time(50).is_none());
    let outcome = session.advance_time(100).expect("deferred work ran");
    assert_eq!(outcome.excluded, vec![id]);
    assert_eq!(session.interactors()[id].status(), InteractorStatus::Idle);
    assert!(session.arbiter().candidates().is_empty());
    assert_eq!(session.pending_deferred(), 0);
}

#[test]
fn reset_all_returns_everyone_to_idle() {
    let mut session = two_buttons();
    session
        .handle_event(sample(EventKind::Down, 0, 0.2, 0.5, 0), None)
        .expect("down handled");
    session
        .handle_event(sample(EventKind::Up, 0, 0.2, 0.5, 60), None)
        .expect("up handled");
    assert!(session.determined().is_some());

    session.reset_all();
    assert!(session.determined().is_none());
    assert!(session.arbiter().candidates().is_empty());
    assert!(session
        .interactors()
        .iter()
        .all(|core| core.status() == InteractorStatus::Idle));
}

#[test]
fn scene_errors_name_the_interactor() {
    let raw = TWO_BUTTONS.replace("claim_on = \"done\"\n\n[[interactor]]", "claim_on = \"missing\"\n\n[[interactor]]");
    let scene = SceneConfig::from_toml_str(&raw).expect("scene parses");
    let err = Session::from_scene(&SessionConfig::default(), &scene).expect_err("bad claim rule");
    assert_eq!(err.interactor, "left");

    let raw = TWO_BUTTONS.replacen("tap: C", "tap: Q", 1);
    let scene = SceneConfig::from_toml_str(&raw).expect("scene parses");
    assert!(Session::from_scene(&SessionConfig::default(), &scene).is_err());
}
