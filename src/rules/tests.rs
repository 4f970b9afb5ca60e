use std::cell::RefCell;
use std::rc::Rc;

use crate::error::CompileError;
use crate::grammar::{ElementBounds, GrammarCompiler, Surface};
use crate::observation::{EventKind, TouchSample};
use crate::recognizer::BehaviorRecognizer;

use super::{RuleFiring, Rulebook};

fn behavior(source: &str) -> BehaviorRecognizer {
    let compiled = GrammarCompiler::new(Surface::new(1000.0, 1000.0))
        .compile(source, ElementBounds::new(400.0, 400.0, 200.0, 200.0))
        .expect("grammar compiles");
    BehaviorRecognizer::new(compiled)
}

fn tap_book() -> (Vec<BehaviorRecognizer>, Rulebook) {
    let behaviors = vec![behavior("tap: C"), behavior("swipe: C->E")];
    let book = Rulebook::new(behaviors.iter().map(|b| b.label().to_string()));
    (behaviors, book)
}

fn press(behaviors: &mut [BehaviorRecognizer], kind: EventKind, ms: u64, pressure: f64) {
    let sample = TouchSample::new(kind, 0, 0.5, 0.5, ms).with_pressure(pressure);
    for behavior in behaviors {
        behavior.observe_touch(&sample);
    }
}

fn rule_error(book: &mut Rulebook, statement: &str) -> String {
    match book.add_rule(statement) {
        Err(CompileError::Rule { message, .. }) => message,
        other => panic!("`{statement}` should be rejected, got {other:?}"),
    }
}

#[test]
fn negation_tracks_its_operand_within_one_cycle() {
    let (mut behaviors, mut book) = tap_book();
    book.add_rule("a: tap is complete").expect("a compiles");
    book.add_rule("b: not a").expect("b compiles");

    book.update(&behaviors);
    assert_eq!(book.is_satisfied("a"), Some(false));
    assert_eq!(book.is_satisfied("b"), Some(true));

    press(&mut behaviors, EventKind::Down, 0, 0.5);
    book.update(&behaviors);
    assert_eq!(book.is_satisfied("a"), Some(false));
    assert_eq!(book.is_satisfied("b"), Some(true));

    press(&mut behaviors, EventKind::Up, 80, 0.5);
    book.update(&behaviors);
    assert_eq!(book.is_satisfied("a"), Some(true));
    assert_eq!(book.is_satisfied("b"), Some(false));
}

#[test]
fn nodes_are_checked_once_per_cycle() {
    let (behaviors, mut book) = tap_book();
    book.add_rule("a: tap is complete").expect("a compiles");
    book.add_rule("b: not a").expect("b compiles");

    book.update(&behaviors);
    assert_eq!(book.check_count("a"), Some(1));
    assert_eq!(book.check_count("b"), Some(1));

    assert_eq!(book.evaluate("a", &behaviors), Some(false));
    assert_eq!(book.evaluate("b", &behaviors), Some(true));
    assert_eq!(book.check_count("a"), Some(1));
    assert_eq!(book.check_count("b"), Some(1));

    book.update(&behaviors);
    assert_eq!(book.check_count("a"), Some(2));
    assert_eq!(book.evaluate("missing", &behaviors), None);
}

#[test]
fn shared_subexpressions_are_interned() {
    let (_, mut book) = tap_book();
    book.add_rule("r1: tap on complete and swipe is complete")
        .expect("r1 compiles");
    book.add_rule("r2: (tap on complete) or swipe is complete")
        .expect("r2 compiles");
    assert_eq!(book.node_count(), 4);

    let label = book.add_rule("tap on complete").expect("leaf compiles");
    assert_eq!(label, "tap_on_complete");
    assert_eq!(book.node_count(), 4);

    let label = book.add_rule("not swipe is complete").expect("not compiles");
    assert_eq!(label, "not_swipe_is_complete");
    assert_eq!(book.node_count(), 5);
}

#[test]
fn listeners_fire_while_true_with_consecutive_count() {
    let (mut behaviors, mut book) = tap_book();
    let firings: Rc<RefCell<Vec<RuleFiring>>> = Rc::default();
    let sink = Rc::clone(&firings);
    book.add_rule_with_listener("held: tap is complete", move |firing| {
        sink.borrow_mut().push(firing.clone())
    })
    .expect("rule compiles");

    press(&mut behaviors, EventKind::Down, 0, 0.5);
    book.update(&behaviors);
    assert!(firings.borrow().is_empty());

    press(&mut behaviors, EventKind::Up, 50, 0.5);
    book.update(&behaviors);
    book.update(&behaviors);

    let firings = firings.borrow();
    assert_eq!(firings.len(), 2);
    assert_eq!(firings[0].label, "held");
    assert!(firings[0].is_rising_edge());
    assert_eq!(firings[1].consecutive_true, 1);
    assert!(!firings[1].is_rising_edge());
}

#[test]
fn time_qualifier_bounds_the_gesture_duration() {
    let (mut quick, mut book) = tap_book();
    book.add_rule("quick: tap on complete in 500ms").expect("compiles");
    press(&mut quick, EventKind::Down, 0, 0.5);
    press(&mut quick, EventKind::Up, 100, 0.5);
    book.update(&quick);
    assert_eq!(book.is_satisfied("quick"), Some(true));

    let (mut slow, mut book) = tap_book();
    book.add_rule("quick: tap on complete in 0.5 s").expect("compiles");
    press(&mut slow, EventKind::Down, 0, 0.5);
    press(&mut slow, EventKind::Up, 800, 0.5);
    book.update(&slow);
    assert_eq!(book.is_satisfied("quick"), Some(false));
    assert_eq!(book.is_satisfied("tap_on_complete"), Some(true));
}

#[test]
fn pressure_and_finger_qualifiers_use_running_means() {
    let (mut behaviors, mut book) = tap_book();
    book.add_rule("hard: tap is complete with >0.5 p").expect("compiles");
    book.add_rule("soft: tap is complete with <0.5p").expect("compiles");
    book.add_rule("one: tap is complete using 1 fingers").expect("compiles");
    book.add_rule("two: tap is complete using 2 fingers").expect("compiles");
    press(&mut behaviors, EventKind::Down, 0, 0.6);
    press(&mut behaviors, EventKind::Up, 40, 0.6);
    book.update(&behaviors);
    assert_eq!(book.is_satisfied("hard"), Some(true));
    assert_eq!(book.is_satisfied("soft"), Some(false));
    assert_eq!(book.is_satisfied("one"), Some(true));
    assert_eq!(book.is_satisfied("two"), Some(false));
}

#[test]
fn most_likely_edge_fires_once() {
    let (mut behaviors, mut book) = tap_book();
    book.add_rule("edge: tap on most_likely").expect("compiles");
    book.add_rule("level: tap is most_likely").expect("compiles");
    behaviors[0].set_most_likely(true);
    press(&mut behaviors, EventKind::Down, 0, 0.5);

    book.update(&behaviors);
    assert_eq!(book.is_satisfied("edge"), Some(true));
    assert_eq!(book.is_satisfied("level"), Some(true));

    book.update(&behaviors);
    assert_eq!(book.is_satisfied("edge"), Some(false));
    assert_eq!(book.is_satisfied("level"), Some(true));
}

#[test]
fn behavior_listener_registers_a_dummy_rule() {
    let (mut behaviors, mut book) = tap_book();
    let seen: Rc<RefCell<Vec<bool>>> = Rc::default();
    let sink = Rc::clone(&seen);
    book.set_behavior_listener(0, move |label, result| {
        assert_eq!(label, "tap");
        sink.borrow_mut().push(result.is_some());
    })
    .expect("listener registers");
    assert!(book.labels().any(|label| label == "tap_notification_dummy"));

    book.update(&behaviors);
    press(&mut behaviors, EventKind::Down, 0, 0.5);
    book.update(&behaviors);
    assert_eq!(*seen.borrow(), vec![false, true]);
    assert!(book.behavior_result(0).is_some());
    assert!(book.set_behavior_listener(7, |_, _| {}).is_err());
}

#[test]
fn reset_forgets_previous_pattern_results() {
    let (mut behaviors, mut book) = tap_book();
    book.add_rule("a: tap is complete").expect("compiles");
    press(&mut behaviors, EventKind::Down, 0, 0.5);
    book.update(&behaviors);
    assert!(book.last_result("a").is_some());
    book.reset();
    assert!(book.last_result("a").is_none());
    assert!(book.behavior_result(0).is_none());
}

#[test]
fn malformed_rules_are_rejected_without_side_effects() {
    let (_, mut book) = tap_book();
    book.add_rule("base: tap is complete").expect("compiles");
    let nodes = book.node_count();

    let cases = [
        ("ghost is complete", "unknown behavior"),
        ("tap is complete and ghost", "no rule labelled"),
        ("(tap is complete and swipe is complete) in 5 ms", "must follow a behavior event"),
        ("tap is complete in abc ms", "bad qualifier"),
        ("tap is complete using 2 p", "bad qualifier"),
        ("tap is complete and", "missing an operand"),
        ("", "empty rule"),
        ("lbl:", "empty rule"),
        ("(tap is complete", "unbalanced"),
        ("tap is complete)", "unbalanced"),
        ("tap tap tap tap", "cannot parse"),
    ];
    for (statement, needle) in cases {
        let message = rule_error(&mut book, statement);
        assert!(
            message.contains(needle),
            "`{statement}`: expected `{needle}` in `{message}`"
        );
    }
    assert_eq!(book.node_count(), nodes);
}

#[test]
fn references_reuse_labelled_rules() {
    let (_, mut book) = tap_book();
    book.add_rule("base: tap is complete").expect("compiles");
    book.add_rule("timed: base in <300 ms").expect("qualifier on a labelled leaf");
    assert_eq!(book.node_count(), 2);
    assert!(book.labels().any(|label| label == "tap_is_complete_in_<300ms"));
    assert!(book.labels().any(|label| label == "timed"));
    assert!(!book.labels().any(|label| label == "base_in_<300ms"));
}

#[test]
fn labelled_sub_rules_keep_canonical_interning() {
    let (mut behaviors, mut book) = tap_book();
    book.add_rule("x: tap is complete and swipe is complete")
        .expect("x compiles");
    book.add_rule("a: tap is complete").expect("a compiles");
    assert_eq!(book.node_count(), 3);

    let label = book
        .add_rule("tap is complete and swipe is complete")
        .expect("unlabelled compiles");
    assert_eq!(label, "tap_is_complete_and_swipe_is_complete");
    assert_eq!(book.node_count(), 3);

    let label = book.add_rule("a and swipe is complete").expect("reference compiles");
    assert_eq!(label, "tap_is_complete_and_swipe_is_complete");
    assert_eq!(book.node_count(), 3);

    press(&mut behaviors, EventKind::Down, 0, 0.5);
    press(&mut behaviors, EventKind::Up, 50, 0.5);
    book.update(&behaviors);
    assert_eq!(book.is_satisfied("a"), book.is_satisfied("tap_is_complete"));
    assert_eq!(
        book.is_satisfied("x"),
        book.is_satisfied("tap_is_complete_and_swipe_is_complete")
    );
}

#[test]
fn a_label_cannot_be_rebound_to_another_rule() {
    let (_, mut book) = tap_book();
    book.add_rule("a: tap is complete").expect("a compiles");
    book.add_rule("a: tap is complete").expect("same rule, same label");
    book.add_rule("tap_is_complete: tap is complete")
        .expect("canonical label names its own rule");
    let nodes = book.node_count();

    let cases = [
        ("a: swipe is complete", "label `a` already names `tap_is_complete`"),
        ("tap_is_complete: swipe is complete", "already names"),
    ];
    for (statement, needle) in cases {
        let message = rule_error(&mut book, statement);
        assert!(
            message.contains(needle),
            "`{statement}`: expected `{needle}` in `{message}`"
        );
    }
    assert_eq!(book.node_count(), nodes);
    assert!(!book.labels().any(|label| label == "swipe_is_complete"));
}
