use std::{fs, path::PathBuf};

use probtouch::config::{load_scene, SessionConfig};
use probtouch::{EventKind, Session};

use crate::replay::Replayer;
use crate::trace::{parse_expected, parse_trace, parse_trace_file};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn replay(trace: &str) -> Vec<String> {
    let scene = load_scene(&fixture("buttons.toml")).expect("scene fixture should load");
    let session =
        Session::from_scene(&SessionConfig::default(), &scene).expect("scene should build");
    let mut replayer = Replayer::new(session, scene.surface.into());
    for row in parse_trace_file(&fixture(trace)).expect("trace fixture should parse") {
        replayer.feed(row).expect("row replays");
    }
    replayer.decisions().iter().map(|d| d.key()).collect()
}

fn expected(name: &str) -> Vec<String> {
    let raw = fs::read_to_string(fixture(name)).expect("expectation fixture");
    parse_expected(&raw).expect("expectations parse")
}

#[test]
fn tap_trace_matches_expectations() {
    assert_eq!(replay("tap_right.csv"), expected("tap_right.expected"));
}

#[test]
fn slipping_off_a_button_only_excludes_it() {
    assert_eq!(replay("slip_off.csv"), expected("slip_off.expected"));
}

#[test]
fn trace_rows_are_parsed_with_optional_contact_columns() {
    let rows = parse_trace(
        "# comment\n\
         touch_trace,ms,kind,pointer,x,y\n\
         touch_trace,5,DOWN,1,10.5,20\n\
         other,1,2,3\n\
         touch_trace,9,move,1,11,21,0.3,4,6,0.5\n",
    )
    .expect("trace parses");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].kind, EventKind::Down);
    assert_eq!(rows[0].pointer, 1);
    assert_eq!(rows[0].pressure, 0.0);
    assert_eq!(rows[1].major, 6.0);

    let sample = rows[1].to_sample(probtouch::grammar::Surface::new(100.0, 50.0));
    assert!((sample.x - 0.11).abs() < 1e-12);
    assert!((sample.y - 0.42).abs() < 1e-12);
    assert_eq!(sample.raw_x, 11.0);
}

#[test]
fn malformed_rows_name_the_line_and_field() {
    let cases = [
        ("touch_trace,0,hover,0,1,1", "line 1: invalid kind"),
        ("touch_trace,x,down,0,1,1", "line 1: invalid ms"),
        ("\ntouch_trace,0,down,0,1", "line 2: expected 6 or 10 columns"),
        ("touch_trace,0,down,300,1,1", "line 1: invalid pointer"),
    ];
    for (raw, needle) in cases {
        let err = parse_trace(raw).expect_err("row should be rejected");
        assert!(
            format!("{err:#}").contains(needle),
            "`{raw}`: expected `{needle}`, got `{err:#}`"
        );
    }
}

#[test]
fn expectations_reject_unknown_kinds() {
    assert_eq!(
        parse_expected("# header\nPromote: left\n\ndetermine:left\n").expect("parses"),
        vec!["promote:left".to_string(), "determine:left".to_string()]
    );
    assert!(parse_expected("tap:left").is_err());
    assert!(parse_expected("determine").is_err());
}

#[test]
fn trace_files_round_trip_through_the_reader() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("trace.csv");
    fs::write(&path, "touch_trace,1,up,0,3,4\n").expect("write trace");
    let rows = parse_trace_file(&path).expect("trace parses");
    assert_eq!(rows[0].ms, 1);
    assert!(parse_trace_file(&dir.path().join("missing.csv")).is_err());
}
