use crate::observation::EventKind;

use super::types::{
    MarkerTarget, NotificationMarker, PatternCheckResult, SequencePattern, TokenModifier,
    TouchEventToken,
};

/// Decides completion of `pattern` for a decoded state path and the event
/// kinds observed along it. Returns `None` for an empty path.
pub fn check(
    path: &[usize],
    kinds: &[EventKind],
    pattern: &SequencePattern,
    previous: Option<&PatternCheckResult>,
) -> Option<PatternCheckResult> {
    let count = pattern.state_count();
    let final_state = *path.last()?;
    if path.iter().any(|state| *state >= count) {
        log::warn!(
            "pattern_check path_out_of_range states={} path_len={}",
            count,
            path.len()
        );
        return None;
    }

    let mut markers: Vec<NotificationMarker> = match previous {
        Some(previous) if previous.markers.len() == pattern.markers().len() => {
            previous.markers.clone()
        }
        _ => pattern.markers().to_vec(),
    };

    let mut result = PatternCheckResult {
        cover: vec![0; count],
        final_state,
        ..PatternCheckResult::default()
    };
    let mut reached = vec![0u32; count];

    let mut current = path[0];
    let mut span_start = 0;
    for (i, &next) in path.iter().enumerate() {
        reached[next] += 1;

        if i >= 1 && current != next {
            let span = span_of(kinds, span_start, i);
            if match_span(pattern.tokens(current), span, current, false, &mut markers) {
                result.cover[current] += 1;
            }
            span_start = i;
        }

        if i > 0 && pattern.is_valid_transition(current, next) {
            if all_covered(&result.cover) {
                result.all_covered = true;
                result.all_covered_once = true;
            }
        } else if i > 0 || !pattern.is_initial(next) {
            result.sequence_broken = true;
            result.all_covered = false;
            result.cover.iter_mut().for_each(|c| *c = 0);
            reached.iter_mut().for_each(|r| *r = 0);
        }

        current = next;
    }

    let span = span_of(kinds, span_start, path.len());
    if match_span(pattern.tokens(current), span, current, true, &mut markers) {
        result.cover[current] += 1;
    }
    if all_covered(&result.cover) {
        result.all_covered = true;
        result.all_covered_once = true;
    }

    let final_covered = result.cover[final_state] == 1;
    if count == 1 {
        result.all_covered = final_covered;
        result.all_covered_once = final_covered;
    }
    result.ends_in_end_state = pattern.is_end(final_state);
    result.ended_released =
        kinds.get(path.len() - 1) == Some(&EventKind::Up) && result.cover[final_state] > 0;

    result.just_covered_new_state = if pattern.tokens(final_state).is_empty() {
        // A state without required events completes on release.
        let already_released = previous
            .is_some_and(|p| p.ended_released && p.final_state == final_state);
        result.ended_released && !already_released
    } else {
        let first_sample = path.len() == 1 && final_covered;
        let newly_covered = previous.is_some_and(|p| {
            final_covered && p.cover.get(final_state).copied().unwrap_or(0) == 0
        });
        first_sample || newly_covered
    };

    if let Some(previous) = previous {
        if previous.has_just_completed() || previous.has_been_completed {
            result.has_been_completed = result.ends_in_end_state;
        }
    }
    if result.has_just_completed() {
        result.has_been_completed = true;
    }

    for marker in &mut markers {
        if let MarkerTarget::State(state) = marker.target {
            marker.reached = reached[state] > 0;
            marker.just_reached = state == final_state
                && marker.reached
                && previous.is_none_or(|p| p.final_state != final_state);
        }
    }
    result.markers = markers;

    log::trace!(
        "pattern_check final_state={} broken={} all_covered={} just_covered={} completed={}",
        result.final_state,
        result.sequence_broken,
        result.all_covered,
        result.just_covered_new_state,
        result.has_been_completed
    );
    Some(result)
}

fn span_of(kinds: &[EventKind], start: usize, end: usize) -> &[EventKind] {
    kinds.get(start..end.min(kinds.len())).unwrap_or(&[])
}

fn all_covered(cover: &[u32]) -> bool {
    cover.iter().all(|c| *c > 0)
}

/// Matches one state's required events against the event kinds of its span.
fn match_span(
    tokens: &[TouchEventToken],
    span: &[EventKind],
    state: usize,
    is_final: bool,
    markers: &mut [NotificationMarker],
) -> bool {
    if tokens.is_empty() {
        return true;
    }
    if span.is_empty() {
        return false;
    }

    let mut matches = vec![0u32; tokens.len()];
    let ok = run_tokens(tokens, span, &mut matches);
    update_event_markers(markers, state, &matches, is_final);
    ok
}

fn run_tokens(tokens: &[TouchEventToken], span: &[EventKind], matches: &mut [u32]) -> bool {
    let mut token_index = 0;
    let mut sample_index = 0;

    while sample_index < span.len() && token_index < tokens.len() {
        let sample = span[sample_index];
        let token = tokens[token_index];

        // Jitter: moves are skippable unless a move is what we are looking for.
        if sample == EventKind::Move && token.kind != EventKind::Move {
            sample_index += 1;
            continue;
        }

        if token.kind == sample {
            matches[token_index] += 1;
            sample_index += 1;
            if token.modifier == TokenModifier::ExactlyOne {
                token_index += 1;
            }
            continue;
        }

        match token.modifier {
            TokenModifier::ExactlyOne => return false,
            TokenModifier::OneOrMore if matches[token_index] == 0 => return false,
            TokenModifier::OneOrMore | TokenModifier::ZeroOrMore => token_index += 1,
        }
    }

    if token_index >= tokens.len() {
        let trailing_move_allowed = tokens
            .last()
            .is_some_and(|token| token.kind != EventKind::Move);
        let leftover = &span[sample_index..];
        if leftover
            .iter()
            .any(|kind| *kind != EventKind::Move || !trailing_move_allowed)
        {
            return false;
        }
    }

    tokens
        .iter()
        .zip(matches.iter())
        .all(|(token, count)| !token.modifier.is_required() || *count > 0)
}

fn update_event_markers(
    markers: &mut [NotificationMarker],
    state: usize,
    matches: &[u32],
    is_final: bool,
) {
    for marker in markers.iter_mut() {
        let MarkerTarget::Event {
            state: marker_state,
            token,
        } = marker.target
        else {
            continue;
        };
        if marker_state != state {
            continue;
        }
        let hit = matches.get(token).is_some_and(|count| *count > 0);
        marker.reached = hit;
        marker.just_reached = is_final && hit;
    }
}
