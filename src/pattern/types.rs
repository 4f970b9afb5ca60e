use crate::observation::EventKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenModifier {
    ExactlyOne,
    OneOrMore,
    ZeroOrMore,
}

impl TokenModifier {
    pub const fn is_required(self) -> bool {
        !matches!(self, Self::ZeroOrMore)
    }
}

/// One required touch event inside a state, e.g. the `u` in `Cu`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TouchEventToken {
    pub kind: EventKind,
    pub modifier: TokenModifier,
}

impl TouchEventToken {
    pub const fn new(kind: EventKind, modifier: TokenModifier) -> Self {
        Self { kind, modifier }
    }

    pub const fn exactly_one(kind: EventKind) -> Self {
        Self::new(kind, TokenModifier::ExactlyOne)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerTarget {
    State(usize),
    Event { state: usize, token: usize },
}

impl MarkerTarget {
    pub const fn state(self) -> usize {
        match self {
            Self::State(state) => state,
            Self::Event { state, .. } => state,
        }
    }
}

/// A `$` in the grammar. The flags are refreshed by every pattern check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NotificationMarker {
    pub index: usize,
    pub target: MarkerTarget,
    pub reached: bool,
    pub just_reached: bool,
}

impl NotificationMarker {
    pub const fn new(index: usize, target: MarkerTarget) -> Self {
        Self {
            index,
            target,
            reached: false,
            just_reached: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternState {
    pub initial: bool,
    pub end: bool,
    pub tokens: Vec<TouchEventToken>,
}

/// Completion automaton for one gesture. State indices match the owning
/// gesture model 1:1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequencePattern {
    states: Vec<PatternState>,
    valid: Vec<Vec<bool>>,
    markers: Vec<NotificationMarker>,
}

impl SequencePattern {
    /// `valid[from][to]` marks transitions with weight > 0. Rows shorter than
    /// the state count are padded with `false`.
    pub fn new(
        states: Vec<PatternState>,
        mut valid: Vec<Vec<bool>>,
        markers: Vec<NotificationMarker>,
    ) -> Self {
        let count = states.len();
        valid.resize_with(count, Vec::new);
        for row in &mut valid {
            row.resize(count, false);
        }
        Self {
            states,
            valid,
            markers,
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, index: usize) -> Option<&PatternState> {
        self.states.get(index)
    }

    pub fn states(&self) -> &[PatternState] {
        &self.states
    }

    pub fn is_initial(&self, state: usize) -> bool {
        self.states.get(state).is_some_and(|s| s.initial)
    }

    pub fn is_end(&self, state: usize) -> bool {
        self.states.get(state).is_some_and(|s| s.end)
    }

    pub fn tokens(&self, state: usize) -> &[TouchEventToken] {
        self.states
            .get(state)
            .map(|s| s.tokens.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_valid_transition(&self, from: usize, to: usize) -> bool {
        self.valid
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(false)
    }

    pub fn markers(&self) -> &[NotificationMarker] {
        &self.markers
    }
}

/// Outcome of one completion check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternCheckResult {
    /// Per-state count of matched spans since the last broken transition.
    pub cover: Vec<u32>,
    pub sequence_broken: bool,
    pub all_covered: bool,
    pub all_covered_once: bool,
    pub final_state: usize,
    pub just_covered_new_state: bool,
    pub ends_in_end_state: bool,
    pub has_been_completed: bool,
    /// The last sample was an `Up` while the final state was covered.
    pub ended_released: bool,
    pub is_most_likely: bool,
    pub has_just_become_most_likely: bool,
    pub markers: Vec<NotificationMarker>,
}

impl PatternCheckResult {
    pub fn has_just_completed(&self) -> bool {
        self.just_covered_new_state && self.all_covered && self.ends_in_end_state
    }

    pub fn is_covered(&self, state: usize) -> bool {
        self.cover.get(state).is_some_and(|count| *count > 0)
    }

    pub fn marker(&self, index: usize) -> Option<&NotificationMarker> {
        self.markers.iter().find(|marker| marker.index == index)
    }
}
