use crate::error::CompileError;
use crate::observation::EventKind;
use crate::pattern::{TokenModifier, TouchEventToken};

use super::ElementBounds;

const ZOOM_FACTOR: f64 = 1.5;

/// Where the scanner stands relative to the state currently being built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Nothing of the next state has been read.
    Idle,
    /// Tokens of a state are pending commit.
    State,
    /// A transition arrow was read and its target state is still missing.
    AfterTransition,
}

/// What `$` attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LastToken {
    Other,
    Event,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DetailKey {
    Scale,
    ScaleX,
    ScaleY,
    Width,
    Height,
}

impl DetailKey {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "s" => Some(Self::Scale),
            "sx" => Some(Self::ScaleX),
            "sy" => Some(Self::ScaleY),
            "w" => Some(Self::Width),
            "h" => Some(Self::Height),
            _ => None,
        }
    }
}

/// Placement cursor in pixels: centre plus size of the next state.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Cursor {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Cursor {
    fn seeded(element: ElementBounds) -> Self {
        let [x, y] = element.centre();
        Self {
            x,
            y,
            w: element.width,
            h: element.height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct ParsedEvent {
    pub(super) token: TouchEventToken,
    pub(super) marker: bool,
}

#[derive(Clone, Debug, Default)]
struct PendingState {
    location: String,
    end: bool,
    marker: bool,
    params: Vec<(DetailKey, f64)>,
    events: Vec<ParsedEvent>,
    start: usize,
}

impl PendingState {
    fn is_empty(&self) -> bool {
        self.location.is_empty()
            && !self.end
            && !self.marker
            && self.params.is_empty()
            && self.events.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct ParsedState {
    pub(super) cx: f64,
    pub(super) cy: f64,
    pub(super) w: f64,
    pub(super) h: f64,
    pub(super) end: bool,
    pub(super) marker: bool,
    pub(super) events: Vec<ParsedEvent>,
}

#[derive(Clone, Debug)]
pub(super) struct ParsedGrammar {
    pub(super) label: Option<String>,
    pub(super) body: String,
    pub(super) states: Vec<ParsedState>,
    /// Every recorded `(from, to)` pair, self transitions included.
    pub(super) transitions: Vec<(usize, usize)>,
    pub(super) only_two_way: bool,
    pub(super) relative: bool,
    /// Element box after any `O[w=..,h=..]` resize.
    pub(super) element: ElementBounds,
}

/// Single left-to-right scan over one grammar string.
pub(super) struct GrammarParser<'a> {
    source: &'a str,
    body: &'a str,
    body_offset: usize,
    pos: usize,
    density: f64,
    element: ElementBounds,
    cursor: Cursor,
    phase: Phase,
    last: LastToken,
    pending: PendingState,
    states: Vec<ParsedState>,
    transitions: Vec<(usize, usize)>,
    last_committed: Option<usize>,
    only_two_way: bool,
    relative: bool,
}

impl<'a> GrammarParser<'a> {
    pub(super) fn new(source: &'a str, element: ElementBounds, density: f64) -> Self {
        let (body, body_offset) = match source.find(':') {
            Some(colon) => (&source[colon + 1..], colon + 1),
            None => (source, 0),
        };
        Self {
            source,
            body,
            body_offset,
            pos: 0,
            density,
            element,
            cursor: Cursor::seeded(element),
            phase: Phase::Idle,
            last: LastToken::Other,
            pending: PendingState::default(),
            states: Vec::new(),
            transitions: Vec::new(),
            last_committed: None,
            only_two_way: true,
            relative: false,
        }
    }

    pub(super) fn parse(mut self) -> Result<ParsedGrammar, CompileError> {
        let label = if self.body_offset > 0 {
            let label = self.source[..self.body_offset - 1].trim();
            (!label.is_empty()).then(|| label.to_string())
        } else {
            None
        };

        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
                continue;
            }
            self.step(ch)?;
        }

        match self.phase {
            Phase::AfterTransition => {
                return Err(self.error_at(self.body.len(), "transition has no target state"));
            }
            Phase::State => self.commit_state()?,
            Phase::Idle => {}
        }
        if self.states.is_empty() {
            return Err(self.error_at(0, "gesture has no states"));
        }

        Ok(ParsedGrammar {
            label,
            body: self.body.split_whitespace().collect(),
            states: self.states,
            transitions: self.transitions,
            only_two_way: self.only_two_way,
            relative: self.relative,
            element: self.element,
        })
    }

    fn peek(&self) -> Option<char> {
        self.body[self.pos..].chars().next()
    }

    fn error_at(&self, body_pos: usize, message: impl Into<String>) -> CompileError {
        CompileError::grammar(self.source, self.body_offset + body_pos, message)
    }

    fn begin_state(&mut self) {
        if self.phase != Phase::State {
            self.pending.start = self.pos;
            self.phase = Phase::State;
        }
    }

    fn step(&mut self, ch: char) -> Result<(), CompileError> {
        let at = self.pos;
        self.pos += ch.len_utf8();
        match ch {
            'N' | 'S' | 'E' | 'W' | 'C' | 'O' | 'T' | 'B' | 'R' | 'L' | 'Z' | 'X' | 'Y' | 'z'
            | 'x' | 'y' => {
                self.begin_state();
                self.move_cursor(ch);
                self.pending.location.push(ch);
                self.last = LastToken::Other;
            }
            '[' => {
                if self.pending.location.is_empty() {
                    return Err(self.error_at(at, "detail block without a state location"));
                }
                self.parse_details(at)?;
                self.last = LastToken::Other;
            }
            '.' => {
                self.begin_state();
                self.pending.end = true;
                self.last = LastToken::Other;
            }
            'd' | 'u' | 'm' => {
                self.begin_state();
                let kind = match ch {
                    'd' => EventKind::Down,
                    'u' => EventKind::Up,
                    _ => EventKind::Move,
                };
                self.pending.events.push(ParsedEvent {
                    token: TouchEventToken::exactly_one(kind),
                    marker: false,
                });
                self.last = LastToken::Event;
            }
            '+' | '*' => {
                let Some(event) = self.pending.events.last_mut() else {
                    return Err(self.error_at(at, format!("modifier `{ch}` has no event")));
                };
                event.token.modifier = if ch == '+' {
                    TokenModifier::OneOrMore
                } else {
                    TokenModifier::ZeroOrMore
                };
                self.last = LastToken::Event;
            }
            '$' => {
                self.begin_state();
                match (self.last, self.pending.events.last_mut()) {
                    (LastToken::Event, Some(event)) => event.marker = true,
                    _ => self.pending.marker = true,
                }
                self.last = LastToken::Other;
            }
            '-' => {
                self.expect('>', at)?;
                self.transition(at, false)?;
            }
            '<' => {
                self.expect('-', at)?;
                self.expect('>', at)?;
                self.transition(at, true)?;
            }
            other => {
                return Err(self.error_at(at, format!("unexpected character `{other}`")));
            }
        }
        Ok(())
    }

    fn expect(&mut self, wanted: char, token_start: usize) -> Result<(), CompileError> {
        match self.peek() {
            Some(ch) if ch == wanted => {
                self.pos += ch.len_utf8();
                Ok(())
            }
            _ => Err(self.error_at(token_start, "malformed transition arrow")),
        }
    }

    fn move_cursor(&mut self, ch: char) {
        let c = &mut self.cursor;
        match ch {
            'N' => c.y -= c.h,
            'S' => c.y += c.h,
            'E' => c.x += c.w,
            'W' => c.x -= c.w,
            'C' => {}
            'O' => self.relative = true,
            'T' => {
                c.h /= 2.0;
                c.y -= c.h;
            }
            'B' => {
                c.h /= 2.0;
                c.y += c.h;
            }
            'R' => {
                c.w /= 2.0;
                c.x += c.w;
            }
            'L' => {
                c.w /= 2.0;
                c.x -= c.w;
            }
            'Z' => {
                c.w *= ZOOM_FACTOR;
                c.h *= ZOOM_FACTOR;
            }
            'X' => c.w *= ZOOM_FACTOR,
            'Y' => c.h *= ZOOM_FACTOR,
            'z' => {
                c.w /= 2.0;
                c.h /= 2.0;
            }
            'x' => c.w /= 2.0,
            'y' => c.h /= 2.0,
            _ => {}
        }
    }

    fn parse_details(&mut self, open: usize) -> Result<(), CompileError> {
        let Some(close) = self.body[self.pos..].find(']') else {
            return Err(self.error_at(open, "unterminated detail block"));
        };
        let content_start = self.pos;
        let content = &self.body[content_start..content_start + close];
        self.pos = content_start + close + 1;

        for entry in content.split(',') {
            let entry: String = entry.split_whitespace().collect();
            let Some((key, value)) = entry.split_once('=') else {
                return Err(self.error_at(open, format!("detail `{entry}` is missing `=`")));
            };
            let Some(key) = DetailKey::parse(key) else {
                return Err(self.error_at(open, format!("unknown detail key `{key}`")));
            };
            let value = match value.parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                _ => {
                    return Err(
                        self.error_at(open, format!("detail value `{value}` is not a number"))
                    );
                }
            };

            if self.pending.location == "O" {
                match key {
                    DetailKey::Width => self.element.width = value * self.density,
                    DetailKey::Height => self.element.height = value * self.density,
                    _ => {}
                }
                self.cursor = Cursor::seeded(self.element);
            }
            self.pending.params.push((key, value));
        }
        Ok(())
    }

    fn transition(&mut self, at: usize, two_way: bool) -> Result<(), CompileError> {
        if self.pending.location.is_empty() {
            return Err(self.error_at(at, "transition has no source state"));
        }
        self.commit_state()?;
        let Some(from) = self.last_committed else {
            return Err(self.error_at(at, "transition has no source state"));
        };
        let to = self.states.len();
        self.transitions.push((from, to));
        if two_way {
            self.transitions.push((to, from));
        } else {
            self.only_two_way = false;
        }
        self.phase = Phase::AfterTransition;
        self.last = LastToken::Other;
        Ok(())
    }

    fn commit_state(&mut self) -> Result<(), CompileError> {
        let pending = std::mem::take(&mut self.pending);
        if pending.location.is_empty() {
            if pending.is_empty() {
                return Ok(());
            }
            return Err(self.error_at(pending.start, "state has no location"));
        }

        let mut w = self.cursor.w;
        let mut h = self.cursor.h;
        for (key, value) in &pending.params {
            match key {
                DetailKey::Scale => {
                    w *= value;
                    h *= value;
                }
                DetailKey::ScaleX => w *= value,
                DetailKey::ScaleY => h *= value,
                DetailKey::Width => w = value * self.density,
                DetailKey::Height => h = value * self.density,
            }
        }
        if w <= 0.0 || h <= 0.0 {
            return Err(self.error_at(pending.start, "state has no area"));
        }

        let index = self.states.len();
        self.states.push(ParsedState {
            cx: self.cursor.x,
            cy: self.cursor.y,
            w,
            h,
            end: pending.end,
            marker: pending.marker,
            events: pending.events,
        });
        self.transitions.push((index, index));
        self.last_committed = Some(index);

        self.cursor = Cursor::seeded(self.element);
        self.phase = Phase::Idle;
        Ok(())
    }
}
