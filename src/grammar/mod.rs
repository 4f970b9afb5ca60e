//! Gesture grammar: compiles strings like `C->E.` into a [`GestureModel`]
//! and the matching [`SequencePattern`].

mod parser;

use glam::{DMat2, DVec2};

use crate::error::CompileError;
use crate::gesture::{EmissionMode, GestureModel};
use crate::pattern::{MarkerTarget, NotificationMarker, PatternState, SequencePattern};

use parser::{GrammarParser, ParsedGrammar};

/// Added to every initial and transition probability before renormalizing.
pub const LAPLACE_EPSILON: f64 = 0.001;
pub const DEFAULT_ACCEPTED_POINTERS: [u8; 2] = [0, 1];

/// Element bounding box in pixels; `x`, `y` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElementBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementBounds {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centre(&self) -> [f64; 2] {
        [self.x + self.width / 2.0, self.y + self.height / 2.0]
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Screen size in pixels. Means and covariances are normalized by it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub width: f64,
    pub height: f64,
}

impl Surface {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Output of one successful compile.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledBehavior {
    /// Explicit `label:` prefix, or the whitespace-free body when absent.
    pub label: String,
    pub model: GestureModel,
    pub pattern: SequencePattern,
    /// Normalized element centre for gestures starting with `O`.
    pub relative_origin: Option<[f64; 2]>,
    pub accepted_pointers: Vec<u8>,
}

impl CompiledBehavior {
    pub fn is_relative(&self) -> bool {
        self.relative_origin.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrammarCompiler {
    surface: Surface,
    display_density: f64,
    emission: EmissionMode,
}

impl GrammarCompiler {
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            display_density: 1.0,
            emission: EmissionMode::default(),
        }
    }

    pub fn with_display_density(mut self, display_density: f64) -> Self {
        self.display_density = display_density;
        self
    }

    pub fn with_emission(mut self, emission: EmissionMode) -> Self {
        self.emission = emission;
        self
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// Compiles one grammar string for an element. Nothing is produced on
    /// error.
    pub fn compile(
        &self,
        source: &str,
        bounds: ElementBounds,
    ) -> Result<CompiledBehavior, CompileError> {
        if !(self.surface.width > 0.0 && self.surface.height > 0.0) {
            return Err(CompileError::grammar(source, 0, "surface must have a positive size"));
        }
        if !(bounds.width > 0.0 && bounds.height > 0.0) {
            return Err(CompileError::grammar(source, 0, "element must have a positive size"));
        }

        let parsed = GrammarParser::new(source, bounds, self.display_density).parse()?;
        let compiled = self.build(source, parsed)?;
        log::debug!(
            "grammar_compiled label={} states={} relative={}",
            compiled.label,
            compiled.model.state_count(),
            compiled.is_relative()
        );
        Ok(compiled)
    }

    fn build(&self, source: &str, parsed: ParsedGrammar) -> Result<CompiledBehavior, CompileError> {
        let n = parsed.states.len();
        let (sw, sh) = (self.surface.width, self.surface.height);

        let mut out_degree = vec![0usize; n];
        for (from, _) in &parsed.transitions {
            out_degree[*from] += 1;
        }

        let mut transitions = vec![vec![0.0; n]; n];
        let mut valid = vec![vec![false; n]; n];
        for &(from, to) in &parsed.transitions {
            transitions[from][to] = 1.0 / out_degree[from] as f64;
            valid[from][to] = true;
        }

        let mut initial = vec![0.0; n];
        initial[0] = 1.0;
        if n > 1 && out_degree[n - 1] > 1 {
            initial[n - 1] = 1.0;
        }

        let any_end = parsed.states.iter().any(|state| state.end);
        let mut markers = Vec::new();
        let mut pattern_states = Vec::with_capacity(n);
        for (index, state) in parsed.states.iter().enumerate() {
            if state.marker {
                markers.push(NotificationMarker::new(markers.len(), MarkerTarget::State(index)));
            }
            for (token, event) in state.events.iter().enumerate() {
                if event.marker {
                    markers.push(NotificationMarker::new(
                        markers.len(),
                        MarkerTarget::Event {
                            state: index,
                            token,
                        },
                    ));
                }
            }
            pattern_states.push(PatternState {
                initial: initial[index] > 0.0,
                end: state.end,
                tokens: state.events.iter().map(|event| event.token).collect(),
            });
        }
        if !any_end {
            pattern_states[n - 1].end = true;
            if parsed.only_two_way {
                pattern_states[0].end = true;
            }
        }

        laplace_correct(&mut initial);
        for row in &mut transitions {
            laplace_correct(row);
        }

        let states = parsed
            .states
            .iter()
            .map(|state| {
                let mean = [state.cx / sw, state.cy / sh];
                let covariance = DMat2::from_diagonal(DVec2::new(
                    (state.w / sw / 4.0).powi(2),
                    (state.h / sh / 4.0).powi(2),
                ));
                (mean, covariance)
            })
            .collect();

        let model = GestureModel::new(states, transitions, initial)
            .map_err(|err| CompileError::grammar(source, 0, err.to_string()))?
            .with_emission(self.emission);

        let relative_origin = parsed.relative.then(|| {
            let [cx, cy] = parsed.element.centre();
            [cx / sw, cy / sh]
        });

        Ok(CompiledBehavior {
            label: parsed.label.unwrap_or(parsed.body),
            model,
            pattern: SequencePattern::new(pattern_states, valid, markers),
            relative_origin,
            accepted_pointers: DEFAULT_ACCEPTED_POINTERS.to_vec(),
        })
    }
}

fn laplace_correct(values: &mut [f64]) {
    let mut sum = 0.0;
    for value in values.iter_mut() {
        *value += LAPLACE_EPSILON;
        sum += *value;
    }
    for value in values.iter_mut() {
        *value /= sum;
    }
}
