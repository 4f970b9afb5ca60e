//! Online recognition of one behavior: a capped per-pointer window folded
//! into a running log-likelihood and a most-likely state path.

mod window;

pub use window::{ObservationWindow, DEFAULT_MAX_OBSERVATIONS};

use crate::error::RecognizerError;
use crate::gesture::GestureModel;
use crate::grammar::CompiledBehavior;
use crate::observation::{EventKind, Observation, TouchSample};
use crate::pattern::SequencePattern;

/// The few behavior accessors the rule layer needs.
pub trait BehaviorView {
    fn label(&self) -> &str;
    fn running_log_likelihood(&self) -> f64;
    /// Most-likely state path of the dominant pointer.
    fn dominant_path(&self) -> &[usize];
    fn dominant_event_kinds(&self) -> Vec<EventKind>;
    fn is_most_likely(&self) -> bool;
    fn time_taken_ms(&self) -> u64;
    fn mean_pressure(&self) -> f64;
    fn mean_size(&self) -> f64;
    fn observed_pointer_count(&self) -> usize;
    fn sequence_pattern(&self) -> &SequencePattern;
}

#[derive(Clone, Debug, Default, PartialEq)]
struct PointerTrack {
    log_likelihood: f64,
    path: Vec<usize>,
    mean_pressure: f64,
    mean_size: f64,
    folded: u32,
}

impl PointerTrack {
    fn fold(&mut self, sample: &TouchSample) {
        let n = f64::from(self.folded);
        self.mean_pressure = (self.mean_pressure * n + sample.pressure) / (n + 1.0);
        self.mean_size = (self.mean_size * n + sample.major_axis) / (n + 1.0);
        self.folded += 1;
    }
}

#[derive(Clone, Debug)]
pub struct BehaviorRecognizer {
    label: String,
    model: GestureModel,
    pattern: SequencePattern,
    window: ObservationWindow,
    tracks: Vec<(u8, PointerTrack)>,
    running_log_likelihood: f64,
    dominant_pointer: u8,
    first_ms: Option<u64>,
    last_ms: u64,
    relative_origin: Option<[f64; 2]>,
    origin_set: bool,
    posterior_ln: f64,
    most_likely: bool,
}

impl BehaviorRecognizer {
    pub fn new(compiled: CompiledBehavior) -> Self {
        Self::with_max_observations(compiled, DEFAULT_MAX_OBSERVATIONS)
    }

    pub fn with_max_observations(compiled: CompiledBehavior, max_observations: usize) -> Self {
        let CompiledBehavior {
            label,
            model,
            pattern,
            relative_origin,
            accepted_pointers,
        } = compiled;
        Self {
            label,
            model,
            pattern,
            window: ObservationWindow::new(&accepted_pointers, max_observations),
            tracks: accepted_pointers
                .iter()
                .map(|pointer| (*pointer, PointerTrack::default()))
                .collect(),
            running_log_likelihood: f64::NEG_INFINITY,
            dominant_pointer: accepted_pointers.first().copied().unwrap_or(0),
            first_ms: None,
            last_ms: 0,
            relative_origin,
            origin_set: false,
            posterior_ln: f64::NEG_INFINITY,
            most_likely: false,
        }
    }

    /// Folds one observation in. `Ok(false)` means the sample's pointer is
    /// not accepted and nothing changed.
    pub fn observe(&mut self, observation: &Observation) -> Result<bool, RecognizerError> {
        match observation {
            Observation::Touch(sample) => Ok(self.observe_touch(sample)),
            other => Err(RecognizerError::WrongModality {
                behavior: self.label.clone(),
                modality: other.modality(),
            }),
        }
    }

    pub fn observe_touch(&mut self, sample: &TouchSample) -> bool {
        if !self.window.accepts(sample.pointer_id) {
            return false;
        }
        if self.first_ms.is_none() {
            self.first_ms = Some(sample.timestamp_ms);
        }
        self.last_ms = sample.timestamp_ms;

        if let Some(origin) = self.relative_origin {
            if !self.origin_set && sample.kind == EventKind::Down {
                self.translate(sample.x - origin[0], sample.y - origin[1]);
                self.origin_set = true;
            }
        }

        self.window.push(*sample);

        self.running_log_likelihood = f64::NEG_INFINITY;
        self.dominant_pointer = self.tracks.first().map(|(id, _)| *id).unwrap_or(0);
        for (pointer, track) in &mut self.tracks {
            let samples = self.window.samples(*pointer);
            if samples.is_empty() {
                track.log_likelihood = f64::NEG_INFINITY;
                track.path.clear();
                continue;
            }
            track.log_likelihood = self.model.log_likelihood(samples);
            track.path = self.model.most_likely_path(samples);
            if track.log_likelihood > self.running_log_likelihood {
                self.running_log_likelihood = track.log_likelihood;
                self.dominant_pointer = *pointer;
            }
        }
        if let Some((_, track)) = self
            .tracks
            .iter_mut()
            .find(|(id, _)| *id == sample.pointer_id)
        {
            track.fold(sample);
        }

        log::trace!(
            "behavior_observe label={} pointer={} kind={} ll={:.3} dominant={}",
            self.label,
            sample.pointer_id,
            sample.kind.label(),
            self.running_log_likelihood,
            self.dominant_pointer
        );
        true
    }

    /// Clears windows, time bookkeeping and running means. A relative
    /// gesture keeps its last translation and re-anchors on the next down.
    pub fn reset(&mut self) {
        self.window.clear();
        for (_, track) in &mut self.tracks {
            *track = PointerTrack::default();
        }
        self.running_log_likelihood = f64::NEG_INFINITY;
        self.dominant_pointer = self.tracks.first().map(|(id, _)| *id).unwrap_or(0);
        self.first_ms = None;
        self.last_ms = 0;
        self.origin_set = false;
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.model.translate(dx, dy);
        if let Some(origin) = &mut self.relative_origin {
            origin[0] += dx;
            origin[1] += dy;
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn model(&self) -> &GestureModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut GestureModel {
        &mut self.model
    }

    pub fn pattern(&self) -> &SequencePattern {
        &self.pattern
    }

    pub fn window(&self) -> &ObservationWindow {
        &self.window
    }

    pub fn accepts(&self, pointer: u8) -> bool {
        self.window.accepts(pointer)
    }

    pub fn is_relative(&self) -> bool {
        self.relative_origin.is_some()
    }

    pub fn relative_origin(&self) -> Option<[f64; 2]> {
        self.relative_origin
    }

    /// Maximum log-likelihood over pointers; `-inf` before any sample.
    pub fn running_log_likelihood(&self) -> f64 {
        self.running_log_likelihood
    }

    pub fn pointer_log_likelihood(&self, pointer: u8) -> Option<f64> {
        self.track(pointer)
            .filter(|_| !self.window.samples(pointer).is_empty())
            .map(|track| track.log_likelihood)
    }

    pub fn dominant_pointer(&self) -> u8 {
        self.dominant_pointer
    }

    pub fn most_likely_path(&self, pointer: u8) -> &[usize] {
        self.track(pointer)
            .map(|track| track.path.as_slice())
            .unwrap_or(&[])
    }

    pub fn most_likely_state(&self, pointer: u8) -> Option<usize> {
        self.most_likely_path(pointer).last().copied()
    }

    pub fn event_kinds(&self, pointer: u8) -> Vec<EventKind> {
        self.window.event_kinds(pointer)
    }

    pub fn observation_count(&self) -> usize {
        self.window.observation_count()
    }

    pub fn observed_pointer_count(&self) -> usize {
        self.window.observed_pointer_count()
    }

    pub fn mean_pressure_of(&self, pointer: u8) -> f64 {
        self.track(pointer).map_or(0.0, |track| track.mean_pressure)
    }

    pub fn mean_size_of(&self, pointer: u8) -> f64 {
        self.track(pointer).map_or(0.0, |track| track.mean_size)
    }

    pub fn first_timestamp_ms(&self) -> Option<u64> {
        self.first_ms
    }

    pub fn time_taken_ms(&self) -> u64 {
        self.first_ms
            .map_or(0, |first| self.last_ms.saturating_sub(first))
    }

    pub fn posterior_ln(&self) -> f64 {
        self.posterior_ln
    }

    pub fn probability(&self) -> f64 {
        self.posterior_ln.exp()
    }

    pub(crate) fn set_posterior_ln(&mut self, posterior_ln: f64) {
        self.posterior_ln = posterior_ln;
    }

    pub(crate) fn set_most_likely(&mut self, most_likely: bool) {
        self.most_likely = most_likely;
    }

    fn track(&self, pointer: u8) -> Option<&PointerTrack> {
        self.tracks
            .iter()
            .find(|(id, _)| *id == pointer)
            .map(|(_, track)| track)
    }
}

impl BehaviorView for BehaviorRecognizer {
    fn label(&self) -> &str {
        &self.label
    }

    fn running_log_likelihood(&self) -> f64 {
        self.running_log_likelihood
    }

    fn dominant_path(&self) -> &[usize] {
        self.most_likely_path(self.dominant_pointer)
    }

    fn dominant_event_kinds(&self) -> Vec<EventKind> {
        self.event_kinds(self.dominant_pointer)
    }

    fn is_most_likely(&self) -> bool {
        self.most_likely
    }

    fn time_taken_ms(&self) -> u64 {
        BehaviorRecognizer::time_taken_ms(self)
    }

    fn mean_pressure(&self) -> f64 {
        self.mean_pressure_of(self.dominant_pointer)
    }

    fn mean_size(&self) -> f64 {
        self.mean_size_of(self.dominant_pointer)
    }

    fn observed_pointer_count(&self) -> usize {
        self.window.observed_pointer_count()
    }

    fn sequence_pattern(&self) -> &SequencePattern {
        &self.pattern
    }
}
