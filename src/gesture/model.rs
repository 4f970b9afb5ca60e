use std::f64::consts::PI;

use glam::{DMat2, DVec2};
use serde::Deserialize;

use crate::error::ModelError;
use crate::observation::TouchSample;

const FIT_DIAGONAL_REGULARIZATION: f64 = 1e-5;
const TOUCH_AXIS_SCALE: f64 = 6.0;
const SYMMETRY_TOLERANCE: f64 = 1e-12;

/// Symmetric within tolerance, positive leading entry and determinant.
fn is_symmetric_positive_definite(m: &DMat2) -> bool {
    let (upper, lower) = (m.y_axis.x, m.x_axis.y);
    m.is_finite()
        && (upper - lower).abs() <= SYMMETRY_TOLERANCE * (1.0 + upper.abs().max(lower.abs()))
        && m.x_axis.x > 0.0
        && m.determinant() > 0.0
}

/// Inverse of a matrix with a finite non-zero determinant.
fn checked_inverse(m: &DMat2) -> Option<DMat2> {
    let det = m.determinant();
    (det != 0.0 && det.is_finite()).then(|| m.inverse())
}

/// `vᵀ M v`
fn quad_form(m: &DMat2, v: DVec2) -> f64 {
    v.dot(m.mul_vec2(v))
}

/// How a state scores a touch sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionMode {
    /// Density of the sample position under the state Gaussian.
    #[default]
    Gaussian,
    /// Bhattacharyya coefficient between the state Gaussian and a Gaussian
    /// built from the sample's contact ellipse.
    Bhattacharyya,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GaussianState {
    mean: [f64; 2],
    covariance: DMat2,
    covariance_inv: DMat2,
    covariance_det: f64,
}

impl GaussianState {
    pub fn new(mean: [f64; 2], covariance: DMat2) -> Option<Self> {
        if !is_symmetric_positive_definite(&covariance) {
            return None;
        }
        let covariance_inv = checked_inverse(&covariance)?;
        Some(Self {
            mean,
            covariance,
            covariance_inv,
            covariance_det: covariance.determinant(),
        })
    }

    pub fn mean(&self) -> [f64; 2] {
        self.mean
    }

    pub fn covariance(&self) -> DMat2 {
        self.covariance
    }

    fn log_density(&self, point: [f64; 2]) -> f64 {
        let diff = DVec2::from(point) - DVec2::from(self.mean);
        -(2.0 * PI).ln()
            - 0.5 * self.covariance_det.ln()
            - 0.5 * quad_form(&self.covariance_inv, diff)
    }

    fn log_bhattacharyya(&self, sample: &TouchSample) -> f64 {
        let touch = touch_covariance(sample.orientation, sample.minor_axis, sample.major_axis);
        let touch_det = touch.determinant();
        if touch_det <= 0.0 || !touch_det.is_finite() {
            return f64::NEG_INFINITY;
        }

        let pooled = (self.covariance + touch) * 0.5;
        let pooled_det = pooled.determinant();
        let Some(pooled_inv) = checked_inverse(&pooled) else {
            return f64::NEG_INFINITY;
        };

        let diff = DVec2::new(sample.x, sample.y) - DVec2::from(self.mean);
        let mahalanobis = quad_form(&pooled_inv, diff);
        // ln( exp(-q/8) * sqrt( sqrt(|S|*|T|) / |P| ) )
        -mahalanobis / 8.0
            + 0.5 * (0.5 * (self.covariance_det * touch_det).ln() - pooled_det.ln())
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.mean[0] += dx;
        self.mean[1] += dy;
    }
}

/// Covariance of the contact ellipse: `T·Tᵀ` with `T = R(orientation)·diag((minor/6)², (major/6)²)`.
pub fn touch_covariance(orientation: f64, minor_axis: f64, major_axis: f64) -> DMat2 {
    let axes = DMat2::from_diagonal(DVec2::new(
        (minor_axis / TOUCH_AXIS_SCALE).powi(2),
        (major_axis / TOUCH_AXIS_SCALE).powi(2),
    ));
    let t = DMat2::from_angle(orientation) * axes;
    t * t.transpose()
}

/// Hidden Markov model with 2-D Gaussian emissions. All probability
/// arithmetic happens in natural-log space.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureModel {
    states: Vec<GaussianState>,
    transitions: Vec<Vec<f64>>,
    initial: Vec<f64>,
    emission: EmissionMode,
}

impl GestureModel {
    pub fn new(
        states: Vec<([f64; 2], DMat2)>,
        transitions: Vec<Vec<f64>>,
        initial: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let count = states.len();
        if count == 0 {
            return Err(ModelError::Empty);
        }
        if initial.len() != count {
            return Err(ModelError::InitialShape {
                len: initial.len(),
                expected: count,
            });
        }
        if transitions.len() != count {
            return Err(ModelError::TransitionShape {
                row: transitions.len(),
                len: 0,
                expected: count,
            });
        }
        if let Some((row, values)) = transitions
            .iter()
            .enumerate()
            .find(|(_, values)| values.len() != count)
        {
            return Err(ModelError::TransitionShape {
                row,
                len: values.len(),
                expected: count,
            });
        }

        let states = states
            .into_iter()
            .enumerate()
            .map(|(state, (mean, covariance))| {
                GaussianState::new(mean, covariance)
                    .ok_or(ModelError::NotPositiveDefinite { state })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            states,
            transitions,
            initial,
            emission: EmissionMode::default(),
        })
    }

    pub fn with_emission(mut self, emission: EmissionMode) -> Self {
        self.emission = emission;
        self
    }

    pub fn set_emission(&mut self, emission: EmissionMode) {
        self.emission = emission;
    }

    pub fn emission(&self) -> EmissionMode {
        self.emission
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, index: usize) -> Option<&GaussianState> {
        self.states.get(index)
    }

    pub fn transition(&self, from: usize, to: usize) -> f64 {
        self.transitions[from][to]
    }

    pub fn transitions(&self) -> &[Vec<f64>] {
        &self.transitions
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    pub fn log_emission(&self, state: usize, sample: &TouchSample) -> f64 {
        let gaussian = &self.states[state];
        match self.emission {
            EmissionMode::Gaussian => gaussian.log_density(sample.position()),
            EmissionMode::Bhattacharyya => gaussian.log_bhattacharyya(sample),
        }
    }

    /// Forward algorithm. Returns `-inf` for an empty sequence.
    pub fn log_likelihood(&self, sequence: &[TouchSample]) -> f64 {
        let Some((first, rest)) = sequence.split_first() else {
            return f64::NEG_INFINITY;
        };
        let n = self.states.len();

        let mut alpha: Vec<f64> = (0..n)
            .map(|j| self.initial[j].ln() + self.log_emission(j, first))
            .collect();
        let mut next = vec![0.0; n];
        let mut terms = vec![0.0; n];

        for sample in rest {
            for (j, slot) in next.iter_mut().enumerate() {
                for (i, term) in terms.iter_mut().enumerate() {
                    *term = alpha[i] + self.transitions[i][j].ln();
                }
                *slot = log_sum_exp(&terms) + self.log_emission(j, sample);
            }
            std::mem::swap(&mut alpha, &mut next);
        }

        log_sum_exp(&alpha)
    }

    /// Viterbi decoding. Ties go to the lowest state index.
    pub fn most_likely_path(&self, sequence: &[TouchSample]) -> Vec<usize> {
        let Some((first, rest)) = sequence.split_first() else {
            return Vec::new();
        };
        let n = self.states.len();

        let mut delta: Vec<f64> = (0..n)
            .map(|j| self.initial[j].ln() + self.log_emission(j, first))
            .collect();
        let mut next = vec![0.0; n];
        let mut back: Vec<Vec<usize>> = Vec::with_capacity(rest.len());

        for sample in rest {
            let mut pointers = vec![0usize; n];
            for (j, slot) in next.iter_mut().enumerate() {
                let mut best_state = 0;
                let mut best_score = delta[0] + self.transitions[0][j].ln();
                for (i, score) in delta.iter().enumerate().skip(1) {
                    let candidate = score + self.transitions[i][j].ln();
                    if candidate > best_score {
                        best_score = candidate;
                        best_state = i;
                    }
                }
                pointers[j] = best_state;
                *slot = best_score + self.log_emission(j, sample);
            }
            back.push(pointers);
            std::mem::swap(&mut delta, &mut next);
        }

        let mut last = 0;
        for (j, score) in delta.iter().enumerate().skip(1) {
            if *score > delta[last] {
                last = j;
            }
        }

        let mut path = vec![0usize; sequence.len()];
        path[sequence.len() - 1] = last;
        for t in (0..back.len()).rev() {
            path[t] = back[t][path[t + 1]];
        }
        path
    }

    /// Shifts every state mean by the same offset.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for state in &mut self.states {
            state.translate(dx, dy);
        }
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        for state in &mut self.states {
            state.mean = [x, y];
        }
    }

    /// Re-estimates one state from weighted samples.
    pub fn fit_state(
        &mut self,
        state: usize,
        samples: &[TouchSample],
        weights: &[f64],
    ) -> Result<(), ModelError> {
        let count = self.states.len();
        if state >= count {
            return Err(ModelError::StateOutOfRange { state, count });
        }
        if samples.is_empty() {
            return Err(ModelError::InvalidFit("empty observation set"));
        }
        if samples.len() != weights.len() {
            return Err(ModelError::InvalidFit("weights do not match samples"));
        }

        let mut mean = [0.0; 2];
        for (sample, weight) in samples.iter().zip(weights) {
            mean[0] += sample.x * weight;
            mean[1] += sample.y * weight;
        }

        let mut covariance = DMat2::ZERO;
        for (sample, weight) in samples.iter().zip(weights) {
            let d = DVec2::new(sample.x - mean[0], sample.y - mean[1]);
            covariance += DMat2::from_cols(d * d.x, d * d.y) * *weight
                + DMat2::from_diagonal(DVec2::splat(FIT_DIAGONAL_REGULARIZATION));
        }

        self.states[state] = GaussianState::new(mean, covariance)
            .ok_or(ModelError::InvalidFit("fitted covariance is degenerate"))?;
        Ok(())
    }

    pub fn fit_state_uniform(
        &mut self,
        state: usize,
        samples: &[TouchSample],
    ) -> Result<(), ModelError> {
        let weight = 1.0 / samples.len().max(1) as f64;
        let weights = vec![weight; samples.len()];
        self.fit_state(state, samples, &weights)
    }
}

/// `ln Σ exp(xᵢ)` with the running max subtracted first.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = values.iter().map(|value| (value - max).exp()).sum();
    sum.ln() + max
}
