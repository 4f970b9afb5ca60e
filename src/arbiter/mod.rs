//! Cross-interactor mediation: candidate pool upkeep and claim resolution.

#[cfg(test)]
mod tests;

use crate::gesture::log_sum_exp;
use crate::interactor::{InteractorCore, InteractorId};

pub const DEFAULT_RULE_OUT_MEAN_EVIDENCE: f64 = -10.0;

/// What the arbiter needs from an interactor.
pub trait Arbitrated {
    fn id(&self) -> InteractorId;
    /// `None` while nothing has been observed.
    fn mean_evidence(&self) -> Option<f64>;
    fn is_candidate(&self) -> bool;
    fn is_determined(&self) -> bool;
    fn has_self_excluded(&self) -> bool;
    fn is_claiming(&self) -> bool;
    fn promote(&mut self);
    fn determine(&mut self);
    /// Returns `true` when the interactor actually left the pool.
    fn exclude(&mut self) -> bool;
    fn grant_self_exclusion(&mut self);
    fn reset_observations(&mut self);
    fn update_rules(&mut self);
    fn set_candidate_probability(&mut self, probability: f64);
}

impl Arbitrated for InteractorCore {
    fn id(&self) -> InteractorId {
        InteractorCore::id(self)
    }

    fn mean_evidence(&self) -> Option<f64> {
        InteractorCore::mean_evidence(self).ok()
    }

    fn is_candidate(&self) -> bool {
        InteractorCore::is_candidate(self)
    }

    fn is_determined(&self) -> bool {
        InteractorCore::is_determined(self)
    }

    fn has_self_excluded(&self) -> bool {
        InteractorCore::has_self_excluded(self)
    }

    fn is_claiming(&self) -> bool {
        InteractorCore::is_claiming(self)
    }

    fn promote(&mut self) {
        let _ = InteractorCore::promote(self);
    }

    fn determine(&mut self) {
        let _ = InteractorCore::determine(self);
    }

    fn exclude(&mut self) -> bool {
        InteractorCore::exclude(self).left_pool()
    }

    fn grant_self_exclusion(&mut self) {
        let _ = self.grant_self_exclude();
        let _ = self.reset_self_excluded();
    }

    fn reset_observations(&mut self) {
        InteractorCore::reset_observations(self);
    }

    fn update_rules(&mut self) {
        InteractorCore::update_rules(self);
    }

    fn set_candidate_probability(&mut self, probability: f64) {
        InteractorCore::set_candidate_probability(self, probability);
    }
}

/// Decisions taken by one [`Arbiter::mediate`] call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediationOutcome {
    pub determined: Option<InteractorId>,
    pub excluded: Vec<InteractorId>,
    pub promoted: Vec<InteractorId>,
}

impl MediationOutcome {
    pub fn is_empty(&self) -> bool {
        self.determined.is_none() && self.excluded.is_empty() && self.promoted.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Arbiter {
    rule_out_mean_evidence: f64,
    candidates: Vec<InteractorId>,
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new(DEFAULT_RULE_OUT_MEAN_EVIDENCE)
    }
}

impl Arbiter {
    pub fn new(rule_out_mean_evidence: f64) -> Self {
        Self {
            rule_out_mean_evidence,
            candidates: Vec::new(),
        }
    }

    pub fn rule_out_mean_evidence(&self) -> f64 {
        self.rule_out_mean_evidence
    }

    /// Current pool, in promotion order.
    pub fn candidates(&self) -> &[InteractorId] {
        &self.candidates
    }

    pub fn clear(&mut self) {
        self.candidates.clear();
    }

    /// One mediation round over every registered interactor.
    pub fn mediate<A: Arbitrated>(&mut self, interactors: &mut [A]) -> MediationOutcome {
        let mut outcome = MediationOutcome::default();

        self.refresh_pool(interactors, false, &mut outcome);
        self.normalize_candidates(interactors);
        for interactor in interactors.iter_mut() {
            if self.candidates.contains(&interactor.id()) {
                interactor.update_rules();
            }
        }
        let best = self.refresh_pool(interactors, true, &mut outcome);

        let claimers: Vec<InteractorId> = self
            .candidates
            .iter()
            .copied()
            .filter(|id| find(interactors, *id).is_some_and(|i| i.is_claiming()))
            .collect();
        match claimers.as_slice() {
            [] => {}
            [claimer] => self.resolve_single_claim(interactors, *claimer, &mut outcome),
            _ => self.resolve_contested_claims(interactors, best, &mut outcome),
        }

        debug_assert!(
            interactors.iter().filter(|i| i.is_determined()).count() <= 1,
            "more than one determined interactor"
        );
        if !outcome.is_empty() {
            log::debug!(
                "mediation determined={:?} excluded={:?} promoted={:?}",
                outcome.determined,
                outcome.excluded,
                outcome.promoted
            );
        }
        outcome
    }

    /// Promotes, excludes or resets each interactor against the threshold
    /// and returns the strongest candidate with its mean evidence.
    fn refresh_pool<A: Arbitrated>(
        &mut self,
        interactors: &mut [A],
        grant_self_exclusion: bool,
        outcome: &mut MediationOutcome,
    ) -> Option<(InteractorId, f64)> {
        let threshold = self.rule_out_mean_evidence;
        let mut trash = Vec::new();
        let mut cradle = Vec::new();
        let mut best: Option<(InteractorId, f64)> = None;

        for interactor in interactors.iter_mut() {
            let id = interactor.id();
            let evidence = interactor.mean_evidence().unwrap_or(f64::NEG_INFINITY);
            if grant_self_exclusion && interactor.has_self_excluded() {
                interactor.grant_self_exclusion();
                trash.push(id);
                outcome.excluded.push(id);
            } else if interactor.is_candidate() && evidence < threshold {
                interactor.exclude();
                trash.push(id);
                outcome.excluded.push(id);
            } else if !interactor.is_candidate()
                && evidence >= threshold
                && !self.candidates.contains(&id)
            {
                interactor.promote();
                cradle.push(id);
                outcome.promoted.push(id);
            } else if !interactor.is_candidate() && evidence < threshold {
                interactor.reset_observations();
            }

            if interactor.is_candidate() && best.map_or(true, |(_, max)| evidence > max) {
                best = Some((id, evidence));
            }
        }

        self.candidates.retain(|id| !trash.contains(id));
        for id in cradle {
            if !self.candidates.contains(&id) {
                self.candidates.push(id);
            }
        }
        best
    }

    /// Softmax of the candidates' mean evidences, for feedback only.
    fn normalize_candidates<A: Arbitrated>(&self, interactors: &mut [A]) {
        let evidences: Vec<f64> = self
            .candidates
            .iter()
            .map(|id| {
                find(interactors, *id)
                    .and_then(|i| i.mean_evidence())
                    .unwrap_or(f64::NEG_INFINITY)
            })
            .collect();
        let normalizer = log_sum_exp(&evidences);
        for (id, evidence) in self.candidates.iter().zip(evidences) {
            let probability = if normalizer.is_finite() {
                (evidence - normalizer).exp()
            } else {
                0.0
            };
            if let Some(interactor) = find_mut(interactors, *id) {
                interactor.set_candidate_probability(probability);
            }
        }
    }

    fn resolve_single_claim<A: Arbitrated>(
        &mut self,
        interactors: &mut [A],
        claimer: InteractorId,
        outcome: &mut MediationOutcome,
    ) {
        let threshold = self.rule_out_mean_evidence;
        let mut determined = false;
        if let Some(interactor) = find_mut(interactors, claimer) {
            if interactor.mean_evidence().is_some_and(|e| e > threshold) {
                interactor.determine();
                outcome.determined = Some(claimer);
                determined = true;
            }
        }
        for id in std::mem::take(&mut self.candidates) {
            if determined && id == claimer {
                continue;
            }
            if let Some(interactor) = find_mut(interactors, id) {
                if interactor.exclude() {
                    outcome.excluded.push(id);
                }
            }
        }
    }

    /// Several claims: the strongest candidate wins if it clears the
    /// threshold, everyone else is excluded.
    fn resolve_contested_claims<A: Arbitrated>(
        &mut self,
        interactors: &mut [A],
        best: Option<(InteractorId, f64)>,
        outcome: &mut MediationOutcome,
    ) {
        let winner = best
            .filter(|(_, evidence)| *evidence > self.rule_out_mean_evidence)
            .map(|(id, _)| id);
        for interactor in interactors.iter_mut() {
            let id = interactor.id();
            if Some(id) == winner {
                interactor.determine();
                outcome.determined = Some(id);
            } else if interactor.exclude() {
                outcome.excluded.push(id);
            }
        }
        self.candidates.clear();
    }
}

fn find<A: Arbitrated>(interactors: &[A], id: InteractorId) -> Option<&A> {
    interactors.iter().find(|i| i.id() == id)
}

fn find_mut<A: Arbitrated>(interactors: &mut [A], id: InteractorId) -> Option<&mut A> {
    interactors.iter_mut().find(|i| i.id() == id)
}
