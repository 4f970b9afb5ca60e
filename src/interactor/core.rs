use crate::error::{CompileError, InteractorError};
use crate::gesture::log_sum_exp;
use crate::observation::{EventKind, Observation};
use crate::pattern::{NotificationMarker, PatternCheckResult};
use crate::recognizer::BehaviorRecognizer;
use crate::rules::{RuleFiring, Rulebook};

use super::executor::{CancelToken, SerialExecutor};
use super::lifecycle::{
    InteractorStatus, LifecycleApplyResult, LifecycleCommand, LifecycleEngine,
};
use super::InteractorId;

/// Posterior value written on reset, before any observation.
pub const POSTERIOR_SENTINEL: f64 = -999_999.0;

/// One UI element's reasoning state: its behaviors, their posterior and the
/// arbitration lifecycle.
#[derive(Debug)]
pub struct InteractorCore {
    id: InteractorId,
    name: String,
    behaviors: Vec<BehaviorRecognizer>,
    prior: Vec<f64>,
    posterior: Vec<f64>,
    evidence: f64,
    most_likely: usize,
    candidate_probability: f64,
    lifecycle: LifecycleEngine,
    rulebook: Rulebook,
    claim_rule: Option<String>,
    hidden: bool,
    last_down_ms: Option<u64>,
    last_event_ms: Option<u64>,
    pending_self_exclusion: Option<CancelToken>,
}

impl InteractorCore {
    /// Builds an interactor with a uniform prior.
    pub fn new(id: InteractorId, behaviors: Vec<BehaviorRecognizer>) -> Result<Self, InteractorError> {
        if behaviors.is_empty() {
            return Err(InteractorError::NoBehaviors);
        }
        let count = behaviors.len();
        let rulebook = Rulebook::new(behaviors.iter().map(|b| b.label().to_string()));
        let mut core = Self {
            id,
            name: format!("interactor-{id}"),
            behaviors,
            prior: vec![1.0 / count as f64; count],
            posterior: vec![POSTERIOR_SENTINEL; count],
            evidence: 0.0,
            most_likely: 0,
            candidate_probability: 0.0,
            lifecycle: LifecycleEngine::new(),
            rulebook,
            claim_rule: None,
            hidden: false,
            last_down_ms: None,
            last_event_ms: None,
            pending_self_exclusion: None,
        };
        core.write_posterior_sentinel();
        Ok(core)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the uniform prior. Entries must be positive and finite; they
    /// are normalized to sum to one.
    pub fn with_prior(mut self, prior: &[f64]) -> Result<Self, InteractorError> {
        let invalid = InteractorError::InvalidPrior {
            len: prior.len(),
            expected: self.behaviors.len(),
        };
        if prior.len() != self.behaviors.len()
            || prior.iter().any(|p| !(p.is_finite() && *p > 0.0))
        {
            return Err(invalid);
        }
        let sum: f64 = prior.iter().sum();
        self.prior = prior.iter().map(|p| p / sum).collect();
        Ok(self)
    }

    pub fn id(&self) -> InteractorId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: InteractorId) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Routes one observation to every behavior and refreshes the posterior.
    /// A hidden interactor does not process the sample: a candidate
    /// self-excludes, anything else resets.
    pub fn observe(&mut self, observation: &Observation) -> Result<(), InteractorError> {
        if self.hidden {
            if self.is_candidate() {
                self.self_exclude();
            } else {
                self.reset();
            }
            return Ok(());
        }

        if let Observation::Touch(sample) = observation {
            if sample.kind == EventKind::Down {
                self.last_down_ms = Some(sample.timestamp_ms);
            }
            self.last_event_ms = Some(sample.timestamp_ms);
        }

        let mut first_error = None;
        for behavior in &mut self.behaviors {
            if let Err(err) = behavior.observe(observation) {
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err.into());
        }

        self.update_posterior();
        Ok(())
    }

    fn update_posterior(&mut self) {
        for (index, behavior) in self.behaviors.iter().enumerate() {
            self.posterior[index] = self.prior[index].ln() + behavior.running_log_likelihood();
        }
        let normalizer = log_sum_exp(&self.posterior);
        self.evidence = normalizer;
        if normalizer.is_finite() {
            for value in &mut self.posterior {
                *value -= normalizer;
            }
        }

        self.most_likely = 0;
        for index in 1..self.posterior.len() {
            if self.posterior[index] > self.posterior[self.most_likely] {
                self.most_likely = index;
            }
        }
        for (index, behavior) in self.behaviors.iter_mut().enumerate() {
            behavior.set_posterior_ln(self.posterior[index]);
            behavior.set_most_likely(index == self.most_likely);
        }
        log::trace!(
            "interactor_posterior name={} evidence={:.3} most_likely={}",
            self.name,
            self.evidence,
            self.most_likely
        );
    }

    fn write_posterior_sentinel(&mut self) {
        for (value, behavior) in self.posterior.iter_mut().zip(&mut self.behaviors) {
            *value = POSTERIOR_SENTINEL;
            behavior.set_posterior_ln(POSTERIOR_SENTINEL);
        }
    }

    /// Log marginal likelihood of the observations under the behavior mix.
    pub fn evidence(&self) -> f64 {
        self.evidence
    }

    /// Evidence per observation, so interactors with short histories are
    /// comparable with long ones.
    pub fn mean_evidence(&self) -> Result<f64, InteractorError> {
        let observations = self
            .behaviors
            .iter()
            .map(BehaviorRecognizer::observation_count)
            .max()
            .unwrap_or(0);
        if observations == 0 {
            return Err(InteractorError::NoObservations);
        }
        Ok(self.evidence / observations as f64)
    }

    pub fn posterior(&self) -> &[f64] {
        &self.posterior
    }

    pub fn prior(&self) -> &[f64] {
        &self.prior
    }

    pub fn most_likely_index(&self) -> usize {
        self.most_likely
    }

    pub fn behaviors(&self) -> &[BehaviorRecognizer] {
        &self.behaviors
    }

    pub fn behavior(&self, label: &str) -> Option<&BehaviorRecognizer> {
        self.behaviors.iter().find(|b| b.label() == label)
    }

    fn behavior_index(&self, label: &str) -> Result<usize, InteractorError> {
        self.behaviors
            .iter()
            .position(|b| b.label() == label)
            .ok_or_else(|| InteractorError::UnknownBehavior(label.to_string()))
    }

    pub fn behavior_posterior(&self, label: &str) -> Result<f64, InteractorError> {
        Ok(self.posterior[self.behavior_index(label)?])
    }

    pub fn behavior_probability(&self, label: &str) -> Result<f64, InteractorError> {
        self.behavior_posterior(label).map(f64::exp)
    }

    pub fn candidate_probability(&self) -> f64 {
        self.candidate_probability
    }

    pub(crate) fn set_candidate_probability(&mut self, probability: f64) {
        self.candidate_probability = probability;
    }

    pub fn observed_pointer_count(&self) -> usize {
        self.behaviors
            .first()
            .map_or(0, BehaviorRecognizer::observed_pointer_count)
    }

    /// Time from the last `Down` to the latest sample.
    pub fn touch_interaction_ms(&self) -> u64 {
        match (self.last_down_ms, self.last_event_ms) {
            (Some(down), Some(last)) => last.saturating_sub(down),
            _ => 0,
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        for behavior in &mut self.behaviors {
            behavior.translate(dx, dy);
        }
    }

    // Lifecycle

    pub fn status(&self) -> InteractorStatus {
        self.lifecycle.status()
    }

    pub fn is_candidate(&self) -> bool {
        self.lifecycle.snapshot().is_candidate()
    }

    pub fn is_determined(&self) -> bool {
        self.status() == InteractorStatus::Determined
    }

    pub fn has_self_excluded(&self) -> bool {
        self.status() == InteractorStatus::SelfExcluded
    }

    pub fn is_claiming(&self) -> bool {
        self.lifecycle.snapshot().claiming
    }

    fn apply(&mut self, command: LifecycleCommand) -> LifecycleApplyResult {
        let result = self.lifecycle.apply(command);
        if result.changed() {
            log::debug!(
                "interactor_lifecycle name={} command={:?} from={:?} to={:?}",
                self.name,
                command,
                result.before.status,
                result.after.status
            );
        }
        result
    }

    pub fn promote(&mut self) -> LifecycleApplyResult {
        self.apply(LifecycleCommand::Promote)
    }

    pub fn determine(&mut self) -> LifecycleApplyResult {
        self.apply(LifecycleCommand::Determine)
    }

    /// Rules the interactor out and resets its reasoning.
    pub fn exclude(&mut self) -> LifecycleApplyResult {
        let result = self.apply(LifecycleCommand::Exclude);
        self.reset_reasoning();
        result
    }

    /// Asks to leave the candidate pool; granted by the next mediation. An
    /// idle interactor has nothing to leave and just resets.
    pub fn self_exclude(&mut self) -> LifecycleApplyResult {
        if self.status() == InteractorStatus::Idle {
            let result = self.apply(LifecycleCommand::Exclude);
            self.reset_reasoning();
            return result;
        }
        self.apply(LifecycleCommand::SelfExclude)
    }

    /// Schedules a cancelable self-exclusion `delay_ms` from `now_ms`,
    /// replacing any earlier one.
    pub fn self_exclude_after(&mut self, delay_ms: u64, now_ms: u64, executor: &mut SerialExecutor) {
        self.cancel_pending_self_exclusion();
        let token = CancelToken::new();
        executor.schedule_self_exclusion(self.id, now_ms.saturating_add(delay_ms), token.clone());
        self.pending_self_exclusion = Some(token);
    }

    pub fn has_pending_self_exclusion(&self) -> bool {
        self.pending_self_exclusion
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Applies a due deferred self-exclusion.
    pub(crate) fn run_deferred_self_exclusion(&mut self) -> LifecycleApplyResult {
        self.pending_self_exclusion = None;
        self.self_exclude()
    }

    pub fn grant_self_exclude(&mut self) -> LifecycleApplyResult {
        let result = self.apply(LifecycleCommand::GrantSelfExclude);
        if result.changed() {
            self.reset_reasoning();
        }
        result
    }

    /// Requests immediate determination; withdraws any self-exclusion.
    pub fn claim_determination(&mut self) -> LifecycleApplyResult {
        self.cancel_pending_self_exclusion();
        self.apply(LifecycleCommand::Claim)
    }

    pub fn reset_self_excluded(&mut self) -> LifecycleApplyResult {
        self.cancel_pending_self_exclusion();
        self.apply(LifecycleCommand::ResetSelfExcluded)
    }

    pub fn undetermine(&mut self) -> LifecycleApplyResult {
        let result = self.apply(LifecycleCommand::Undetermine);
        self.reset_reasoning();
        self.cancel_pending_self_exclusion();
        result
    }

    fn cancel_pending_self_exclusion(&mut self) {
        if let Some(token) = self.pending_self_exclusion.take() {
            token.cancel();
        }
    }

    /// Clears every behavior window; evidence drops to zero.
    pub fn reset_observations(&mut self) {
        for behavior in &mut self.behaviors {
            behavior.reset();
        }
        self.evidence = 0.0;
    }

    fn reset_reasoning(&mut self) {
        self.candidate_probability = 0.0;
        self.reset_observations();
        self.rulebook.reset();
        self.write_posterior_sentinel();
        self.last_down_ms = None;
        self.last_event_ms = None;
    }

    /// Full reset: idle, no claim, empty windows, fresh rule state.
    pub fn reset(&mut self) {
        if self.is_candidate() || self.is_claiming() {
            let _ = self.apply(LifecycleCommand::Exclude);
        }
        self.reset_reasoning();
    }

    // Rules

    pub fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    pub fn add_rule(&mut self, statement: &str) -> Result<String, CompileError> {
        self.rulebook.add_rule(statement)
    }

    pub fn add_rule_with_listener(
        &mut self,
        statement: &str,
        listener: impl FnMut(&RuleFiring) + 'static,
    ) -> Result<String, CompileError> {
        self.rulebook.add_rule_with_listener(statement, listener)
    }

    pub fn set_behavior_listener(
        &mut self,
        label: &str,
        listener: impl FnMut(&str, Option<&PatternCheckResult>) + 'static,
    ) -> Result<(), InteractorError> {
        let index = self.behavior_index(label)?;
        self.rulebook.set_behavior_listener(index, listener)?;
        Ok(())
    }

    /// Claims determination whenever the named rule holds after an update.
    pub fn claim_on(&mut self, label: &str) -> Result<(), InteractorError> {
        if self.rulebook.is_satisfied(label).is_none() {
            return Err(InteractorError::Compile(CompileError::rule(
                label,
                "no rule with this label",
            )));
        }
        self.claim_rule = Some(label.to_string());
        Ok(())
    }

    pub fn update_rules(&mut self) {
        self.rulebook.update(&self.behaviors);
        let claim = self
            .claim_rule
            .as_deref()
            .and_then(|label| self.rulebook.is_satisfied(label))
            .unwrap_or(false);
        if claim {
            let _ = self.claim_determination();
        }
    }

    pub fn evaluate_rule(&mut self, label: &str) -> Option<bool> {
        self.rulebook.evaluate(label, &self.behaviors)
    }

    fn marker(&self, behavior: usize, marker: usize) -> Result<NotificationMarker, InteractorError> {
        let unknown = InteractorError::UnknownMarker { behavior, marker };
        let declared = self.behaviors[behavior]
            .pattern()
            .markers()
            .iter()
            .find(|m| m.index == marker)
            .copied()
            .ok_or(unknown)?;
        Ok(self
            .rulebook
            .behavior_result(behavior)
            .and_then(|result| result.marker(marker))
            .copied()
            .unwrap_or(declared))
    }

    pub fn marker_reached(&self, label: &str, marker: usize) -> Result<bool, InteractorError> {
        self.marker_reached_at(self.behavior_index(label)?, marker)
    }

    pub fn marker_reached_at(&self, behavior: usize, marker: usize) -> Result<bool, InteractorError> {
        self.check_behavior_index(behavior, marker)?;
        Ok(self.marker(behavior, marker)?.reached)
    }

    pub fn marker_just_reached(&self, label: &str, marker: usize) -> Result<bool, InteractorError> {
        self.marker_just_reached_at(self.behavior_index(label)?, marker)
    }

    pub fn marker_just_reached_at(
        &self,
        behavior: usize,
        marker: usize,
    ) -> Result<bool, InteractorError> {
        self.check_behavior_index(behavior, marker)?;
        Ok(self.marker(behavior, marker)?.just_reached)
    }

    fn check_behavior_index(&self, behavior: usize, marker: usize) -> Result<(), InteractorError> {
        if behavior < self.behaviors.len() {
            Ok(())
        } else {
            Err(InteractorError::UnknownMarker { behavior, marker })
        }
    }
}
