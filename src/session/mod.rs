//! Input manager: fans touch samples out to every interactor, filters move
//! jitter and runs mediation after each forwarded batch.

#[cfg(test)]
mod tests;

use crate::arbiter::{Arbiter, MediationOutcome};
use crate::config::{InteractorConfig, SceneConfig, SessionConfig};
use crate::error::{InteractorError, SceneError};
use crate::grammar::GrammarCompiler;
use crate::interactor::{DeferredAction, InteractorCore, InteractorId, SerialExecutor};
use crate::observation::{EventKind, Observation, TouchSample};
use crate::recognizer::BehaviorRecognizer;

#[derive(Debug)]
pub struct Session {
    interactors: Vec<InteractorCore>,
    arbiter: Arbiter,
    executor: SerialExecutor,
    move_jitter_threshold: f64,
    previous_batch: Vec<TouchSample>,
    now_ms: u64,
}

impl Session {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            interactors: Vec::new(),
            arbiter: Arbiter::new(config.arbiter.rule_out_mean_evidence),
            executor: SerialExecutor::new(),
            move_jitter_threshold: config.session.move_jitter_threshold,
            previous_batch: Vec::new(),
            now_ms: 0,
        }
    }

    /// Compiles every scene interactor and registers them in scene order.
    pub fn from_scene(config: &SessionConfig, scene: &SceneConfig) -> Result<Self, SceneError> {
        let compiler = GrammarCompiler::new(scene.surface.into())
            .with_display_density(config.grammar.display_density)
            .with_emission(config.recognizer.emission);

        let mut session = Self::new(config);
        for entry in &scene.interactors {
            let core = build_interactor(&compiler, config, entry).map_err(|source| SceneError {
                interactor: entry.id.clone(),
                source,
            })?;
            session.add_interactor(core);
        }
        log::debug!(
            "session_built interactors={} surface={}x{}",
            session.interactors.len(),
            scene.surface.width,
            scene.surface.height
        );
        Ok(session)
    }

    /// Registers an interactor and returns its id, which is its position.
    pub fn add_interactor(&mut self, mut core: InteractorCore) -> InteractorId {
        let id = self.interactors.len();
        core.set_id(id);
        log::debug!("interactor_added id={} name={}", id, core.name());
        self.interactors.push(core);
        id
    }

    pub fn interactors(&self) -> &[InteractorCore] {
        &self.interactors
    }

    pub fn interactor(&self, id: InteractorId) -> Option<&InteractorCore> {
        self.interactors.get(id)
    }

    pub fn interactor_mut(&mut self, id: InteractorId) -> Option<&mut InteractorCore> {
        self.interactors.get_mut(id)
    }

    pub fn interactor_by_name(&self, name: &str) -> Option<&InteractorCore> {
        self.interactors.iter().find(|core| core.name() == name)
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn pending_deferred(&self) -> usize {
        self.executor.pending()
    }

    pub fn determined(&self) -> Option<&InteractorCore> {
        self.interactors.iter().find(|core| core.is_determined())
    }

    /// Handles one host event. A move while two pointers are down carries
    /// the second pointer's sample in the same batch.
    pub fn handle_event(
        &mut self,
        primary: TouchSample,
        second: Option<TouchSample>,
    ) -> Result<Option<MediationOutcome>, InteractorError> {
        let mut batch = vec![primary];
        if primary.kind == EventKind::Move {
            batch.extend(second);
        }
        self.handle(&batch)
    }

    /// Forwards a batch of samples. Returns the mediation outcome when a
    /// round ran, `None` when everything was filtered or an interactor is
    /// already determined.
    pub fn handle(
        &mut self,
        samples: &[TouchSample],
    ) -> Result<Option<MediationOutcome>, InteractorError> {
        let mut forwarded = 0usize;
        for (index, sample) in samples.iter().enumerate() {
            if self.is_jitter(samples.len(), index, sample) {
                log::trace!(
                    "move_filtered pointer={} ms={}",
                    sample.pointer_id,
                    sample.timestamp_ms
                );
                continue;
            }
            self.now_ms = self.now_ms.max(sample.timestamp_ms);
            let observation = Observation::Touch(*sample);
            for core in &mut self.interactors {
                core.observe(&observation)?;
            }
            forwarded += 1;
        }

        if forwarded == 0 {
            return Ok(None);
        }
        self.previous_batch = samples.to_vec();
        if self.determined().is_some() {
            return Ok(None);
        }
        Ok(Some(self.mediate()))
    }

    fn is_jitter(&self, batch_len: usize, index: usize, sample: &TouchSample) -> bool {
        sample.kind == EventKind::Move
            && batch_len == self.previous_batch.len()
            && self
                .previous_batch
                .get(index)
                .is_some_and(|previous| sample.distance_to(previous) <= self.move_jitter_threshold)
    }

    pub fn mediate(&mut self) -> MediationOutcome {
        self.arbiter.mediate(&mut self.interactors)
    }

    /// Schedules a cancelable self-exclusion relative to the session clock.
    /// Returns `false` for an unknown id.
    pub fn self_exclude_after(&mut self, id: InteractorId, delay_ms: u64) -> bool {
        let now_ms = self.now_ms;
        match self.interactors.get_mut(id) {
            Some(core) => {
                core.self_exclude_after(delay_ms, now_ms, &mut self.executor);
                true
            }
            None => false,
        }
    }

    /// Moves the clock forward and applies due deferred work. A mediation
    /// round follows whenever something ran.
    pub fn advance_time(&mut self, now_ms: u64) -> Option<MediationOutcome> {
        self.now_ms = self.now_ms.max(now_ms);
        let actions = self.executor.run_due(self.now_ms);
        if actions.is_empty() {
            return None;
        }
        for action in actions {
            match action {
                DeferredAction::SelfExclude(id) => {
                    if let Some(core) = self.interactors.get_mut(id) {
                        let result = core.run_deferred_self_exclusion();
                        log::debug!(
                            "deferred_self_exclusion interactor={} status={:?}",
                            id,
                            result.status
                        );
                    }
                }
            }
        }
        Some(self.mediate())
    }

    /// Returns every interactor to idle and forgets input history.
    pub fn reset_all(&mut self) {
        for core in &mut self.interactors {
            core.reset();
        }
        self.arbiter.clear();
        self.previous_batch.clear();
        log::debug!("session_reset interactors={}", self.interactors.len());
    }
}

fn build_interactor(
    compiler: &GrammarCompiler,
    config: &SessionConfig,
    entry: &InteractorConfig,
) -> Result<InteractorCore, InteractorError> {
    let behaviors = entry
        .behaviors
        .iter()
        .map(|source| {
            compiler.compile(source, entry.bounds.into()).map(|compiled| {
                BehaviorRecognizer::with_max_observations(
                    compiled,
                    config.recognizer.max_observations,
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut core = InteractorCore::new(0, behaviors)?.with_name(entry.id.clone());
    if let Some(prior) = &entry.prior {
        core = core.with_prior(prior)?;
    }
    for rule in &entry.rules {
        core.add_rule(rule)?;
    }
    if let Some(label) = &entry.claim_on {
        core.claim_on(label)?;
    }
    Ok(core)
}
