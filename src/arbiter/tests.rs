use crate::interactor::InteractorId;

use super::{Arbiter, Arbitrated, MediationOutcome};

#[derive(Debug, Default)]
struct FakeInteractor {
    id: InteractorId,
    evidence: Option<f64>,
    candidate: bool,
    determined: bool,
    self_excluded: bool,
    claiming: bool,
    claim_after_rules: bool,
    rule_updates: u32,
    resets: u32,
    candidate_probability: f64,
}

impl FakeInteractor {
    fn new(id: InteractorId, evidence: Option<f64>) -> Self {
        Self {
            id,
            evidence,
            ..Self::default()
        }
    }

    fn claiming(mut self) -> Self {
        self.claim_after_rules = true;
        self
    }
}

impl Arbitrated for FakeInteractor {
    fn id(&self) -> InteractorId {
        self.id
    }

    fn mean_evidence(&self) -> Option<f64> {
        self.evidence
    }

    fn is_candidate(&self) -> bool {
        self.candidate
    }

    fn is_determined(&self) -> bool {
        self.determined
    }

    fn has_self_excluded(&self) -> bool {
        self.self_excluded
    }

    fn is_claiming(&self) -> bool {
        self.claiming
    }

    fn promote(&mut self) {
        self.candidate = true;
    }

    fn determine(&mut self) {
        self.candidate = true;
        self.determined = true;
    }

    fn exclude(&mut self) -> bool {
        let was_candidate = self.candidate;
        self.candidate = false;
        self.determined = false;
        self.claiming = false;
        self.resets += 1;
        was_candidate
    }

    fn grant_self_exclusion(&mut self) {
        self.self_excluded = false;
        self.exclude();
    }

    fn reset_observations(&mut self) {
        self.resets += 1;
    }

    fn update_rules(&mut self) {
        self.rule_updates += 1;
        if self.claim_after_rules {
            self.claiming = true;
        }
    }

    fn set_candidate_probability(&mut self, probability: f64) {
        self.candidate_probability = probability;
    }
}

#[test]
fn stronger_of_two_claimants_is_determined() {
    let mut arbiter = Arbiter::new(-10.0);
    let mut interactors = vec![
        FakeInteractor::new(0, Some(-1.0)).claiming(),
        FakeInteractor::new(1, Some(-2.0)).claiming(),
    ];
    let outcome = arbiter.mediate(&mut interactors);

    assert_eq!(outcome.promoted, vec![0, 1]);
    assert_eq!(outcome.determined, Some(0));
    assert_eq!(outcome.excluded, vec![1]);
    assert!(interactors[0].determined);
    assert!(!interactors[1].candidate);
    assert!(arbiter.candidates().is_empty());
}

#[test]
fn promotion_without_claims_keeps_the_pool() {
    let mut arbiter = Arbiter::default();
    let mut interactors = vec![
        FakeInteractor::new(0, Some(-3.0)),
        FakeInteractor::new(1, Some(-30.0)),
        FakeInteractor::new(2, None),
    ];
    let outcome = arbiter.mediate(&mut interactors);

    assert_eq!(
        outcome,
        MediationOutcome {
            determined: None,
            excluded: Vec::new(),
            promoted: vec![0],
        }
    );
    assert_eq!(arbiter.candidates(), &[0]);
    assert_eq!(interactors[0].rule_updates, 1);
    assert_eq!(interactors[1].rule_updates, 0);
    assert!(interactors[1].resets > 0);
    assert!((interactors[0].candidate_probability - 1.0).abs() < 1e-12);
}

#[test]
fn candidate_below_threshold_is_excluded() {
    let mut arbiter = Arbiter::new(-10.0);
    let mut interactors = vec![FakeInteractor::new(0, Some(-1.0))];
    arbiter.mediate(&mut interactors);
    assert!(interactors[0].candidate);

    interactors[0].evidence = Some(-12.0);
    let outcome = arbiter.mediate(&mut interactors);
    assert_eq!(outcome.excluded, vec![0]);
    assert!(!interactors[0].candidate);
    assert!(arbiter.candidates().is_empty());
}

#[test]
fn single_claim_excludes_every_other_candidate() {
    let mut arbiter = Arbiter::new(-10.0);
    let mut interactors = vec![
        FakeInteractor::new(0, Some(-1.0)),
        FakeInteractor::new(1, Some(-4.0)).claiming(),
        FakeInteractor::new(2, Some(-2.0)),
    ];
    let outcome = arbiter.mediate(&mut interactors);
    assert_eq!(outcome.determined, Some(1));
    assert_eq!(outcome.excluded, vec![0, 2]);
    assert_eq!(
        interactors.iter().filter(|i| i.determined).count(),
        1
    );
}

#[test]
fn claim_on_the_threshold_is_not_enough() {
    let mut arbiter = Arbiter::new(-10.0);
    let mut interactors = vec![FakeInteractor::new(0, Some(-10.0)).claiming()];
    let outcome = arbiter.mediate(&mut interactors);
    assert_eq!(outcome.promoted, vec![0]);
    assert_eq!(outcome.determined, None);
    assert_eq!(outcome.excluded, vec![0]);
}

#[test]
fn self_exclusion_is_granted_in_the_second_pass() {
    let mut arbiter = Arbiter::new(-10.0);
    let mut interactors = vec![FakeInteractor::new(0, Some(-1.0))];
    arbiter.mediate(&mut interactors);
    interactors[0].self_excluded = true;

    let outcome = arbiter.mediate(&mut interactors);
    assert_eq!(outcome.excluded, vec![0]);
    assert!(!interactors[0].candidate);
    assert!(!interactors[0].self_excluded);
    assert!(arbiter.candidates().is_empty());
}

#[test]
fn contested_claims_below_threshold_determine_nobody() {
    let mut arbiter = Arbiter::new(-10.0);
    let mut interactors = vec![
        FakeInteractor::new(0, Some(-10.0)).claiming(),
        FakeInteractor::new(1, Some(-10.0)).claiming(),
    ];
    let outcome = arbiter.mediate(&mut interactors);
    assert_eq!(outcome.determined, None);
    assert_eq!(outcome.excluded, vec![0, 1]);
    assert!(interactors.iter().all(|i| !i.determined));
}
