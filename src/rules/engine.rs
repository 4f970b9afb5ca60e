use std::collections::HashMap;
use std::fmt;

use crate::error::CompileError;
use crate::pattern::{self, PatternCheckResult};
use crate::recognizer::BehaviorView;

use super::compiler::{self, Expr, RuleScope};
use super::lexer::{BehaviorEvent, BinaryOp, EventOperator};

pub type NodeId = usize;

pub type RuleListener = Box<dyn FnMut(&RuleFiring)>;
pub type BehaviorListener = Box<dyn FnMut(&str, Option<&PatternCheckResult>)>;

/// Delivered to rule listeners on every cycle in which the rule holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleFiring {
    pub label: String,
    /// Cycles the rule has held in a row before this one.
    pub consecutive_true: u32,
}

impl RuleFiring {
    pub fn is_rising_edge(&self) -> bool {
        self.consecutive_true == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Qualifier {
    TimeTaken {
        min_ms: Option<f64>,
        max_ms: Option<f64>,
    },
    Fingers(usize),
    Pressure {
        min: Option<f64>,
        max: Option<f64>,
    },
    Size {
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl Qualifier {
    fn holds(&self, view: &dyn BehaviorView) -> bool {
        match *self {
            Self::TimeTaken { min_ms, max_ms } => {
                let taken = view.time_taken_ms() as f64;
                min_ms.map_or(true, |min| taken > min) && max_ms.map_or(true, |max| taken <= max)
            }
            Self::Fingers(count) => view.observed_pointer_count() == count,
            Self::Pressure { min, max } => within_open(view.mean_pressure(), min, max),
            Self::Size { min, max } => within_open(view.mean_size(), min, max),
        }
    }
}

fn within_open(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |min| value > min) && max.map_or(true, |max| value < max)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    Leaf {
        behavior: usize,
        op: EventOperator,
        event: BehaviorEvent,
    },
    Not(NodeId),
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    Qualified {
        leaf: NodeId,
        qualifier: Qualifier,
    },
}

struct RuleNode {
    label: String,
    kind: NodeKind,
    checked: bool,
    result: bool,
    consecutive_true: u32,
    check_count: u64,
    last_result: Option<PatternCheckResult>,
    /// Each listener with the label it was registered under.
    listeners: Vec<(String, RuleListener)>,
}

impl RuleNode {
    fn new(label: String, kind: NodeKind) -> Self {
        Self {
            label,
            kind,
            checked: false,
            result: false,
            consecutive_true: 0,
            check_count: 0,
            last_result: None,
            listeners: Vec::new(),
        }
    }
}

/// Memoized rule graph over one interactor's behaviors. Nodes are interned
/// by canonical label and only ever reference earlier nodes. Rule labels are
/// aliases and never replace a node's canonical label.
pub struct Rulebook {
    behaviors: Vec<String>,
    nodes: Vec<RuleNode>,
    index: HashMap<String, NodeId>,
    aliases: HashMap<String, NodeId>,
    behavior_results: Vec<Option<PatternCheckResult>>,
    behavior_listeners: Vec<Option<BehaviorListener>>,
}

impl fmt::Debug for Rulebook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rulebook")
            .field("behaviors", &self.behaviors)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl RuleScope for Rulebook {
    fn behavior_index(&self, label: &str) -> Option<usize> {
        self.behaviors.iter().position(|behavior| behavior == label)
    }

    fn node_by_label(&self, label: &str) -> Option<NodeId> {
        self.aliases
            .get(label)
            .or_else(|| self.index.get(label))
            .copied()
    }

    fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(id).map(|node| node.kind)
    }
}

impl Rulebook {
    pub fn new<I, S>(behavior_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let behaviors: Vec<String> = behavior_labels.into_iter().map(Into::into).collect();
        let count = behaviors.len();
        Self {
            behaviors,
            nodes: Vec::new(),
            index: HashMap::new(),
            aliases: HashMap::new(),
            behavior_results: vec![None; count],
            behavior_listeners: (0..count).map(|_| None).collect(),
        }
    }

    /// Compiles one rule statement and returns the label it is registered
    /// under. Nothing is registered when compilation fails, including when
    /// the rule label already names a different node.
    pub fn add_rule(&mut self, statement: &str) -> Result<String, CompileError> {
        let parsed = compiler::parse(statement, &*self)?;
        if let Some(label) = &parsed.label {
            let canonical = self.canonical_label(&parsed.root);
            if let Some(bound) = self.node_by_label(label) {
                if self.nodes[bound].label != canonical {
                    return Err(CompileError::rule(
                        statement,
                        format!(
                            "label `{label}` already names `{}`",
                            self.nodes[bound].label
                        ),
                    ));
                }
            }
        }
        let root = self.intern(&parsed.root);
        let label = match parsed.label {
            Some(label) => {
                if label != self.nodes[root].label {
                    self.aliases.insert(label.clone(), root);
                }
                label
            }
            None => self.nodes[root].label.clone(),
        };
        log::debug!(
            "rule_added label={} nodes={}",
            label,
            self.nodes.len()
        );
        Ok(label)
    }

    pub fn add_rule_with_listener(
        &mut self,
        statement: &str,
        listener: impl FnMut(&RuleFiring) + 'static,
    ) -> Result<String, CompileError> {
        let label = self.add_rule(statement)?;
        if let Some(id) = self.node_by_label(&label) {
            self.nodes[id]
                .listeners
                .push((label.clone(), Box::new(listener)));
        }
        Ok(label)
    }

    /// Attaches a listener to an already registered rule. Returns `false`
    /// for an unknown label.
    pub fn add_listener(&mut self, label: &str, listener: impl FnMut(&RuleFiring) + 'static) -> bool {
        match self.node_by_label(label) {
            Some(id) => {
                self.nodes[id]
                    .listeners
                    .push((label.to_string(), Box::new(listener)));
                true
            }
            None => false,
        }
    }

    /// Registers a per-behavior listener, called with the pattern result each
    /// time one of the behavior's leaves is evaluated. Adds
    /// `<label>_notification_dummy: <label> is complete` so the behavior is
    /// evaluated every cycle.
    pub fn set_behavior_listener(
        &mut self,
        behavior: usize,
        listener: impl FnMut(&str, Option<&PatternCheckResult>) + 'static,
    ) -> Result<(), CompileError> {
        let Some(label) = self.behaviors.get(behavior).cloned() else {
            return Err(CompileError::rule(
                "",
                format!("no behavior at index {behavior}"),
            ));
        };
        self.add_rule(&format!("{label}_notification_dummy: {label} is complete"))?;
        self.behavior_listeners[behavior] = Some(Box::new(listener));
        Ok(())
    }

    pub fn behavior_labels(&self) -> &[String] {
        &self.behaviors
    }

    /// Every label a node is reachable by, canonical and rule labels alike.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.index
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// One evaluation cycle: forget memoized results, then check every node.
    pub fn update<B: BehaviorView>(&mut self, behaviors: &[B]) {
        for node in &mut self.nodes {
            node.checked = false;
        }
        for id in 0..self.nodes.len() {
            self.check(id, behaviors);
        }
    }

    /// Checks one rule, reusing this cycle's result when already checked.
    pub fn evaluate<B: BehaviorView>(&mut self, label: &str, behaviors: &[B]) -> Option<bool> {
        let id = self.node_by_label(label)?;
        Some(self.check(id, behaviors))
    }

    /// Result of the most recent check, without evaluating.
    pub fn is_satisfied(&self, label: &str) -> Option<bool> {
        self.node_by_label(label).map(|id| self.nodes[id].result)
    }

    pub fn consecutive_true(&self, label: &str) -> Option<u32> {
        self.node_by_label(label)
            .map(|id| self.nodes[id].consecutive_true)
    }

    pub fn check_count(&self, label: &str) -> Option<u64> {
        self.node_by_label(label).map(|id| self.nodes[id].check_count)
    }

    /// Last pattern result of a behavior leaf.
    pub fn last_result(&self, label: &str) -> Option<&PatternCheckResult> {
        let id = self.node_by_label(label)?;
        self.nodes[id].last_result.as_ref()
    }

    /// Latest pattern result computed for a behavior by any of its leaves.
    pub fn behavior_result(&self, behavior: usize) -> Option<&PatternCheckResult> {
        self.behavior_results.get(behavior)?.as_ref()
    }

    /// Drops every leaf's previous result so completion starts over.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.last_result = None;
        }
        for result in &mut self.behavior_results {
            *result = None;
        }
    }

    /// The label `intern` would give `expr`, without registering anything.
    fn canonical_label(&self, expr: &Expr) -> String {
        match expr {
            Expr::Reference(id) => self.nodes[*id].label.clone(),
            Expr::Leaf {
                ident, op, event, ..
            } => format!("{ident}_{}_{}", op.keyword(), event.keyword()),
            Expr::Not(inner) => format!("not_{}", self.canonical_label(inner)),
            Expr::Binary { op, left, right } => format!(
                "{}_{}_{}",
                self.canonical_label(left),
                op.keyword(),
                self.canonical_label(right)
            ),
            Expr::Qualified {
                operand,
                word,
                text,
                ..
            } => format!(
                "{}_{}_{}",
                self.canonical_label(operand),
                word.keyword(),
                text
            ),
        }
    }

    fn intern(&mut self, expr: &Expr) -> NodeId {
        let (label, kind) = match expr {
            Expr::Reference(id) => return *id,
            Expr::Leaf {
                behavior,
                ident,
                op,
                event,
            } => (
                format!("{ident}_{}_{}", op.keyword(), event.keyword()),
                NodeKind::Leaf {
                    behavior: *behavior,
                    op: *op,
                    event: *event,
                },
            ),
            Expr::Not(inner) => {
                let inner = self.intern(inner);
                (
                    format!("not_{}", self.nodes[inner].label),
                    NodeKind::Not(inner),
                )
            }
            Expr::Binary { op, left, right } => {
                let left = self.intern(left);
                let right = self.intern(right);
                (
                    format!(
                        "{}_{}_{}",
                        self.nodes[left].label,
                        op.keyword(),
                        self.nodes[right].label
                    ),
                    NodeKind::Binary {
                        op: *op,
                        left,
                        right,
                    },
                )
            }
            Expr::Qualified {
                operand,
                word,
                text,
                qualifier,
            } => {
                let leaf = self.intern(operand);
                (
                    format!("{}_{}_{}", self.nodes[leaf].label, word.keyword(), text),
                    NodeKind::Qualified {
                        leaf,
                        qualifier: *qualifier,
                    },
                )
            }
        };
        if let Some(id) = self.index.get(&label) {
            return *id;
        }
        let id = self.nodes.len();
        self.nodes.push(RuleNode::new(label.clone(), kind));
        self.index.insert(label, id);
        id
    }

    fn check<B: BehaviorView>(&mut self, id: NodeId, behaviors: &[B]) -> bool {
        if self.nodes[id].checked {
            return self.nodes[id].result;
        }
        let now = match self.nodes[id].kind {
            NodeKind::Leaf {
                behavior,
                op,
                event,
            } => self.check_leaf(id, behavior, op, event, behaviors),
            NodeKind::Not(inner) => !self.check(inner, behaviors),
            NodeKind::Binary { op, left, right } => {
                let left = self.check(left, behaviors);
                let right = self.check(right, behaviors);
                match op {
                    BinaryOp::And => left && right,
                    BinaryOp::Or => left || right,
                }
            }
            NodeKind::Qualified { leaf, qualifier } => {
                let base = self.check(leaf, behaviors);
                let view = match self.nodes[leaf].kind {
                    NodeKind::Leaf { behavior, .. } => behaviors.get(behavior),
                    _ => None,
                };
                base && view.is_some_and(|view| qualifier.holds(view))
            }
        };

        let node = &mut self.nodes[id];
        node.check_count += 1;
        node.consecutive_true = if now && node.result {
            node.consecutive_true + 1
        } else {
            0
        };
        node.result = now;
        node.checked = true;
        if now {
            for (label, listener) in &mut node.listeners {
                listener(&RuleFiring {
                    label: label.clone(),
                    consecutive_true: node.consecutive_true,
                });
            }
        }
        now
    }

    fn check_leaf<B: BehaviorView>(
        &mut self,
        id: NodeId,
        behavior: usize,
        op: EventOperator,
        event: BehaviorEvent,
        behaviors: &[B],
    ) -> bool {
        let Some(view) = behaviors.get(behavior) else {
            log::warn!(
                "rule_leaf_missing_behavior label={} behavior={} available={}",
                self.nodes[id].label,
                behavior,
                behaviors.len()
            );
            return false;
        };

        let previous = self.nodes[id].last_result.take();
        let was_most_likely = previous.as_ref().is_some_and(|result| result.is_most_likely);
        let mut result = pattern::check(
            view.dominant_path(),
            &view.dominant_event_kinds(),
            view.sequence_pattern(),
            previous.as_ref(),
        );
        if let Some(result) = &mut result {
            result.is_most_likely = view.is_most_likely();
            result.has_just_become_most_likely = result.is_most_likely && !was_most_likely;
        }
        if let Some(Some(listener)) = self.behavior_listeners.get_mut(behavior) {
            listener(view.label(), result.as_ref());
        }

        let verdict = result.as_ref().is_some_and(|result| match (op, event) {
            (EventOperator::On, BehaviorEvent::Complete) => result.has_just_completed(),
            (EventOperator::Is, BehaviorEvent::Complete) => {
                result.has_been_completed || result.has_just_completed()
            }
            (EventOperator::Is, BehaviorEvent::MostLikely) => result.is_most_likely,
            (EventOperator::On, BehaviorEvent::MostLikely) => result.has_just_become_most_likely,
        });
        self.behavior_results[behavior] = result.clone();
        self.nodes[id].last_result = result;
        verdict
    }
}
