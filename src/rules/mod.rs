//! Rule language over behavior completion: `label: swipe on complete in
//! 500 ms and not tap is most_likely`, compiled into a memoized node graph.

mod compiler;
mod engine;
mod lexer;
#[cfg(test)]
mod tests;

pub use engine::{
    BehaviorListener, NodeId, NodeKind, Qualifier, RuleFiring, RuleListener, Rulebook,
};
pub use lexer::{BehaviorEvent, BinaryOp, EventOperator, QualifierWord};
