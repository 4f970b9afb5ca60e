use crate::error::CompileError;

use super::engine::{NodeId, NodeKind, Qualifier};
use super::lexer::{self, BehaviorEvent, BinaryOp, EventOperator, QualifierWord, Token, TokenClass};

/// Parsed rule before interning. Every identifier is already resolved, so
/// interning an `Expr` cannot fail.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Leaf {
        behavior: usize,
        ident: String,
        op: EventOperator,
        event: BehaviorEvent,
    },
    Reference(NodeId),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Qualified {
        operand: Box<Expr>,
        word: QualifierWord,
        text: String,
        qualifier: Qualifier,
    },
}

/// Lookups the parser needs from the owning rulebook.
pub trait RuleScope {
    fn behavior_index(&self, label: &str) -> Option<usize>;
    fn node_by_label(&self, label: &str) -> Option<NodeId>;
    fn node_kind(&self, id: NodeId) -> Option<NodeKind>;
}

#[derive(Debug)]
pub struct ParsedRule {
    pub label: Option<String>,
    pub root: Expr,
}

pub fn parse(statement: &str, scope: &dyn RuleScope) -> Result<ParsedRule, CompileError> {
    let mut tokens = lexer::tokenize(statement);
    let label = match tokens.first() {
        Some(token) if token.class == TokenClass::Label => {
            let token = tokens.remove(0);
            Some(token.text.trim_end_matches(':').to_string())
        }
        _ => None,
    };
    if tokens.is_empty() {
        return Err(CompileError::rule(statement, "empty rule"));
    }
    check_brackets(statement, &tokens)?;

    let parser = RuleParser {
        statement,
        tokens: &tokens,
        scope,
    };
    let root = parser.expr(0, tokens.len())?;
    Ok(ParsedRule { label, root })
}

fn check_brackets(statement: &str, tokens: &[Token]) -> Result<(), CompileError> {
    let mut depth = 0i32;
    for token in tokens {
        match token.class {
            TokenClass::Open => depth += 1,
            TokenClass::Close => {
                depth -= 1;
                if depth < 0 {
                    return Err(CompileError::rule(statement, "unbalanced brackets"));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(CompileError::rule(statement, "unbalanced brackets"));
    }
    Ok(())
}

struct RuleParser<'a> {
    statement: &'a str,
    tokens: &'a [Token],
    scope: &'a dyn RuleScope,
}

impl RuleParser<'_> {
    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::rule(self.statement, message)
    }

    fn class(&self, index: usize) -> TokenClass {
        self.tokens[index].class
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.tokens[start..end]
            .iter()
            .map(|token| token.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True when the bracket opened at `start` closes exactly at `end - 1`.
    fn encloses(&self, start: usize, end: usize) -> bool {
        if end - start < 2
            || self.class(start) != TokenClass::Open
            || self.class(end - 1) != TokenClass::Close
        {
            return false;
        }
        let mut depth = 0i32;
        for index in start + 1..end - 1 {
            match self.class(index) {
                TokenClass::Open => depth += 1,
                TokenClass::Close => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        depth == 0
    }

    fn expr(&self, mut start: usize, mut end: usize) -> Result<Expr, CompileError> {
        while self.encloses(start, end) {
            start += 1;
            end -= 1;
        }
        let len = end - start;
        if len == 0 {
            return Err(self.error("empty expression"));
        }

        if len == 3 {
            if let (TokenClass::Identifier, TokenClass::EventOperator(op), TokenClass::Event(event)) =
                (self.class(start), self.class(start + 1), self.class(start + 2))
            {
                return self.leaf(&self.tokens[start].text, op, event);
            }
        }

        if len == 1 && self.class(start) == TokenClass::Identifier {
            let label = &self.tokens[start].text;
            return self
                .scope
                .node_by_label(label)
                .map(Expr::Reference)
                .ok_or_else(|| self.error(format!("no rule labelled `{label}`")));
        }

        if self.class(start) == TokenClass::Not {
            return Ok(Expr::Not(Box::new(self.expr(start + 1, end)?)));
        }

        if len >= 3 {
            if let (TokenClass::Qualifier(word), TokenClass::QualifierValue, TokenClass::Unit) =
                (self.class(end - 3), self.class(end - 2), self.class(end - 1))
            {
                return self.qualified(start, end - 3, word, end - 2);
            }
        }

        let mut depth = 0i32;
        for index in start..end {
            match self.class(index) {
                TokenClass::Open => depth += 1,
                TokenClass::Close => depth -= 1,
                TokenClass::Binary(op) if depth == 0 => {
                    if index == start || index + 1 == end {
                        return Err(self.error(format!(
                            "operator `{}` is missing an operand",
                            op.keyword()
                        )));
                    }
                    return Ok(Expr::Binary {
                        op,
                        left: Box::new(self.expr(start, index)?),
                        right: Box::new(self.expr(index + 1, end)?),
                    });
                }
                _ => {}
            }
        }

        Err(self.error(format!("cannot parse `{}`", self.text(start, end))))
    }

    fn leaf(&self, ident: &str, op: EventOperator, event: BehaviorEvent) -> Result<Expr, CompileError> {
        let behavior = self
            .scope
            .behavior_index(ident)
            .ok_or_else(|| self.error(format!("unknown behavior `{ident}`")))?;
        Ok(Expr::Leaf {
            behavior,
            ident: ident.to_string(),
            op,
            event,
        })
    }

    fn qualified(
        &self,
        start: usize,
        end: usize,
        word: QualifierWord,
        value_index: usize,
    ) -> Result<Expr, CompileError> {
        let operand = self.expr(start, end)?;
        let is_leaf = match &operand {
            Expr::Leaf { .. } => true,
            Expr::Reference(id) => matches!(self.scope.node_kind(*id), Some(NodeKind::Leaf { .. })),
            _ => false,
        };
        if !is_leaf {
            return Err(self.error(format!(
                "qualifier `{}` must follow a behavior event",
                word.keyword()
            )));
        }

        let value = &self.tokens[value_index].text;
        let unit = &self.tokens[value_index + 1].text;
        let qualifier = parse_qualifier(word, value, unit)
            .ok_or_else(|| self.error(format!("bad qualifier `{} {value} {unit}`", word.keyword())))?;
        Ok(Expr::Qualified {
            operand: Box::new(operand),
            word,
            text: format!("{value}{unit}"),
            qualifier,
        })
    }
}

fn number(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
}

fn parse_qualifier(word: QualifierWord, value: &str, unit: &str) -> Option<Qualifier> {
    match (word, unit) {
        (QualifierWord::In, "ms" | "s") => {
            let scale = if unit == "s" { 1000.0 } else { 1.0 };
            let (min, max) = if let Some((low, high)) = value.split_once('-') {
                (Some(number(low)?), Some(number(high)?))
            } else if let Some(low) = value.strip_prefix('>') {
                (Some(number(low)?), None)
            } else {
                let high = value.strip_prefix('<').unwrap_or(value);
                (None, Some(number(high)?))
            };
            Some(Qualifier::TimeTaken {
                min_ms: min.map(|v| v * scale),
                max_ms: max.map(|v| v * scale),
            })
        }
        (QualifierWord::Using, "fingers") => value.parse::<usize>().ok().map(Qualifier::Fingers),
        (QualifierWord::With, "p" | "a") => {
            let (min, max) = match value.strip_prefix('<') {
                Some(high) => (None, Some(number(high)?)),
                None => (Some(number(value.strip_prefix('>').unwrap_or(value))?), None),
            };
            Some(if unit == "p" {
                Qualifier::Pressure { min, max }
            } else {
                Qualifier::Size { min, max }
            })
        }
        _ => None,
    }
}
