use std::sync::LazyLock;

use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
}

impl BinaryOp {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// `is` tests a standing condition, `on` the edge into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOperator {
    Is,
    On,
}

impl EventOperator {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::On => "on",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BehaviorEvent {
    Complete,
    MostLikely,
}

impl BehaviorEvent {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::MostLikely => "most_likely",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QualifierWord {
    In,
    Using,
    With,
}

impl QualifierWord {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Using => "using",
            Self::With => "with",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TokenClass {
    Binary(BinaryOp),
    Not,
    EventOperator(EventOperator),
    Event(BehaviorEvent),
    Label,
    Open,
    Close,
    Qualifier(QualifierWord),
    QualifierValue,
    Unit,
    Identifier,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub text: String,
    pub class: TokenClass,
}

/// Digit-then-unit splitters. `ms` precedes `s` so milliseconds are not
/// split twice.
static UNIT_SPLITTERS: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    ["ms", "s", "p", "a", "fingers"]
        .into_iter()
        .map(|unit| {
            let re = Regex::new(&format!(r"(\d){unit}\s*")).expect("unit pattern is valid");
            (re, format!("${{1}} {unit} "))
        })
        .collect()
});
static LABEL_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*:\s*").expect("colon pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Inserts the mandatory spaces around brackets, units and label colons,
/// then collapses whitespace.
fn normalize(statement: &str) -> String {
    let mut text = statement.replace('(', " ( ").replace(')', " ) ");
    for (re, replacement) in UNIT_SPLITTERS.iter() {
        text = re.replace_all(&text, replacement.as_str()).into_owned();
    }
    text = LABEL_COLON.replace_all(&text, ": ").into_owned();
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

fn classify(word: &str, previous: Option<TokenClass>) -> TokenClass {
    match word {
        "and" => TokenClass::Binary(BinaryOp::And),
        "or" => TokenClass::Binary(BinaryOp::Or),
        "not" => TokenClass::Not,
        "is" => TokenClass::EventOperator(EventOperator::Is),
        "on" => TokenClass::EventOperator(EventOperator::On),
        "complete" => TokenClass::Event(BehaviorEvent::Complete),
        "most_likely" => TokenClass::Event(BehaviorEvent::MostLikely),
        _ if word.ends_with(':') => TokenClass::Label,
        "(" => TokenClass::Open,
        ")" => TokenClass::Close,
        "in" => TokenClass::Qualifier(QualifierWord::In),
        "using" => TokenClass::Qualifier(QualifierWord::Using),
        "with" => TokenClass::Qualifier(QualifierWord::With),
        _ if matches!(previous, Some(TokenClass::Qualifier(_))) => TokenClass::QualifierValue,
        // Units only follow a value; elsewhere `a` or `s` is a rule label.
        "ms" | "s" | "fingers" | "p" | "a"
            if previous == Some(TokenClass::QualifierValue) =>
        {
            TokenClass::Unit
        }
        _ => TokenClass::Identifier,
    }
}

pub fn tokenize(statement: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    for word in normalize(statement).split(' ').filter(|word| !word.is_empty()) {
        let class = classify(word, tokens.last().map(|token| token.class));
        tokens.push(Token {
            text: word.to_string(),
            class,
        });
    }
    tokens
}
