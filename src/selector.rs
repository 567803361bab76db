//! Label and field selectors.
//!
//! Selector strings are parsed once while the registry is built so that a
//! malformed selector rejects its metric up front. Against the API server the
//! original strings are sent unchanged; the offline store evaluates the parsed
//! form itself.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty requirement in {0:?}")]
    EmptyRequirement(String),

    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("unterminated value set in {0:?}")]
    UnterminatedSet(String),

    #[error("unsupported operator in {0:?}")]
    UnsupportedOperator(String),
}

/// One requirement of a label selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelRequirement {
    Exists(String),
    NotExists(String),
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
}

impl LabelRequirement {
    fn matches(&self, labels: Option<&Map<String, Value>>) -> bool {
        let get = |key: &str| labels.and_then(|l| l.get(key)).and_then(Value::as_str);
        match self {
            LabelRequirement::Exists(key) => get(key).is_some(),
            LabelRequirement::NotExists(key) => get(key).is_none(),
            LabelRequirement::Equals(key, value) => get(key) == Some(value.as_str()),
            LabelRequirement::NotEquals(key, value) => get(key) != Some(value.as_str()),
            LabelRequirement::In(key, values) => get(key).is_some_and(|v| values.contains(v)),
            LabelRequirement::NotIn(key, values) => !get(key).is_some_and(|v| values.contains(v)),
        }
    }
}

/// A parsed label selector; all requirements must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<LabelRequirement>,
}

impl LabelSelector {
    pub fn requirements(&self) -> &[LabelRequirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Matches against `metadata.labels` of a document.
    pub fn matches(&self, document: &Value) -> bool {
        let labels = document
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .and_then(Value::as_object);
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements = Vec::new();
        for term in split_terms(s)? {
            requirements.push(parse_label_requirement(term)?);
        }
        Ok(Self { requirements })
    }
}

fn parse_label_requirement(term: &str) -> Result<LabelRequirement, SelectorError> {
    if let Some(key) = term.strip_prefix('!') {
        return Ok(LabelRequirement::NotExists(checked_key(key.trim())?));
    }
    if let Some((key, value)) = term.split_once("!=") {
        return Ok(LabelRequirement::NotEquals(
            checked_key(key.trim())?,
            value.trim().to_string(),
        ));
    }
    if let Some((key, value)) = term.split_once("==").or_else(|| term.split_once('=')) {
        return Ok(LabelRequirement::Equals(
            checked_key(key.trim())?,
            value.trim().to_string(),
        ));
    }
    if let Some(open) = term.find('(') {
        let head: Vec<&str> = term[..open].split_whitespace().collect();
        let body = term[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| SelectorError::UnterminatedSet(term.to_string()))?;
        let values: BTreeSet<String> = body
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        return match head.as_slice() {
            [key, "in"] => Ok(LabelRequirement::In(checked_key(key)?, values)),
            [key, "notin"] => Ok(LabelRequirement::NotIn(checked_key(key)?, values)),
            _ => Err(SelectorError::UnsupportedOperator(term.to_string())),
        };
    }
    if term.split_whitespace().count() > 1 {
        return Err(SelectorError::UnsupportedOperator(term.to_string()));
    }
    Ok(LabelRequirement::Exists(checked_key(term)?))
}

fn checked_key(key: &str) -> Result<String, SelectorError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if valid {
        Ok(key.to_string())
    } else {
        Err(SelectorError::InvalidKey(key.to_string()))
    }
}

/// Splits on commas that are not inside a parenthesized value set.
fn split_terms(s: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    if s.trim().is_empty() {
        return Ok(terms);
    }

    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::UnterminatedSet(s.to_string()));
    }
    terms.push(&s[start..]);

    terms
        .into_iter()
        .map(str::trim)
        .map(|t| {
            if t.is_empty() {
                Err(SelectorError::EmptyRequirement(s.to_string()))
            } else {
                Ok(t)
            }
        })
        .collect()
}

/// One `path=value` or `path!=value` term of a field selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequirement {
    pub path: Vec<String>,
    pub value: String,
    pub negated: bool,
}

impl FieldRequirement {
    /// A missing field compares as the empty string.
    fn matches(&self, document: &Value) -> bool {
        let mut node = Some(document);
        for segment in &self.path {
            node = node.and_then(|n| n.get(segment));
        }
        let actual = match node {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        (actual == self.value) != self.negated
    }
}

/// A parsed field selector; all requirements must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<FieldRequirement>,
}

impl FieldSelector {
    pub fn requirements(&self) -> &[FieldRequirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.requirements.iter().all(|r| r.matches(document))
    }
}

impl FromStr for FieldSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements = Vec::new();
        for term in split_terms(s)? {
            let (path, value, negated) = if let Some((p, v)) = term.split_once("!=") {
                (p, v, true)
            } else if let Some((p, v)) = term.split_once("==").or_else(|| term.split_once('=')) {
                (p, v, false)
            } else {
                return Err(SelectorError::UnsupportedOperator(term.to_string()));
            };

            let path = path.trim();
            let segments: Vec<String> = path.split('.').map(str::to_string).collect();
            if segments.iter().any(|seg| checked_key(seg).is_err()) {
                return Err(SelectorError::InvalidKey(path.to_string()));
            }
            requirements.push(FieldRequirement {
                path: segments,
                value: value.trim().to_string(),
                negated,
            });
        }
        Ok(Self { requirements })
    }
}
