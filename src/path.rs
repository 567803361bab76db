//! Path expressions over resource documents.
//!
//! An expression takes one of four forms:
//!
//! - `$.status.replicas`: a root-relative lookup producing one scalar
//! - `production`: a constant, produced verbatim for every sample
//! - `key($.metadata.labels)`: one sample per key of the mapping found at the subpath
//! - `val($.spec.limits)`: one sample per value of the mapping found at the subpath
//!
//! Lookups accept dotted keys (`$.a.b`), quoted bracket keys
//! (`$.metadata.labels['app.kubernetes.io/name']`), sequence indices
//! (`$.status.conditions[0]`, `$.items[-1]`, `$.items.0`), wildcards (`[*]`,
//! `.*`), recursive descent (`$..name`) and filters
//! (`$.status.conditions[?(@.type=='Ready')].status`). Expressions are only
//! parsed when evaluated, so a malformed path fails per sample, never at startup.

use serde_json::{Map, Number, Value};
use std::borrow::Cow;

use crate::error::EvalError;

const KEYS_PREFIX: &str = "key(";
const VALUES_PREFIX: &str = "val(";

/// A classified path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathExpression {
    /// Text that does not begin with `$`; it is its own value.
    Constant(String),
    /// A root-relative lookup beginning with `$`.
    Lookup(String),
    /// `key(<subpath>)`: enumerate the keys of a mapping.
    Keys(String),
    /// `val(<subpath>)`: enumerate the values of a mapping.
    Values(String),
}

impl PathExpression {
    /// Classifies an expression by its outer form. Never fails.
    pub fn parse(expression: &str) -> Self {
        let trimmed = expression.trim();
        if let Some(inner) = enumeration_inner(trimmed, KEYS_PREFIX) {
            PathExpression::Keys(inner.to_string())
        } else if let Some(inner) = enumeration_inner(trimmed, VALUES_PREFIX) {
            PathExpression::Values(inner.to_string())
        } else if trimmed.starts_with('$') {
            PathExpression::Lookup(trimmed.to_string())
        } else {
            PathExpression::Constant(expression.to_string())
        }
    }

    pub fn is_enumeration(&self) -> bool {
        matches!(self, PathExpression::Keys(_) | PathExpression::Values(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, PathExpression::Constant(_))
    }
}

impl std::fmt::Display for PathExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathExpression::Constant(s) | PathExpression::Lookup(s) => f.write_str(s),
            PathExpression::Keys(s) => write!(f, "{KEYS_PREFIX}{s})"),
            PathExpression::Values(s) => write!(f, "{VALUES_PREFIX}{s})"),
        }
    }
}

fn enumeration_inner<'e>(expression: &'e str, prefix: &str) -> Option<&'e str> {
    expression
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(')'))
        .map(str::trim)
}

/// A scalar pulled out of a document, keeping its source type for later coercion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    Null,
    Bool(bool),
    Number(&'a Number),
    String(&'a str),
    Mapping(&'a Map<String, Value>),
    Sequence(&'a [Value]),
}

impl<'a> RawValue<'a> {
    /// Short name of the value's shape, used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "boolean",
            RawValue::Number(_) => "number",
            RawValue::String(_) => "string",
            RawValue::Mapping(_) => "mapping",
            RawValue::Sequence(_) => "sequence",
        }
    }

    /// Label rendering: strings pass through, anything else becomes empty.
    pub fn to_label(&self) -> String {
        match self {
            RawValue::String(s) => (*s).to_string(),
            _ => String::new(),
        }
    }
}

impl<'a> From<&'a Value> for RawValue<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => RawValue::Number(n),
            Value::String(s) => RawValue::String(s),
            Value::Object(map) => RawValue::Mapping(map),
            Value::Array(items) => RawValue::Sequence(items),
        }
    }
}

/// Result of evaluating one expression against one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated<'a> {
    Scalar(RawValue<'a>),
    /// Entries of the mapping targeted by `key(...)`/`val(...)`, in key order.
    Entries(Vec<(&'a str, &'a Value)>),
}

/// Evaluates an expression string against a document.
pub fn evaluate<'a>(document: &'a Value, expression: &'a str) -> Result<Evaluated<'a>, EvalError> {
    let trimmed = expression.trim();
    if let Some(inner) = enumeration_inner(trimmed, KEYS_PREFIX)
        .or_else(|| enumeration_inner(trimmed, VALUES_PREFIX))
    {
        return enumerate(document, inner);
    }
    if trimmed.starts_with('$') {
        return lookup(document, trimmed).map(|node| Evaluated::Scalar(node.into()));
    }
    Ok(Evaluated::Scalar(RawValue::String(expression)))
}

/// Evaluates an already classified expression against a document.
pub fn evaluate_expression<'a>(
    document: &'a Value,
    expression: &'a PathExpression,
) -> Result<Evaluated<'a>, EvalError> {
    match expression {
        PathExpression::Constant(text) => Ok(Evaluated::Scalar(RawValue::String(text))),
        PathExpression::Lookup(path) => {
            lookup(document, path).map(|node| Evaluated::Scalar(node.into()))
        }
        PathExpression::Keys(path) | PathExpression::Values(path) => enumerate(document, path),
    }
}

/// Resolves the subpath and returns its mapping entries. A resolved node that
/// is not a mapping enumerates to nothing.
fn enumerate<'a>(document: &'a Value, path: &str) -> Result<Evaluated<'a>, EvalError> {
    let entries = match lookup(document, path)? {
        Value::Object(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        _ => Vec::new(),
    };
    Ok(Evaluated::Entries(entries))
}

/// Walks a `$`-rooted path and returns the node it points at.
///
/// A path made only of keys and indices must resolve at every step. A path
/// with a wildcard, recursive descent or filter resolves to its first match in
/// document order, and to `NotFound` when nothing matches.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Result<&'a Value, EvalError> {
    let segments = parse_segments(path)?;
    if !segments.iter().all(Segment::is_singular) {
        let mut nodes = vec![document];
        for segment in &segments {
            nodes = select(nodes, segment);
        }
        return nodes
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::not_found(path, "no node matched"));
    }

    let mut node = document;
    for segment in &segments {
        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map
                .get(key.as_ref())
                .ok_or_else(|| EvalError::not_found(path, format!("missing key {key:?}")))?,
            (Segment::Key(key), Value::Array(items)) => {
                let index: i64 = key.parse().map_err(|_| {
                    EvalError::not_found(path, format!("key {key:?} applied to a sequence"))
                })?;
                index_sequence(items, index, path)?
            }
            (Segment::Index(index), Value::Array(items)) => index_sequence(items, *index, path)?,
            (segment, other) => {
                return Err(EvalError::not_found(
                    path,
                    format!("{} applied to {}", segment.describe(), RawValue::from(other).shape()),
                ))
            }
        };
    }
    Ok(node)
}

fn index_of(items: &[Value], index: i64) -> Option<&Value> {
    let position = if index < 0 {
        items.len() as i64 + index
    } else {
        index
    };
    usize::try_from(position).ok().and_then(|p| items.get(p))
}

fn index_sequence<'a>(items: &'a [Value], index: i64, path: &str) -> Result<&'a Value, EvalError> {
    index_of(items, index).ok_or_else(|| {
        EvalError::not_found(
            path,
            format!("index {index} out of range for sequence of length {}", items.len()),
        )
    })
}

/// Follows keys and indices without reporting why a step failed.
fn walk<'a>(mut node: &'a Value, segments: &[Segment<'_>]) -> Option<&'a Value> {
    for segment in segments {
        node = match (segment, node) {
            (Segment::Key(key), Value::Object(map)) => map.get(key.as_ref())?,
            (Segment::Key(key), Value::Array(items)) => index_of(items, key.parse().ok()?)?,
            (Segment::Index(index), Value::Array(items)) => index_of(items, *index)?,
            _ => return None,
        };
    }
    Some(node)
}

fn children(node: &Value) -> Vec<&Value> {
    match node {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    for child in children(node) {
        descendants(child, out);
    }
}

fn select<'a>(nodes: Vec<&'a Value>, segment: &Segment<'_>) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for node in nodes {
        match segment {
            Segment::Key(_) | Segment::Index(_) => {
                out.extend(walk(node, std::slice::from_ref(segment)))
            }
            Segment::Wildcard => out.extend(children(node)),
            Segment::Descendants => descendants(node, &mut out),
            Segment::Filter(filter) => out.extend(
                children(node)
                    .into_iter()
                    .filter(|candidate| filter.matches(candidate)),
            ),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    const ALL: [(&'static str, CompareOp); 6] = [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        ("<=", CompareOp::Le),
        (">=", CompareOp::Ge),
        ("<", CompareOp::Lt),
        (">", CompareOp::Gt),
    ];
}

/// `[?(@.path)]` or `[?(@.path <op> literal)]`.
#[derive(Debug, Clone, PartialEq)]
struct Filter<'p> {
    /// Keys and indices relative to the candidate element.
    path: Vec<Segment<'p>>,
    /// `None` only tests that the path resolves.
    test: Option<(CompareOp, Value)>,
}

impl Filter<'_> {
    fn matches(&self, candidate: &Value) -> bool {
        let Some(node) = walk(candidate, &self.path) else {
            return false;
        };
        match &self.test {
            None => true,
            Some((op, literal)) => compare(node, *op, literal),
        }
    }
}

/// Numbers compare numerically and strings lexically; other shapes only
/// support equality.
fn compare(node: &Value, op: CompareOp, literal: &Value) -> bool {
    let ordering = match (node, literal) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match (op, ordering) {
        (CompareOp::Eq, Some(o)) => o.is_eq(),
        (CompareOp::Eq, None) => node == literal,
        (CompareOp::Ne, Some(o)) => o.is_ne(),
        (CompareOp::Ne, None) => node != literal,
        (CompareOp::Lt, Some(o)) => o.is_lt(),
        (CompareOp::Le, Some(o)) => o.is_le(),
        (CompareOp::Gt, Some(o)) => o.is_gt(),
        (CompareOp::Ge, Some(o)) => o.is_ge(),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment<'p> {
    Key(Cow<'p, str>),
    Index(i64),
    /// `.*` or `[*]`
    Wildcard,
    /// `..`: the node and everything below it.
    Descendants,
    Filter(Filter<'p>),
}

impl Segment<'_> {
    fn is_singular(&self) -> bool {
        matches!(self, Segment::Key(_) | Segment::Index(_))
    }

    fn describe(&self) -> String {
        match self {
            Segment::Key(key) => format!("key {key:?}"),
            Segment::Index(index) => format!("index [{index}]"),
            Segment::Wildcard => "wildcard".to_string(),
            Segment::Descendants => "recursive descent".to_string(),
            Segment::Filter(_) => "filter".to_string(),
        }
    }
}

fn parse_segments(path: &str) -> Result<Vec<Segment<'_>>, EvalError> {
    let rest = path
        .strip_prefix('$')
        .ok_or_else(|| EvalError::syntax(path, "must begin with '$'"))?;
    parse_steps(rest).map_err(|reason| EvalError::syntax(path, reason))
}

/// Parses the steps following a `$` or `@` root.
fn parse_steps(rest: &str) -> Result<Vec<Segment<'_>>, String> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let bytes = rest.as_bytes();

    while pos < bytes.len() {
        match bytes[pos] {
            b'.' if bytes.get(pos + 1) == Some(&b'.') => {
                segments.push(Segment::Descendants);
                // `$..[0]` continues with a bracket, `$..name` with a key
                pos += if bytes.get(pos + 2) == Some(&b'[') { 2 } else { 1 };
            }
            b'.' => {
                pos += 1;
                let start = pos;
                while pos < bytes.len() && bytes[pos] != b'.' && bytes[pos] != b'[' {
                    pos += 1;
                }
                match &rest[start..pos] {
                    "" => return Err("empty key after '.'".to_string()),
                    "*" => segments.push(Segment::Wildcard),
                    key => segments.push(Segment::Key(Cow::Borrowed(key))),
                }
            }
            b'[' => {
                let (segment, next) = parse_bracket(rest, pos + 1)?;
                segments.push(segment);
                pos = next;
            }
            other => return Err(format!("unexpected character {:?}", other as char)),
        }
    }

    Ok(segments)
}

/// Parses the inside of `[...]` starting just after the `[`; returns the
/// segment and the position just after the closing `]`.
fn parse_bracket(rest: &str, start: usize) -> Result<(Segment<'_>, usize), String> {
    let body = &rest[start..];
    let mut chars = body.char_indices();

    match chars.next() {
        Some((_, quote @ ('\'' | '"'))) => {
            let mut key = String::new();
            let mut escaped = false;
            for (offset, c) in chars {
                if escaped {
                    key.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    let after = start + offset + c.len_utf8();
                    return match rest[after..].chars().next() {
                        Some(']') => Ok((Segment::Key(Cow::Owned(key)), after + 1)),
                        _ => Err("expected ']' after quoted key".to_string()),
                    };
                } else {
                    key.push(c);
                }
            }
            Err("unterminated quoted key".to_string())
        }
        Some((_, '*')) if body[1..].starts_with(']') => Ok((Segment::Wildcard, start + 2)),
        Some((_, '*')) => Err("expected ']' after '*'".to_string()),
        Some((_, '?')) => {
            let (filter, next) = parse_filter(rest, start + 1)?;
            Ok((Segment::Filter(filter), next))
        }
        Some(_) => {
            let close = body
                .find(']')
                .ok_or_else(|| "unterminated '['".to_string())?;
            let inner = body[..close].trim();
            let index = inner
                .parse::<i64>()
                .map_err(|_| format!("invalid index {inner:?}"))?;
            Ok((Segment::Index(index), start + close + 1))
        }
        None => Err("unterminated '['".to_string()),
    }
}

/// Parses `(expr)]` starting just after the `?`.
fn parse_filter(rest: &str, start: usize) -> Result<(Filter<'_>, usize), String> {
    let body = &rest[start..];
    let open = body.len() - body.trim_start().len();
    if !body[open..].starts_with('(') {
        return Err("expected '(' after '?'".to_string());
    }

    let expr_start = start + open + 1;
    let close = closing_paren(&rest[expr_start..])
        .ok_or_else(|| "unterminated filter".to_string())?;
    let filter = parse_filter_expression(&rest[expr_start..expr_start + close])?;

    let after = expr_start + close + 1;
    let tail = &rest[after..];
    let gap = tail.len() - tail.trim_start().len();
    if !tail[gap..].starts_with(']') {
        return Err("expected ']' after filter".to_string());
    }
    Ok((filter, after + gap + 1))
}

/// Byte offset of the `)` closing an already opened parenthesis, skipping
/// quoted text.
fn closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (i, &b) in text.as_bytes().iter().enumerate() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if b == b'\\' => escaped = true,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' if depth == 0 => return Some(i),
                b')' => depth -= 1,
                _ => {}
            },
        }
    }
    None
}

fn parse_filter_expression(expr: &str) -> Result<Filter<'_>, String> {
    let expr = expr.trim();
    let (lhs, test) = match find_operator(expr) {
        Some((at, symbol, op)) => {
            let literal = parse_literal(expr[at + symbol.len()..].trim())?;
            (expr[..at].trim(), Some((op, literal)))
        }
        None => (expr, None),
    };

    let relative = lhs
        .strip_prefix('@')
        .ok_or_else(|| format!("filter must test '@', got {lhs:?}"))?;
    let path = parse_steps(relative)?;
    if !path.iter().all(Segment::is_singular) {
        return Err("filter paths may only use keys and indices".to_string());
    }
    Ok(Filter { path, test })
}

/// First comparison operator outside quoted text.
fn find_operator(expr: &str) -> Option<(usize, &'static str, CompareOp)> {
    let bytes = expr.as_bytes();
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if b == b'\\' => escaped = true,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if matches!(b, b'=' | b'!' | b'<' | b'>') => {
                let found = CompareOp::ALL
                    .iter()
                    .find(|(symbol, _)| expr[i..].starts_with(*symbol));
                if let Some(&(symbol, op)) = found {
                    return Some((i, symbol, op));
                }
            }
            None => {}
        }
    }
    None
}

fn parse_literal(text: &str) -> Result<Value, String> {
    if let Some(quote @ ('\'' | '"')) = text.chars().next() {
        let inner = text[1..]
            .strip_suffix(quote)
            .ok_or_else(|| format!("unterminated string {text:?}"))?;
        let mut unescaped = String::with_capacity(inner.len());
        let mut escaped = false;
        for c in inner.chars() {
            if escaped || c != '\\' {
                unescaped.push(c);
                escaped = false;
            } else {
                escaped = true;
            }
        }
        return Ok(Value::String(unescaped));
    }
    match text {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        _ => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("invalid filter literal {text:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "metadata": {
                "name": "web-0",
                "labels": {"app.kubernetes.io/name": "web", "tier": "frontend"}
            },
            "spec": {"limits": {"cpu": 2, "mem": 4}, "paused": false},
            "status": {
                "ready": "True",
                "conditions": [
                    {"type": "Ready", "status": "True"},
                    {"type": "Synced", "status": "False"}
                ],
                "phase": null
            }
        })
    }

    #[test]
    fn test_classify() {
        assert_eq!(PathExpression::parse("$.a.b"), PathExpression::Lookup("$.a.b".into()));
        assert_eq!(PathExpression::parse("prod"), PathExpression::Constant("prod".into()));
        assert_eq!(
            PathExpression::parse("key($.metadata.labels)"),
            PathExpression::Keys("$.metadata.labels".into())
        );
        assert_eq!(
            PathExpression::parse(" val( $.spec.limits ) "),
            PathExpression::Values("$.spec.limits".into())
        );
        assert!(PathExpression::parse("val($.x)").is_enumeration());
        assert!(!PathExpression::parse("$.x").is_enumeration());
    }

    #[test]
    fn test_display_round_trips_enumerations() {
        let expr = PathExpression::parse("key($.metadata.labels)");
        assert_eq!(expr.to_string(), "key($.metadata.labels)");
    }

    #[test]
    fn test_scalar_lookup_preserves_type() {
        let d = doc();
        assert_eq!(
            evaluate(&d, "$.metadata.name").unwrap(),
            Evaluated::Scalar(RawValue::String("web-0"))
        );
        assert_eq!(
            evaluate(&d, "$.spec.paused").unwrap(),
            Evaluated::Scalar(RawValue::Bool(false))
        );
        assert_eq!(evaluate(&d, "$.status.phase").unwrap(), Evaluated::Scalar(RawValue::Null));
        match evaluate(&d, "$.spec.limits.cpu").unwrap() {
            Evaluated::Scalar(RawValue::Number(n)) => assert_eq!(n.as_i64(), Some(2)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bracket_and_index_lookup() {
        let d = doc();
        assert_eq!(
            evaluate(&d, "$.metadata.labels['app.kubernetes.io/name']").unwrap(),
            Evaluated::Scalar(RawValue::String("web"))
        );
        assert_eq!(
            evaluate(&d, "$[\"metadata\"][\"name\"]").unwrap(),
            Evaluated::Scalar(RawValue::String("web-0"))
        );
        assert_eq!(
            evaluate(&d, "$.status.conditions[1].type").unwrap(),
            Evaluated::Scalar(RawValue::String("Synced"))
        );
        assert_eq!(
            evaluate(&d, "$.status.conditions[-1].status").unwrap(),
            Evaluated::Scalar(RawValue::String("False"))
        );
        assert_eq!(
            evaluate(&d, "$.status.conditions.0.type").unwrap(),
            Evaluated::Scalar(RawValue::String("Ready"))
        );
    }

    #[test]
    fn test_root_returns_whole_document() {
        let d = doc();
        assert!(matches!(
            evaluate(&d, "$").unwrap(),
            Evaluated::Scalar(RawValue::Mapping(_))
        ));
    }

    #[test]
    fn test_missing_paths_are_not_found() {
        let d = doc();
        for path in [
            "$.metadata.namespace",
            "$.status.conditions[5]",
            "$.metadata.name.first",
            "$.status.conditions.x",
        ] {
            assert!(
                matches!(evaluate(&d, path), Err(EvalError::NotFound { .. })),
                "{path} should be NotFound"
            );
        }
    }

    #[test]
    fn test_malformed_paths_are_syntax_errors() {
        let d = doc();
        for path in [
            "$.a[",
            "$.a['b",
            "$.a[x]",
            "$a",
            "$.a[*x]",
            "$.a[?(@.b=='c']",
            "$.a[?(b=='c')]",
            "$.a[?(@.b==c)]",
            "$.a[?(@..b)]",
        ] {
            assert!(
                matches!(evaluate(&d, path), Err(EvalError::Syntax { .. })),
                "{path} should be a syntax error"
            );
        }
    }

    #[test]
    fn test_condition_filter_selects_matching_entry() {
        let d = doc();
        assert_eq!(
            evaluate(&d, "$.status.conditions[?(@.type=='Ready')].status").unwrap(),
            Evaluated::Scalar(RawValue::String("True"))
        );
        assert_eq!(
            evaluate(&d, "$.status.conditions[?(@.type == \"Synced\")].status").unwrap(),
            Evaluated::Scalar(RawValue::String("False"))
        );
        assert_eq!(
            evaluate(&d, "$.status.conditions[?(@.type!='Ready')].type").unwrap(),
            Evaluated::Scalar(RawValue::String("Synced"))
        );
    }

    #[test]
    fn test_filter_without_match_is_not_found() {
        let d = doc();
        assert!(matches!(
            evaluate(&d, "$.status.conditions[?(@.type=='Degraded')].status"),
            Err(EvalError::NotFound { .. })
        ));
        assert!(matches!(
            evaluate(&d, "$.status.conditions[?(@.reason)].status"),
            Err(EvalError::NotFound { .. })
        ));
    }

    #[test]
    fn test_filter_literals_and_comparisons() {
        let d = json!({"items": [
            {"name": "a", "replicas": 1, "paused": true, "note": "x)]y"},
            {"name": "b", "replicas": 3, "paused": false}
        ]});
        let first = |path: &str| match evaluate(&d, path).unwrap() {
            Evaluated::Scalar(RawValue::String(s)) => s.to_string(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(first("$.items[?(@.replicas > 2)].name"), "b");
        assert_eq!(first("$.items[?(@.replicas <= 1.0)].name"), "a");
        assert_eq!(first("$.items[?(@.paused == false)].name"), "b");
        assert_eq!(first("$.items[?(@.note == 'x)]y')].name"), "a");
        assert_eq!(first("$.items[?(@.note)].name"), "a");
    }

    #[test]
    fn test_wildcard_and_descent_take_first_match() {
        let d = doc();
        assert_eq!(
            evaluate(&d, "$.status.conditions[*].type").unwrap(),
            Evaluated::Scalar(RawValue::String("Ready"))
        );
        assert_eq!(
            evaluate(&d, "$.status.conditions.*.status").unwrap(),
            Evaluated::Scalar(RawValue::String("True"))
        );
        assert_eq!(
            evaluate(&d, "$..tier").unwrap(),
            Evaluated::Scalar(RawValue::String("frontend"))
        );
        assert_eq!(
            evaluate(&d, "$..[1].type").unwrap(),
            Evaluated::Scalar(RawValue::String("Synced"))
        );
    }

    #[test]
    fn test_enumeration_through_filter() {
        let d = doc();
        match evaluate(&d, "key($.status.conditions[?(@.type=='Ready')])").unwrap() {
            Evaluated::Entries(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
                assert_eq!(keys, vec!["status", "type"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_constant_is_verbatim() {
        let d = doc();
        assert_eq!(
            evaluate(&d, "cluster-a").unwrap(),
            Evaluated::Scalar(RawValue::String("cluster-a"))
        );
    }

    #[test]
    fn test_enumeration_returns_entries() {
        let d = doc();
        match evaluate(&d, "val($.spec.limits)").unwrap() {
            Evaluated::Entries(entries) => {
                let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
                assert_eq!(keys, vec!["cpu", "mem"]);
                assert_eq!(entries[1].1, &json!(4));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_enumeration_over_non_mapping_is_empty() {
        let d = doc();
        assert_eq!(
            evaluate(&d, "key($.status.conditions)").unwrap(),
            Evaluated::Entries(vec![])
        );
        assert_eq!(
            evaluate(&d, "key($.metadata.name)").unwrap(),
            Evaluated::Entries(vec![])
        );
    }

    #[test]
    fn test_classified_evaluation_matches_string_evaluation() {
        let d = doc();
        for text in ["$.metadata.name", "key($.metadata.labels)", "fixed"] {
            let expr = PathExpression::parse(text);
            assert_eq!(evaluate_expression(&d, &expr).unwrap(), evaluate(&d, text).unwrap());
        }
    }

    #[test]
    fn test_label_rendering() {
        assert_eq!(RawValue::String("x").to_label(), "x");
        assert_eq!(RawValue::Bool(true).to_label(), "");
        assert_eq!(RawValue::Null.to_label(), "");
    }
}
