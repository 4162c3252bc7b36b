//! Evaluator for the `where` predicates attached to foreign keys.
//!
//! Supports conjunctions (`AND`) of `=`, `<>`, `!=`, `<`, `<=`, `>`, `>=`,
//! `IN (...)`, `BETWEEN ... AND ...` and `IS [NOT] NULL`.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

use crate::generators::temporal::parse_datetime;
use crate::generators::{GeneratedValue, Row};

/// Result of evaluating a filter against one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Matched,
    Rejected,
    Unsupported,
}

/// Evaluate `expression` against `row` (keys are lower-cased column names).
pub fn evaluate_filter(expression: &str, row: &Row) -> FilterOutcome {
    let expr = strip_parens(expression);
    if expr.is_empty() {
        return FilterOutcome::Matched;
    }

    if let Some(parts) = split_and(expr) {
        for part in parts {
            match evaluate_filter(&part, row) {
                FilterOutcome::Matched => continue,
                other => return other,
            }
        }
        return FilterOutcome::Matched;
    }

    if let Some((column, negated)) = parse_is_null(expr) {
        let Some(value) = row.get(&column) else {
            return FilterOutcome::Unsupported;
        };
        return outcome(value.is_null() != negated);
    }

    if let Some((column, negated, values)) = parse_in_list(expr) {
        let Some(value) = row.get(&column) else {
            return FilterOutcome::Unsupported;
        };
        if value.is_null() {
            return FilterOutcome::Rejected;
        }
        let found = values
            .iter()
            .any(|literal| compare(value, literal) == Some(Ordering::Equal));
        return outcome(found != negated);
    }

    if let Some((column, min, max)) = parse_between(expr) {
        let Some(value) = row.get(&column) else {
            return FilterOutcome::Unsupported;
        };
        return match (compare(value, &min), compare(value, &max)) {
            (Some(low), Some(high)) => outcome(low != Ordering::Less && high != Ordering::Greater),
            _ => FilterOutcome::Rejected,
        };
    }

    if let Some((column, op, literal)) = parse_comparison(expr) {
        let Some(value) = row.get(&column) else {
            return FilterOutcome::Unsupported;
        };
        let Some(ordering) = compare(value, &literal) else {
            return FilterOutcome::Rejected;
        };
        let pass = match op.as_str() {
            "=" => ordering == Ordering::Equal,
            "<>" | "!=" => ordering != Ordering::Equal,
            "<" => ordering == Ordering::Less,
            "<=" => ordering != Ordering::Greater,
            ">" => ordering == Ordering::Greater,
            ">=" => ordering != Ordering::Less,
            _ => return FilterOutcome::Unsupported,
        };
        return outcome(pass);
    }

    FilterOutcome::Unsupported
}

fn outcome(pass: bool) -> FilterOutcome {
    if pass {
        FilterOutcome::Matched
    } else {
        FilterOutcome::Rejected
    }
}

fn strip_parens(expression: &str) -> &str {
    let mut expr = expression.trim();
    while expr.starts_with('(') && expr.ends_with(')') && balanced(&expr[1..expr.len() - 1]) {
        expr = expr[1..expr.len() - 1].trim();
    }
    expr
}

fn balanced(expr: &str) -> bool {
    let mut depth = 0i32;
    for ch in expr.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
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

static BETWEEN_TAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bbetween\s+\S+$").ok());
static IS_NULL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*`?(\w+)`?\s+is\s+(not\s+)?null\s*$").ok());
static IN_LIST: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*`?(\w+)`?\s+(not\s+)?in\s*\(([^\)]*)\)\s*$").ok()
});
static BETWEEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*`?(\w+)`?\s+between\s+(\S+)\s+and\s+(\S+)\s*$").ok()
});
static COMPARISON: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*`?(\w+)`?\s*(<>|!=|>=|<=|=|>|<)\s*('(?:[^']|'')*'|"[^"]*"|[^\s'"]+)\s*$"#)
        .ok()
});

/// Split on top-level `AND`, outside quotes and parentheses, keeping the
/// `AND` of a `BETWEEN` inside its term.
fn split_and(expr: &str) -> Option<Vec<String>> {
    let between = BETWEEN_TAIL.as_ref()?;
    let bytes = expr.as_bytes();
    let mut parts: Vec<String> = Vec::new();
    let mut start = 0;
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if let Some(open) = quote {
            if byte == open {
                quote = None;
            }
            i += 1;
            continue;
        }
        match byte {
            b'\'' | b'"' | b'`' => quote = Some(byte),
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ if depth == 0 && byte.is_ascii_whitespace() => {
                if let Some(len) = and_keyword(&bytes[i..]) {
                    let piece = expr[start..i].trim();
                    if !between.is_match(piece) {
                        parts.push(piece.to_string());
                        start = i + len;
                    }
                    i += len;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(expr[start..].trim().to_string());

    if parts.len() > 1 { Some(parts) } else { None }
}

/// Length of a whitespace-delimited `AND` at the start of `bytes`.
fn and_keyword(bytes: &[u8]) -> Option<usize> {
    let lead = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    let word = bytes.get(lead..lead + 3)?;
    if !word.eq_ignore_ascii_case(b"and") {
        return None;
    }
    let trail = bytes[lead + 3..]
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    (trail > 0).then_some(lead + 3 + trail)
}

fn parse_is_null(expr: &str) -> Option<(String, bool)> {
    let caps = IS_NULL.as_ref()?.captures(expr)?;
    Some((caps[1].to_lowercase(), caps.get(2).is_some()))
}

fn parse_in_list(expr: &str) -> Option<(String, bool, Vec<String>)> {
    let caps = IN_LIST.as_ref()?.captures(expr)?;
    let values = caps[3].split(',').map(normalize_literal).collect();
    Some((caps[1].to_lowercase(), caps.get(2).is_some(), values))
}

fn parse_between(expr: &str) -> Option<(String, String, String)> {
    let caps = BETWEEN.as_ref()?.captures(expr)?;
    Some((
        caps[1].to_lowercase(),
        normalize_literal(&caps[2]),
        normalize_literal(&caps[3]),
    ))
}

fn parse_comparison(expr: &str) -> Option<(String, String, String)> {
    let caps = COMPARISON.as_ref()?.captures(expr)?;
    Some((
        caps[1].to_lowercase(),
        caps[2].to_string(),
        normalize_literal(&caps[3]),
    ))
}

fn normalize_literal(value: &str) -> String {
    let trimmed = value.trim();
    let quoted = (trimmed.starts_with('\'') && trimmed.ends_with('\''))
        || (trimmed.starts_with('"') && trimmed.ends_with('"'));
    if quoted && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].replace("''", "'")
    } else if trimmed.eq_ignore_ascii_case("true") {
        "1".to_string()
    } else if trimmed.eq_ignore_ascii_case("false") {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Order `value` against a literal: numerically, then as dates, then as
/// case-insensitive text. `None` when either side is NULL.
fn compare(value: &GeneratedValue, literal: &str) -> Option<Ordering> {
    if value.is_null() || literal.eq_ignore_ascii_case("null") {
        return None;
    }

    if let Ok(number) = literal.parse::<f64>()
        && let Some(left) = value.as_f64()
    {
        return left.partial_cmp(&number);
    }

    if !matches!(value, GeneratedValue::Text(_))
        && let (Some(left), Some(right)) = (value.as_datetime(), parse_datetime(literal))
    {
        return Some(left.cmp(&right));
    }

    let left = value.to_text()?.to_lowercase();
    Some(left.as_str().cmp(literal.to_lowercase().as_str()))
}
