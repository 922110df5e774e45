use serde_json::{Map, Value};

use caseguard::filter::{is_operator_object, FilterOp};

/// Decide whether a row satisfies a filter tree.
///
/// Test-only interpreter used as the semantic oracle: merge and pruning
/// results are checked against actual row sets, not just tree shapes. An
/// empty filter matches every row.
pub fn row_matches(filter: &Value, row: &Map<String, Value>) -> bool {
    let Value::Object(map) = filter else { return true };
    map.iter().all(|(key, value)| match key.as_str() {
        "AND" => value
            .as_array()
            .map_or(true, |items| items.iter().all(|item| row_matches(item, row))),
        "OR" => value
            .as_array()
            .map_or(true, |items| items.iter().any(|item| row_matches(item, row))),
        "NOT" => !row_matches(value, row),
        field => constraint_holds(row.get(field), value),
    })
}

fn constraint_holds(actual: Option<&Value>, constraint: &Value) -> bool {
    match constraint {
        Value::Object(obj) if is_operator_object(obj) => obj.iter().all(|(key, expected)| {
            FilterOp::from_key(key).map_or(true, |op| operator_holds(op, expected, actual))
        }),
        Value::Object(_) => match actual {
            Some(Value::Object(nested_row)) => row_matches(constraint, nested_row),
            _ => false,
        },
        leaf => actual == Some(leaf),
    }
}

fn operator_holds(op: FilterOp, expected: &Value, actual: Option<&Value>) -> bool {
    match op {
        FilterOp::Eq => actual == Some(expected),
        FilterOp::Ne => actual.map_or(false, |a| a != expected),
        FilterOp::Gt => ordered(actual, expected, |a, e| a > e),
        FilterOp::Gte => ordered(actual, expected, |a, e| a >= e),
        FilterOp::Lt => ordered(actual, expected, |a, e| a < e),
        FilterOp::Lte => ordered(actual, expected, |a, e| a <= e),
        FilterOp::In => match (expected, actual) {
            (Value::Array(items), Some(a)) => items.contains(a),
            _ => false,
        },
        FilterOp::NotIn => match (expected, actual) {
            (Value::Array(items), Some(a)) => !items.contains(a),
            _ => false,
        },
        FilterOp::Between => match (expected.as_array(), number(actual)) {
            (Some(range), Some(n)) if range.len() == 2 => match (range[0].as_f64(), range[1].as_f64()) {
                (Some(lo), Some(hi)) => n >= lo && n <= hi,
                _ => false,
            },
            _ => false,
        },
        FilterOp::Like => strings(actual, expected).map_or(false, |(a, e)| like_match(&e, &a)),
        FilterOp::ILike => strings(actual, expected)
            .map_or(false, |(a, e)| like_match(&e.to_lowercase(), &a.to_lowercase())),
        FilterOp::NotILike => strings(actual, expected)
            .map_or(false, |(a, e)| !like_match(&e.to_lowercase(), &a.to_lowercase())),
        FilterOp::Contains => strings(actual, expected).map_or(false, |(a, e)| a.contains(&e)),
        FilterOp::StartsWith => strings(actual, expected).map_or(false, |(a, e)| a.starts_with(&e)),
        FilterOp::EndsWith => strings(actual, expected).map_or(false, |(a, e)| a.ends_with(&e)),
        FilterOp::IsNull => match expected {
            Value::Bool(true) => actual.map_or(true, Value::is_null),
            Value::Bool(false) => actual.is_some_and(|a| !a.is_null()),
            _ => false,
        },
        FilterOp::IsNotNull => match expected {
            Value::Bool(true) => actual.is_some_and(|a| !a.is_null()),
            Value::Bool(false) => actual.map_or(true, Value::is_null),
            _ => false,
        },
    }
}

fn number(actual: Option<&Value>) -> Option<f64> {
    actual.and_then(Value::as_f64)
}

fn ordered(actual: Option<&Value>, expected: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (number(actual), expected.as_f64()) {
        (Some(a), Some(e)) => cmp(a, e),
        _ => false,
    }
}

fn strings(actual: Option<&Value>, expected: &Value) -> Option<(String, String)> {
    match (actual, expected) {
        (Some(Value::String(a)), Value::String(e)) => Some((a.clone(), e.clone())),
        _ => None,
    }
}

// SQL LIKE with % wildcards only; enough for test fixtures.
fn like_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut rest = text;
    if !rest.starts_with(parts[0]) {
        return false;
    }
    rest = &rest[parts[0].len()..];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    let last = parts[parts.len() - 1];
    last.is_empty() || rest.ends_with(last)
}
