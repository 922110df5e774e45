use serde_json::{Map, Value};

use crate::config;

use super::error::FilterError;
use super::types::{classify, FilterOp, NodeShape, AND, NOT, OR};

/// Merge an untrusted user where tree over a trusted base (security) filter.
///
/// The contract is one-directional: the merged tree can never match a row the
/// base filter excludes. User input may narrow the result set, never widen
/// it. When the user tree is absent or not an object the base stands alone.
pub fn merge_secure_filters(base: &Value, user: Option<&Value>) -> Value {
    let (Value::Object(base_map), Some(Value::Object(user_map))) = (base, user) else {
        return base.clone();
    };
    Value::Object(deep_merge_filters(base_map, user_map))
}

/// Validating entry point for query construction. A malformed base filter is
/// a bug in the calling layer, not adversarial input, so it is the one
/// condition this module refuses to tolerate silently.
pub fn prepare_query_filters(base: &Value, rbac_where: Option<&Value>) -> Result<Value, FilterError> {
    if !base.is_object() {
        return Err(FilterError::InvalidBaseFilter(format!(
            "base filter must be an object, got {}",
            json_type_name(base)
        )));
    }
    match rbac_where {
        Some(user) => Ok(merge_secure_filters(base, Some(user))),
        None => Ok(base.clone()),
    }
}

/// Two-pass deep merge. Pass 1 carries every base constraint into the result,
/// consulting the user tree only where it can safely narrow. Pass 2 adds the
/// purely additive user constraints that had no base counterpart.
pub fn deep_merge_filters(base: &Map<String, Value>, user: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();

    for (key, base_value) in base {
        if base_value.is_null() {
            continue;
        }
        match key.as_str() {
            AND => {
                // Conjunction is always safe: every conjunct from both sides must hold.
                let mut conjuncts = valid_conjuncts(base_value);
                if let Some(user_and) = user.get(AND) {
                    conjuncts.extend(valid_conjuncts(user_and));
                }
                push_conjuncts(&mut merged, conjuncts);
            }
            OR => {
                let base_alts = valid_conjuncts(base_value);
                if base_alts.is_empty() {
                    continue;
                }
                let user_alts = user.get(OR).map(valid_conjuncts).unwrap_or_default();
                if user_alts.is_empty() {
                    merged.insert(OR.to_string(), Value::Array(base_alts));
                } else {
                    // A bare union of alternatives would widen past the base.
                    // Require one base alternative AND one user alternative.
                    push_conjuncts(&mut merged, vec![or_group(base_alts), or_group(user_alts)]);
                }
            }
            NOT => {
                // NOT is absolute: the base exclusion stands verbatim and the
                // user side is never consulted for this key.
                if user.get(NOT).is_some_and(|v| !v.is_null()) && config::config().security.enable_audit_logging {
                    tracing::warn!("User filter attempted to override NOT; base exclusion kept");
                }
                merged.insert(NOT.to_string(), base_value.clone());
            }
            _ => match user.get(key) {
                None => {
                    merged.insert(key.clone(), base_value.clone());
                }
                Some(user_value) => match (classify(base_value), classify(user_value)) {
                    (NodeShape::Operators(base_op), NodeShape::Operators(user_op)) => {
                        merged.insert(key.clone(), Value::Object(merge_operators(base_op, user_op)));
                    }
                    (NodeShape::Nested(base_nested), NodeShape::Nested(user_nested)) => {
                        merged.insert(key.clone(), Value::Object(deep_merge_filters(base_nested, user_nested)));
                    }
                    _ => {
                        // Mismatched shapes (operator vs nested, or any
                        // primitive/array) resolve toward the trusted side.
                        if config::config().security.enable_audit_logging {
                            tracing::warn!("Discarding user constraint on '{}': shape conflicts with base filter", key);
                        }
                        merged.insert(key.clone(), base_value.clone());
                    }
                },
            },
        }
    }

    for (key, user_value) in user {
        if user_value.is_null() {
            continue;
        }
        if key == NOT {
            // A user NOT with no base anchor is rejected outright.
            if base.get(NOT).map_or(true, Value::is_null) && config::config().security.enable_audit_logging {
                tracing::warn!("Ignoring user-supplied NOT with no base counterpart");
            }
            continue;
        }
        if base.get(key).is_some_and(|v| !v.is_null()) {
            continue; // consumed by pass 1
        }
        match key.as_str() {
            AND => push_conjuncts(&mut merged, valid_conjuncts(user_value)),
            OR => {
                let user_alts = valid_conjuncts(user_value);
                if user_alts.is_empty() {
                    continue;
                }
                if merged.is_empty() {
                    // Nothing to protect from widening yet.
                    merged.insert(OR.to_string(), Value::Array(user_alts));
                } else {
                    // Fold under AND so the alternatives cannot bypass the
                    // constraints already accumulated.
                    push_conjuncts(&mut merged, vec![or_group(user_alts)]);
                }
            }
            _ => {
                merged.insert(key.clone(), user_value.clone());
            }
        }
    }

    for combinator in [AND, OR] {
        if merged.get(combinator).and_then(Value::as_array).is_some_and(Vec::is_empty) {
            merged.remove(combinator);
        }
    }
    merged
}

/// Merge two operator objects for the same field. The base value wins for
/// every operator it defines, except `in`, where narrowing to the
/// intersection is safe. An empty intersection keeps the base list: an empty
/// `in` array can read as unconstrained in the query layer downstream.
pub fn merge_operators(base_op: &Map<String, Value>, user_op: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base_op.clone();

    for (op, user_value) in user_op {
        if FilterOp::from_key(op).is_none() {
            continue;
        }
        match base_op.get(op) {
            Some(base_value) => {
                if matches!(FilterOp::from_key(op), Some(FilterOp::In)) {
                    if let (Value::Array(base_items), Value::Array(user_items)) = (base_value, user_value) {
                        let narrowed: Vec<Value> =
                            base_items.iter().filter(|item| user_items.contains(item)).cloned().collect();
                        if !narrowed.is_empty() {
                            merged.insert(op.clone(), Value::Array(narrowed));
                        }
                    }
                }
                // otherwise the base value stands
            }
            None => {
                // New operator on the same field is an additional conjunct
                merged.insert(op.clone(), user_value.clone());
            }
        }
    }
    merged
}

/// Conjunct/alternative lists accept only plain filter objects; scalars,
/// arrays and nulls smuggled into an AND/OR array are dropped.
fn valid_conjuncts(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.iter().filter(|item| item.is_object()).cloned().collect(),
        _ => Vec::new(),
    }
}

fn push_conjuncts(merged: &mut Map<String, Value>, conjuncts: Vec<Value>) {
    if conjuncts.is_empty() {
        return;
    }
    match merged.get_mut(AND) {
        Some(Value::Array(existing)) => existing.extend(conjuncts),
        _ => {
            merged.insert(AND.to_string(), Value::Array(conjuncts));
        }
    }
}

fn or_group(alternatives: Vec<Value>) -> Value {
    let mut group = Map::new();
    group.insert(OR.to_string(), Value::Array(alternatives));
    Value::Object(group)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
