use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Logical combinator keys recognized inside a where tree.
pub const AND: &str = "AND";
pub const OR: &str = "OR";
pub const NOT: &str = "NOT";

/// Comparison operators allowed inside a field-level operator object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "eq")] Eq,
    #[serde(rename = "ne")] Ne,
    #[serde(rename = "gt")] Gt,
    #[serde(rename = "gte")] Gte,
    #[serde(rename = "lt")] Lt,
    #[serde(rename = "lte")] Lte,

    #[serde(rename = "in")] In,
    #[serde(rename = "notIn")] NotIn,

    #[serde(rename = "like")] Like,
    #[serde(rename = "ilike")] ILike,
    #[serde(rename = "notIlike")] NotILike,

    #[serde(rename = "between")] Between,
    #[serde(rename = "contains")] Contains,
    #[serde(rename = "startsWith")] StartsWith,
    #[serde(rename = "endsWith")] EndsWith,

    #[serde(rename = "isNull")] IsNull,
    #[serde(rename = "isNotNull")] IsNotNull,
}

impl FilterOp {
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "in" => FilterOp::In,
            "notIn" => FilterOp::NotIn,
            "like" => FilterOp::Like,
            "ilike" => FilterOp::ILike,
            "notIlike" => FilterOp::NotILike,
            "between" => FilterOp::Between,
            "contains" => FilterOp::Contains,
            "startsWith" => FilterOp::StartsWith,
            "endsWith" => FilterOp::EndsWith,
            "isNull" => FilterOp::IsNull,
            "isNotNull" => FilterOp::IsNotNull,
            _ => return None,
        })
    }
}

/// True when at least one key of `obj` is a comparison operator.
///
/// This is what distinguishes a field constraint like `{"eq": "PENDING"}`
/// from a nested relation filter like `{"name": {"eq": "x"}}` - both arrive
/// as plain JSON objects.
pub fn is_operator_object(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|k| FilterOp::from_key(k).is_some())
}

/// Shape of a where-tree node. All shape decisions go through `classify` so
/// the resolver and the merger can never disagree on how a node is read.
#[derive(Debug, Clone, Copy)]
pub enum NodeShape<'a> {
    /// Field-level comparison object, e.g. `{"eq": 5, "lt": 10}`
    Operators(&'a Map<String, Value>),
    /// Nested relation filter, e.g. `{"name": {"eq": "x"}}`
    Nested(&'a Map<String, Value>),
    /// Scalar, array or null leaf (implicit equality or combinator payload)
    Leaf(&'a Value),
}

pub fn classify(value: &Value) -> NodeShape<'_> {
    match value {
        Value::Object(obj) if is_operator_object(obj) => NodeShape::Operators(obj),
        Value::Object(obj) => NodeShape::Nested(obj),
        other => NodeShape::Leaf(other),
    }
}

/// Query scope as parsed from a request body: the relations to include and
/// the caller-supplied where tree. Both trees are untrusted until they have
/// been through `ResourceAccess::apply`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryScope {
    pub with: Option<Value>,
    #[serde(rename = "where")]
    pub where_clause: Option<Value>,
}
