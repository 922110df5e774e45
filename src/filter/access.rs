use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::config;

use super::error::FilterError;
use super::merge::prepare_query_filters;
use super::types::{classify, NodeShape, QueryScope, AND, NOT, OR};

/// Well-known role tags carried in authenticated request context.
pub mod roles {
    pub const NATIONAL_DIRECTOR: &str = "NATIONAL_DIRECTOR";
    pub const PROGRAM_DIRECTOR: &str = "PROGRAM_DIRECTOR";
    pub const HOME_DIRECTOR: &str = "HOME_DIRECTOR";
    pub const PSYCHOLOGIST: &str = "PSYCHOLOGIST";
    pub const SOS_AUNT: &str = "SOS_AUNT";
}

/// Role -> readable resource table. Injected into `ResourceAccess` so tests
/// and deployments can substitute their own table; `Default` ships the
/// case-management one.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: HashMap<String, HashSet<String>>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self { rules: HashMap::new() }
    }

    pub fn allow(mut self, role: &str, resources: &[&str]) -> Self {
        self.rules
            .entry(role.to_string())
            .or_default()
            .extend(resources.iter().map(|r| r.to_string()));
        self
    }

    /// Resources the role may read. Unknown roles get the empty set, so an
    /// unrecognized role prunes everything rather than failing the request.
    pub fn readable_resources(&self, role: &str) -> HashSet<String> {
        self.rules.get(role).cloned().unwrap_or_default()
    }

    pub fn case_management() -> Self {
        Self::new()
            .allow(roles::NATIONAL_DIRECTOR, &[
                "program", "home", "child", "incidentReport", "reviewStep", "notification",
                "auditLog", "user",
            ])
            .allow(roles::PROGRAM_DIRECTOR, &[
                "program", "home", "child", "incidentReport", "reviewStep", "notification", "user",
            ])
            .allow(roles::HOME_DIRECTOR, &[
                "home", "child", "incidentReport", "reviewStep", "notification",
            ])
            .allow(roles::PSYCHOLOGIST, &["child", "incidentReport", "reviewStep"])
            .allow(roles::SOS_AUNT, &["incidentReport"])
    }
}

/// Candidate singular forms for a relation alias, most specific first. The
/// alias itself is always the first candidate; the permission table is keyed
/// by singular resource names while query aliases are often pluralized.
pub fn normalize_resource_names(alias: &str) -> Vec<String> {
    let mut candidates = vec![alias.to_string()];
    if let Some(stem) = alias.strip_suffix("ies") {
        candidates.push(format!("{stem}y"));
    }
    if alias.ends_with("ses") || alias.ends_with("xes") || alias.ends_with("ches") || alias.ends_with("shes") {
        candidates.push(alias[..alias.len() - 2].to_string());
    } else if alias.ends_with('s') && !alias.ends_with("ss") {
        candidates.push(alias[..alias.len() - 1].to_string());
    }
    candidates
}

pub fn has_read_access(alias: &str, permitted: &HashSet<String>) -> bool {
    normalize_resource_names(alias).iter().any(|candidate| permitted.contains(candidate))
}

/// Prune a relations ("with") tree down to readable resources.
///
/// Denied aliases are dropped along with everything nested under them. A
/// nested config whose attributes are all filtered away collapses back to the
/// bare `true` include marker - the relation is still included, just without
/// further restriction. Returns `None` when nothing survives.
pub fn filter_relations_by_permission(tree: &Value, permitted: &HashSet<String>) -> Option<Value> {
    let Value::Object(map) = tree else { return None };
    let mut kept = Map::new();

    for (alias, node) in map {
        if !has_read_access(alias, permitted) {
            if config::config().filter.debug_logging {
                tracing::debug!("Dropping relation '{}': not readable with current role", alias);
            }
            continue;
        }
        match node {
            Value::Object(cfg) => {
                let mut filtered = Map::new();
                for (attr, value) in cfg {
                    if attr == "with" {
                        if let Some(nested) = filter_relations_by_permission(value, permitted) {
                            filtered.insert(attr.clone(), nested);
                        }
                    } else {
                        // columns / orderBy / limit / offset carry no permission semantics
                        filtered.insert(attr.clone(), value.clone());
                    }
                }
                if filtered.is_empty() {
                    kept.insert(alias.clone(), Value::Bool(true));
                } else {
                    kept.insert(alias.clone(), Value::Object(filtered));
                }
            }
            other => {
                kept.insert(alias.clone(), other.clone());
            }
        }
    }

    if kept.is_empty() { None } else { Some(Value::Object(kept)) }
}

/// Prune a where tree down to readable resources.
///
/// Operator objects are field constraints and pass untouched; plain nested
/// objects are relation references and must pass the same alias check as the
/// relations tree. Dot-qualified keys are checked by their leading alias
/// segment only. Returns `None` when nothing survives.
pub fn filter_where_by_permission(tree: &Value, permitted: &HashSet<String>) -> Option<Value> {
    let Value::Object(map) = tree else { return None };
    let mut kept = Map::new();

    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        if key == AND || key == OR {
            let Value::Array(items) = value else { continue };
            let mut filtered_items = Vec::new();
            for item in items {
                if !item.is_object() {
                    continue;
                }
                if let Some(filtered) = filter_where_by_permission(item, permitted) {
                    filtered_items.push(filtered);
                }
            }
            if !filtered_items.is_empty() {
                kept.insert(key.clone(), Value::Array(filtered_items));
            }
            continue;
        }
        if key == NOT {
            // NOT semantics are resolved by the merger, not by permission pruning
            kept.insert(key.clone(), value.clone());
            continue;
        }
        if let Some((alias, _)) = key.split_once('.') {
            if has_read_access(alias, permitted) {
                kept.insert(key.clone(), value.clone());
            } else if config::config().filter.debug_logging {
                tracing::debug!("Dropping filter key '{}': alias '{}' not readable", key, alias);
            }
            continue;
        }
        match classify(value) {
            NodeShape::Operators(_) => {
                // field constraint, not a relation reference
                kept.insert(key.clone(), value.clone());
            }
            NodeShape::Nested(_) => {
                if !has_read_access(key, permitted) {
                    if config::config().filter.debug_logging {
                        tracing::debug!("Dropping filter key '{}': not readable with current role", key);
                    }
                    continue;
                }
                if let Some(filtered) = filter_where_by_permission(value, permitted) {
                    kept.insert(key.clone(), filtered);
                }
            }
            NodeShape::Leaf(_) => {
                kept.insert(key.clone(), value.clone());
            }
        }
    }

    if kept.is_empty() { None } else { Some(Value::Object(kept)) }
}

/// Resource Access Resolver: prunes relation and where trees down to what a
/// role may read. Never errors - denial is silent omission, so callers that
/// want to surface "not permitted" must diff input against output.
#[derive(Debug, Clone)]
pub struct ResourceAccess {
    policy: AccessPolicy,
}

impl ResourceAccess {
    pub fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    pub fn readable_resources(&self, role: &str) -> HashSet<String> {
        self.policy.readable_resources(role)
    }

    /// Apply role-based access control to both trees of a query scope. The
    /// permitted set is resolved once and shared by both walks.
    pub fn apply(&self, role: &str, scope: &QueryScope) -> QueryScope {
        let permitted = self.policy.readable_resources(role);
        QueryScope {
            with: scope.with.as_ref().and_then(|tree| filter_relations_by_permission(tree, &permitted)),
            where_clause: scope
                .where_clause
                .as_ref()
                .and_then(|tree| filter_where_by_permission(tree, &permitted)),
        }
    }

    /// Full request pipeline: prune the scope for the role, then merge the
    /// surviving where tree over the trusted base filter.
    pub fn scope_query(&self, role: &str, base: &Value, scope: &QueryScope) -> Result<QueryScope, FilterError> {
        let pruned = self.apply(role, scope);
        let merged = prepare_query_filters(base, pruned.where_clause.as_ref())?;
        Ok(QueryScope { with: pruned.with, where_clause: Some(merged) })
    }
}

impl Default for ResourceAccess {
    fn default() -> Self {
        Self::new(AccessPolicy::case_management())
    }
}
