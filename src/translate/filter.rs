//! `where` arguments compiled into Cypher predicates
//!
//! A key is either a field name (equality) or a field name followed by one
//! of the operator suffixes below. `AND` / `OR` take lists of nested
//! filters. Relationship fields filter on the existence of a related node
//! matching a nested filter.

use super::{CypherBuilder, and_all, auth};
use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::{Entity, Field, FieldKind, Operation};
use crate::core::selection::SelectionTree;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    Not,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Matches,
}

/// Longest suffixes first so `_NOT_IN` wins over `_IN`
const SUFFIXES: &[(&str, Operator)] = &[
    ("_NOT_STARTS_WITH", Operator::NotStartsWith),
    ("_NOT_ENDS_WITH", Operator::NotEndsWith),
    ("_NOT_CONTAINS", Operator::NotContains),
    ("_STARTS_WITH", Operator::StartsWith),
    ("_ENDS_WITH", Operator::EndsWith),
    ("_CONTAINS", Operator::Contains),
    ("_MATCHES", Operator::Matches),
    ("_NOT_IN", Operator::NotIn),
    ("_NOT", Operator::Not),
    ("_LTE", Operator::Lte),
    ("_GTE", Operator::Gte),
    ("_IN", Operator::In),
    ("_LT", Operator::Lt),
    ("_GT", Operator::Gt),
];

impl Operator {
    fn render(self, property: &str, param: &str) -> String {
        match self {
            Operator::Equal => format!("{} = {}", property, param),
            Operator::Not => format!("{} <> {}", property, param),
            Operator::In => format!("{} IN {}", property, param),
            Operator::NotIn => format!("NOT {} IN {}", property, param),
            Operator::Lt => format!("{} < {}", property, param),
            Operator::Lte => format!("{} <= {}", property, param),
            Operator::Gt => format!("{} > {}", property, param),
            Operator::Gte => format!("{} >= {}", property, param),
            Operator::Contains => format!("{} CONTAINS {}", property, param),
            Operator::NotContains => format!("NOT {} CONTAINS {}", property, param),
            Operator::StartsWith => format!("{} STARTS WITH {}", property, param),
            Operator::NotStartsWith => format!("NOT {} STARTS WITH {}", property, param),
            Operator::EndsWith => format!("{} ENDS WITH {}", property, param),
            Operator::NotEndsWith => format!("NOT {} ENDS WITH {}", property, param),
            Operator::Matches => format!("{} =~ {}", property, param),
        }
    }

    fn takes_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

/// Split a filter key into the field it targets and the operator
fn resolve<'e>(entity: &'e Entity, key: &str) -> GraphResult<(&'e Field, Operator)> {
    if let Some(field) = entity.field(key) {
        return Ok((field, Operator::Equal));
    }
    for (suffix, operator) in SUFFIXES {
        if let Some(base) = key.strip_suffix(suffix)
            && let Some(field) = entity.field(base)
        {
            return Ok((field, *operator));
        }
    }
    Err(GraphError::schema_mismatch(&entity.name, key))
}

/// Names of the fields a filter touches, nested `AND` / `OR` included
pub(crate) fn filtered_fields<'w>(entity: &Entity, filter: &'w Map<String, Value>) -> Vec<&'w str> {
    let mut names = Vec::new();
    for (key, value) in filter {
        if key == "AND" || key == "OR" {
            if let Value::Array(items) = value {
                for item in items.iter().filter_map(Value::as_object) {
                    names.extend(filtered_fields(entity, item));
                }
            }
            continue;
        }
        if let Ok((field, _)) = resolve(entity, key) {
            names.push(&key[..field.name.len()]);
        }
    }
    names
}

/// Compile a filter over the node bound to `var`
///
/// `prefix` seeds parameter names; it equals `var` at the top and grows
/// with each `AND` / `OR` branch so sibling branches never share a name.
pub(crate) fn predicates(
    b: &mut CypherBuilder<'_>,
    entity: &Entity,
    var: &str,
    prefix: &str,
    filter: &Map<String, Value>,
) -> GraphResult<Vec<String>> {
    let mut out = Vec::new();

    for (key, value) in filter {
        if key == "AND" || key == "OR" {
            if let Some(group) = logical(b, entity, var, prefix, key, value)? {
                out.push(group);
            }
            continue;
        }

        let (field, operator) = resolve(entity, key)?;
        let property = format!("{}.{}", var, field.name);
        match &field.kind {
            FieldKind::Scalar { .. } => {
                if value.is_null() {
                    match operator {
                        Operator::Equal => out.push(format!("{} IS NULL", property)),
                        Operator::Not => out.push(format!("{} IS NOT NULL", property)),
                        _ => {
                            return Err(GraphError::invalid_argument(
                                "where",
                                format!("'{}' does not accept null", key),
                            ));
                        }
                    }
                    continue;
                }
                if operator.takes_list() && !value.is_array() {
                    return Err(GraphError::invalid_argument(
                        "where",
                        format!("'{}' expects a list", key),
                    ));
                }
                let param = b.param(format!("{}_{}", prefix, key), value.clone());
                out.push(operator.render(&property, &param));
            }
            FieldKind::Relationship(rel) => {
                let negate = match operator {
                    Operator::Equal => false,
                    Operator::Not => true,
                    _ => {
                        return Err(GraphError::invalid_argument(
                            "where",
                            format!("'{}' is not supported on a relationship", key),
                        ));
                    }
                };
                let target = b.graph().require_entity(&rel.target)?;
                let inner_var = format!("{}_{}", prefix, field.name);
                let pattern = rel.pattern(
                    var,
                    None,
                    &format!("{}:{}", inner_var, target.label()),
                );

                let mut inner = Vec::new();
                match value {
                    Value::Null => {}
                    Value::Object(nested) => {
                        inner = predicates(b, target, &inner_var, &inner_var, nested)?;
                        let fields = filtered_fields(target, nested);
                        let rules = auth::rules_in_scope(target, Operation::Read, &fields);
                        inner.extend(auth::node_predicates(b, &inner_var, &rules));
                    }
                    _ => {
                        return Err(GraphError::invalid_argument(
                            "where",
                            format!("'{}' expects an object", key),
                        ));
                    }
                }

                let exists = match and_all(inner) {
                    Some(clause) => format!("EXISTS {{ {} WHERE {} }}", pattern, clause),
                    None => format!("EXISTS {{ {} }}", pattern),
                };
                // a null relationship filter asks for nodes without the relationship
                if negate != value.is_null() {
                    out.push(format!("NOT {}", exists));
                } else {
                    out.push(exists);
                }
            }
            FieldKind::Computed { .. } => {
                return Err(GraphError::invalid_argument(
                    "where",
                    format!("computed field '{}' cannot be filtered on", field.name),
                ));
            }
        }
    }

    Ok(out)
}

fn logical(
    b: &mut CypherBuilder<'_>,
    entity: &Entity,
    var: &str,
    prefix: &str,
    key: &str,
    value: &Value,
) -> GraphResult<Option<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| GraphError::invalid_argument("where", format!("'{}' expects a list", key)))?;

    let mut groups = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let nested = item.as_object().ok_or_else(|| {
            GraphError::invalid_argument("where", format!("'{}' items must be objects", key))
        })?;
        let branch = format!("{}_{}{}", prefix, key, i);
        if let Some(clause) = and_all(predicates(b, entity, var, &branch, nested)?) {
            groups.push(format!("({})", clause));
        }
    }

    if groups.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("({})", groups.join(&format!(" {} ", key)))))
}

/// Structural filter plus the rules in scope, for the node bound to `var`
///
/// Field rules are collected from `selected`, from the filter itself and
/// from `inputs` (fields about to be written).
pub(crate) fn scoped_predicates(
    b: &mut CypherBuilder<'_>,
    entity: &Entity,
    var: &str,
    operation: Operation,
    selected: &[SelectionTree],
    filter: Option<&Map<String, Value>>,
    inputs: &[&str],
) -> GraphResult<Vec<String>> {
    let mut out = match filter {
        Some(filter) => predicates(b, entity, var, var, filter)?,
        None => Vec::new(),
    };

    let mut requested: Vec<&str> = selected.iter().map(|s| s.name.as_str()).collect();
    if let Some(filter) = filter {
        requested.extend(filtered_fields(entity, filter));
    }
    requested.extend_from_slice(inputs);

    let rules = auth::rules_in_scope(entity, operation, &requested);
    out.extend(auth::node_predicates(b, var, &rules));
    Ok(out)
}

/// Read an optional object argument
pub(crate) fn object_argument<'s>(
    selection: &'s SelectionTree,
    name: &str,
) -> GraphResult<Option<&'s Map<String, Value>>> {
    match selection.argument(name) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(GraphError::invalid_argument(name, "expected an object")),
    }
}
