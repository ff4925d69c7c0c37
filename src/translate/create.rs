//! Create mutations
//!
//! Each input element runs in its own `CALL { ... }` subquery. The create
//! rules of every element, nested ones included, are checked over the input
//! parameters before any of them runs, so a denial creates nothing:
//!
//! ```text
//! WITH 1 AS this_guard
//! WHERE $auth.sub IS NOT NULL
//! CALL {
//! CREATE (this0:Person)
//! SET this0.name = $this0_name
//! CREATE (this0_movies0:Movie)
//! SET this0_movies0.title = $this0_movies0_title
//! MERGE (this0)-[:ACTED_IN]->(this0_movies0)
//! RETURN this0
//! }
//! RETURN this0 { .name } AS this0
//! ```
//!
//! A created node the caller may not read is returned as `null`.
//!
//! Relationship fields of an input element accept `create: [{ node, edge }]`
//! and `connect: [{ where: { node }, edge }]`.

use super::projection::project;
use super::{CompiledQuery, CypherBuilder, and_all, auth, filter, graph_of, objects};
use crate::core::context::ExecutionContext;
use crate::core::error::{GraphError, GraphResult};
use crate::core::pluralize::Pluralizer;
use crate::core::schema::{Entity, FieldKind, Operation, Relationship};
use crate::core::selection::SelectionTree;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Compile a create of one or more `entity` nodes
///
/// The returned shape comes from the child of `selection` named after the
/// entity plural (`createPeople { people { name } }`).
pub fn translate_create(
    entity: &Entity,
    selection: &SelectionTree,
    ctx: &ExecutionContext,
) -> GraphResult<CompiledQuery> {
    let mut b = CypherBuilder::new(graph_of(ctx)?);
    let input = selection
        .argument("input")
        .ok_or_else(|| GraphError::invalid_argument("input", "is required"))?;
    let items = objects("input", input)?;
    if items.is_empty() {
        return Err(GraphError::invalid_argument("input", "must not be empty"));
    }

    let mut gates = Vec::new();
    let mut blocks = Vec::new();
    let mut vars = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let var = format!("this{}", i);
        blocks.push("CALL {".to_string());
        create_node(&mut b, entity, &var, item, &[], &mut gates, &mut blocks)?;
        blocks.push(format!("RETURN {}", var));
        blocks.push("}".to_string());
        vars.push(var);
    }

    let mut lines = Vec::new();
    if let Some(gate) = and_all(gates) {
        lines.push("WITH 1 AS this_guard".to_string());
        lines.push(format!("WHERE {}", gate));
    }
    lines.extend(blocks);

    let returned = result_fields(entity, selection);
    let mut projections = Vec::with_capacity(vars.len());
    for var in &vars {
        let readable =
            filter::scoped_predicates(&mut b, entity, var, Operation::Read, returned, None, &[])?;
        let projection = project(&mut b, entity, var, returned)?;
        projections.push(match and_all(readable) {
            Some(clause) => format!("CASE WHEN {} THEN {} END AS {}", clause, projection, var),
            None => format!("{} AS {}", projection, var),
        });
    }
    lines.push(format!("RETURN {}", projections.join(", ")));

    Ok(b.finish(lines.join("\n")))
}

/// Fields requested under the plural child of a mutation selection
pub(crate) fn result_fields<'s>(entity: &Entity, selection: &'s SelectionTree) -> &'s [SelectionTree] {
    let key = Pluralizer::camel_case(&entity.plural());
    selection
        .child(&key)
        .map(|child| child.fields.as_slice())
        .unwrap_or(&[])
}

/// Emit the creation of one node bound to `var`, nested work included
///
/// `scope` lists the variables bound by enclosing levels; they are carried
/// through every `WITH` this level emits. Create rules of this level and
/// below are pushed to `gates` instead of being emitted in place.
fn create_node(
    b: &mut CypherBuilder<'_>,
    entity: &Entity,
    var: &str,
    input: &Map<String, Value>,
    scope: &[String],
    gates: &mut Vec<String>,
    lines: &mut Vec<String>,
) -> GraphResult<()> {
    let mut supplied = IndexMap::new();
    let mut nested = Vec::new();
    for (key, value) in input {
        let field = entity.require_field(key)?;
        match &field.kind {
            FieldKind::Scalar { .. } => {
                let param = b.param(format!("{}_{}", var, key), value.clone());
                supplied.insert(key.clone(), param);
            }
            FieldKind::Relationship(rel) => nested.push((key.as_str(), rel, value)),
            FieldKind::Computed { .. } => {
                return Err(GraphError::invalid_argument(
                    "input",
                    format!("computed field '{}' cannot be set", key),
                ));
            }
        }
    }

    let requested: Vec<&str> = input.keys().map(String::as_str).collect();
    let rules = auth::rules_in_scope(entity, Operation::Create, &requested);
    gates.extend(auth::input_predicates(b, var, &rules, &supplied));

    lines.push(format!("CREATE ({}:{})", var, entity.label()));
    for (field, param) in &supplied {
        lines.push(format!("SET {}.{} = {}", var, field, param));
    }

    let mut inner_scope = scope.to_vec();
    inner_scope.push(var.to_string());
    for (field, rel, value) in nested {
        let input = value.as_object().ok_or_else(|| {
            GraphError::invalid_argument("input", format!("'{}' expects an object", field))
        })?;
        for (action, value) in input {
            match action.as_str() {
                "create" => {
                    for (j, item) in objects("input", value)?.into_iter().enumerate() {
                        let child = format!("{}_{}{}", var, field, j);
                        nested_create(b, rel, var, &child, item, &inner_scope, gates, lines)?;
                    }
                }
                "connect" => {
                    for (j, item) in objects("input", value)?.into_iter().enumerate() {
                        let child = format!("{}_{}_connect{}", var, field, j);
                        connect(b, rel, var, &child, item, &inner_scope, lines)?;
                    }
                }
                other => {
                    return Err(GraphError::invalid_argument(
                        "input",
                        format!("unsupported nested operation '{}' on '{}'", other, field),
                    ));
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn nested_create(
    b: &mut CypherBuilder<'_>,
    rel: &Relationship,
    parent: &str,
    child: &str,
    item: &Map<String, Value>,
    scope: &[String],
    gates: &mut Vec<String>,
    lines: &mut Vec<String>,
) -> GraphResult<()> {
    let target = b.graph().require_entity(&rel.target)?;
    let node = match item.get("node") {
        Some(Value::Object(node)) => node,
        _ => {
            return Err(GraphError::invalid_argument(
                "input",
                "nested create expects { node: {...} }",
            ));
        }
    };
    create_node(b, target, child, node, scope, gates, lines)?;

    let edge = edge_properties(b, rel, &format!("{}_relationship", child), item)?;
    if edge.is_empty() {
        lines.push(format!("MERGE {}", rel.pattern(parent, None, child)));
    } else {
        let rel_var = format!("{}_relationship", child);
        lines.push(format!("MERGE {}", rel.pattern(parent, Some(&rel_var), child)));
        for (property, param) in edge {
            lines.push(format!("SET {}.{} = {}", rel_var, property, param));
        }
    }
    Ok(())
}

/// Connect `parent` to every target node matching the item's filter
///
/// The target's connect rules join the filter. A missing filter connects
/// every node of the target entity that passes those rules.
pub(crate) fn connect(
    b: &mut CypherBuilder<'_>,
    rel: &Relationship,
    parent: &str,
    var: &str,
    item: &Map<String, Value>,
    scope: &[String],
    lines: &mut Vec<String>,
) -> GraphResult<()> {
    let target = b.graph().require_entity(&rel.target)?;
    let node_filter = node_filter(item)?;
    let predicates = filter::scoped_predicates(
        b,
        target,
        var,
        Operation::Connect,
        &[],
        node_filter,
        &[],
    )?;

    let carried = scope.join(", ");
    lines.push(format!("WITH {}", carried));
    lines.push(format!("OPTIONAL MATCH ({}:{})", var, target.label()));
    if let Some(clause) = and_all(predicates) {
        lines.push(format!("WHERE {}", clause));
    }
    lines.push(format!("WITH {}, collect({}) AS {}_nodes", carried, var, var));

    let rel_var = format!("{}_relationship", var);
    let edge = edge_properties(b, rel, &rel_var, item)?;
    let node = format!("{}_node", var);
    let merge = if edge.is_empty() {
        format!("MERGE {}", rel.pattern(parent, None, &node))
    } else {
        let sets: Vec<String> = edge
            .iter()
            .map(|(property, param)| format!("{}.{} = {}", rel_var, property, param))
            .collect();
        format!(
            "MERGE {} SET {}",
            rel.pattern(parent, Some(&rel_var), &node),
            sets.join(", ")
        )
    };
    lines.push(format!("FOREACH({} IN {}_nodes | {})", node, var, merge));
    Ok(())
}

/// `where: { node: {...} }`, or the filter given directly under `where`
pub(crate) fn node_filter(item: &Map<String, Value>) -> GraphResult<Option<&Map<String, Value>>> {
    match item.get("where") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(filter)) => match filter.get("node") {
            Some(Value::Object(node)) => Ok(Some(node)),
            Some(_) => Err(GraphError::invalid_argument("where", "node must be an object")),
            None => Ok(Some(filter)),
        },
        Some(_) => Err(GraphError::invalid_argument("where", "expected an object")),
    }
}

/// Parameterise the `edge` properties of an item, keyed by property name
fn edge_properties(
    b: &mut CypherBuilder<'_>,
    rel: &Relationship,
    prefix: &str,
    item: &Map<String, Value>,
) -> GraphResult<Vec<(String, String)>> {
    let edge = match item.get("edge") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(edge)) => edge,
        Some(_) => return Err(GraphError::invalid_argument("edge", "expected an object")),
    };

    let mut out = Vec::with_capacity(edge.len());
    for (property, value) in edge {
        if !rel.properties.contains(property) {
            return Err(GraphError::schema_mismatch(&rel.rel_type, property));
        }
        let param = b.param(format!("{}_{}", prefix, property), value.clone());
        out.push((property.clone(), param));
    }
    Ok(out)
}
