use super::projection::{Options, project};
use super::{CompiledQuery, CypherBuilder, and_all, filter, graph_of};
use crate::core::context::ExecutionContext;
use crate::core::error::GraphResult;
use crate::core::schema::{Entity, Operation};
use crate::core::selection::SelectionTree;
use serde_json::Value;

/// Compile a read of `entity` shaped by `selection`
///
/// `selection` is the root field (`people(where: ..., options: ...)`); its
/// children are projected. Arguments: `where`, `options { limit, skip, sort }`.
///
/// ```text
/// MATCH (this:Person)
/// WHERE this.name = $this_name
/// RETURN this { .name } AS this
/// ```
pub fn translate_read(
    entity: &Entity,
    selection: &SelectionTree,
    ctx: &ExecutionContext,
) -> GraphResult<CompiledQuery> {
    let mut b = CypherBuilder::new(graph_of(ctx)?);
    let mut lines = vec![format!("MATCH (this:{})", entity.label())];

    let where_filter = filter::object_argument(selection, "where")?;
    let predicates = filter::scoped_predicates(
        &mut b,
        entity,
        "this",
        Operation::Read,
        &selection.fields,
        where_filter,
        &[],
    )?;
    if let Some(clause) = and_all(predicates) {
        lines.push(format!("WHERE {}", clause));
    }

    let options = Options::parse(entity, selection)?;
    if !options.is_empty() {
        lines.push("WITH this".to_string());
        if !options.sort.is_empty() {
            let order: Vec<String> = options
                .sort
                .iter()
                .map(|(field, descending)| {
                    format!("this.{} {}", field, if *descending { "DESC" } else { "ASC" })
                })
                .collect();
            lines.push(format!("ORDER BY {}", order.join(", ")));
        }
        if let Some(skip) = options.skip {
            lines.push(format!("SKIP {}", b.param("this_skip", Value::from(skip))));
        }
        if let Some(limit) = options.limit {
            lines.push(format!("LIMIT {}", b.param("this_limit", Value::from(limit))));
        }
    }

    let projection = project(&mut b, entity, "this", &selection.fields)?;
    lines.push(format!("RETURN {} AS this", projection));

    Ok(b.finish(lines.join("\n")))
}
