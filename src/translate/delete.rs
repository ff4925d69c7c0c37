use super::{CompiledQuery, CypherBuilder, and_all, filter, graph_of};
use crate::core::context::ExecutionContext;
use crate::core::error::GraphResult;
use crate::core::schema::{Entity, Operation};
use crate::core::selection::SelectionTree;

/// Compile a delete of every `entity` node matching `where`
///
/// Matched nodes are detached and deleted; the query always returns one
/// row with `nodesDeleted` and `relationshipsDeleted`, zero when nothing
/// matched (including when a rule filtered every node out).
pub fn translate_delete(
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
        Operation::Delete,
        &[],
        where_filter,
        &[],
    )?;
    if let Some(clause) = and_all(predicates) {
        lines.push(format!("WHERE {}", clause));
    }

    lines.push("OPTIONAL MATCH (this)-[this_rel]-()".to_string());
    lines.push(
        "WITH collect(DISTINCT this) AS this_nodes, count(DISTINCT this_rel) AS this_relationships"
            .to_string(),
    );
    lines.push("FOREACH(this_node IN this_nodes | DETACH DELETE this_node)".to_string());
    lines.push(
        "RETURN size(this_nodes) AS nodesDeleted, this_relationships AS relationshipsDeleted"
            .to_string(),
    );

    Ok(b.finish(lines.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AuthRule;
    use crate::core::error::GraphError;
    use crate::core::schema::TypeGraph;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_delete_with_rule() {
        let person = Entity::new("Person")
            .with_scalar("id", "ID")
            .with_rule(AuthRule::equals("id", "sub").on(&[Operation::Delete]));
        let ctx = ExecutionContext::new()
            .with_type_graph(Arc::new(TypeGraph::new(vec![person.clone()]).unwrap()));
        let selection = SelectionTree::new("deletePeople")
            .with_argument("where", json!({"id": "1"}))
            .with_scalars(&["nodesDeleted"]);

        let query = translate_delete(&person, &selection, &ctx).unwrap();
        assert_eq!(
            query.normalized_text(),
            "MATCH (this:Person) \
             WHERE this.id = $this_id AND this.id IS NOT NULL AND this.id = $auth.sub \
             OPTIONAL MATCH (this)-[this_rel]-() \
             WITH collect(DISTINCT this) AS this_nodes, count(DISTINCT this_rel) AS this_relationships \
             FOREACH(this_node IN this_nodes | DETACH DELETE this_node) \
             RETURN size(this_nodes) AS nodesDeleted, this_relationships AS relationshipsDeleted"
        );
        assert!(query.is_auth_dependent());
    }

    #[test]
    fn test_delete_unknown_filter_field() {
        let person = Entity::new("Person").with_scalar("id", "ID");
        let ctx = ExecutionContext::new()
            .with_type_graph(Arc::new(TypeGraph::new(vec![person.clone()]).unwrap()));
        let selection = SelectionTree::new("deletePeople").with_argument("where", json!({"age": 3}));
        assert!(matches!(
            translate_delete(&person, &selection, &ctx),
            Err(GraphError::SchemaMismatch { .. })
        ));
    }
}
