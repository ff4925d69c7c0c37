use super::create::{connect, node_filter, result_fields};
use super::projection::project;
use super::{CompiledQuery, CypherBuilder, and_all, filter, graph_of, objects};
use crate::core::context::ExecutionContext;
use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::{Entity, FieldKind, Operation, Relationship};
use crate::core::selection::SelectionTree;
use serde_json::{Map, Value};

/// Compile an update of every `entity` node matching `where`
///
/// Arguments: `where`, `update` (scalar fields only), `connect` and
/// `disconnect` (keyed by relationship field). Only supplied fields are
/// written. Updated nodes the caller may not read are left out of the
/// result.
///
/// ```text
/// MATCH (this:Movie)
/// WHERE this.title = $this_title
/// SET this.title = $this_update_title
/// RETURN this { .title } AS this
/// ```
pub fn translate_update(
    entity: &Entity,
    selection: &SelectionTree,
    ctx: &ExecutionContext,
) -> GraphResult<CompiledQuery> {
    let mut b = CypherBuilder::new(graph_of(ctx)?);
    let mut lines = vec![format!("MATCH (this:{})", entity.label())];

    let update = filter::object_argument(selection, "update")?;
    let mut writes = Vec::new();
    if let Some(update) = update {
        for (key, value) in update {
            let field = entity.require_field(key)?;
            if !field.is_scalar() {
                return Err(GraphError::invalid_argument(
                    "update",
                    format!("'{}' is not a scalar field; use connect or disconnect", key),
                ));
            }
            writes.push((key.as_str(), value));
        }
    }

    let where_filter = filter::object_argument(selection, "where")?;
    let inputs: Vec<&str> = writes.iter().map(|(key, _)| *key).collect();
    let returned = result_fields(entity, selection);
    let predicates = filter::scoped_predicates(
        &mut b,
        entity,
        "this",
        Operation::Update,
        returned,
        where_filter,
        &inputs,
    )?;
    if let Some(clause) = and_all(predicates) {
        lines.push(format!("WHERE {}", clause));
    }

    for (key, value) in writes {
        let param = b.param(format!("this_update_{}", key), value.clone());
        lines.push(format!("SET this.{} = {}", key, param));
    }

    let scope = vec!["this".to_string()];
    if let Some(connects) = filter::object_argument(selection, "connect")? {
        for (key, value) in connects {
            let rel = relationship(entity, key, "connect")?;
            for (j, item) in objects("connect", value)?.into_iter().enumerate() {
                let var = format!("this_{}_connect{}", key, j);
                connect(&mut b, rel, "this", &var, item, &scope, &mut lines)?;
            }
        }
    }
    if let Some(disconnects) = filter::object_argument(selection, "disconnect")? {
        for (key, value) in disconnects {
            let rel = relationship(entity, key, "disconnect")?;
            for (j, item) in objects("disconnect", value)?.into_iter().enumerate() {
                let var = format!("this_{}_disconnect{}", key, j);
                disconnect(&mut b, rel, &var, item, &mut lines)?;
            }
        }
    }

    let readable =
        filter::scoped_predicates(&mut b, entity, "this", Operation::Read, returned, None, &[])?;
    if let Some(clause) = and_all(readable) {
        lines.push("WITH this".to_string());
        lines.push(format!("WHERE {}", clause));
    }

    let projection = project(&mut b, entity, "this", returned)?;
    lines.push(format!("RETURN {} AS this", projection));

    Ok(b.finish(lines.join("\n")))
}

fn relationship<'e>(entity: &'e Entity, key: &str, argument: &str) -> GraphResult<&'e Relationship> {
    match &entity.require_field(key)?.kind {
        FieldKind::Relationship(rel) => Ok(rel),
        _ => Err(GraphError::invalid_argument(
            argument,
            format!("'{}' is not a relationship", key),
        )),
    }
}

/// Delete the `this` edges whose far node matches the item's filter
fn disconnect(
    b: &mut CypherBuilder<'_>,
    rel: &Relationship,
    var: &str,
    item: &Map<String, Value>,
    lines: &mut Vec<String>,
) -> GraphResult<()> {
    let target = b.graph().require_entity(&rel.target)?;
    let predicates = filter::scoped_predicates(
        b,
        target,
        var,
        Operation::Disconnect,
        &[],
        node_filter(item)?,
        &[],
    )?;

    let rel_var = format!("{}_rel", var);
    lines.push("WITH this".to_string());
    lines.push(format!(
        "OPTIONAL MATCH {}",
        rel.pattern("this", Some(&rel_var), &format!("{}:{}", var, target.label()))
    ));
    if let Some(clause) = and_all(predicates) {
        lines.push(format!("WHERE {}", clause));
    }
    lines.push(format!("WITH this, collect({}) AS {}s", rel_var, rel_var));
    lines.push(format!(
        "FOREACH({}_item IN {}s | DELETE {}_item)",
        var, rel_var, var
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::AuthRule;
    use crate::core::schema::{Direction, Field, TypeGraph};
    use serde_json::json;
    use std::sync::Arc;

    fn graph() -> Arc<TypeGraph> {
        Arc::new(
            TypeGraph::new(vec![
                Entity::new("Movie")
                    .with_scalar("id", "ID")
                    .with_scalar("title", "String")
                    .with_field(
                        Field::scalar("budget", "Int")
                            .with_rule(AuthRule::any_role(["finance"]).on(&[Operation::Update])),
                    )
                    .with_relationship(
                        "actors",
                        Relationship::new("ACTED_IN", Direction::In, "Person"),
                    ),
                Entity::new("Person")
                    .with_scalar("name", "String")
                    .with_rule(AuthRule::authenticated().on(&[Operation::Disconnect])),
            ])
            .unwrap(),
        )
    }

    fn compile(selection: SelectionTree) -> GraphResult<CompiledQuery> {
        let graph = graph();
        let ctx = ExecutionContext::new().with_type_graph(graph.clone());
        translate_update(graph.entity("Movie").unwrap(), &selection, &ctx)
    }

    #[test]
    fn test_update_sets_supplied_fields_only() {
        let query = compile(
            SelectionTree::new("updateMovies")
                .with_argument("where", json!({"id": "1"}))
                .with_argument("update", json!({"title": "The Matrix"}))
                .with_field(SelectionTree::new("movies").with_scalars(&["id", "title"])),
        )
        .unwrap();

        assert_eq!(
            query.normalized_text(),
            "MATCH (this:Movie) WHERE this.id = $this_id \
             SET this.title = $this_update_title \
             RETURN this { .id, .title } AS this"
        );
        assert_eq!(query.params["this_update_title"], json!("The Matrix"));
        assert!(!query.is_auth_dependent());
    }

    #[test]
    fn test_update_input_field_rules() {
        let query = compile(
            SelectionTree::new("updateMovies").with_argument("update", json!({"budget": 10})),
        )
        .unwrap();
        assert_eq!(
            query.normalized_text(),
            "MATCH (this:Movie) \
             WHERE ANY(this_role IN $this_auth0_roles WHERE this_role IN coalesce($auth.roles, [])) \
             SET this.budget = $this_update_budget \
             RETURN this { } AS this"
        );
    }

    #[test]
    fn test_connect_and_disconnect() {
        let query = compile(
            SelectionTree::new("updateMovies")
                .with_argument("where", json!({"id": "1"}))
                .with_argument("connect", json!({"actors": [{"where": {"node": {"name": "Keanu"}}}]}))
                .with_argument("disconnect", json!({"actors": [{"where": {"node": {"name": "Tom"}}}]})),
        )
        .unwrap();

        assert_eq!(
            query.normalized_text(),
            "MATCH (this:Movie) WHERE this.id = $this_id \
             WITH this OPTIONAL MATCH (this_actors_connect0:Person) \
             WHERE this_actors_connect0.name = $this_actors_connect0_name \
             WITH this, collect(this_actors_connect0) AS this_actors_connect0_nodes \
             FOREACH(this_actors_connect0_node IN this_actors_connect0_nodes | \
             MERGE (this)<-[:ACTED_IN]-(this_actors_connect0_node)) \
             WITH this OPTIONAL MATCH (this)<-[this_actors_disconnect0_rel:ACTED_IN]-(this_actors_disconnect0:Person) \
             WHERE this_actors_disconnect0.name = $this_actors_disconnect0_name AND $auth.sub IS NOT NULL \
             WITH this, collect(this_actors_disconnect0_rel) AS this_actors_disconnect0_rels \
             FOREACH(this_actors_disconnect0_item IN this_actors_disconnect0_rels | DELETE this_actors_disconnect0_item) \
             RETURN this { } AS this"
        );
        assert!(query.is_auth_dependent());
    }

    #[test]
    fn test_returned_fields_keep_read_rules() {
        let movie = Entity::new("Movie")
            .with_scalar("title", "String")
            .with_field(
                Field::scalar("budget", "Int")
                    .with_rule(AuthRule::any_role(["finance"]).on(&[Operation::Read])),
            );
        let graph = Arc::new(TypeGraph::new(vec![movie]).unwrap());
        let ctx = ExecutionContext::new().with_type_graph(graph.clone());
        let selection = SelectionTree::new("updateMovies")
            .with_argument("update", json!({}))
            .with_field(SelectionTree::new("movies").with_scalars(&["title", "budget"]));

        let query = translate_update(graph.entity("Movie").unwrap(), &selection, &ctx).unwrap();
        assert_eq!(
            query.normalized_text(),
            "MATCH (this:Movie) \
             WITH this WHERE ANY(this_role IN $this_auth0_roles WHERE this_role IN coalesce($auth.roles, [])) \
             RETURN this { .title, .budget } AS this"
        );
        assert!(query.is_auth_dependent());
    }

    #[test]
    fn test_relationship_in_update_rejected() {
        let result = compile(
            SelectionTree::new("updateMovies").with_argument("update", json!({"actors": {}})),
        );
        assert!(matches!(result, Err(GraphError::InvalidArgument { .. })));
    }

    #[test]
    fn test_unknown_update_field() {
        let result = compile(
            SelectionTree::new("updateMovies").with_argument("update", json!({"rating": 1})),
        );
        assert!(matches!(result, Err(GraphError::SchemaMismatch { .. })));
    }
}
