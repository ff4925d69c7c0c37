//! CRUD handlers generated for every entity of a type graph
//!
//! For `Person` (plural `People`):
//!
//! - `Query.people`
//! - `Mutation.createPeople`
//! - `Mutation.updatePeople`
//! - `Mutation.deletePeople`

use super::registry::{RegistryNode, Resolver, ResolverMap};
use crate::core::auth::AuthParam;
use crate::core::context::{ExecutionContext, Record};
use crate::core::error::{GraphError, GraphResult};
use crate::core::pluralize::Pluralizer;
use crate::core::schema::{Entity, Operation, TypeGraph};
use crate::core::selection::{Arguments, SelectionTree};
use crate::translate::{translate_create, translate_delete, translate_read, translate_update};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Resolver running one CRUD operation of one entity against the connection
pub struct GeneratedResolver {
    graph: Arc<TypeGraph>,
    entity: String,
    operation: Operation,
}

impl GeneratedResolver {
    pub fn new(graph: Arc<TypeGraph>, entity: impl Into<String>, operation: Operation) -> Self {
        Self {
            graph,
            entity: entity.into(),
            operation,
        }
    }
}

#[async_trait]
impl Resolver for GeneratedResolver {
    async fn resolve(
        &self,
        _parent: Value,
        args: Arguments,
        ctx: ExecutionContext,
        selection: SelectionTree,
    ) -> GraphResult<Value> {
        let entity = self.graph.require_entity(&self.entity)?;
        let ctx = ctx.with_type_graph(self.graph.clone());
        let selection = SelectionTree {
            arguments: args,
            ..selection
        };

        let query = match self.operation {
            Operation::Read => translate_read(entity, &selection, &ctx)?,
            Operation::Create => translate_create(entity, &selection, &ctx)?,
            Operation::Update => translate_update(entity, &selection, &ctx)?,
            Operation::Delete => translate_delete(entity, &selection, &ctx)?,
            other => {
                return Err(GraphError::Config(format!(
                    "no generated handler for '{}'",
                    other.as_str()
                )));
            }
        };
        let auth = ctx
            .auth()
            .cloned()
            .unwrap_or_else(AuthParam::unauthenticated);
        let query = query.with_auth(&auth);

        tracing::debug!(
            entity = %entity.name,
            operation = self.operation.as_str(),
            params = ?query.params.keys().collect::<Vec<_>>(),
            "{}",
            query.text
        );

        let connection = ctx.connection().ok_or(GraphError::MissingConnection)?;
        let records = connection.execute(&query).await?;

        Ok(shape(entity, self.operation, records))
    }
}

/// Turn result rows into the value the operation returns
fn shape(entity: &Entity, operation: Operation, records: Vec<Record>) -> Value {
    let key = Pluralizer::camel_case(&entity.plural());
    match operation {
        Operation::Create => {
            let mut created = Vec::new();
            for mut record in records {
                // unreadable nodes come back as null columns
                for i in 0.. {
                    match record.remove(&format!("this{}", i)) {
                        Some(Value::Null) => {}
                        Some(node) => created.push(node),
                        None => break,
                    }
                }
            }
            let mut out = Map::new();
            out.insert(key, Value::Array(created));
            Value::Object(out)
        }
        Operation::Update => {
            let mut out = Map::new();
            out.insert(key, Value::Array(column(records, "this")));
            Value::Object(out)
        }
        Operation::Delete => {
            let record = records.into_iter().next().unwrap_or_default();
            json!({
                "nodesDeleted": record.get("nodesDeleted").cloned().unwrap_or(json!(0)),
                "relationshipsDeleted": record.get("relationshipsDeleted").cloned().unwrap_or(json!(0)),
            })
        }
        _ => Value::Array(column(records, "this")),
    }
}

fn column(records: Vec<Record>, name: &str) -> Vec<Value> {
    records
        .into_iter()
        .filter_map(|mut record| record.remove(name))
        .collect()
}

/// Generate the CRUD handler tree for every entity of `graph`
pub fn generate(graph: Arc<TypeGraph>) -> ResolverMap {
    let mut query = ResolverMap::new();
    let mut mutation = ResolverMap::new();

    for entity in graph.entities() {
        let plural = entity.plural();
        let handler = |operation| {
            RegistryNode::handler(Arc::new(GeneratedResolver::new(
                graph.clone(),
                entity.name.clone(),
                operation,
            )))
        };

        query.insert(Pluralizer::camel_case(&plural), handler(Operation::Read));
        mutation.insert(format!("create{}", plural), handler(Operation::Create));
        mutation.insert(format!("update{}", plural), handler(Operation::Update));
        mutation.insert(format!("delete{}", plural), handler(Operation::Delete));
    }

    let mut tree = ResolverMap::new();
    tree.insert("Query".to_string(), RegistryNode::Namespace(query));
    tree.insert("Mutation".to_string(), RegistryNode::Namespace(mutation));
    tree
}
