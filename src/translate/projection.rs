//! Map projections of selection trees
//!
//! `this { .name, alias: this.title, movies: [ (this)-[:ACTED_IN]->(this_movies:Movie) | this_movies { .title } ] }`

use super::{CypherBuilder, and_all, filter, quote, references_auth};
use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::{Entity, FieldKind, Operation, Relationship};
use crate::core::selection::SelectionTree;
use serde_json::{Map, Value};

/// Paging and ordering from an `options` argument
#[derive(Debug, Default)]
pub(crate) struct Options {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
    /// `(field, descending)` in request order
    pub sort: Vec<(String, bool)>,
}

impl Options {
    pub fn parse(entity: &Entity, selection: &SelectionTree) -> GraphResult<Self> {
        let Some(options) = filter::object_argument(selection, "options")? else {
            return Ok(Self::default());
        };

        let mut parsed = Self {
            limit: count(options, "limit")?,
            skip: count(options, "skip")?,
            sort: Vec::new(),
        };

        match options.get("sort") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    let item = item.as_object().ok_or_else(|| {
                        GraphError::invalid_argument("options", "sort items must be objects")
                    })?;
                    for (name, direction) in item {
                        let field = entity.require_field(name)?;
                        if !field.is_scalar() {
                            return Err(GraphError::invalid_argument(
                                "options",
                                format!("cannot sort on '{}'", name),
                            ));
                        }
                        let descending = match direction.as_str() {
                            Some("ASC") => false,
                            Some("DESC") => true,
                            _ => {
                                return Err(GraphError::invalid_argument(
                                    "options",
                                    format!("sort direction for '{}' must be ASC or DESC", name),
                                ));
                            }
                        };
                        parsed.sort.push((name.clone(), descending));
                    }
                }
            }
            Some(_) => return Err(GraphError::invalid_argument("options", "sort must be a list")),
        }

        Ok(parsed)
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.skip.is_none() && self.sort.is_empty()
    }
}

fn count(options: &Map<String, Value>, key: &str) -> GraphResult<Option<i64>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_i64() {
            Some(n) if n >= 0 => Ok(Some(n)),
            _ => Err(GraphError::invalid_argument(
                "options",
                format!("{} must be a non-negative integer", key),
            )),
        },
    }
}

/// Project `fields` of the node bound to `var`
pub(crate) fn project(
    b: &mut CypherBuilder<'_>,
    entity: &Entity,
    var: &str,
    fields: &[SelectionTree],
) -> GraphResult<String> {
    let mut entries = Vec::with_capacity(fields.len());

    for selection in fields {
        let key = selection.response_key();
        if selection.name == "__typename" {
            entries.push(format!("{}: {}", key, quote(&entity.name)));
            continue;
        }

        let field = entity.require_field(&selection.name)?;
        match &field.kind {
            FieldKind::Scalar { .. } => match &selection.alias {
                Some(alias) if alias != &field.name => {
                    entries.push(format!("{}: {}.{}", alias, var, field.name))
                }
                _ => entries.push(format!(".{}", field.name)),
            },
            FieldKind::Computed { statement, list } => {
                let value = computed(b, var, key, statement, *list, selection);
                entries.push(format!("{}: {}", key, value));
            }
            FieldKind::Relationship(rel) => {
                let child = format!("{}_{}", var, key);
                let value = traversal(b, var, &child, rel, selection)?;
                entries.push(format!("{}: {}", key, value));
            }
        }
    }

    if entries.is_empty() {
        Ok(format!("{} {{ }}", var))
    } else {
        Ok(format!("{} {{ {} }}", var, entries.join(", ")))
    }
}

fn computed(
    b: &mut CypherBuilder<'_>,
    var: &str,
    key: &str,
    statement: &str,
    list: bool,
    selection: &SelectionTree,
) -> String {
    let mut args = vec![format!("this: {}", var)];
    if references_auth(statement) {
        args.push(format!("auth: {}", b.auth()));
    }
    for (name, value) in &selection.arguments {
        let param = b.param(format!("{}_{}_{}", var, key, name), value.clone());
        args.push(format!("{}: {}", name, param));
    }

    let call = format!(
        "apoc.cypher.runFirstColumn({}, {{{}}}, true)",
        quote(statement),
        args.join(", ")
    );
    if list { call } else { format!("head({})", call) }
}

fn traversal(
    b: &mut CypherBuilder<'_>,
    var: &str,
    child: &str,
    rel: &Relationship,
    selection: &SelectionTree,
) -> GraphResult<String> {
    let target = b.graph().require_entity(&rel.target)?;

    let where_filter = filter::object_argument(selection, "where")?;
    let predicates = filter::scoped_predicates(
        b,
        target,
        child,
        Operation::Read,
        &selection.fields,
        where_filter,
        &[],
    )?;

    let options = Options::parse(target, selection)?;
    if !options.sort.is_empty() {
        return Err(GraphError::invalid_argument(
            "options",
            format!("sort is not supported on nested field '{}'", selection.name),
        ));
    }

    let pattern = rel.pattern(var, None, &format!("{}:{}", child, target.label()));
    let projection = project(b, target, child, &selection.fields)?;

    let mut comprehension = match and_all(predicates) {
        Some(clause) => format!("[ {} WHERE {} | {} ]", pattern, clause, projection),
        None => format!("[ {} | {} ]", pattern, projection),
    };

    let skip = options
        .skip
        .map(|n| b.param(format!("{}_skip", child), Value::from(n)));
    let limit = options
        .limit
        .map(|n| b.param(format!("{}_limit", child), Value::from(n)));
    match (skip, limit) {
        (Some(skip), Some(limit)) => {
            comprehension = format!("{}[{}..{} + {}]", comprehension, skip, skip, limit)
        }
        (Some(skip), None) => comprehension = format!("{}[{}..]", comprehension, skip),
        (None, Some(limit)) => comprehension = format!("{}[..{}]", comprehension, limit),
        (None, None) => {}
    }

    if rel.is_list() {
        Ok(comprehension)
    } else {
        Ok(format!("head({})", comprehension))
    }
}
