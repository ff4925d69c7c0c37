//! Translation engine: GraphQL operations to parameterised Cypher
//!
//! Four entry points, one per operation kind, share the contract
//! `(entity, selection, context) -> CompiledQuery`:
//!
//! - [`translate_read`]: `MATCH` + filters + nested pattern comprehensions
//! - [`translate_create`]: `CREATE` per input element, nested create / connect
//! - [`translate_update`]: `MATCH` + `SET` + connect / disconnect
//! - [`translate_delete`]: `MATCH` + `DETACH DELETE`, returning counts
//!
//! Authorization rules become predicates referencing `$auth`. The engine
//! only marks a query as auth-dependent; filling the `auth` parameter is
//! the job of the caller (see [`CompiledQuery::with_auth`]).
//!
//! Output is deterministic: the same inputs always give byte-identical text
//! and a parameter map with the same keys in the same order.

mod auth;
mod create;
mod delete;
mod filter;
mod projection;
mod read;
mod update;

pub use create::translate_create;
pub use delete::translate_delete;
pub use read::translate_read;
pub use update::translate_update;

use crate::core::auth::AuthParam;
use crate::core::context::ExecutionContext;
use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::TypeGraph;
use indexmap::IndexMap;
use serde_json::Value;

/// Name of the authorization parameter in every compiled query
pub const AUTH_PARAM: &str = "auth";

/// Query text plus its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub params: IndexMap<String, Value>,
    auth_dependent: bool,
}

impl CompiledQuery {
    pub fn new(text: impl Into<String>, params: IndexMap<String, Value>) -> Self {
        let text = text.into();
        let auth_dependent = references_auth(&text);
        Self {
            text,
            params,
            auth_dependent,
        }
    }

    /// Whether the text references `$auth`
    pub fn is_auth_dependent(&self) -> bool {
        self.auth_dependent
    }

    /// Attach the authorization parameter when the text references it
    ///
    /// Queries that do not reference `$auth` are returned unchanged, so the
    /// parameter map holds `auth` exactly when the text needs it.
    pub fn with_auth(mut self, auth: &AuthParam) -> Self {
        if self.auth_dependent {
            self.params.insert(AUTH_PARAM.to_string(), auth.to_value());
        }
        self
    }

    /// Text with whitespace runs collapsed, for fixture comparison
    pub fn normalized_text(&self) -> String {
        normalize_whitespace(&self.text)
    }
}

/// Collapse every run of whitespace into one space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `text` references the authorization parameter
pub fn references_auth(text: &str) -> bool {
    text.match_indices("$auth").any(|(i, m)| {
        text[i + m.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
    })
}

/// Resolve the type graph a translation works against
pub(crate) fn graph_of(ctx: &ExecutionContext) -> GraphResult<&TypeGraph> {
    ctx.type_graph()
        .map(|g| g.as_ref())
        .ok_or_else(|| GraphError::Config("execution context carries no type graph".to_string()))
}

/// Shared state while emitting one query
pub(crate) struct CypherBuilder<'g> {
    graph: &'g TypeGraph,
    params: IndexMap<String, Value>,
}

impl<'g> CypherBuilder<'g> {
    pub(crate) fn new(graph: &'g TypeGraph) -> Self {
        Self {
            graph,
            params: IndexMap::new(),
        }
    }

    pub(crate) fn graph(&self) -> &'g TypeGraph {
        self.graph
    }

    /// Register a parameter and return its `$name` reference
    ///
    /// Names are derived from variable paths and are normally unique; a
    /// clash gets a numeric suffix so no value is ever overwritten.
    pub(crate) fn param(&mut self, name: impl Into<String>, value: Value) -> String {
        let base = name.into();
        let mut key = base.clone();
        let mut n = 1;
        while self.params.contains_key(&key) {
            key = format!("{}_{}", base, n);
            n += 1;
        }
        self.params.insert(key.clone(), value);
        format!("${}", key)
    }

    /// Reference to the whole authorization parameter
    pub(crate) fn auth(&self) -> String {
        format!("${}", AUTH_PARAM)
    }

    /// Reference to a claim of the authorization parameter
    pub(crate) fn claim(&self, path: &str) -> String {
        format!("${}.{}", AUTH_PARAM, path)
    }

    pub(crate) fn finish(self, text: String) -> CompiledQuery {
        CompiledQuery::new(text, self.params)
    }
}

/// Join predicates with `AND`, `None` when there are none
pub(crate) fn and_all(predicates: Vec<String>) -> Option<String> {
    if predicates.is_empty() {
        None
    } else {
        Some(predicates.join(" AND "))
    }
}

/// Quote a string as a Cypher string literal
pub(crate) fn quote(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Accept either a single object or a list of objects
pub(crate) fn objects<'a>(
    argument: &str,
    value: &'a Value,
) -> GraphResult<Vec<&'a serde_json::Map<String, Value>>> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| {
            item.as_object()
                .ok_or_else(|| GraphError::invalid_argument(argument, "expected an object"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("  MATCH (this:Movie)\n\tRETURN   this  "),
            "MATCH (this:Movie) RETURN this"
        );
    }

    #[test]
    fn test_references_auth() {
        assert!(references_auth("WHERE this.id = $auth.sub"));
        assert!(references_auth("{this: this, auth: $auth}"));
        assert!(!references_auth("WHERE this.id = $this_auth0_roles"));
        assert!(!references_auth("WHERE this.id = $authors_name"));
        assert!(!references_auth("MATCH (this:Movie)"));
    }

    #[test]
    fn test_with_auth_only_when_referenced() {
        let claims = json!({"sub": "1"}).as_object().unwrap().clone();
        let auth = AuthParam::from_claims(claims);

        let plain = CompiledQuery::new("MATCH (this:Movie)", IndexMap::new()).with_auth(&auth);
        assert!(!plain.params.contains_key(AUTH_PARAM));

        let guarded =
            CompiledQuery::new("MATCH (this) WHERE this.id = $auth.sub", IndexMap::new())
                .with_auth(&auth);
        assert_eq!(guarded.params[AUTH_PARAM], json!({"sub": "1"}));
    }

    #[test]
    fn test_param_names_never_collide() {
        let graph = TypeGraph::default();
        let mut builder = CypherBuilder::new(&graph);
        assert_eq!(builder.param("this_name", json!("a")), "$this_name");
        assert_eq!(builder.param("this_name", json!("b")), "$this_name_1");
        let query = builder.finish(String::new());
        assert_eq!(query.params["this_name"], json!("a"));
        assert_eq!(query.params["this_name_1"], json!("b"));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote(r"a\b"), r#""a\\b""#);
    }
}
