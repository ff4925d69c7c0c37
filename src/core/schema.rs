//! In-memory type graph: entities, relationships and their authorization rules
//!
//! The type graph is built once (usually from YAML, see
//! [`GraphConfig`](crate::config::GraphConfig)) and only read afterwards. The
//! translation engine borrows entities from it; generated resolvers hold it
//! behind an `Arc`.

use crate::core::auth::{AuthPredicate, AuthRule};
use crate::core::error::{GraphError, GraphResult};
use crate::core::pluralize::Pluralizer;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Operation kinds an authorization rule can be scoped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    Connect,
    Disconnect,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
        }
    }
}

/// Direction of a relationship, relative to the entity declaring it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Out,
    In,
}

/// Whether a relationship field holds one related node or a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    #[default]
    Many,
}

/// A directed, typed edge from the owning entity to `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship type in the store (e.g. "ACTED_IN")
    #[serde(rename = "type")]
    pub rel_type: String,

    pub direction: Direction,

    /// Name of the target entity
    pub target: String,

    #[serde(default)]
    pub cardinality: Cardinality,

    /// Properties that may be set on the edge itself
    #[serde(default)]
    pub properties: Vec<String>,
}

impl Relationship {
    pub fn new(rel_type: impl Into<String>, direction: Direction, target: impl Into<String>) -> Self {
        Self {
            rel_type: rel_type.into(),
            direction,
            target: target.into(),
            cardinality: Cardinality::Many,
            properties: Vec::new(),
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.properties.push(property.into());
        self
    }

    pub fn is_list(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    /// Render the pattern `(from)-[rel:TYPE]->(to)` honouring the direction
    ///
    /// `to` is inserted verbatim so callers can pass `x:Label`.
    pub fn pattern(&self, from: &str, rel_var: Option<&str>, to: &str) -> String {
        let rel = format!("{}:{}", rel_var.unwrap_or(""), self.rel_type);
        match self.direction {
            Direction::Out => format!("({})-[{}]->({})", from, rel, to),
            Direction::In => format!("({})<-[{}]-({})", from, rel, to),
        }
    }
}

/// What a field holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// A stored node property
    Scalar {
        #[serde(rename = "type", default = "default_scalar_type")]
        scalar: String,
        #[serde(default)]
        list: bool,
    },

    /// A traversal to another entity
    Relationship(Relationship),

    /// A value produced by a Cypher statement evaluated against the node
    Computed {
        statement: String,
        #[serde(default)]
        list: bool,
    },
}

fn default_scalar_type() -> String {
    "String".to_string()
}

/// A field of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(flatten)]
    pub kind: FieldKind,

    /// Rules that only constrain access when this field is requested
    #[serde(default)]
    pub auth: Vec<AuthRule>,
}

impl Field {
    pub fn scalar(name: impl Into<String>, scalar: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar {
                scalar: scalar.into(),
                list: false,
            },
            auth: Vec::new(),
        }
    }

    pub fn relationship(name: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Relationship(relationship),
            auth: Vec::new(),
        }
    }

    pub fn computed(name: impl Into<String>, statement: impl Into<String>, list: bool) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Computed {
                statement: statement.into(),
                list,
            },
            auth: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: AuthRule) -> Self {
        self.auth.push(rule);
        self
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, FieldKind::Scalar { .. })
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match &self.kind {
            FieldKind::Relationship(rel) => Some(rel),
            _ => None,
        }
    }
}

/// A node type of the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,

    /// Store label; defaults to the entity name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub fields: Vec<Field>,

    /// Rules applying to every access of this entity
    #[serde(default)]
    pub auth: Vec<AuthRule>,

    /// Fields whose values identify a node
    #[serde(default)]
    pub unique: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            fields: Vec::new(),
            auth: Vec::new(),
            unique: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_scalar(self, name: impl Into<String>, scalar: impl Into<String>) -> Self {
        self.with_field(Field::scalar(name, scalar))
    }

    pub fn with_relationship(self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.with_field(Field::relationship(name, relationship))
    }

    pub fn with_rule(mut self, rule: AuthRule) -> Self {
        self.auth.push(rule);
        self
    }

    pub fn with_unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look a field up, failing with `SchemaMismatch` when it is not declared
    pub fn require_field(&self, name: &str) -> GraphResult<&Field> {
        self.field(name)
            .ok_or_else(|| GraphError::schema_mismatch(&self.name, name))
    }

    /// Plural name used by generated operations ("Person" -> "People")
    pub fn plural(&self) -> String {
        Pluralizer::pluralize(&self.name)
    }
}

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

/// Whether `name` can be emitted into query text without quoting
pub fn is_identifier(name: &str) -> bool {
    identifier_regex().is_match(name)
}

/// The complete, validated set of entities
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
    entities: IndexMap<String, Entity>,
}

impl TypeGraph {
    /// Build and validate a type graph
    ///
    /// Rejects duplicate entity names, identifiers that cannot be emitted
    /// unquoted, relationships to unknown entities and rules that reference
    /// fields the owning entity does not have.
    pub fn new(entities: Vec<Entity>) -> GraphResult<Self> {
        let mut map = IndexMap::new();
        for entity in entities {
            if map.contains_key(&entity.name) {
                return Err(GraphError::Config(format!(
                    "entity '{}' is declared twice",
                    entity.name
                )));
            }
            map.insert(entity.name.clone(), entity);
        }

        let graph = Self { entities: map };
        for entity in graph.entities.values() {
            graph.validate_entity(entity)?;
        }
        Ok(graph)
    }

    fn validate_entity(&self, entity: &Entity) -> GraphResult<()> {
        check_identifier(&entity.name, "entity name")?;
        check_identifier(entity.label(), "label")?;

        for field in &entity.fields {
            check_identifier(&field.name, "field name")?;
            if entity.fields.iter().filter(|f| f.name == field.name).count() > 1 {
                return Err(GraphError::Config(format!(
                    "{}.{} is declared twice",
                    entity.name, field.name
                )));
            }
            if let FieldKind::Relationship(rel) = &field.kind {
                check_identifier(&rel.rel_type, "relationship type")?;
                for property in &rel.properties {
                    check_identifier(property, "relationship property")?;
                }
                if !self.entities.contains_key(&rel.target) {
                    return Err(GraphError::Config(format!(
                        "{}.{} targets unknown entity '{}'",
                        entity.name, field.name, rel.target
                    )));
                }
            }
            for rule in &field.auth {
                validate_rule(entity, rule)?;
            }
        }

        for rule in &entity.auth {
            validate_rule(entity, rule)?;
        }

        for unique in &entity.unique {
            if !entity.field(unique).is_some_and(Field::is_scalar) {
                return Err(GraphError::Config(format!(
                    "{} declares unknown unique field '{}'",
                    entity.name, unique
                )));
            }
        }

        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Look an entity up, failing with `SchemaMismatch` when it is unknown
    pub fn require_entity(&self, name: &str) -> GraphResult<&Entity> {
        self.entity(name)
            .ok_or_else(|| GraphError::schema_mismatch("TypeGraph", name))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn check_identifier(name: &str, what: &str) -> GraphResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(GraphError::Config(format!("invalid {}: '{}'", what, name)))
    }
}

fn validate_rule(entity: &Entity, rule: &AuthRule) -> GraphResult<()> {
    match &rule.predicate {
        AuthPredicate::Equals { field, claim } => {
            if !entity.field(field).is_some_and(Field::is_scalar) {
                return Err(GraphError::Config(format!(
                    "auth rule on {} references unknown field '{}'",
                    entity.name, field
                )));
            }
            for segment in claim.split('.') {
                check_identifier(segment, "claim path")?;
            }
        }
        AuthPredicate::AnyRole { roles } => {
            if roles.is_empty() {
                return Err(GraphError::Config(format!(
                    "any_role rule on {} lists no roles",
                    entity.name
                )));
            }
        }
        AuthPredicate::Authenticated => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Entity {
        Entity::new("Person")
            .with_scalar("id", "ID")
            .with_scalar("name", "String")
            .with_relationship(
                "movies",
                Relationship::new("ACTED_IN", Direction::Out, "Movie"),
            )
    }

    fn movie() -> Entity {
        Entity::new("Movie").with_scalar("title", "String")
    }

    #[test]
    fn test_type_graph_lookup() {
        let graph = TypeGraph::new(vec![person(), movie()]).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.entity_names(), vec!["Person", "Movie"]);
        assert!(graph.entity("Person").is_some());
        assert!(matches!(
            graph.require_entity("Actor"),
            Err(GraphError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_relationship_target_rejected() {
        let result = TypeGraph::new(vec![person()]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unknown entity 'Movie'"));
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let result = TypeGraph::new(vec![movie(), movie()]);
        assert!(matches!(result, Err(GraphError::Config(_))));
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let bad = Entity::new("Movie").with_scalar("title`) DETACH DELETE n //", "String");
        assert!(matches!(
            TypeGraph::new(vec![bad]),
            Err(GraphError::Config(_))
        ));
    }

    #[test]
    fn test_rule_on_unknown_field_rejected() {
        let entity = movie().with_rule(AuthRule::equals("ownerId", "sub"));
        let err = TypeGraph::new(vec![entity]).unwrap_err();
        assert!(err.to_string().contains("ownerId"));
    }

    #[test]
    fn test_unique_fields_must_be_scalars() {
        assert!(TypeGraph::new(vec![person().with_unique("id"), movie()]).is_ok());

        let err = TypeGraph::new(vec![person().with_unique("movies"), movie()]).unwrap_err();
        assert!(err.to_string().contains("unique field 'movies'"));
        assert!(TypeGraph::new(vec![movie().with_unique("isbn")]).is_err());
    }

    #[test]
    fn test_require_field() {
        let entity = person();
        assert!(entity.require_field("name").is_ok());
        match entity.require_field("age") {
            Err(GraphError::SchemaMismatch { entity, field }) => {
                assert_eq!(entity, "Person");
                assert_eq!(field, "age");
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_relationship_pattern() {
        let out = Relationship::new("ACTED_IN", Direction::Out, "Movie");
        assert_eq!(
            out.pattern("this", None, "this_movies:Movie"),
            "(this)-[:ACTED_IN]->(this_movies:Movie)"
        );

        let inbound = Relationship::new("ACTED_IN", Direction::In, "Person");
        assert_eq!(
            inbound.pattern("this", Some("r"), "a"),
            "(this)<-[r:ACTED_IN]-(a)"
        );
    }

    #[test]
    fn test_label_defaults_to_name() {
        let mut entity = movie();
        assert_eq!(entity.label(), "Movie");
        entity.label = Some("Film".to_string());
        assert_eq!(entity.label(), "Film");
    }

    #[test]
    fn test_plural() {
        assert_eq!(person().plural(), "People");
        assert_eq!(movie().plural(), "Movies");
    }
}
