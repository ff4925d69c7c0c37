//! Core module containing the type graph, request context and error types

pub mod auth;
pub mod context;
pub mod error;
pub mod pluralize;
pub mod schema;
pub mod selection;

pub use auth::{
    AuthParam, AuthParamDeriver, AuthPredicate, AuthRule, CredentialVerifier, JwtVerifier,
};
pub use context::{Connection, ExecutionContext, Record};
pub use error::{ErrorResponse, GraphError, GraphResult};
pub use pluralize::Pluralizer;
pub use schema::{
    Cardinality, Direction, Entity, Field, FieldKind, Operation, Relationship, TypeGraph,
};
pub use selection::{Arguments, SelectionTree};
