//! # this-cypher
//!
//! Schema-driven GraphQL to Cypher translation with composable,
//! authorization-aware resolvers.
//!
//! ## Features
//!
//! - **Type Graph**: entities, relationships and auth rules declared in YAML
//! - **Translation Engine**: read / create / update / delete operations
//!   compiled into parameterised Cypher, nested to any depth
//! - **Authorization Weaving**: rules become predicates over `$auth`, the
//!   claims of a verified JWT
//! - **Resolver Composition**: generated CRUD handlers merged with your own,
//!   then guarded so every call sees a connection and a derived `auth`
//! - **Pluggable Store**: any [`Connection`](core::Connection); Neo4j via
//!   `neo4rs` behind the `neo4j` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use this_cypher::prelude::*;
//!
//! let config = GraphConfig::from_yaml_file("graph.yaml")?;
//! let registry = GraphBuilder::new().with_config(config).build()?;
//!
//! let ctx = ExecutionContext::from_headers(&headers)
//!     .with_connection(Arc::new(Neo4jConnection::new(graph)));
//!
//! for selection in SelectionTree::from_query("{ people { name } }", None, &Map::new())? {
//!     let people = registry.resolve_root("Query", selection, ctx.clone()).await?;
//! }
//! ```

pub mod config;
pub mod core;
pub mod resolvers;
pub mod storage;
pub mod translate;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Arguments, AuthParam, AuthParamDeriver, AuthPredicate, AuthRule, Cardinality, Connection,
        CredentialVerifier, Direction, Entity, ExecutionContext, Field, FieldKind, GraphError,
        GraphResult, JwtVerifier, Operation, Pluralizer, Record, Relationship, SelectionTree,
        TypeGraph,
    };

    // === Translation ===
    pub use crate::translate::{
        CompiledQuery, normalize_whitespace, translate_create, translate_delete, translate_read,
        translate_update,
    };

    // === Resolvers ===
    pub use crate::resolvers::{
        GraphBuilder, Handler, HandlerRegistry, RegistryNode, Resolver, ResolverMap, compose,
        generate, resolver_fn, wrap,
    };

    // === Storage ===
    pub use crate::storage::RecordingConnection;
    #[cfg(feature = "neo4j")]
    pub use crate::storage::Neo4jConnection;

    // === Config ===
    pub use crate::config::{AuthConfig, GraphConfig};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Map, Value, json};
    pub use std::sync::Arc;

    // === Axum ===
    pub use axum::http::HeaderMap;
}
