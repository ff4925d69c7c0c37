//! Per-request execution context and the connection handle seam

use crate::core::auth::AuthParam;
use crate::core::schema::TypeGraph;
use crate::translate::CompiledQuery;
use anyhow::Result;
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// One result row, keyed by column name
pub type Record = Map<String, Value>;

/// Opaque handle to the graph store
///
/// The core only checks that a handle is present and forwards compiled
/// queries to it. Retries, timeouts, sessions and pooling belong to the
/// implementation.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Record>>;
}

/// Everything a handler needs to serve one request
///
/// Immutable: [`ExecutionContext::augment`] returns a new value carrying the
/// derived [`AuthParam`] and leaves the original untouched, so a context reused
/// across requests never leaks one caller's claims into another's.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    credentials: Option<String>,
    type_graph: Option<Arc<TypeGraph>>,
    connection: Option<Arc<dyn Connection>>,
    auth: Option<AuthParam>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from HTTP headers, taking the `Authorization` header as credentials
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let credentials = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            credentials,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    pub fn with_type_graph(mut self, type_graph: Arc<TypeGraph>) -> Self {
        self.type_graph = Some(type_graph);
        self
    }

    pub fn with_connection(mut self, connection: Arc<dyn Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    /// A copy of this context carrying `auth`
    pub fn augment(&self, auth: AuthParam) -> Self {
        Self {
            auth: Some(auth),
            ..self.clone()
        }
    }

    pub fn credentials(&self) -> Option<&str> {
        self.credentials.as_deref()
    }

    pub fn type_graph(&self) -> Option<&Arc<TypeGraph>> {
        self.type_graph.as_ref()
    }

    pub fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.connection.as_ref()
    }

    /// The derived authorization parameter, if a wrapper attached one
    pub fn auth(&self) -> Option<&AuthParam> {
        self.auth.as_ref()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field("type_graph", &self.type_graph.as_ref().map(|g| g.len()))
            .field("connection", &self.connection.is_some())
            .field("auth", &self.auth)
            .finish()
    }
}
