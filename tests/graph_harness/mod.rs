//! Shared fixtures for the integration tests
//!
//! Provides a small movie graph (`Person`, `Movie`, `ACTED_IN`), JWT
//! signing helpers and a verifier that counts its invocations.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod graph_harness;
//! use graph_harness::*;
//! ```

#![allow(dead_code)]

use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::atomic::{AtomicUsize, Ordering};
use this_cypher::prelude::*;

pub const SECRET: &str = "integration-secret";

pub const MOVIE_GRAPH: &str = r#"
auth:
  secret: integration-secret
entities:
  - name: Person
    unique: [id]
    auth:
      - rule: equals
        field: id
        claim: sub
        operations: [update, delete]
    fields:
      - name: id
        kind: scalar
        type: ID
      - name: name
        kind: scalar
      - name: movies
        kind: relationship
        type: ACTED_IN
        direction: OUT
        target: Movie
        properties: [role]
  - name: Movie
    fields:
      - name: title
        kind: scalar
      - name: released
        kind: scalar
        type: Int
      - name: actors
        kind: relationship
        type: ACTED_IN
        direction: IN
        target: Person
"#;

pub fn movie_config() -> GraphConfig {
    GraphConfig::from_yaml_str(MOVIE_GRAPH).expect("movie graph parses")
}

pub fn movie_graph() -> Arc<TypeGraph> {
    Arc::new(movie_config().type_graph().expect("movie graph validates"))
}

/// Execution context carrying the movie graph, as generated handlers see it
pub fn movie_context() -> ExecutionContext {
    ExecutionContext::new().with_type_graph(movie_graph())
}

pub fn record(value: Value) -> Record {
    value.as_object().expect("record literal is an object").clone()
}

/// Sign `claims` with [`SECRET`] using HS256
pub fn sign(claims: Value) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("token signs")
}

pub fn bearer(claims: Value) -> String {
    format!("Bearer {}", sign(claims))
}

/// Verifier accepting any token as `{"sub": <token>}`, counting its calls
#[derive(Default)]
pub struct CountingVerifier {
    calls: AtomicUsize,
}

impl CountingVerifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialVerifier for CountingVerifier {
    async fn verify(&self, token: &str) -> Result<Map<String, Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!(token));
        Ok(claims)
    }
}
