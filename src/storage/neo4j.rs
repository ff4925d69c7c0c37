//! Neo4j connection handle using the neo4rs Bolt protocol driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `neo4j` feature flag:
//! ```toml
//! [dependencies]
//! this-cypher = { version = "0.0.9", features = ["neo4j"] }
//! ```
//!
//! Compiled parameters are converted to Bolt values recursively (lists and
//! maps included, since `IN` filters and the `auth` parameter need them) and
//! every returned row is deserialized into a JSON record keyed by column.

use crate::core::context::{Connection, Record};
use crate::translate::CompiledQuery;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use neo4rs::{BoltList, BoltMap, BoltString, BoltType, Graph, query};
use serde_json::Value;

/// Convert a serde_json::Value into a BoltType query parameter.
///
/// - Strings → BoltType::String
/// - Integers → BoltType::Integer
/// - Floats → BoltType::Float
/// - Booleans → BoltType::Boolean
/// - Null → BoltType::Null
/// - Arrays → BoltType::List
/// - Objects → BoltType::Map
fn json_value_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::String(s) => BoltType::from(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::from(i)
            } else if let Some(f) = n.as_f64() {
                BoltType::from(f)
            } else {
                BoltType::from(n.to_string())
            }
        }
        Value::Bool(b) => BoltType::from(*b),
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items {
                list.push(json_value_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(entries) => {
            let mut map = BoltMap::new();
            for (key, item) in entries {
                map.put(BoltString::from(key.as_str()), json_value_to_bolt(item));
            }
            BoltType::Map(map)
        }
    }
}

/// Connection handle backed by a `neo4rs::Graph` pool
///
/// # Example
///
/// ```rust,ignore
/// use neo4rs::Graph;
/// use this_cypher::storage::Neo4jConnection;
///
/// let graph = Graph::new("127.0.0.1:7687", "neo4j", "password").await?;
/// let ctx = ExecutionContext::new().with_connection(Arc::new(Neo4jConnection::new(graph)));
/// ```
#[derive(Clone)]
pub struct Neo4jConnection {
    graph: Graph,
}

impl Neo4jConnection {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Connect to `uri` with basic credentials
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| anyhow!("Failed to connect to Neo4j: {}", e))?;
        Ok(Self::new(graph))
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl Connection for Neo4jConnection {
    async fn execute(&self, compiled: &CompiledQuery) -> Result<Vec<Record>> {
        let mut q = query(&compiled.text);
        for (name, value) in &compiled.params {
            q = q.param(name.as_str(), json_value_to_bolt(value));
        }

        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| anyhow!("Failed to execute query: {}", e))?;

        let mut records = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| anyhow!("Failed to iterate: {}", e))?
        {
            let record: Record = row
                .to()
                .map_err(|e| anyhow!("Failed to decode row: {}", e))?;
            records.push(record);
        }

        Ok(records)
    }
}
