//! In-memory connection handle for testing and development

use crate::core::context::{Connection, Record};
use crate::translate::CompiledQuery;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

/// Connection that records every query it receives and replays canned rows
///
/// Responses queued with [`push_response`](Self::push_response) are handed
/// out in order, one per executed query; once the queue is empty every query
/// returns no rows. Uses RwLock for thread-safe access, and clones share state.
#[derive(Clone, Default)]
pub struct RecordingConnection {
    executed: Arc<RwLock<Vec<CompiledQuery>>>,
    responses: Arc<RwLock<VecDeque<Vec<Record>>>>,
}

impl RecordingConnection {
    /// Create a new recording connection with no canned responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next unanswered query
    pub fn push_response(&self, records: Vec<Record>) -> Result<()> {
        let mut responses = self
            .responses
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        responses.push_back(records);
        Ok(())
    }

    /// Queries executed so far, oldest first
    pub fn executed(&self) -> Result<Vec<CompiledQuery>> {
        let executed = self
            .executed
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(executed.clone())
    }

    /// The most recently executed query
    pub fn last(&self) -> Result<Option<CompiledQuery>> {
        let executed = self
            .executed
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        Ok(executed.last().cloned())
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Record>> {
        self.executed
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .push(query.clone());

        let mut responses = self
            .responses
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        Ok(responses.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_records_and_replays() {
        let connection = RecordingConnection::new();
        connection
            .push_response(vec![record(json!({"this": {"name": "Keanu"}}))])
            .unwrap();

        let query = CompiledQuery::new("MATCH (this:Person) RETURN this", IndexMap::new());
        let rows = connection.execute(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["this"]["name"], json!("Keanu"));

        let rows = connection.execute(&query).await.unwrap();
        assert!(rows.is_empty());

        assert_eq!(connection.executed().unwrap().len(), 2);
        assert_eq!(connection.last().unwrap(), Some(query));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let connection = RecordingConnection::new();
        let shared = connection.clone();
        let query = CompiledQuery::new("RETURN 1", IndexMap::new());
        shared.execute(&query).await.unwrap();
        assert_eq!(connection.executed().unwrap().len(), 1);
    }
}
