//! Connection handle implementations for different backends

pub mod in_memory;
#[cfg(feature = "neo4j")]
pub mod neo4j;

pub use in_memory::RecordingConnection;
#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jConnection;
