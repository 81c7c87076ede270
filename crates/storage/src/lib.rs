// IMDS Storage Layer
//
// Read-only knowledge store interface with pluggable backends

pub mod memory;
pub mod trait_;

#[cfg(feature = "neo4j")]
pub mod neo4j;

pub use memory::*;
pub use trait_::*;

#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jKnowledgeStore;
