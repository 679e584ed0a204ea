//! Secondary indexing: caller-declared descriptors, the storage representations
//! backing each cardinality, and the CoW engine both primary and secondary
//! indexes are built on.
pub mod descriptor;
pub mod engine;
pub mod representation;
