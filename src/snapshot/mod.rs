//! Snapshot-level concerns: the DAG-linked iteration history and the garbage
//! collection pass that retires iterations a retention policy no longer keeps.
pub mod gc;
pub mod iteration;
