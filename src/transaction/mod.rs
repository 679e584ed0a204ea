//! Single-writer, many-reader transaction coordination and the option bitflags
//! that tune durability and observation behavior per transaction.
pub mod coordinator;
pub mod options;
