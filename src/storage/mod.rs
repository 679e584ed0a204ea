//! Page-oriented copy-on-write storage: framed pages, the manifests that order them,
//! and the datastore roots that pin a manifest version as the committed state.
pub mod cache;
pub mod manifest;
pub mod page;
pub mod root;
