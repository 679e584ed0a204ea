//! Asynchronous, per-datastore commit notifications.
pub mod bus;
pub mod event;
