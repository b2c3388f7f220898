//! Ports - abstraction layer.
//!
//! Traits here are the seams to infrastructure. The engine only talks to
//! storage through them, so a different backend can be plugged in without
//! touching the task graph.

pub mod status_store;

pub use self::status_store::StatusStore;
