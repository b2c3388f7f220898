//! Impls - implementations of the ports.
//!
//! Only the in-memory reference store lives here. Durable backends belong in
//! their own crates and implement [`crate::ports::StatusStore`].

pub mod memory_store;

pub use self::memory_store::InMemoryStatusStore;
