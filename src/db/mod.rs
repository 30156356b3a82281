//! Profile storage
//!
//! The gate reads user profiles through the [`ProfileStore`] trait so the
//! MongoDB-backed store can be swapped for the in-memory one in dev mode and
//! tests.

pub mod memory;
pub mod mongo;
pub mod schemas;
pub mod store;

pub use memory::MemoryProfileStore;
pub use mongo::{MongoClient, MongoProfileStore};
pub use store::ProfileStore;
