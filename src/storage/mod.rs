//! Storage abstraction: the wire-level filter language, the
//! `StorageAdapter` trait every backend implements, and the in-memory
//! reference adapter.

pub mod filter;
pub mod memory;
pub mod traits;

pub use memory::MemoryAdapter;
pub use traits::{FindOptions, Sort, StorageAdapter, VectorHit};
