//! Source store readers.

pub mod memory;
pub mod mongo;

pub use memory::MemorySource;
pub use mongo::MongoSource;
