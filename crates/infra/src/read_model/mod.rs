//! In-memory storage shared by the repositories.

mod partitioned;

pub use partitioned::PartitionedStore;
