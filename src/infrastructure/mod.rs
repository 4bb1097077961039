//! Adapters for the domain ports: clocks, in-memory ledger and cache, and the
//! optional RocksDB ledger.

pub mod clock;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
