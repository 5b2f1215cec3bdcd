//! Adapters implementing the domain ports: in-memory and RocksDB stores,
//! and the HTTP gateway client.

pub mod gateway;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
