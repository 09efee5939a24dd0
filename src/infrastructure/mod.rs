//! Adapters implementing the domain ports: storage backends and the
//! mobile-money HTTP client.

pub mod in_memory;
pub mod mpesa;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
