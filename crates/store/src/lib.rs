//! Store implementations for the ledger: in-memory (tests/dev) and
//! Postgres (production), plus connection configuration.

pub mod config;
pub mod memory;
pub mod postgres;


pub use config::StoreConfig;
pub use memory::MemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
