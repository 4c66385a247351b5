// src/storage/mod.rs
pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;
pub use traits::Storage;
