// Storage and export

pub mod csv;
pub mod json;
pub mod memory;
pub mod native;
pub mod repository;
pub mod seed;

pub use memory::MemoryRepository;
pub use native::SqliteRepository;
pub use repository::{InventoryRepository, RepoError};

/// Inventory database schema version
/// Increment when the schema changes in a way that old versions can't read
pub const STORE_FORMAT_VERSION: u32 = 1;
