pub mod config;
pub mod migration;
pub mod paths;
pub mod storage;

pub use crate::config::{StorageBackend, StoreConfig};
pub use crate::migration::{MigrationEngine, MigrationReport};
pub use crate::paths::ChatboxPaths;
pub use crate::storage::{FileBlobStorage, FileRepository, MemoryBlobStorage, MemoryRepository};
