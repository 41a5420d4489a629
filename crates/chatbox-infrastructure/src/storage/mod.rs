//! Storage backends for the session repository and blob storage.

mod atomic_file;
mod file_blob;
mod file_repository;
mod key_encoding;
mod memory_blob;
mod memory_repository;

pub use file_blob::FileBlobStorage;
pub use file_repository::FileRepository;
pub use memory_blob::MemoryBlobStorage;
pub use memory_repository::MemoryRepository;
