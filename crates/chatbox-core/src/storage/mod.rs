//! Storage contracts shared by the infrastructure and application layers.

mod blob;
pub mod keys;
mod repository;

pub use blob::{BlobStorage, DisplaySource};
pub use repository::{KeyValueRead, Repository, RepositoryExt, TransactFn, Transaction};
