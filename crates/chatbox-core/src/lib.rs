pub mod error;
pub mod schema;
pub mod session;
pub mod settings;
pub mod storage;

// Re-export common error type
pub use error::{Result, StoreError};
pub use schema::SchemaVersion;
pub use settings::AppSettings;
