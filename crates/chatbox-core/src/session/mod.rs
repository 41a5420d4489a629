//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: Core session domain model (`Session`, `SessionType`, `Avatar`)
//! - `message`: Conversation message types (`Message`, `MessageRole`)
//! - `patch`: Partial updates used by star/rename (`SessionPatch`)

mod message;
mod model;
mod patch;

// Re-export public API
pub use message::{Message, MessageRole};
pub use model::{Avatar, Session, SessionType};
pub use patch::SessionPatch;
