//! Application layer for the Chatbox session store.
//!
//! Coordinates the domain and infrastructure layers: the reactive bridge the
//! UI reads from, the session actions it calls, the startup cleanup, and the
//! startup sequence that ties them together.

pub mod actions;
pub mod bridge;
pub mod gc;
pub mod startup;
pub mod store;

pub use actions::SessionActions;
pub use bridge::{Projection, ProjectionValue, ReactiveBridge, Subscription};
pub use gc::{CleanupReport, OrphanReference, StorageCleaner};
pub use startup::{HydratedStore, MigratedStore, StoreBootstrap};
pub use store::{AvatarDisplay, ChatStore, open_backends};
