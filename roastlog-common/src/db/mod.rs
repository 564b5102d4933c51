//! Database initialization and stores

pub mod init;
pub mod inventory;
pub mod schema_sync;
pub mod sessions;
pub mod table_schemas;

pub use init::*;
pub use inventory::{InventoryEntry, InventoryStore};
pub use schema_sync::*;
pub use sessions::{AppendedRow, SessionStore};
pub use table_schemas::*;
