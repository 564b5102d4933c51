//! # Roastlog Common Library
//!
//! Shared code for the roastlog tools including:
//! - Canonical field lists (persisted rows, Scout and Core schemas)
//! - Roast session data model and flat field records
//! - Database initialization and the append-only session store
//! - Configuration loading
//! - Time and date helpers (MM:SS, flexible dates, seasons)

pub mod config;
pub mod db;
pub mod error;
pub mod record;
pub mod schema;
pub mod session;
pub mod time;

pub use error::{Error, Result};
pub use record::{FieldValue, FlatRecord};
pub use schema::{ModelKind, Schema};
pub use session::{RoastSession, SessionError};
