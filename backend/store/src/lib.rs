//! Session persistence and portal configuration storage for PortalChat.

pub mod memory;
pub mod portal_configs;
pub mod sqlite;

pub use memory::{MemoryCredentialVault, MemorySessionStore};
pub use portal_configs::SqlitePortalConfigRepository;
pub use sqlite::{SqliteDatabase, SqliteSessionStore};
