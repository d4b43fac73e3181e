//! Persistence backends for sealed credential records
//!
//! This module provides two backends behind the `Preferences` trait:
//! 1. JSON file (durable, explicit flush)
//! 2. In-memory map (tests and previews)

mod file;
mod memory;
mod traits;

pub use file::FilePreferences;
pub use memory::MemoryPreferences;
pub use traits::Preferences;
