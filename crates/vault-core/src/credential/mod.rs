//! Credential records and the store that seals and persists them

mod store;
mod types;

pub use store::CredentialStore;
pub use types::*;
