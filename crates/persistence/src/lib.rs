//! Persistence layer for the voice engine
//!
//! Provides durable storage behind small traits so the engine never touches
//! a driver directly:
//! - Call rows and append-only call messages (ScyllaDB or in-memory)
//! - Assistant lookup (by id and by dialled number)
//! - Encrypted provider-credential blobs and tenant API-key digests

pub mod assistants;
pub mod calls;
pub mod client;
pub mod credentials;
pub mod error;
pub mod memory;

pub use assistants::AssistantDirectory;
pub use calls::{CallStore, ScyllaCallStore};
pub use client::{ScyllaClient, ScyllaConfig};
pub use credentials::{api_key_digest, decrypt_credential, encrypt_credential, parse_encryption_key};
pub use error::PersistenceError;
pub use memory::{InMemoryDirectory, InMemoryStore};
