pub mod manager;
pub mod models;
pub mod store;

pub use manager::SessionManager;
pub use models::{Role, Session, UserProfile};
pub use store::{CredentialStore, FileStore, MemoryStore};
