pub mod backend;
pub mod reference;
pub mod sled_storage;

pub use backend::{AuditTail, StorageBackend};
pub use reference::load_reference_directory;
pub use sled_storage::SledStorage;
