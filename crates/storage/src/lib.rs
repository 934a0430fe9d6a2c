mod error;
mod fs;
mod memory;
mod path;
mod record;
mod traits;

pub mod conformance;

pub use error::StorageError;
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use path::normalize_path;
pub use record::{content_hash, StoredDocument};
pub use traits::{DocumentStore, Expected};
