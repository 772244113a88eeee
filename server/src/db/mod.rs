pub mod memory;
pub mod models;
pub mod mongo;
pub mod storage;

pub use memory::InMemoryStorage;
pub use models::{Project, ProjectFields, User};
pub use mongo::MongoStorage;
pub use storage::{insert_with_next_id, OfflineStorage, Storage, StorageError, MAX_ID_ATTEMPTS};
