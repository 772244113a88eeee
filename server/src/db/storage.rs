use async_trait::async_trait;
use mongodb::bson;

use super::models::{Project, ProjectFields, User};

/// Attempts made by [`insert_with_next_id`] before giving up on a contended id.
pub const MAX_ID_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Cast error: {0}")]
    Cast(String),

    #[error("No project id left after {0}")]
    IdSpaceExhausted(i64),
}

/// Durable home of users and projects.
///
/// Implementations must enforce unique user emails and unique project ids,
/// reporting a clash as [`StorageError::Duplicate`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// All projects, ascending by id.
    async fn find_all_projects(&self) -> Result<Vec<Project>, StorageError>;

    async fn find_max_id_project(&self) -> Result<Option<Project>, StorageError>;

    async fn insert_project(&self, project: &Project) -> Result<(), StorageError>;

    /// Returns the number of matched rows; zero is not an error.
    async fn update_project_by_id(
        &self,
        id: i64,
        fields: &ProjectFields,
    ) -> Result<u64, StorageError>;

    async fn delete_project_by_id(&self, id: i64) -> Result<u64, StorageError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    /// Stores the user; fails with `Duplicate` if the email is taken.
    async fn insert_user(&self, user: User) -> Result<User, StorageError>;

    async fn ping(&self) -> Result<(), StorageError>;

    async fn close(&self);
}

/// Assigns `max(id) + 1` (or 1 on an empty collection) and inserts.
///
/// Two writers can read the same maximum; the unique id constraint rejects
/// the loser, which then re-reads the maximum and tries again.
pub async fn insert_with_next_id(
    storage: &dyn Storage,
    fields: ProjectFields,
) -> Result<Project, StorageError> {
    let mut attempt = 1;
    loop {
        let next_id = match storage.find_max_id_project().await? {
            Some(latest) => latest
                .id
                .checked_add(1)
                .ok_or(StorageError::IdSpaceExhausted(latest.id))?,
            None => 1,
        };
        let project = Project::new(next_id, fields.clone());

        match storage.insert_project(&project).await {
            Ok(()) => return Ok(project),
            Err(StorageError::Duplicate(key)) if attempt < MAX_ID_ATTEMPTS => {
                log::warn!(
                    "Project id {} was taken concurrently ({}), retrying",
                    next_id,
                    key
                );
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Stand-in used when no database could be configured. Every call fails, so
/// requests answer 500 while the process keeps serving.
#[derive(Debug, Clone)]
pub struct OfflineStorage {
    reason: String,
}

impl OfflineStorage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn unavailable(&self) -> StorageError {
        StorageError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl Storage for OfflineStorage {
    async fn find_all_projects(&self) -> Result<Vec<Project>, StorageError> {
        Err(self.unavailable())
    }

    async fn find_max_id_project(&self) -> Result<Option<Project>, StorageError> {
        Err(self.unavailable())
    }

    async fn insert_project(&self, _project: &Project) -> Result<(), StorageError> {
        Err(self.unavailable())
    }

    async fn update_project_by_id(
        &self,
        _id: i64,
        _fields: &ProjectFields,
    ) -> Result<u64, StorageError> {
        Err(self.unavailable())
    }

    async fn delete_project_by_id(&self, _id: i64) -> Result<u64, StorageError> {
        Err(self.unavailable())
    }

    async fn find_user_by_email(&self, _email: &str) -> Result<Option<User>, StorageError> {
        Err(self.unavailable())
    }

    async fn insert_user(&self, _user: User) -> Result<User, StorageError> {
        Err(self.unavailable())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Err(self.unavailable())
    }

    async fn close(&self) {}
}
