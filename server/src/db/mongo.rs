use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, Database, IndexModel,
};
use tokio::sync::OnceCell;

use super::models::{Project, ProjectFields, User};
use super::storage::{Storage, StorageError};

pub const USERS_COLLECTION: &str = "users";
pub const PROJECTS_COLLECTION: &str = "tabelData";

/// Database used when neither the config nor the URI names one.
pub const FALLBACK_DATABASE: &str = "test";

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Runs a setup step until it succeeds once. A failed attempt leaves the
/// gate closed and the next caller tries again.
#[derive(Debug, Default)]
struct IndexGate {
    ready: OnceCell<()>,
}

impl IndexGate {
    async fn ensure<F, Fut>(&self, init: F) -> Result<(), StorageError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StorageError>>,
    {
        self.ready.get_or_try_init(init).await?;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.initialized()
    }
}

/// Writes that depend on a unique index wait until the indexes exist.
#[derive(Clone)]
pub struct MongoStorage {
    client: Client,
    db: Database,
    indexes: Arc<IndexGate>,
}

impl MongoStorage {
    /// Parses the URI and prepares the client. The driver connects lazily,
    /// so an unreachable server only surfaces on the first operation.
    pub async fn connect(uri: &str, database_name: Option<&str>) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self::new(client, database_name))
    }

    pub fn new(client: Client, database_name: Option<&str>) -> Self {
        let db = match database_name {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(FALLBACK_DATABASE)),
        };

        Self {
            client,
            db,
            indexes: Arc::new(IndexGate::default()),
        }
    }

    pub fn database_name(&self) -> &str {
        self.db.name()
    }

    fn users(&self) -> Collection<User> {
        self.db.collection(USERS_COLLECTION)
    }

    fn projects(&self) -> Collection<Project> {
        self.db.collection(PROJECTS_COLLECTION)
    }

    /// Creates the unique indexes unless an earlier call already did.
    pub async fn ensure_indexes(&self) -> Result<(), StorageError> {
        if self.indexes.is_ready() {
            return Ok(());
        }
        self.indexes.ensure(|| self.init_indexes()).await
    }

    async fn init_indexes(&self) -> Result<(), StorageError> {
        log::info!("Initializing database indexes...");
        // Create unique index on email
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.users().create_index(email_index).await?;

        // Unique project ids close the read-max-then-insert race
        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.projects().create_index(id_index).await?;

        log::info!("Database indexes created successfully");
        Ok(())
    }
}

/// Maps unique-index violations to [`StorageError::Duplicate`].
fn classify(err: mongodb::error::Error) -> StorageError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY_CODE {
            return StorageError::Duplicate(write_error.message.clone());
        }
    }
    StorageError::Database(err)
}

#[async_trait]
impl Storage for MongoStorage {
    async fn find_all_projects(&self) -> Result<Vec<Project>, StorageError> {
        let mut cursor = self.projects().find(doc! {}).sort(doc! { "id": 1 }).await?;

        let mut projects = Vec::new();
        while let Some(project) = cursor.try_next().await? {
            projects.push(project);
        }

        Ok(projects)
    }

    async fn find_max_id_project(&self) -> Result<Option<Project>, StorageError> {
        let project = self
            .projects()
            .find_one(doc! {})
            .sort(doc! { "id": -1 })
            .await?;
        Ok(project)
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StorageError> {
        self.ensure_indexes().await?;
        self.projects()
            .insert_one(project)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn update_project_by_id(
        &self,
        id: i64,
        fields: &ProjectFields,
    ) -> Result<u64, StorageError> {
        // An empty $set is rejected by the server
        if fields.is_empty() {
            return Ok(self.projects().count_documents(doc! { "id": id }).await?);
        }

        let set = fields.to_document()?;
        let result = self
            .projects()
            .update_one(doc! { "id": id }, doc! { "$set": set })
            .await
            .map_err(classify)?;
        Ok(result.matched_count)
    }

    async fn delete_project_by_id(&self, id: i64) -> Result<u64, StorageError> {
        let result = self.projects().delete_one(doc! { "id": id }).await?;
        Ok(result.deleted_count)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let user = self.users().find_one(doc! { "email": email }).await?;
        Ok(user)
    }

    async fn insert_user(&self, user: User) -> Result<User, StorageError> {
        self.ensure_indexes().await?;
        self.users().insert_one(&user).await.map_err(classify)?;
        Ok(user)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        log::info!("MongoDB client shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn index_gate_retries_after_a_failed_attempt() {
        let gate = IndexGate::default();
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let init = move || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(StorageError::Unavailable("server selection timeout".to_string()))
            } else {
                Ok(())
            }
        };

        assert!(gate.ensure(init).await.is_err());
        assert!(!gate.is_ready());

        gate.ensure(init).await.expect("second attempt succeeds");
        assert!(gate.is_ready());

        gate.ensure(init).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn index_gate_runs_setup_once_under_contention() {
        let gate = Arc::new(IndexGate::default());
        let attempts = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let attempts = Arc::clone(&attempts);
                tokio::spawn(async move {
                    gate.ensure(|| async {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok(())
                    })
                    .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
