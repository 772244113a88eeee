use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use super::models::{Project, ProjectFields, User};
use super::storage::{Storage, StorageError};

/// Process-local storage with the same uniqueness rules as the MongoDB
/// collections. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    // email -> user
    users: Arc<DashMap<String, User>>,
    // id -> project
    projects: Arc<DashMap<i64, Project>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn get_project(&self, id: i64) -> Option<Project> {
        self.projects.get(&id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_all_projects(&self) -> Result<Vec<Project>, StorageError> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        projects.sort_by_key(|project| project.id);
        Ok(projects)
    }

    async fn find_max_id_project(&self) -> Result<Option<Project>, StorageError> {
        Ok(self
            .projects
            .iter()
            .max_by_key(|entry| *entry.key())
            .map(|entry| entry.value().clone()))
    }

    async fn insert_project(&self, project: &Project) -> Result<(), StorageError> {
        match self.projects.entry(project.id) {
            Entry::Occupied(_) => Err(StorageError::Duplicate(format!("id: {}", project.id))),
            Entry::Vacant(slot) => {
                slot.insert(project.clone());
                Ok(())
            }
        }
    }

    async fn update_project_by_id(
        &self,
        id: i64,
        fields: &ProjectFields,
    ) -> Result<u64, StorageError> {
        match self.projects.get_mut(&id) {
            Some(mut project) => {
                project.fields.apply(fields);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_project_by_id(&self, id: i64) -> Result<u64, StorageError> {
        Ok(self.projects.remove(&id).map_or(0, |_| 1))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        Ok(self.users.get(email).map(|entry| entry.value().clone()))
    }

    async fn insert_user(&self, user: User) -> Result<User, StorageError> {
        match self.users.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(StorageError::Duplicate(format!("email: {}", user.email))),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) {
        log::debug!(
            "Dropping in-memory storage ({} users, {} projects)",
            self.users.len(),
            self.projects.len()
        );
    }
}
