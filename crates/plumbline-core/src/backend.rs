//! Data-access seam for the checklist.
//!
//! The store and preference sync take these traits by value, so tests run
//! against [`memory::MemoryBackend`] and the binary against
//! [`rest::RestBackend`].

pub mod memory;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;

use crate::prefs::{Preferences, PreferencesPatch};
use crate::reorder::OrderUpdate;
use crate::task::{NewTask, Task, TaskId, TaskPatch, UserId};

#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Every task owned by `user`, ordered by `order` then `created_at`.
    async fn list_tasks(&self, user: UserId) -> anyhow::Result<Vec<Task>>;

    async fn insert_task(&self, user: UserId, task: &NewTask) -> anyhow::Result<TaskId>;

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> anyhow::Result<()>;

    async fn delete_task(&self, id: TaskId) -> anyhow::Result<()>;

    /// One result per update, in input order. A failed item does not stop
    /// the rest of the batch.
    async fn batch_update_order(&self, updates: &[OrderUpdate]) -> Vec<anyhow::Result<()>> {
        let mut results = Vec::with_capacity(updates.len());
        for update in updates {
            let patch = TaskPatch::order(update.order);
            results.push(self.update_task(update.id, &patch).await);
        }
        results
    }
}

#[async_trait]
pub trait PreferenceBackend: Send + Sync {
    async fn get_preferences(&self, user: UserId) -> anyhow::Result<Option<Preferences>>;

    async fn create_default_preferences(&self, user: UserId) -> anyhow::Result<Preferences>;

    async fn update_preferences(&self, user: UserId, patch: &PreferencesPatch) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: TaskBackend + ?Sized> TaskBackend for Arc<T> {
    async fn list_tasks(&self, user: UserId) -> anyhow::Result<Vec<Task>> {
        (**self).list_tasks(user).await
    }

    async fn insert_task(&self, user: UserId, task: &NewTask) -> anyhow::Result<TaskId> {
        (**self).insert_task(user, task).await
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> anyhow::Result<()> {
        (**self).update_task(id, patch).await
    }

    async fn delete_task(&self, id: TaskId) -> anyhow::Result<()> {
        (**self).delete_task(id).await
    }

    async fn batch_update_order(&self, updates: &[OrderUpdate]) -> Vec<anyhow::Result<()>> {
        (**self).batch_update_order(updates).await
    }
}

#[async_trait]
impl<T: PreferenceBackend + ?Sized> PreferenceBackend for Arc<T> {
    async fn get_preferences(&self, user: UserId) -> anyhow::Result<Option<Preferences>> {
        (**self).get_preferences(user).await
    }

    async fn create_default_preferences(&self, user: UserId) -> anyhow::Result<Preferences> {
        (**self).create_default_preferences(user).await
    }

    async fn update_preferences(&self, user: UserId, patch: &PreferencesPatch) -> anyhow::Result<()> {
        (**self).update_preferences(user, patch).await
    }
}

/// Who is signed in, if anyone.
pub trait Identity: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdentity(pub Option<UserId>);

impl StaticIdentity {
    pub fn signed_in(user: UserId) -> Self {
        Self(Some(user))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0
    }
}
