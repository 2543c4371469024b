use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{Identity, TaskBackend};
use crate::filter::{GroupBy, TaskQuery};
use crate::paging::Pagination;
use crate::reorder::order_updates;
use crate::stats::TaskStats;
use crate::task::{NewTask, Task, TaskId, TaskPatch, UserId};
use crate::view::ChecklistView;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no signed-in user; sign in to change the checklist")]
    Unauthenticated,
    #[error("task text cannot be empty")]
    EmptyText,
    #[error("completion changes go through toggle, not edit")]
    CompletionNotEditable,
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("reorder incomplete: {failed} of {total} order update(s) failed")]
    ReorderIncomplete { failed: usize, total: usize },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owns the signed-in user's checklist.
///
/// Every successful mutation is followed by a full reload from the backend;
/// there is no local patching of the list. Mutations are not queued, so two
/// in flight at once race and whichever reload lands last wins.
pub struct TaskStore<B, I> {
    backend: B,
    identity: I,
    tasks: Vec<Task>,
    generation: u64,
    stats_cache: Option<(u64, NaiveDate, TaskStats)>,
}

impl<B, I> TaskStore<B, I>
where
    B: TaskBackend,
    I: Identity,
{
    pub fn new(backend: B, identity: I) -> Self {
        Self {
            backend,
            identity,
            tasks: Vec::new(),
            generation: 0,
            stats_cache: None,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Bumped on every reload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the local list with the backend's.
    #[instrument(skip(self))]
    pub async fn reload(&mut self) -> StoreResult<()> {
        let Some(user) = self.identity.current_user() else {
            warn!("reload without a signed-in user; clearing checklist");
            self.replace_tasks(Vec::new());
            return Err(StoreError::Unauthenticated);
        };

        let tasks = self
            .backend
            .list_tasks(user)
            .await
            .map_err(|err| backend_failure("list_tasks", err))?;
        debug!(user_id = %user, count = tasks.len(), "reloaded checklist");
        self.replace_tasks(tasks);
        Ok(())
    }

    #[instrument(skip(self, new), fields(text = %new.text))]
    pub async fn add_task(&mut self, mut new: NewTask) -> StoreResult<TaskId> {
        let user = self.require_user()?;
        if !new.has_text() {
            return Err(StoreError::EmptyText);
        }
        new.text = new.text.trim().to_string();
        new.order = self.next_order();

        let id = self
            .backend
            .insert_task(user, &new)
            .await
            .map_err(|err| backend_failure("insert_task", err))?;
        info!(task_id = %id, order = new.order, "added task");

        self.reload().await?;
        Ok(id)
    }

    /// Sends only the fields present in `patch`. An empty patch is a no-op.
    /// `completed` and `completed_at` are refused here so the pair can only
    /// move together through [`TaskStore::toggle_task`].
    #[instrument(skip(self, patch), fields(task_id = %id))]
    pub async fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> StoreResult<()> {
        self.require_user()?;
        if patch.touches_completion() {
            warn!("edit tried to change completion; use toggle");
            return Err(StoreError::CompletionNotEditable);
        }
        if patch.has_empty_text() {
            return Err(StoreError::EmptyText);
        }
        if patch.is_empty() {
            debug!("empty patch; nothing to send");
            return Ok(());
        }

        self.backend
            .update_task(id, &patch)
            .await
            .map_err(|err| backend_failure("update_task", err))?;
        info!("updated task");

        self.reload().await
    }

    /// Flips completion and returns the new state. Callers that want an
    /// instant local echo can show [`Task::toggled`] until the reload lands.
    #[instrument(skip(self, now), fields(task_id = %id))]
    pub async fn toggle_task(&mut self, id: TaskId, now: DateTime<Utc>) -> StoreResult<bool> {
        self.require_user()?;
        let task = self.get(id).ok_or(StoreError::NotFound(id))?;
        let patch = TaskPatch::toggle_from(task, now);
        let completed = patch.completed.unwrap_or(!task.completed);

        self.backend
            .update_task(id, &patch)
            .await
            .map_err(|err| backend_failure("toggle_task", err))?;
        info!(completed, "toggled task");

        self.reload().await?;
        Ok(completed)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn delete_task(&mut self, id: TaskId) -> StoreResult<()> {
        self.require_user()?;

        self.backend
            .delete_task(id)
            .await
            .map_err(|err| backend_failure("delete_task", err))?;
        info!("deleted task");

        self.reload().await
    }

    /// Persists a group's new visual order as 0-based positions. The whole
    /// batch is attempted and the list is reloaded even when some updates
    /// fail.
    #[instrument(skip(self, ordered_ids), fields(count = ordered_ids.len()))]
    pub async fn reorder_tasks(&mut self, ordered_ids: &[TaskId]) -> StoreResult<()> {
        self.require_user()?;
        if ordered_ids.is_empty() {
            return Ok(());
        }

        let updates = order_updates(ordered_ids);
        let results = self.backend.batch_update_order(&updates).await;

        let mut failed = 0;
        for (update, result) in updates.iter().zip(results) {
            if let Err(err) = result {
                failed += 1;
                let detail = format!("{err:#}");
                error!(task_id = %update.id, order = update.order, error = %detail, "order update failed");
            }
        }

        self.reload().await?;

        if failed > 0 {
            warn!(failed, total = updates.len(), "reorder partially applied");
            return Err(StoreError::ReorderIncomplete {
                failed,
                total: updates.len(),
            });
        }
        info!(total = updates.len(), "reordered tasks");
        Ok(())
    }

    /// Aggregates over the full list, cached until the next reload or day
    /// change.
    pub fn stats(&mut self, today: NaiveDate) -> TaskStats {
        if let Some((generation, day, stats)) = self.stats_cache
            && generation == self.generation
            && day == today
        {
            return stats;
        }

        let stats = TaskStats::compute(&self.tasks, today);
        self.stats_cache = Some((self.generation, today, stats));
        stats
    }

    pub fn view(
        &self,
        query: &TaskQuery,
        group_by: GroupBy,
        pagination: Pagination,
        today: NaiveDate,
    ) -> ChecklistView<'_> {
        ChecklistView::build(&self.tasks, query, group_by, pagination, today)
    }

    /// Next manual position: one past the highest, or 0 for an empty list.
    pub fn next_order(&self) -> i64 {
        self.tasks
            .iter()
            .map(|task| task.order)
            .max()
            .map_or(0, |max| max + 1)
    }

    fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.generation += 1;
        self.stats_cache = None;
    }

    fn require_user(&self) -> StoreResult<UserId> {
        self.identity.current_user().ok_or_else(|| {
            warn!("mutation refused: no signed-in user");
            StoreError::Unauthenticated
        })
    }
}

fn backend_failure(op: &'static str, err: anyhow::Error) -> StoreError {
    let detail = format!("{err:#}");
    error!(op, error = %detail, "backend call failed");
    StoreError::Backend(err)
}
