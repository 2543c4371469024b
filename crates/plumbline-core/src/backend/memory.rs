use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use super::{PreferenceBackend, TaskBackend};
use crate::prefs::{Preferences, PreferencesPatch};
use crate::task::{NewTask, Task, TaskId, TaskPatch, UserId};

/// In-process backend with the same ordering and ownership rules as the
/// hosted one. Failures can be injected per task or globally.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    preferences: HashMap<UserId, Preferences>,
    failing_updates: HashSet<TaskId>,
    offline: bool,
    calls: usize,
}

impl MemoryState {
    fn begin(&mut self, op: &str) -> anyhow::Result<()> {
        self.calls += 1;
        debug!(op, calls = self.calls, "memory backend call");
        if self.offline {
            return Err(anyhow!("{op}: backend unreachable"));
        }
        Ok(())
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let backend = Self::default();
        backend.state.lock().tasks = tasks;
        backend
    }

    /// Makes every later update of `id` fail.
    pub fn fail_updates_for(&self, id: TaskId) {
        self.state.lock().failing_updates.insert(id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Number of backend calls served so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.state.lock().tasks.clone()
    }

    pub fn stored_preferences(&self, user: UserId) -> Option<Preferences> {
        self.state.lock().preferences.get(&user).copied()
    }
}

#[async_trait]
impl TaskBackend for MemoryBackend {
    async fn list_tasks(&self, user: UserId) -> anyhow::Result<Vec<Task>> {
        let mut state = self.state.lock();
        state.begin("list_tasks")?;

        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|task| task.user_id == user)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(tasks)
    }

    async fn insert_task(&self, user: UserId, new: &NewTask) -> anyhow::Result<TaskId> {
        let mut state = self.state.lock();
        state.begin("insert_task")?;

        let now = Utc::now();
        let task = Task {
            id: TaskId::random(),
            user_id: user,
            text: new.text.clone(),
            completed: false,
            completed_at: None,
            priority: new.priority,
            category: new.category.clone(),
            due_date: new.due_date,
            reminder_date: new.reminder_date,
            recurrence: new.recurrence,
            order: new.order,
            created_at: now,
            updated_at: now,
        };
        let id = task.id;
        state.tasks.push(task);
        Ok(id)
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.begin("update_task")?;
        if state.failing_updates.contains(&id) {
            return Err(anyhow!("update_task: rejected update for {id}"));
        }

        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| anyhow!("update_task: no row with id {id}"))?;
        patch.apply_to(task);
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_task(&self, id: TaskId) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.begin("delete_task")?;

        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != id);
        if state.tasks.len() == before {
            return Err(anyhow!("delete_task: no row with id {id}"));
        }
        Ok(())
    }
}

#[async_trait]
impl PreferenceBackend for MemoryBackend {
    async fn get_preferences(&self, user: UserId) -> anyhow::Result<Option<Preferences>> {
        let mut state = self.state.lock();
        state.begin("get_preferences")?;
        Ok(state.preferences.get(&user).copied())
    }

    async fn create_default_preferences(&self, user: UserId) -> anyhow::Result<Preferences> {
        let mut state = self.state.lock();
        state.begin("create_default_preferences")?;
        let prefs = *state.preferences.entry(user).or_default();
        Ok(prefs)
    }

    async fn update_preferences(&self, user: UserId, patch: &PreferencesPatch) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.begin("update_preferences")?;
        let prefs = state.preferences.entry(user).or_default();
        patch.apply_to(prefs);
        Ok(())
    }
}
