use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{PreferenceBackend, TaskBackend};
use crate::config::BackendSettings;
use crate::filter::GroupBy;
use crate::prefs::{Preferences, PreferencesPatch, ViewDensity};
use crate::task::{Category, CategoryTag, NewTask, Priority, Recurrence, Task, TaskId, TaskPatch, UserId};

const TASKS_TABLE: &str = "checklist_items";
const PREFERENCES_TABLE: &str = "user_preferences";

/// PostgREST-style adapter for the hosted database. Row-level security on
/// the server scopes every query to the caller.
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
}

impl RestBackend {
    pub fn new(settings: &BackendSettings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&settings.api_key).context("api key is not a valid header value")?,
        );
        let bearer = settings.access_token.as_deref().unwrap_or(&settings.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {bearer}"))
                .context("access token is not a valid header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/rest/v1/{table}", self.base_url)
        } else {
            format!("{}/rest/v1/{table}?{query}", self.base_url)
        }
    }

    fn request(&self, method: Method, table: &str, query: &str) -> RequestBuilder {
        self.client.request(method, self.table_url(table, query))
    }

    async fn send(&self, op: &str, request: RequestBuilder) -> anyhow::Result<String> {
        let response = request
            .send()
            .await
            .with_context(|| format!("{op}: request failed"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("{op}: failed reading response body"))?;
        debug!(op, %status, bytes = body.len(), "backend responded");

        if !status.is_success() {
            return Err(anyhow!("{op}: backend returned {status}: {}", body.trim()));
        }
        Ok(body)
    }
}

#[async_trait]
impl TaskBackend for RestBackend {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn list_tasks(&self, user: UserId) -> anyhow::Result<Vec<Task>> {
        let query = format!("select=*&user_id=eq.{user}&order=order.asc,created_at.asc");
        let body = self
            .send("list_tasks", self.request(Method::GET, TASKS_TABLE, &query))
            .await?;

        let rows: Vec<Value> = serde_json::from_str(&body).context("list_tasks: malformed rows")?;
        Ok(decode_rows(rows))
    }

    #[instrument(skip(self, task), fields(user_id = %user))]
    async fn insert_task(&self, user: UserId, task: &NewTask) -> anyhow::Result<TaskId> {
        let payload = insert_body(user, task);
        let request = self
            .request(Method::POST, TASKS_TABLE, "")
            .header("Prefer", "return=representation")
            .body(payload.to_string());
        let body = self.send("insert_task", request).await?;

        let rows: Vec<TaskRow> = serde_json::from_str(&body).context("insert_task: malformed rows")?;
        rows.first()
            .map(|row| TaskId(row.id))
            .ok_or_else(|| anyhow!("insert_task: backend returned no row"))
    }

    #[instrument(skip(self, patch), fields(task_id = %id))]
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> anyhow::Result<()> {
        let query = format!("id=eq.{id}");
        let request = self
            .request(Method::PATCH, TASKS_TABLE, &query)
            .body(patch_body(patch).to_string());
        self.send("update_task", request).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn delete_task(&self, id: TaskId) -> anyhow::Result<()> {
        let query = format!("id=eq.{id}");
        self.send("delete_task", self.request(Method::DELETE, TASKS_TABLE, &query))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceBackend for RestBackend {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn get_preferences(&self, user: UserId) -> anyhow::Result<Option<Preferences>> {
        let query = format!("select=*&user_id=eq.{user}&limit=1");
        let body = self
            .send("get_preferences", self.request(Method::GET, PREFERENCES_TABLE, &query))
            .await?;

        let rows: Vec<PreferencesRow> =
            serde_json::from_str(&body).context("get_preferences: malformed rows")?;
        Ok(rows.into_iter().next().map(Preferences::from))
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn create_default_preferences(&self, user: UserId) -> anyhow::Result<Preferences> {
        let defaults = Preferences::default();
        let payload = PreferencesRow {
            user_id: user.0,
            group_by: defaults.group_by,
            view_density: defaults.view_density,
            items_per_page: defaults.items_per_page,
        };
        let request = self
            .request(Method::POST, PREFERENCES_TABLE, "")
            .header("Prefer", "return=representation")
            .body(serde_json::to_string(&payload)?);
        let body = self.send("create_default_preferences", request).await?;

        let rows: Vec<PreferencesRow> =
            serde_json::from_str(&body).context("create_default_preferences: malformed rows")?;
        Ok(rows.into_iter().next().map(Preferences::from).unwrap_or(defaults))
    }

    #[instrument(skip(self, patch), fields(user_id = %user))]
    async fn update_preferences(&self, user: UserId, patch: &PreferencesPatch) -> anyhow::Result<()> {
        let query = format!("user_id=eq.{user}");
        let request = self
            .request(Method::PATCH, PREFERENCES_TABLE, &query)
            .body(serde_json::to_string(patch)?);
        self.send("update_preferences", request).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TaskRow {
    id: Uuid,
    user_id: Uuid,
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: Option<Priority>,
    category: CategoryTag,
    #[serde(default)]
    custom_category: Option<String>,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    reminder_date: Option<NaiveDate>,
    #[serde(default)]
    recurrence: Option<Recurrence>,
    #[serde(default)]
    order: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = anyhow::Error;

    fn try_from(row: TaskRow) -> anyhow::Result<Self> {
        let category = Category::from_parts(row.category, row.custom_category.as_deref())
            .with_context(|| format!("row {} has an invalid category", row.id))?;
        Ok(Task {
            id: TaskId(row.id),
            user_id: UserId(row.user_id),
            text: row.text,
            completed: row.completed,
            completed_at: row.completed_at,
            priority: row.priority.unwrap_or_default(),
            category,
            due_date: row.due_date,
            reminder_date: row.reminder_date,
            recurrence: row.recurrence.unwrap_or_default(),
            order: row.order.unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PreferencesRow {
    user_id: Uuid,
    #[serde(default)]
    group_by: GroupBy,
    #[serde(default)]
    view_density: ViewDensity,
    items_per_page: usize,
}

impl From<PreferencesRow> for Preferences {
    fn from(row: PreferencesRow) -> Self {
        Preferences {
            group_by: row.group_by,
            view_density: row.view_density,
            items_per_page: row.items_per_page,
        }
    }
}

/// Rows that do not map onto a task (unknown category tag, custom category
/// without a label) are dropped with a warning; the rest still load.
fn decode_rows(rows: Vec<Value>) -> Vec<Task> {
    rows.into_iter()
        .filter_map(|raw| {
            let row_id = raw.get("id").cloned().unwrap_or(Value::Null);
            let decoded = serde_json::from_value::<TaskRow>(raw)
                .context("row does not match the task columns")
                .and_then(Task::try_from);
            match decoded {
                Ok(task) => Some(task),
                Err(err) => {
                    let detail = format!("{err:#}");
                    warn!(row_id = %row_id, error = %detail, "skipping undecodable task row");
                    None
                }
            }
        })
        .collect()
}

fn insert_body(user: UserId, task: &NewTask) -> Value {
    json!({
        "user_id": user.0,
        "text": task.text,
        "completed": false,
        "priority": task.priority,
        "category": task.category.tag(),
        "custom_category": task.category.custom_label(),
        "due_date": task.due_date,
        "reminder_date": task.reminder_date,
        "recurrence": task.recurrence,
        "order": task.order,
    })
}

/// Only the columns the patch touches; a category change always rewrites
/// both category columns.
fn patch_body(patch: &TaskPatch) -> Value {
    let mut body = Map::new();
    if let Some(text) = &patch.text {
        body.insert("text".into(), json!(text));
    }
    if let Some(completed) = patch.completed {
        body.insert("completed".into(), json!(completed));
    }
    if let Some(completed_at) = patch.completed_at {
        body.insert("completed_at".into(), json!(completed_at));
    }
    if let Some(priority) = patch.priority {
        body.insert("priority".into(), json!(priority));
    }
    if let Some(category) = &patch.category {
        body.insert("category".into(), json!(category.tag()));
        body.insert("custom_category".into(), json!(category.custom_label()));
    }
    if let Some(due) = patch.due_date {
        body.insert("due_date".into(), json!(due));
    }
    if let Some(reminder) = patch.reminder_date {
        body.insert("reminder_date".into(), json!(reminder));
    }
    if let Some(recurrence) = patch.recurrence {
        body.insert("recurrence".into(), json!(recurrence));
    }
    if let Some(order) = patch.order {
        body.insert("order".into(), json!(order));
    }
    Value::Object(body)
}
