use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|err| anyhow!("invalid task id {s:?}: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|err| anyhow!("invalid user id {s:?}: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    #[default]
    None,
}

impl Priority {
    /// Display order used by priority grouping.
    pub const ALL: [Priority; 4] = [Priority::High, Priority::Medium, Priority::Low, Priority::None];

    /// Lower ranks sort first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
            Priority::None => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::None => "No priority",
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            "none" | "" => Ok(Priority::None),
            other => Err(anyhow!("unknown priority: {other}")),
        }
    }
}

/// Category discriminant without the custom label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryTag {
    Repair,
    FollowUp,
    Materials,
    Travel,
    Admin,
    Training,
    Custom,
}

impl CategoryTag {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryTag::Repair => "repair",
            CategoryTag::FollowUp => "follow-up",
            CategoryTag::Materials => "materials",
            CategoryTag::Travel => "travel",
            CategoryTag::Admin => "admin",
            CategoryTag::Training => "training",
            CategoryTag::Custom => "custom",
        }
    }
}

impl FromStr for CategoryTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "repair" => Ok(CategoryTag::Repair),
            "follow-up" | "followup" | "follow_up" => Ok(CategoryTag::FollowUp),
            "materials" => Ok(CategoryTag::Materials),
            "travel" => Ok(CategoryTag::Travel),
            "admin" => Ok(CategoryTag::Admin),
            "training" => Ok(CategoryTag::Training),
            "custom" => Ok(CategoryTag::Custom),
            other => Err(anyhow!("unknown category: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Repair,
    FollowUp,
    Materials,
    Travel,
    #[default]
    Admin,
    Training,
    Custom(String),
}

impl Category {
    pub fn tag(&self) -> CategoryTag {
        match self {
            Category::Repair => CategoryTag::Repair,
            Category::FollowUp => CategoryTag::FollowUp,
            Category::Materials => CategoryTag::Materials,
            Category::Travel => CategoryTag::Travel,
            Category::Admin => CategoryTag::Admin,
            Category::Training => CategoryTag::Training,
            Category::Custom(_) => CategoryTag::Custom,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Category::Repair => "Repair",
            Category::FollowUp => "Follow-up",
            Category::Materials => "Materials",
            Category::Travel => "Travel",
            Category::Admin => "Admin",
            Category::Training => "Training",
            Category::Custom(label) => label.as_str(),
        }
    }

    pub fn custom_label(&self) -> Option<&str> {
        match self {
            Category::Custom(label) => Some(label.as_str()),
            _ => None,
        }
    }

    /// Rebuilds a category from its stored tag and free-text label.
    pub fn from_parts(tag: CategoryTag, custom: Option<&str>) -> anyhow::Result<Self> {
        Ok(match tag {
            CategoryTag::Repair => Category::Repair,
            CategoryTag::FollowUp => Category::FollowUp,
            CategoryTag::Materials => Category::Materials,
            CategoryTag::Travel => Category::Travel,
            CategoryTag::Admin => Category::Admin,
            CategoryTag::Training => Category::Training,
            CategoryTag::Custom => {
                let label = custom.map(str::trim).unwrap_or_default();
                if label.is_empty() {
                    return Err(anyhow!("custom category requires a label"));
                }
                Category::Custom(label.to_string())
            }
        })
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    /// Accepts a fixed category name, or `custom:<label>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(label) = s.trim().strip_prefix("custom:") {
            return Category::from_parts(CategoryTag::Custom, Some(label));
        }
        let tag: CategoryTag = s.parse()?;
        Category::from_parts(tag, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
            Recurrence::Yearly => "yearly",
        }
    }
}

impl FromStr for Recurrence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "yearly" => Ok(Recurrence::Yearly),
            other => Err(anyhow!("unknown recurrence: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub text: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub category: Category,
    pub due_date: Option<NaiveDate>,
    pub reminder_date: Option<NaiveDate>,
    pub recurrence: Recurrence,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date.is_some_and(|due| due < today)
    }

    pub fn is_due_today(&self, today: NaiveDate) -> bool {
        self.due_date == Some(today)
    }

    /// Local copy with the completion flipped, for display ahead of the
    /// next re-fetch.
    pub fn toggled(&self, now: DateTime<Utc>) -> Task {
        let mut copy = self.clone();
        TaskPatch::toggle_from(self, now).apply_to(&mut copy);
        copy
    }
}

/// Insert payload. `order` is filled in by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTask {
    pub text: String,
    pub priority: Priority,
    pub category: Category,
    pub due_date: Option<NaiveDate>,
    pub reminder_date: Option<NaiveDate>,
    pub recurrence: Recurrence,
    pub order: i64,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_due_date(mut self, due: Option<NaiveDate>) -> Self {
        self.due_date = due;
        self
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Partial update. `None` fields are left untouched and never sent; the
/// nested options on nullable columns distinguish "clear" from "keep".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub due_date: Option<Option<NaiveDate>>,
    pub reminder_date: Option<Option<NaiveDate>>,
    pub recurrence: Option<Recurrence>,
    pub order: Option<i64>,
}

impl TaskPatch {
    pub fn toggle_from(task: &Task, now: DateTime<Utc>) -> Self {
        let completed = !task.completed;
        Self {
            completed: Some(completed),
            completed_at: Some(completed.then_some(now)),
            ..Self::default()
        }
    }

    pub fn order(order: i64) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn touches_completion(&self) -> bool {
        self.completed.is_some() || self.completed_at.is_some()
    }

    pub fn has_empty_text(&self) -> bool {
        self.text.as_deref().is_some_and(|text| text.trim().is_empty())
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = completed_at;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = &self.category {
            task.category = category.clone();
        }
        if let Some(due) = self.due_date {
            task.due_date = due;
        }
        if let Some(reminder) = self.reminder_date {
            task.reminder_date = reminder;
        }
        if let Some(recurrence) = self.recurrence {
            task.recurrence = recurrence;
        }
        if let Some(order) = self.order {
            task.order = order;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample(now: DateTime<Utc>) -> Task {
        Task {
            id: TaskId::random(),
            user_id: UserId(Uuid::new_v4()),
            text: "Check boiler".to_string(),
            completed: false,
            completed_at: None,
            priority: Priority::High,
            category: Category::Repair,
            due_date: None,
            reminder_date: None,
            recurrence: Recurrence::None,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn toggling_twice_restores_completion_state() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let task = sample(now);

        let done = task.toggled(now);
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(now));

        let undone = done.toggled(now);
        assert!(!undone.completed);
        assert_eq!(undone.completed_at, None);
        assert_eq!(undone, task);
    }

    #[test]
    fn custom_category_needs_label() {
        assert!(Category::from_parts(CategoryTag::Custom, None).is_err());
        assert!(Category::from_parts(CategoryTag::Custom, Some("  ")).is_err());

        let parsed: Category = "custom:Warranty".parse().unwrap();
        assert_eq!(parsed, Category::Custom("Warranty".to_string()));
        assert_eq!(parsed.tag(), CategoryTag::Custom);

        let fixed: Category = "follow-up".parse().unwrap();
        assert_eq!(fixed, Category::FollowUp);
        assert_eq!(fixed.custom_label(), None);
    }

    #[test]
    fn empty_patch_detection() {
        assert!(TaskPatch::default().is_empty());
        assert!(!TaskPatch::order(3).is_empty());
        let blank = TaskPatch {
            text: Some("   ".to_string()),
            ..TaskPatch::default()
        };
        assert!(blank.has_empty_text());
    }
}
