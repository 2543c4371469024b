use std::cmp::Ordering;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

use crate::task::{
  Category,
  CategoryTag,
  Priority,
  Task
};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(CategoryTag)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum DateFilter {
  #[default]
  All,
  Today,
  Overdue,
  Upcoming,
  NoDate
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum StatusFilter {
  #[default]
  All,
  Completed,
  Pending
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
  #[default]
  None,
  Category,
  Priority,
  Date
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum DateBucket {
  Overdue,
  Today,
  ThisWeek,
  ThisMonth,
  Future,
  NoDate
}

impl DateBucket {
  /// Display order used by date
  /// grouping.
  pub const ALL: [DateBucket; 6] = [
    DateBucket::Overdue,
    DateBucket::Today,
    DateBucket::ThisWeek,
    DateBucket::ThisMonth,
    DateBucket::Future,
    DateBucket::NoDate
  ];

  pub fn for_due(
    due: Option<NaiveDate>,
    today: NaiveDate
  ) -> Self {
    let Some(due) = due else {
      return DateBucket::NoDate;
    };
    if due < today {
      return DateBucket::Overdue;
    }
    if due == today {
      return DateBucket::Today;
    }

    let days_out =
      (due - today).num_days();
    if days_out <= 7 {
      DateBucket::ThisWeek
    } else if days_out <= 30 {
      DateBucket::ThisMonth
    } else {
      DateBucket::Future
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | DateBucket::Overdue => "Overdue",
      | DateBucket::Today => "Today",
      | DateBucket::ThisWeek => {
        "This week"
      }
      | DateBucket::ThisMonth => {
        "This month"
      }
      | DateBucket::Future => "Later",
      | DateBucket::NoDate => "No date"
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
  All,
  Category(Category),
  Priority(Priority),
  Date(DateBucket)
}

impl GroupKey {
  pub fn label(&self) -> &str {
    match self {
      | GroupKey::All => "Tasks",
      | GroupKey::Category(category) => {
        category.label()
      }
      | GroupKey::Priority(priority) => {
        priority.label()
      }
      | GroupKey::Date(bucket) => {
        bucket.label()
      }
    }
  }
}

#[derive(Debug, Clone)]
pub struct TaskGroup<'a> {
  pub key:   GroupKey,
  pub tasks: Vec<&'a Task>
}

impl TaskGroup<'_> {
  pub fn ids(
    &self
  ) -> Vec<crate::task::TaskId> {
    self
      .tasks
      .iter()
      .map(|task| task.id)
      .collect()
  }
}

/// User-selected criteria for the
/// checklist.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
  pub search:   String,
  pub priority: PriorityFilter,
  pub category: CategoryFilter,
  pub date:     DateFilter,
  pub status:   StatusFilter
}

impl TaskQuery {
  /// Whether manual ordering gives way
  /// to priority ordering. The status
  /// filter only picks a partition, so
  /// it does not count.
  pub fn has_active_filters(
    &self
  ) -> bool {
    !self.search.trim().is_empty()
      || self.priority
        != PriorityFilter::All
      || self.category
        != CategoryFilter::All
      || self.date != DateFilter::All
  }

  #[tracing::instrument(
    skip(self, task, today),
    level = "trace"
  )]
  pub fn matches(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    let checks = [
      self.matches_search(task),
      self.matches_priority(task),
      self.matches_category(task),
      self.matches_date(task, today),
      self.matches_status(task)
    ];
    let ok =
      checks.iter().all(|check| *check);

    trace!(task_id = %task.id, ?checks, ok, "filter predicate evaluation");
    ok
  }

  fn matches_search(
    &self,
    task: &Task
  ) -> bool {
    let needle =
      self.search.trim().to_lowercase();
    needle.is_empty()
      || task
        .text
        .to_lowercase()
        .contains(&needle)
  }

  fn matches_priority(
    &self,
    task: &Task
  ) -> bool {
    match self.priority {
      | PriorityFilter::All => true,
      | PriorityFilter::Only(
        priority
      ) => task.priority == priority
    }
  }

  fn matches_category(
    &self,
    task: &Task
  ) -> bool {
    match self.category {
      | CategoryFilter::All => true,
      | CategoryFilter::Only(tag) => {
        task.category.tag() == tag
      }
    }
  }

  fn matches_date(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    match (self.date, task.due_date) {
      | (DateFilter::All, _) => true,
      | (DateFilter::NoDate, due) => {
        due.is_none()
      }
      | (_, None) => false,
      | (DateFilter::Today, Some(due)) => {
        due == today
      }
      | (
        DateFilter::Overdue,
        Some(due)
      ) => due < today,
      | (
        DateFilter::Upcoming,
        Some(due)
      ) => due > today
    }
  }

  fn matches_status(
    &self,
    task: &Task
  ) -> bool {
    match self.status {
      | StatusFilter::All => true,
      | StatusFilter::Completed => {
        task.completed
      }
      | StatusFilter::Pending => {
        !task.completed
      }
    }
  }
}

/// Applies the query and returns the
/// survivors in display order.
#[tracing::instrument(skip(
  tasks, query, today
))]
pub fn filter_and_sort<'a>(
  tasks: &'a [Task],
  query: &TaskQuery,
  today: NaiveDate
) -> Vec<&'a Task> {
  let mut visible: Vec<&Task> = tasks
    .iter()
    .filter(|task| {
      query.matches(task, today)
    })
    .collect();
  sort_tasks(
    &mut visible,
    query.has_active_filters()
  );

  trace!(
    total = tasks.len(),
    visible = visible.len(),
    "filtered checklist"
  );
  visible
}

pub fn sort_tasks(
  tasks: &mut [&Task],
  filters_active: bool
) {
  tasks.sort_by(|a, b| {
    compare_tasks(a, b, filters_active)
  });
}

/// Incomplete first; manual order when
/// nothing narrows the view; otherwise
/// priority, then due date (dated
/// first, earlier first), then order.
pub fn compare_tasks(
  a: &Task,
  b: &Task,
  filters_active: bool
) -> Ordering {
  let by_completion =
    a.completed.cmp(&b.completed);
  if by_completion != Ordering::Equal {
    return by_completion;
  }

  if !filters_active
    && !a.completed
    && !b.completed
  {
    let by_order = a.order.cmp(&b.order);
    if by_order != Ordering::Equal {
      return by_order;
    }
  }

  a.priority
    .rank()
    .cmp(&b.priority.rank())
    .then_with(|| {
      compare_due(
        a.due_date, b.due_date
      )
    })
    .then_with(|| a.order.cmp(&b.order))
}

fn compare_due(
  a: Option<NaiveDate>,
  b: Option<NaiveDate>
) -> Ordering {
  match (a, b) {
    | (Some(a), Some(b)) => a.cmp(&b),
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => Ordering::Equal
  }
}

/// Buckets already-sorted tasks. Empty
/// buckets are omitted; priority and
/// date buckets keep their canonical
/// order, category buckets keep first
/// appearance.
#[tracing::instrument(skip(
  tasks, today
))]
pub fn group_tasks<'a>(
  tasks: &[&'a Task],
  group_by: GroupBy,
  today: NaiveDate
) -> Vec<TaskGroup<'a>> {
  if tasks.is_empty() {
    return Vec::new();
  }

  match group_by {
    | GroupBy::None => {
      vec![TaskGroup {
        key:   GroupKey::All,
        tasks: tasks.to_vec()
      }]
    }
    | GroupBy::Category => {
      let mut groups: Vec<TaskGroup> =
        Vec::new();
      for task in tasks.iter().copied() {
        match groups.iter_mut().find(
          |group| {
            matches!(
              &group.key,
              GroupKey::Category(category)
                if *category == task.category
            )
          }
        ) {
          | Some(group) => {
            group.tasks.push(task)
          }
          | None => {
            groups.push(TaskGroup {
              key:   GroupKey::Category(
                task.category.clone()
              ),
              tasks: vec![task]
            })
          }
        }
      }
      groups
    }
    | GroupBy::Priority => {
      Priority::ALL
        .iter()
        .map(|priority| {
          TaskGroup {
            key:   GroupKey::Priority(
              *priority
            ),
            tasks: tasks
              .iter()
              .copied()
              .filter(|task| {
                task.priority
                  == *priority
              })
              .collect()
          }
        })
        .filter(|group| {
          !group.tasks.is_empty()
        })
        .collect()
    }
    | GroupBy::Date => {
      DateBucket::ALL
        .iter()
        .map(|bucket| {
          TaskGroup {
            key:   GroupKey::Date(
              *bucket
            ),
            tasks: tasks
              .iter()
              .copied()
              .filter(|task| {
                DateBucket::for_due(
                  task.due_date,
                  today
                ) == *bucket
              })
              .collect()
          }
        })
        .filter(|group| {
          !group.tasks.is_empty()
        })
        .collect()
    }
  }
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim()
      .eq_ignore_ascii_case("all")
    {
      return Ok(PriorityFilter::All);
    }
    Ok(PriorityFilter::Only(s.parse()?))
  }
}

impl FromStr for CategoryFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if s.trim()
      .eq_ignore_ascii_case("all")
    {
      return Ok(CategoryFilter::All);
    }
    Ok(CategoryFilter::Only(s.parse()?))
  }
}

impl FromStr for DateFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(DateFilter::All),
      | "today" => Ok(DateFilter::Today),
      | "overdue" => {
        Ok(DateFilter::Overdue)
      }
      | "upcoming" => {
        Ok(DateFilter::Upcoming)
      }
      | "no-date" | "nodate" | "none" => {
        Ok(DateFilter::NoDate)
      }
      | other => Err(anyhow!(
        "unknown date filter: {other}"
      ))
    }
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(StatusFilter::All),
      | "completed" | "done" => {
        Ok(StatusFilter::Completed)
      }
      | "pending" | "todo" => {
        Ok(StatusFilter::Pending)
      }
      | other => Err(anyhow!(
        "unknown status filter: {other}"
      ))
    }
  }
}

impl FromStr for GroupBy {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "none" => Ok(GroupBy::None),
      | "category" => {
        Ok(GroupBy::Category)
      }
      | "priority" => {
        Ok(GroupBy::Priority)
      }
      | "date" => Ok(GroupBy::Date),
      | other => Err(anyhow!(
        "unknown grouping: {other}"
      ))
    }
  }
}

impl GroupBy {
  pub fn as_str(self) -> &'static str {
    match self {
      | GroupBy::None => "none",
      | GroupBy::Category => "category",
      | GroupBy::Priority => "priority",
      | GroupBy::Date => "date"
    }
  }
}
