use chrono::NaiveDate;
use tracing::debug;

use crate::filter::{GroupBy, TaskGroup, TaskQuery, filter_and_sort, group_tasks};
use crate::paging::{PageInfo, Pagination};
use crate::task::Task;

/// What the checklist shows for one set of inputs.
///
/// The incomplete partition is paginated first and only the page's slice is
/// grouped, so a group that straddles a page boundary appears partially on
/// each page. Completed tasks skip pagination and grouping entirely.
#[derive(Debug, Clone)]
pub struct ChecklistView<'a> {
    pub groups: Vec<TaskGroup<'a>>,
    pub completed: Vec<&'a Task>,
    pub pagination: Pagination,
    pub page: PageInfo,
    pub group_by: GroupBy,
}

impl<'a> ChecklistView<'a> {
    #[tracing::instrument(skip(tasks, query, today))]
    pub fn build(
        tasks: &'a [Task],
        query: &TaskQuery,
        group_by: GroupBy,
        pagination: Pagination,
        today: NaiveDate,
    ) -> Self {
        let visible = filter_and_sort(tasks, query, today);
        let (todo, completed): (Vec<&Task>, Vec<&Task>) =
            visible.into_iter().partition(|task| !task.completed);

        let pagination = pagination.clamped(todo.len());
        let page = pagination.page_info(todo.len());
        let groups = group_tasks(pagination.slice(&todo), group_by, today);

        debug!(
            todo = todo.len(),
            completed = completed.len(),
            page = page.page,
            total_pages = page.total_pages,
            groups = groups.len(),
            "built checklist view"
        );

        Self {
            groups,
            completed,
            pagination,
            page,
            group_by,
        }
    }

    /// Incomplete tasks on the current page, in display order.
    pub fn page_tasks(&self) -> impl Iterator<Item = &'a Task> + '_ {
        self.groups.iter().flat_map(|group| group.tasks.iter().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.completed.is_empty()
    }
}
