use chrono::NaiveDate;
use serde::Serialize;

use crate::task::{Priority, Task};

/// Aggregates over the full, unfiltered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub high_priority: usize,
    /// Whole percent, 0 for an empty list.
    pub completion_rate: u32,
}

impl TaskStats {
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let open = || tasks.iter().filter(|task| !task.completed);

        let overdue = open().filter(|task| task.is_overdue(today)).count();
        let due_today = tasks.iter().filter(|task| task.is_due_today(today)).count();
        let high_priority = open()
            .filter(|task| task.priority == Priority::High)
            .count();

        Self {
            total,
            completed,
            pending: total - completed,
            overdue,
            due_today,
            high_priority,
            completion_rate: completion_rate(completed, total),
        }
    }
}

fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::task::{Category, Recurrence, TaskId, UserId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    fn task(completed: bool, priority: Priority, due: Option<NaiveDate>) -> Task {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        Task {
            id: TaskId::random(),
            user_id: UserId(Uuid::nil()),
            text: "job".to_string(),
            completed,
            completed_at: completed.then_some(now),
            priority,
            category: Category::Admin,
            due_date: due,
            reminder_date: None,
            recurrence: Recurrence::None,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_list_has_zero_rate() {
        let stats = TaskStats::compute(&[], today());
        assert_eq!(stats, TaskStats::default());
    }

    #[test]
    fn four_of_ten_completed_is_forty_percent() {
        let mut tasks: Vec<Task> = (0..4).map(|_| task(true, Priority::None, None)).collect();
        tasks.extend((0..6).map(|_| task(false, Priority::None, None)));

        let stats = TaskStats::compute(&tasks, today());
        assert_eq!(stats.total, 10);
        assert_eq!(stats.completed + stats.pending, stats.total);
        assert_eq!(stats.completion_rate, 40);
    }

    #[test]
    fn rate_rounds_to_nearest_percent() {
        let tasks = vec![
            task(true, Priority::None, None),
            task(true, Priority::None, None),
            task(false, Priority::None, None),
        ];
        assert_eq!(TaskStats::compute(&tasks, today()).completion_rate, 67);
    }

    #[test]
    fn overdue_and_high_priority_ignore_completed() {
        let yesterday = today().pred_opt();
        let tasks = vec![
            task(false, Priority::High, yesterday),
            task(true, Priority::High, yesterday),
            task(false, Priority::Low, Some(today())),
        ];

        let stats = TaskStats::compute(&tasks, today());
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.high_priority, 1);
        assert_eq!(stats.due_today, 1);
    }
}
