use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::commands::short_id;
use crate::config::Config;
use crate::datetime::format_date;
use crate::prefs::{Preferences, ViewDensity};
use crate::stats::TaskStats;
use crate::task::{Priority, Recurrence, Task};
use crate::view::ChecklistView;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, view, today))]
    pub fn print_checklist(
        &mut self,
        view: &ChecklistView<'_>,
        today: NaiveDate,
        density: ViewDensity,
        show_completed: bool,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_checklist(&mut out, view, today, density, show_completed)
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_stats(&mut self, stats: &TaskStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_stats(&mut out, stats)
    }

    pub fn print_prefs(&mut self, prefs: &Preferences) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "group_by        {}", prefs.group_by.as_str())?;
        writeln!(out, "view_density    {}", prefs.view_density.as_str())?;
        writeln!(out, "items_per_page  {}", prefs.items_per_page)?;
        Ok(())
    }

    fn write_checklist<W: Write>(
        &self,
        mut out: W,
        view: &ChecklistView<'_>,
        today: NaiveDate,
        density: ViewDensity,
        show_completed: bool,
    ) -> anyhow::Result<()> {
        if view.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        for (idx, group) in view.groups.iter().enumerate() {
            if idx > 0 && density == ViewDensity::Comfortable {
                writeln!(out)?;
            }
            let header = format!("{} ({})", group.key.label(), group.tasks.len());
            writeln!(out, "{}", self.paint(&header, Tone::Heading))?;

            match density {
                ViewDensity::Comfortable => self.write_task_table(&mut out, &group.tasks, today)?,
                ViewDensity::Compact => {
                    for task in &group.tasks {
                        writeln!(out, "{}", self.compact_line(task, today))?;
                    }
                }
            }
        }

        let page = view.page;
        if page.total_items > 0 {
            writeln!(
                out,
                "\nPage {} of {}, tasks {}-{} of {}{}{}",
                page.page,
                page.total_pages.max(1),
                page.start + 1,
                page.end,
                page.total_items,
                if page.has_previous() { "  [--page prev]" } else { "" },
                if page.has_next() { "  [--page next]" } else { "" },
            )?;
        }

        if !view.completed.is_empty() {
            let header = format!("\nCompleted ({})", view.completed.len());
            writeln!(out, "{}", self.paint(&header, Tone::Muted))?;
            if show_completed {
                for task in &view.completed {
                    writeln!(out, "{}", self.compact_line(task, today))?;
                }
            } else {
                writeln!(out, "  (hidden; pass --show-completed to expand)")?;
            }
        }

        Ok(())
    }

    fn write_task_table<W: Write>(&self, out: W, tasks: &[&Task], today: NaiveDate) -> anyhow::Result<()> {
        let mut table = Table::new(["ID", "Pri", "Category", "Due", "Task"]);
        for task in tasks {
            table.push([
                self.paint(&short_id(task.id), Tone::Marker),
                self.priority_cell(task.priority),
                task.category.label().to_string(),
                self.due_cell(task, today),
                describe(task),
            ]);
        }
        table.write_to(out)
    }

    fn write_stats<W: Write>(&self, mut out: W, stats: &TaskStats) -> anyhow::Result<()> {
        writeln!(out, "total          {}", stats.total)?;
        writeln!(out, "completed      {}", stats.completed)?;
        writeln!(out, "pending        {}", stats.pending)?;
        let overdue = stats.overdue.to_string();
        let overdue = if stats.overdue > 0 { self.paint(&overdue, Tone::Alert) } else { overdue };
        writeln!(out, "overdue        {overdue}")?;
        writeln!(out, "due today      {}", stats.due_today)?;
        writeln!(out, "high priority  {}", stats.high_priority)?;
        writeln!(out, "completion     {}%", stats.completion_rate)?;
        Ok(())
    }

    fn compact_line(&self, task: &Task, today: NaiveDate) -> String {
        let mark = if task.completed { "[x]" } else { "[ ]" };
        let mut line = format!("{mark} {} {}", self.paint(&short_id(task.id), Tone::Marker), describe(task));
        if task.due_date.is_some() {
            line.push_str(&format!("  due {}", self.due_cell(task, today)));
        }
        line
    }

    fn priority_cell(&self, priority: Priority) -> String {
        match priority {
            Priority::High => self.paint("H", Tone::Alert),
            Priority::Medium => self.paint("M", Tone::Marker),
            Priority::Low => "L".to_string(),
            Priority::None => String::new(),
        }
    }

    fn due_cell(&self, task: &Task, today: NaiveDate) -> String {
        let Some(due) = task.due_date else {
            return String::new();
        };
        let text = format_date(due);
        if task.completed {
            text
        } else if task.is_overdue(today) {
            self.paint(&text, Tone::Alert)
        } else if task.is_due_today(today) {
            self.paint(&text, Tone::Ok)
        } else {
            text
        }
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{}m{text}\x1b[0m", tone.sgr())
    }
}

fn describe(task: &Task) -> String {
    match task.recurrence {
        Recurrence::None => task.text.clone(),
        other => format!("{} ({})", task.text, other.as_str()),
    }
}

/// Terminal emphasis used by the checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Heading,
    Muted,
    Alert,
    Ok,
    Marker,
}

impl Tone {
    fn sgr(self) -> &'static str {
        match self {
            Tone::Heading => "1",
            Tone::Muted => "2",
            Tone::Alert => "31",
            Tone::Ok => "32",
            Tone::Marker => "33",
        }
    }
}

/// Fixed-column table; cells may carry color escapes, which take no width.
struct Table<const N: usize> {
    headers: [&'static str; N],
    rows: Vec<[String; N]>,
}

impl<const N: usize> Table<N> {
    fn new(headers: [&'static str; N]) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: [String; N]) {
        self.rows.push(row);
    }

    fn widths(&self) -> [usize; N] {
        let mut widths = self.headers.map(visible_width);
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(visible_width(cell));
            }
        }
        widths
    }

    fn write_to<W: Write>(&self, mut out: W) -> anyhow::Result<()> {
        let widths = self.widths();
        let rule = widths.map(|width| "-".repeat(width));

        write_row(&mut out, &self.headers, &widths)?;
        write_row(&mut out, &rule, &widths)?;
        for row in &self.rows {
            write_row(&mut out, row, &widths)?;
        }
        Ok(())
    }
}

fn write_row<W: Write, S: AsRef<str>>(mut out: W, cells: &[S], widths: &[usize]) -> anyhow::Result<()> {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str("  ");
        }
        let cell = cell.as_ref();
        line.push_str(cell);
        line.push_str(&" ".repeat(width.saturating_sub(visible_width(cell))));
    }
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}

/// Display width of `cell`, skipping `ESC ... m` color sequences.
fn visible_width(cell: &str) -> usize {
    let mut width = 0;
    let mut rest = cell;
    while let Some(esc) = rest.find('\x1b') {
        width += UnicodeWidthStr::width(&rest[..esc]);
        rest = match rest[esc..].find('m') {
            Some(end) => &rest[esc + end + 1..],
            None => "",
        };
    }
    width + UnicodeWidthStr::width(rest)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::filter::{GroupBy, TaskQuery};
    use crate::paging::Pagination;
    use crate::task::{Category, TaskId, UserId};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn task(text: &str, order: i64, due: Option<NaiveDate>, completed: bool) -> Task {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        Task {
            id: TaskId(Uuid::new_v4()),
            user_id: UserId(Uuid::nil()),
            text: text.to_string(),
            completed,
            completed_at: completed.then_some(now),
            priority: Priority::High,
            category: Category::Materials,
            due_date: due,
            reminder_date: None,
            recurrence: Recurrence::None,
            order,
            created_at: now,
            updated_at: now,
        }
    }

    fn render(tasks: &[Task], density: ViewDensity, show_completed: bool) -> String {
        let renderer = Renderer { color: false };
        let view = ChecklistView::build(
            tasks,
            &TaskQuery::default(),
            GroupBy::Category,
            Pagination::new(1, 10),
            day(9),
        );
        let mut buf = Vec::new();
        renderer
            .write_checklist(&mut buf, &view, day(9), density, show_completed)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn color_sequences_take_no_width() {
        assert_eq!(visible_width("\x1b[31mH\x1b[0m"), 1);
        assert_eq!(visible_width("Tuyau coudé"), 11);
        assert_eq!(visible_width("\x1b[33m"), 0);
    }

    #[test]
    fn table_columns_align_on_visible_width() {
        let mut table = Table::new(["ID", "Task"]);
        table.push(["\x1b[33mabc\x1b[0m".to_string(), "Order PEX".to_string()]);
        table.push(["d".to_string(), String::new()]);

        let mut buf = Vec::new();
        table.write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID   Task");
        assert_eq!(lines[1], "---  ---------");
        assert_eq!(lines[2], "\x1b[33mabc\x1b[0m  Order PEX");
        assert_eq!(lines[3], "d");
    }

    #[test]
    fn completed_section_is_collapsed_by_default() {
        let tasks = vec![
            task("Order PEX fittings", 0, Some(day(10)), false),
            task("Pick up permit", 1, None, true),
        ];

        let collapsed = render(&tasks, ViewDensity::Comfortable, false);
        assert!(collapsed.contains("Materials (1)"));
        assert!(collapsed.contains("Completed (1)"));
        assert!(!collapsed.contains("Pick up permit"));
        assert!(collapsed.contains("Page 1 of 1, tasks 1-1 of 1"));

        let expanded = render(&tasks, ViewDensity::Compact, true);
        assert!(expanded.contains("[x]"));
        assert!(expanded.contains("Pick up permit"));
        assert!(expanded.contains("due 2026-03-10"));
    }

    #[test]
    fn empty_view_says_so() {
        assert_eq!(render(&[], ViewDensity::Comfortable, false), "No tasks.\n");
    }
}
