use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::backend::{PreferenceBackend, StaticIdentity, TaskBackend};
use crate::cli::{AddArgs, Command, EditArgs, ListArgs, MoveArgs, PrefsArgs};
use crate::datetime::{DayBoundary, parse_date_expr};
use crate::paging::Pagination;
use crate::prefs::{Preferences, PreferenceSync, PreferencesPatch};
use crate::render::Renderer;
use crate::reorder::move_within;
use crate::store::TaskStore;
use crate::task::{NewTask, Task, TaskId, TaskPatch};

/// Shortest id prefix accepted on the command line.
const MIN_ID_PREFIX: usize = 4;

type Store<B> = TaskStore<B, StaticIdentity>;
type Prefs<B> = PreferenceSync<B, StaticIdentity>;

#[instrument(skip(backend, renderer, command))]
pub async fn dispatch<B>(
    backend: B,
    identity: StaticIdentity,
    boundary: DayBoundary,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()>
where
    B: TaskBackend + PreferenceBackend + Clone,
{
    let now = Utc::now();
    let today = boundary.today(now);
    let mut store = TaskStore::new(backend.clone(), identity);
    let mut prefs = PreferenceSync::new(backend, identity);

    debug!(?command, %today, "dispatching command");

    match command {
        Command::List(args) => cmd_list(&mut store, &mut prefs, renderer, &args, today).await,
        Command::Add(args) => cmd_add(&mut store, &args, today).await,
        Command::Edit(args) => cmd_edit(&mut store, &args, today).await,
        Command::Toggle { task } => cmd_toggle(&mut store, &task, now).await,
        Command::Delete { task } => cmd_delete(&mut store, &task).await,
        Command::Move(args) => cmd_move(&mut store, &mut prefs, &args, today).await,
        Command::Stats => cmd_stats(&mut store, renderer, today).await,
        Command::Prefs(args) => cmd_prefs(&mut prefs, renderer, &args).await,
    }
}

async fn cmd_list<B>(
    store: &mut Store<B>,
    prefs: &mut Prefs<B>,
    renderer: &mut Renderer,
    args: &ListArgs,
    today: NaiveDate,
) -> anyhow::Result<()>
where
    B: TaskBackend + PreferenceBackend,
{
    let current = load_view_prefs(prefs, args).await?;
    store.reload().await?;

    let view = store.view(
        &args.query(),
        current.group_by,
        Pagination::new(args.page, current.items_per_page),
        today,
    );
    renderer.print_checklist(&view, today, current.view_density, args.show_completed)
}

/// Loads saved preferences and persists any `--group`/`--per-page` given
/// for this listing.
async fn load_view_prefs<B>(prefs: &mut Prefs<B>, args: &ListArgs) -> anyhow::Result<Preferences>
where
    B: PreferenceBackend,
{
    let stored = prefs.load().await?;

    let patch = PreferencesPatch {
        group_by: args.group.filter(|group| *group != stored.group_by),
        items_per_page: args.per_page.filter(|size| *size != stored.items_per_page),
        ..PreferencesPatch::default()
    };
    if patch != PreferencesPatch::default() {
        prefs.update(patch).await?;
    }

    Ok(prefs.current())
}

async fn cmd_add<B>(store: &mut Store<B>, args: &AddArgs, today: NaiveDate) -> anyhow::Result<()>
where
    B: TaskBackend,
{
    store.reload().await?;

    let mut new = NewTask::new(args.text.join(" "))
        .with_priority(args.priority.unwrap_or_default())
        .with_category(args.category.clone().unwrap_or_default())
        .with_due_date(parse_optional_date(args.due.as_deref(), today, "due")?);
    new.reminder_date = parse_optional_date(args.reminder.as_deref(), today, "reminder")?;
    new.recurrence = args.repeat.unwrap_or_default();

    let id = store.add_task(new).await?;
    println!("Added task {}.", short_id(id));
    Ok(())
}

async fn cmd_edit<B>(store: &mut Store<B>, args: &EditArgs, today: NaiveDate) -> anyhow::Result<()>
where
    B: TaskBackend,
{
    store.reload().await?;
    let id = resolve_task(store.tasks(), &args.task)?;

    let due_date = if args.clear_due {
        Some(None)
    } else {
        parse_optional_date(args.due.as_deref(), today, "due")?.map(Some)
    };
    let reminder_date = if args.clear_reminder {
        Some(None)
    } else {
        parse_optional_date(args.reminder.as_deref(), today, "reminder")?.map(Some)
    };

    let patch = TaskPatch {
        text: args.text.as_ref().map(|text| text.trim().to_string()),
        priority: args.priority,
        category: args.category.clone(),
        due_date,
        reminder_date,
        recurrence: args.repeat,
        ..TaskPatch::default()
    };
    if patch.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    store.update_task(id, patch).await?;
    println!("Updated task {}.", short_id(id));
    Ok(())
}

async fn cmd_toggle<B>(store: &mut Store<B>, reference: &str, now: DateTime<Utc>) -> anyhow::Result<()>
where
    B: TaskBackend,
{
    store.reload().await?;
    let id = resolve_task(store.tasks(), reference)?;

    let completed = store.toggle_task(id, now).await?;
    if completed {
        println!("Completed task {}.", short_id(id));
    } else {
        println!("Reopened task {}.", short_id(id));
    }
    Ok(())
}

async fn cmd_delete<B>(store: &mut Store<B>, reference: &str) -> anyhow::Result<()>
where
    B: TaskBackend,
{
    store.reload().await?;
    let id = resolve_task(store.tasks(), reference)?;

    store.delete_task(id).await?;
    println!("Deleted task {}.", short_id(id));
    Ok(())
}

/// Moves a task inside the group it is rendered in, using the same view
/// inputs a `list` with these arguments would show.
async fn cmd_move<B>(
    store: &mut Store<B>,
    prefs: &mut Prefs<B>,
    args: &MoveArgs,
    today: NaiveDate,
) -> anyhow::Result<()>
where
    B: TaskBackend + PreferenceBackend,
{
    let current = load_view_prefs(prefs, &args.view).await?;
    store.reload().await?;
    let id = resolve_task(store.tasks(), &args.task)?;

    let view = store.view(
        &args.view.query(),
        current.group_by,
        Pagination::new(args.view.page, current.items_per_page),
        today,
    );
    let group = view
        .groups
        .iter()
        .find(|group| group.tasks.iter().any(|task| task.id == id))
        .ok_or_else(|| {
            anyhow!(
                "task {} is not on page {} of this view",
                short_id(id),
                view.page.page
            )
        })?;
    let label = group.key.label().to_string();
    let ids = group.ids();
    let from = ids
        .iter()
        .position(|candidate| *candidate == id)
        .context("task vanished from its group")?;
    let reordered = move_within(&ids, from, args.to)?;

    info!(group = %label, from, to = args.to, "moving task");
    store.reorder_tasks(&reordered).await?;
    println!("Moved task {} to position {} in {label}.", short_id(id), args.to);
    Ok(())
}

async fn cmd_stats<B>(store: &mut Store<B>, renderer: &mut Renderer, today: NaiveDate) -> anyhow::Result<()>
where
    B: TaskBackend,
{
    store.reload().await?;
    let stats = store.stats(today);
    renderer.print_stats(&stats)
}

async fn cmd_prefs<B>(prefs: &mut Prefs<B>, renderer: &mut Renderer, args: &PrefsArgs) -> anyhow::Result<()>
where
    B: PreferenceBackend,
{
    prefs.load().await?;

    let patch = PreferencesPatch {
        group_by: args.group,
        view_density: args.density,
        items_per_page: args.per_page,
    };
    if patch != PreferencesPatch::default() {
        prefs.update(patch).await?;
        info!("preferences saved");
    }

    renderer.print_prefs(&prefs.current())
}

fn parse_optional_date(raw: Option<&str>, today: NaiveDate, what: &str) -> anyhow::Result<Option<NaiveDate>> {
    raw.map(|raw| parse_date_expr(raw, today).with_context(|| format!("invalid {what} date")))
        .transpose()
}

/// Accepts a full id or a unique prefix of at least four characters.
pub fn resolve_task(tasks: &[Task], reference: &str) -> anyhow::Result<TaskId> {
    let needle = reference.trim().to_ascii_lowercase();

    if let Ok(id) = needle.parse::<TaskId>() {
        return tasks
            .iter()
            .find(|task| task.id == id)
            .map(|task| task.id)
            .ok_or_else(|| anyhow!("no task with id {id}"));
    }

    if needle.len() < MIN_ID_PREFIX {
        return Err(anyhow!(
            "task id prefix {needle:?} is too short (need at least {MIN_ID_PREFIX} characters)"
        ));
    }

    let mut matches = tasks
        .iter()
        .filter(|task| task.id.to_string().starts_with(&needle));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches {needle:?}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("task id prefix {needle:?} is ambiguous"));
    }
    Ok(first.id)
}

pub fn short_id(id: TaskId) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::task::{Category, Priority, Recurrence, UserId};

    fn task_with_id(raw: &str) -> Task {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        Task {
            id: TaskId(Uuid::parse_str(raw).unwrap()),
            user_id: UserId(Uuid::nil()),
            text: "Snake main line".to_string(),
            completed: false,
            completed_at: None,
            priority: Priority::None,
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
    fn resolves_full_ids_and_unique_prefixes() {
        let tasks = vec![
            task_with_id("6f1c2a00-0000-4000-8000-000000000001"),
            task_with_id("6f1d2a00-0000-4000-8000-000000000002"),
        ];

        assert_eq!(resolve_task(&tasks, "6F1C").unwrap(), tasks[0].id);
        assert_eq!(
            resolve_task(&tasks, "6f1d2a00-0000-4000-8000-000000000002").unwrap(),
            tasks[1].id
        );
        assert!(resolve_task(&tasks, "6f1").is_err());
        assert!(resolve_task(&tasks, "6f1c2a00-0000-4000-8000-0000000000ff").is_err());
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        let tasks = vec![
            task_with_id("6f1c2a00-0000-4000-8000-000000000001"),
            task_with_id("6f1c2b00-0000-4000-8000-000000000002"),
        ];

        let err = resolve_task(&tasks, "6f1c").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn short_id_is_first_eight_characters() {
        let task = task_with_id("6f1c2a00-0000-4000-8000-000000000001");
        assert_eq!(short_id(task.id), "6f1c2a00");
    }
}
