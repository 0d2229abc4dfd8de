//! Task list commands

use haven_core::models::TaskList;

use super::common::{ensure_identity, resolve_record_id, short_id, status_marker, Engine};
use crate::error::CliError;

pub async fn run_add(engine: &Engine, name: &str) -> Result<(), CliError> {
    let identity = ensure_identity(engine).await?;
    engine.task_lists.initialize().await?;

    let created = engine
        .task_lists
        .create(TaskList::new(name, identity.user_id))
        .await?;
    println!("{}", created.id);
    Ok(())
}

pub async fn run_show(engine: &Engine) -> Result<(), CliError> {
    engine.task_lists.initialize().await?;
    let lists = engine.task_lists.get_all().await?;
    let tasks = engine.tasks.get_all().await?;

    for list in &lists {
        let count = tasks.iter().filter(|task| task.list_id == list.id).count();
        let marker = status_marker(list.meta.sync_status);
        let default_tag = if list.is_default { " (default)" } else { "" };
        println!(
            "{}{} {:<24} {count} tasks{default_tag}",
            short_id(&list.id),
            marker,
            list.name,
        );
    }
    Ok(())
}

pub async fn run_delete(engine: &Engine, id: &str) -> Result<(), CliError> {
    let lists = engine.task_lists.get_all().await?;
    let list_id = resolve_record_id(&lists, id)?;

    // Cascades: the list's tasks are removed in the same transaction
    engine.task_lists.delete(&list_id).await?;
    println!("{list_id}");
    Ok(())
}
