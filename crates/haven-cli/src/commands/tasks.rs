//! Task commands

use chrono::Utc;
use haven_core::models::{Task, TaskList};
use serde::Serialize;

use super::common::{
    ensure_identity, format_relative_time, resolve_record_id, short_id, status_marker, Engine,
};
use crate::error::CliError;

pub async fn run_add(
    engine: &Engine,
    title_parts: &[String],
    list_name: Option<&str>,
    category: Option<&str>,
) -> Result<(), CliError> {
    let title = title_parts.join(" ").trim().to_string();
    if title.is_empty() {
        return Err(CliError::EmptyTitle);
    }

    let identity = ensure_identity(engine).await?;
    engine.task_lists.initialize().await?;

    let list = find_list(engine, list_name).await?;
    let mut task = Task::new(list.id, title, identity.user_id);
    task.category = category.map(str::to_string);

    let created = engine.tasks.create(task).await?;
    println!("{}", created.id);
    Ok(())
}

#[derive(Debug, Serialize)]
struct TaskListItem {
    id: String,
    title: String,
    list: String,
    completed: bool,
    sync_status: String,
    updated_at: i64,
}

pub async fn run_list(
    engine: &Engine,
    category: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    engine.task_lists.initialize().await?;
    let tasks = match category {
        Some(category) => engine.tasks.get_by_category(category).await?,
        None => engine.tasks.get_all().await?,
    };
    let lists = engine.task_lists.get_all().await?;

    if as_json {
        let items: Vec<TaskListItem> = tasks
            .iter()
            .map(|task| TaskListItem {
                id: task.id.to_string(),
                title: task.title.clone(),
                list: list_name(&lists, task),
                completed: task.completed,
                sync_status: task.meta.sync_status.to_string(),
                updated_at: task.meta.updated_at,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let now_ms = Utc::now().timestamp_millis();
    for task in &tasks {
        let check = if task.completed { 'x' } else { ' ' };
        let marker = status_marker(task.meta.sync_status);
        let relative = format_relative_time(task.meta.updated_at, now_ms);
        println!(
            "{}{} [{check}] {:<40}  {:<12}  {relative}",
            short_id(&task.id),
            marker,
            truncate(&task.title, 40),
            list_name(&lists, task),
        );
    }
    Ok(())
}

pub async fn run_done(engine: &Engine, id: &str) -> Result<(), CliError> {
    let tasks = engine.tasks.get_all().await?;
    let task_id = resolve_record_id(&tasks, id)?;

    let updated = engine
        .tasks
        .update(&task_id, |task| task.completed = true)
        .await?;
    println!("{}", updated.id);
    Ok(())
}

pub async fn run_delete(engine: &Engine, id: &str) -> Result<(), CliError> {
    let tasks = engine.tasks.get_all().await?;
    let task_id = resolve_record_id(&tasks, id)?;

    engine.tasks.delete(&task_id).await?;
    println!("{task_id}");
    Ok(())
}

async fn find_list(engine: &Engine, name: Option<&str>) -> Result<TaskList, CliError> {
    let lists = engine.task_lists.get_all().await?;
    match name {
        Some(name) => lists
            .into_iter()
            .find(|list| list.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CliError::ListNotFound(name.to_string())),
        None => lists
            .into_iter()
            .find(|list| list.is_default)
            .ok_or_else(|| CliError::ListNotFound("Inbox".to_string())),
    }
}

fn list_name(lists: &[TaskList], task: &Task) -> String {
    lists
        .iter()
        .find(|list| list.id == task.list_id)
        .map_or_else(|| short_id(&task.list_id), |list| list.name.clone())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = text.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::super::common::open_engine;
    use super::*;

    fn unique_test_db_path() -> PathBuf {
        static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("haven-cli-test-{timestamp}-{sequence}.db"))
    }

    fn cleanup_db_files(path: &PathBuf) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_done_delete_flow_offline() {
        let db_path = unique_test_db_path();
        let engine = open_engine(&db_path, None).await.unwrap();

        run_add(&engine, &["Water".to_string(), "plants".to_string()], None, None)
            .await
            .unwrap();

        let tasks = engine.tasks.get_all().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Water plants");
        assert!(!tasks[0].completed);

        // Inbox was seeded and the task landed in it
        let lists = engine.task_lists.get_all().await.unwrap();
        assert!(lists.iter().any(|list| list.is_default));
        assert_eq!(tasks[0].list_id, lists[0].id);

        run_done(&engine, &tasks[0].id.as_str()).await.unwrap();
        let tasks = engine.tasks.get_all().await.unwrap();
        assert!(tasks[0].completed);
        assert_eq!(tasks[0].meta.version, 2);

        run_delete(&engine, &tasks[0].id.as_str()).await.unwrap();
        assert!(engine.tasks.get_all().await.unwrap().is_empty());

        // Offline: every mutation became a queued operation
        assert_eq!(engine.queue.snapshot().await.len(), 3);

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_rejects_empty_title() {
        let db_path = unique_test_db_path();
        let engine = open_engine(&db_path, None).await.unwrap();

        let error = run_add(&engine, &["   ".to_string()], None, None)
            .await
            .unwrap_err();
        assert!(matches!(error, CliError::EmptyTitle));

        cleanup_db_files(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_to_unknown_list_fails() {
        let db_path = unique_test_db_path();
        let engine = open_engine(&db_path, None).await.unwrap();

        let error = run_add(&engine, &["task".to_string()], Some("Nope"), None)
            .await
            .unwrap_err();
        assert!(matches!(error, CliError::ListNotFound(_)));

        cleanup_db_files(&db_path);
    }

    #[test]
    fn test_truncate_adds_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long task title", 10), "a very ...");
    }
}
