//! Manual sync, queue diagnostics, and defaults reset

use chrono::Utc;

use super::common::{ensure_identity, format_relative_time, short_id, Engine};
use crate::error::CliError;

pub async fn run_sync(engine: &Engine) -> Result<(), CliError> {
    if !engine.has_server() {
        return Err(CliError::ServerRequired);
    }
    ensure_identity(engine).await?;

    let pending_before = engine.queue.snapshot().await.len();

    // One drain covers every entity type; each repository then re-merges its
    // canonical remote list.
    engine.task_lists.sync().await?;
    engine.tasks.sync().await?;
    engine.backgrounds.sync().await?;
    engine.block_rules.sync().await?;

    let pending_after = engine.queue.snapshot().await.len();
    println!("sync complete ({pending_before} queued before, {pending_after} remaining)");
    Ok(())
}

pub async fn run_queue(engine: &Engine, as_json: bool) -> Result<(), CliError> {
    let operations = engine.queue.snapshot().await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&operations)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("queue empty");
        return Ok(());
    }

    let now_ms = Utc::now().timestamp_millis();
    for op in &operations {
        println!(
            "{}  {:<6} {:<10} v{:<3} retries {}  {}",
            short_id(&op.entity_id),
            op.kind,
            op.entity,
            op.version,
            op.retries,
            format_relative_time(op.timestamp, now_ms),
        );
    }
    Ok(())
}

pub async fn run_reset(engine: &Engine) -> Result<(), CliError> {
    engine.task_lists.reset_to_defaults().await?;
    engine.tasks.reset_to_defaults().await?;
    engine.backgrounds.reset_to_defaults().await?;
    engine.block_rules.reset_to_defaults().await?;
    println!("restored defaults");
    Ok(())
}
