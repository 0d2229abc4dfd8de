//! Site block rule commands

use haven_core::models::BlockRule;

use super::common::{ensure_identity, resolve_record_id, short_id, status_marker, Engine};
use crate::error::CliError;

pub async fn run_add(engine: &Engine, pattern: &str) -> Result<(), CliError> {
    let identity = ensure_identity(engine).await?;

    let created = engine
        .block_rules
        .create(BlockRule::new(pattern.trim(), identity.user_id))
        .await?;
    println!("{}", created.id);
    Ok(())
}

pub async fn run_list(engine: &Engine) -> Result<(), CliError> {
    for rule in engine.block_rules.get_all().await? {
        let marker = status_marker(rule.meta.sync_status);
        let state = if rule.enabled { "on " } else { "off" };
        println!("{}{} [{state}] {}", short_id(&rule.id), marker, rule.pattern);
    }
    Ok(())
}

pub async fn run_delete(engine: &Engine, id: &str) -> Result<(), CliError> {
    let rules = engine.block_rules.get_all().await?;
    let rule_id = resolve_record_id(&rules, id)?;

    engine.block_rules.delete(&rule_id).await?;
    println!("{rule_id}");
    Ok(())
}

pub async fn run_test(engine: &Engine, host: &str) -> Result<(), CliError> {
    let matching: Vec<BlockRule> = engine
        .block_rules
        .get_all()
        .await?
        .into_iter()
        .filter(|rule| rule.matches_host(host))
        .collect();

    if matching.is_empty() {
        println!("{host}: not blocked");
    } else {
        for rule in &matching {
            println!("{host}: blocked by {} ({})", rule.pattern, short_id(&rule.id));
        }
    }
    Ok(())
}
