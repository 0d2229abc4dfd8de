//! Background commands

use haven_core::models::Background;

use super::common::{ensure_identity, resolve_record_id, short_id, status_marker, Engine};
use crate::error::CliError;

pub async fn run_list(engine: &Engine) -> Result<(), CliError> {
    engine.backgrounds.initialize().await?;
    for background in engine.backgrounds.get_all().await? {
        let marker = status_marker(background.meta.sync_status);
        let tag = if background.is_default { " (built-in)" } else { "" };
        println!(
            "{}{} {:<16} {:<10} {}{tag}",
            short_id(&background.id),
            marker,
            background.name,
            background.category,
            background.image_url,
        );
    }
    Ok(())
}

pub async fn run_add(engine: &Engine, name: &str, url: &str) -> Result<(), CliError> {
    let identity = ensure_identity(engine).await?;
    engine.backgrounds.initialize().await?;

    let created = engine
        .backgrounds
        .create(Background::new(name, url, identity.user_id))
        .await?;
    println!("{}", created.id);
    Ok(())
}

pub async fn run_delete(engine: &Engine, id: &str) -> Result<(), CliError> {
    let backgrounds = engine.backgrounds.get_all().await?;
    let background_id = resolve_record_id(&backgrounds, id)?;

    engine.backgrounds.delete(&background_id).await?;
    println!("{background_id}");
    Ok(())
}
