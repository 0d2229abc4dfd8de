//! Haven CLI - the productivity dashboard from the terminal
//!
//! Every mutation writes locally first; without `--server` the engine stays
//! offline and work queues for the next sync.

mod cli;
mod commands;
mod error;

use std::env;
use std::path::PathBuf;

use clap::Parser;

use cli::{BgCommands, BlockCommands, Cli, Commands, ListCommands, TaskCommands};
use commands::common::open_engine;
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("haven=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let server = resolve_server(cli.server);
    let engine = open_engine(&db_path, server.as_deref()).await?;

    match cli.command {
        Commands::Task { command } => match command {
            TaskCommands::Add {
                title,
                list,
                category,
            } => {
                commands::tasks::run_add(&engine, &title, list.as_deref(), category.as_deref())
                    .await?;
            }
            TaskCommands::List { category, json } => {
                commands::tasks::run_list(&engine, category.as_deref(), json).await?;
            }
            TaskCommands::Done { id } => commands::tasks::run_done(&engine, &id).await?,
            TaskCommands::Delete { id } => commands::tasks::run_delete(&engine, &id).await?,
        },
        Commands::List { command } => match command {
            ListCommands::Add { name } => commands::lists::run_add(&engine, &name).await?,
            ListCommands::Show => commands::lists::run_show(&engine).await?,
            ListCommands::Delete { id } => commands::lists::run_delete(&engine, &id).await?,
        },
        Commands::Bg { command } => match command {
            BgCommands::List => commands::backgrounds::run_list(&engine).await?,
            BgCommands::Add { name, url } => {
                commands::backgrounds::run_add(&engine, &name, &url).await?;
            }
            BgCommands::Delete { id } => {
                commands::backgrounds::run_delete(&engine, &id).await?;
            }
        },
        Commands::Block { command } => match command {
            BlockCommands::Add { pattern } => commands::blocks::run_add(&engine, &pattern).await?,
            BlockCommands::List => commands::blocks::run_list(&engine).await?,
            BlockCommands::Delete { id } => commands::blocks::run_delete(&engine, &id).await?,
            BlockCommands::Test { host } => commands::blocks::run_test(&engine, &host).await?,
        },
        Commands::Login { user_id } => commands::session::run_login(&engine, &user_id).await?,
        Commands::Logout => commands::session::run_logout(&engine).await?,
        Commands::Whoami => commands::session::run_whoami(&engine).await?,
        Commands::Sync => commands::sync_cmd::run_sync(&engine).await?,
        Commands::Queue { json } => commands::sync_cmd::run_queue(&engine, json).await?,
        Commands::Reset => commands::sync_cmd::run_reset(&engine).await?,
    }

    Ok(())
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("HAVEN_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("haven")
        .join("haven.db")
}

fn resolve_server(cli_server: Option<String>) -> Option<String> {
    cli_server
        .or_else(|| env::var("HAVEN_SERVER_URL").ok())
        .filter(|url| !url.trim().is_empty())
}
