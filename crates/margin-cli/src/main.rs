//! Margin CLI - keep a local copy of your notes in sync
//!
//! Imports note documents, edits notes locally and runs sync rounds against a
//! folder acting as the remote note service.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::commands::common::{resolve_db_path, resolve_remote_dir};
use crate::error::CliError;

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
                .add_directive("margin=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let remote_dir = resolve_remote_dir(cli.remote);

    match cli.command {
        Some(Commands::Import { dir }) => {
            commands::import::run_import(&dir, cli.workers, &db_path, &remote_dir).await?;
        }
        Some(Commands::List {
            limit,
            templates,
            json,
        }) => commands::list::run_list(limit, templates, json, &db_path).await?,
        Some(Commands::Search { query, limit, json }) => {
            commands::search::run_search(&query, limit, json, &db_path).await?;
        }
        Some(Commands::Show { guid, xml, json }) => {
            commands::show::run_show(&guid, xml, json, &db_path).await?;
        }
        Some(Commands::Add { title, body }) => {
            commands::add::run_add(&title, &body, &db_path).await?;
        }
        Some(Commands::Edit { guid }) => commands::edit::run_edit(&guid, &db_path).await?,
        Some(Commands::Delete { guid }) => commands::delete::run_delete(&guid, &db_path).await?,
        Some(Commands::Purge) => commands::delete::run_purge(&db_path).await?,
        Some(Commands::Sync { prefer, json }) => {
            commands::sync::run_sync(prefer, json, &db_path, &remote_dir).await?;
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show { json } => commands::config::run_show(json, &db_path).await?,
            ConfigCommands::Set {
                workers,
                include_templates,
                reset_sync_date,
            } => {
                commands::config::run_set(workers, include_templates, reset_sync_date, &db_path)
                    .await?;
            }
        },
        Some(Commands::Completions { shell, output }) => {
            commands::completions::run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
