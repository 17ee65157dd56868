//! Sandpiper CLI
//!
//! Command-line front end for the sandbox submission core: drives the
//! same controller and monitor the chat bot uses, with stdout as the
//! chat surface.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod console;

use config::AppConfig;
use console::ConsoleMessenger;
use sp_bot::{
    render, ChatId, ChatInput, MonitorConfig, MonitorPool, RenderConfig, SubmissionController,
};
use sp_connectors::{AnyRunConnector, SandboxApi, TaskId};
use sp_core::db::{
    create_active_task_repository, create_credential_repository, create_pool,
    create_user_repository, run_migrations, ActiveTaskRepository, CredentialRepository,
    UserRepository,
};
use sp_core::{AccessDecision, AccessGate, Secret, TextCatalog};
use sp_observability::{init_logging_with_config, LoggingConfig};

#[derive(Parser)]
#[command(name = "sandpiper")]
#[command(version)]
#[command(about = "Sandbox analysis relay: submit, monitor, and render threat reports", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Acting user id (the chat identity the command runs as)
    #[arg(short, long, default_value = "1")]
    owner: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    InitDb,

    /// Register the acting user and store a sandbox API key for them
    AddKey {
        /// Display name for the key
        #[arg(long, default_value = "default")]
        name: String,

        /// The API key value
        key: String,
    },

    /// Submit a URL for analysis and monitor it to completion
    SubmitUrl { url: String },

    /// Submit a file for analysis and monitor it to completion
    SubmitFile { path: PathBuf },

    /// Fetch and render the report for a task id
    Report { task_id: String },

    /// List recent analyses from the sandbox account
    History {
        #[arg(long, default_value = "10")]
        limit: u32,

        #[arg(long, default_value = "0")]
        skip: u32,
    },

    /// Show the account's API quota limits
    Limits,

    /// List locally recorded tasks that are still active
    Active,
}

/// Everything the commands need, constructed once at startup.
struct AppContext {
    texts: Arc<TextCatalog>,
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialRepository>,
    tasks: Arc<dyn ActiveTaskRepository>,
    gate: Arc<AccessGate>,
    api: Arc<dyn SandboxApi>,
    pool: Arc<MonitorPool>,
    controller: SubmissionController,
    render: RenderConfig,
    language: String,
}

impl AppContext {
    async fn build(config: &AppConfig) -> Result<Self> {
        let db = create_pool(&config.database_url)
            .await
            .context("failed to open database")?;
        run_migrations(&db).await.context("failed to run migrations")?;

        let users = create_user_repository(db.clone());
        let credentials = create_credential_repository(db.clone());
        let tasks = create_active_task_repository(db);

        let texts = Arc::new(match &config.lang_dir {
            Some(dir) => TextCatalog::load_dir(Path::new(dir))
                .context("failed to load language directory")?,
            None => TextCatalog::builtin(),
        });

        let api: Arc<dyn SandboxApi> = Arc::new(
            AnyRunConnector::new(config.sandbox.clone())
                .context("failed to initialize sandbox connector")?,
        );
        let chat = Arc::new(ConsoleMessenger::new());
        let pool = Arc::new(MonitorPool::new());
        let render = RenderConfig {
            report_base_url: config.report_base_url.clone(),
        };

        let gate = Arc::new(AccessGate::new(
            users.clone(),
            credentials.clone(),
            texts.clone(),
        ));
        let controller = SubmissionController::new(
            api.clone(),
            tasks.clone(),
            gate.clone(),
            chat,
            texts.clone(),
            pool.clone(),
            render.clone(),
            MonitorConfig {
                max_attempts: config.monitor.max_attempts,
                poll_interval: std::time::Duration::from_secs(config.monitor.poll_interval_secs),
            },
        );

        Ok(Self {
            texts,
            users,
            credentials,
            tasks,
            gate,
            api,
            pool,
            controller,
            render,
            language: config.language.clone(),
        })
    }

    /// Runs the access gate and returns the credential, or bails with
    /// the denial message.
    async fn authorize(&self, owner_id: i64) -> Result<sp_core::Credential> {
        match self.gate.check(owner_id).await? {
            AccessDecision::Granted(credential) => Ok(credential),
            AccessDecision::Denied(message) => bail!("{}", message),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    let logging = match config.logging.as_str() {
        "development" => LoggingConfig::development(),
        "production" => LoggingConfig::production(),
        _ => LoggingConfig::default(),
    };
    init_logging_with_config(logging);

    let ctx = AppContext::build(&config).await?;

    match cli.command {
        Commands::InitDb => {
            // Migrations already ran during context construction.
            println!("{}", "Database schema ready.".green());
        }

        Commands::AddKey { name, key } => {
            ctx.users.register(cli.owner).await?;
            ctx.credentials
                .add(cli.owner, &Secret::from(key), &name)
                .await?;
            println!("{} key '{}' is now active", "Stored:".green(), name);
            for credential in ctx.credentials.list(cli.owner).await? {
                let marker = if credential.is_active { "*" } else { " " };
                println!("  {} {}", marker, credential.name);
            }
        }

        Commands::SubmitUrl { url } => {
            let launched = ctx
                .controller
                .handle(
                    ChatId(cli.owner),
                    cli.owner,
                    &ctx.language,
                    ChatInput::from_text(&url),
                )
                .await;
            // Stay alive until the monitor reaches its terminal outcome.
            ctx.pool.wait_all().await;
            if launched.is_none() {
                std::process::exit(1);
            }
        }

        Commands::SubmitFile { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.bin");
            let launched = ctx
                .controller
                .handle(
                    ChatId(cli.owner),
                    cli.owner,
                    &ctx.language,
                    ChatInput::from_document(filename, bytes),
                )
                .await;
            ctx.pool.wait_all().await;
            if launched.is_none() {
                std::process::exit(1);
            }
        }

        Commands::Report { task_id } => {
            let credential = ctx.authorize(cli.owner).await?;
            let report = ctx
                .api
                .get_report(&credential.key, &TaskId(task_id))
                .await?;
            let (text, actions) =
                render::format_report(&report, &ctx.render, &ctx.texts, &ctx.language);
            println!("{}", text);
            for action in actions {
                println!("  {} {}", action.label.bold(), action.url.blue().underline());
            }
        }

        Commands::History { limit, skip } => {
            let credential = ctx.authorize(cli.owner).await?;
            let entries = ctx.api.get_history(&credential.key, limit, skip).await?;
            println!(
                "{}",
                render::format_history(&entries, &ctx.texts, &ctx.language)
            );
        }

        Commands::Limits => {
            let credential = ctx.authorize(cli.owner).await?;
            let limits = ctx.api.get_limits(&credential.key).await?;
            println!(
                "{}",
                render::format_limits(&limits, &ctx.texts, &ctx.language)
            );
        }

        Commands::Active => {
            let active = ctx.tasks.list_active(cli.owner).await?;
            if active.is_empty() {
                println!("No active tasks.");
            }
            for task in active {
                println!(
                    "{}  submitted {}",
                    task.task_id.bold(),
                    task.created_at.format("%d %B %Y, %H:%M")
                );
            }
        }
    }

    // Nothing should be left running, but never exit with monitors
    // silently dropped.
    ctx.pool.shutdown().await;
    Ok(())
}
