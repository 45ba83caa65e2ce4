//! Command-line front end for the Scriba interaction log.

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use scriba_rs::config::{LayeredConfigOptions, ScribaConfig};
use scriba_rs::core::{AutoConfirm, Confirm, InteractionLog};
use scriba_rs::protocol::{
    ClearOptions, ExportFormat, InteractionFilter, InteractionType, ListOptions, NewInteraction,
    RecordId, Relations, SortDirection, SortKey,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Command-line options for the scriba CLI.
#[derive(Parser)]
#[command(name = "scriba", version, about = "AI interaction history with offline fallback")]
struct Cli {
    /// Optional path to a scriba.json5 config file layered over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show remote readiness and pending local records
    Status,
    /// Connect to a remote store and remember its credentials
    Configure { url: String, key: String },
    /// Forget the remote connection and saved credentials
    Reset,
    /// Record an interaction
    Record(RecordArgs),
    /// List interactions from both stores
    List(ListArgs),
    /// Show a single interaction
    Get { id: String },
    /// Push local-only interactions to the remote store
    Sync,
    /// Delete an interaction by id
    Delete { id: String },
    /// Clear stored interactions (local only unless --remote is given)
    Clear {
        #[arg(long)]
        local: bool,
        #[arg(long)]
        remote: bool,
        /// Skip the confirmation prompt for the remote wipe
        #[arg(long)]
        yes: bool,
    },
    /// Export interactions to a file
    Export {
        #[arg(long, default_value = "json")]
        format: ExportFormat,
        /// Output file; defaults to the generated file name in the cwd
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        list: ListArgs,
    },
    /// Create the remote table and procedures
    InitSchema,
}

#[derive(Args)]
struct RecordArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    response: String,
    #[arg(long)]
    model: String,
    #[arg(long = "type")]
    interaction_type: InteractionType,
    /// Metadata as a JSON object
    #[arg(long)]
    metadata: Option<String>,
    #[command(flatten)]
    relations: RelationArgs,
}

#[derive(Args)]
struct RelationArgs {
    #[arg(long)]
    project_id: Option<String>,
    #[arg(long)]
    task_id: Option<String>,
    #[arg(long)]
    document_id: Option<String>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long = "type")]
    interaction_type: Option<InteractionType>,
    #[command(flatten)]
    relations: RelationArgs,
    #[arg(long)]
    sort_by: Option<SortKey>,
    #[arg(long)]
    direction: Option<SortDirection>,
    #[arg(long, default_value_t = 0)]
    offset: usize,
    #[arg(long)]
    limit: Option<usize>,
}

impl ListArgs {
    fn options(&self, defaults: &ListOptions) -> ListOptions {
        let filter = InteractionFilter {
            interaction_type: self.interaction_type,
            project_id: self.relations.project_id.clone(),
            task_id: self.relations.task_id.clone(),
            document_id: self.relations.document_id.clone(),
        };
        defaults
            .clone()
            .with_filter(filter)
            .with_sort(
                self.sort_by.unwrap_or(defaults.sort_by),
                self.direction.unwrap_or(defaults.direction),
            )
            .with_page(self.offset, self.limit.unwrap_or(defaults.limit))
    }
}

/// Asks on the terminal before a remote wipe.
struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, message: &str) -> bool {
        let mut stderr = io::stderr();
        if write!(stderr, "{message} [y/N] ").and_then(|_| stderr.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// Entry point for the scriba CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scriba_rs::init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let log = scriba_rs::open_log(&config).context("failed to open interaction log")?;

    if config.sync.on_startup && !matches!(cli.command, Command::Sync | Command::Reset) {
        startup_sync(&log).await;
    }

    match cli.command {
        Command::Status => print_json(&json!({
            "data_dir": config.data_dir(),
            "status": log.status(),
        })),
        Command::Configure { url, key } => {
            if !log.remote().initialize(&url, &key) {
                bail!("remote store could not be initialized; check the url and key");
            }
            print_json(&json!({ "remote_ready": true }))
        }
        Command::Reset => {
            log.remote().reset().context("failed to reset remote client")?;
            print_json(&json!({ "remote_ready": false }))
        }
        Command::Record(args) => {
            let metadata = match args.metadata.as_deref() {
                Some(raw) => serde_json::from_str::<Value>(raw).context("invalid --metadata JSON")?,
                None => json!({}),
            };
            let input = NewInteraction::new(
                args.prompt,
                args.response,
                args.model,
                args.interaction_type,
            )
            .with_metadata(metadata)
            .with_relations(Relations {
                project_id: args.relations.project_id,
                task_id: args.relations.task_id,
                document_id: args.relations.document_id,
            });
            let recorded = log.record_interaction(input).await?;
            print_json(&recorded)
        }
        Command::List(args) => {
            let options = args.options(&log.settings().default_list);
            let listing = log.list_interactions(&options).await?;
            print_json(&listing)
        }
        Command::Get { id } => match log.get_interaction(&RecordId::new(id.as_str())).await? {
            Some(record) => print_json(&record),
            None => bail!("interaction not found: {id}"),
        },
        Command::Sync => {
            let cancel = CancellationToken::new();
            let watcher = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; stopping sync after the current batch");
                    watcher.cancel();
                }
            });
            let summary = log.sync_local_interactions(&cancel).await?;
            print_json(&summary)
        }
        Command::Delete { id } => {
            let outcome = log.delete_interaction(&RecordId::new(id)).await?;
            print_json(&json!({ "outcome": outcome }))
        }
        Command::Clear { local, remote, yes } => {
            let options = if local || remote {
                ClearOptions { local, remote }
            } else {
                ClearOptions::default()
            };
            let report = if yes {
                log.clear_all_interactions(options, &AutoConfirm(true)).await
            } else {
                log.clear_all_interactions(options, &TerminalConfirm).await
            };
            print_json(&report)
        }
        Command::Export {
            format,
            output,
            list,
        } => {
            let options = list.options(&log.settings().default_list);
            let document = log.export_interactions(format, &options).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&document.filename));
            std::fs::write(&path, &document.content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            print_json(&json!({
                "path": path,
                "records": document.record_count,
                "mime_type": document.mime_type,
            }))
        }
        Command::InitSchema => {
            let existed = log.ensure_remote_schema().await?;
            print_json(&json!({ "table_existed": existed, "schema_ready": true }))
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ScribaConfig> {
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = path {
        info!("layering config from path: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let layered = ScribaConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

async fn startup_sync(log: &InteractionLog) {
    if log.status().local_pending == 0 {
        return;
    }
    match log.sync_local_interactions(&CancellationToken::new()).await {
        Ok(summary) => info!(
            "startup sync finished (synced={}, remaining={})",
            summary.synced, summary.remaining
        ),
        Err(err) => debug!("startup sync skipped (error={})", err),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
