use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rss2push::config::{Config, PushoverOverrides, SendyOverrides, SinkSelection};
use rss2push::feed::{FeedFetcher, FeedList};
use rss2push::notify::SinkSet;
use rss2push::pipeline::{FeedProcessor, Orchestrator};
use rss2push::storage::{Database, SeenLedger};

/// Get the config directory path (~/.config/rss2push/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("rss2push"))
}

/// Create the config directory with user-only permissions.
fn ensure_config_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config directory '{}'", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "rss2push",
    version,
    about = "Send new feed entries as Pushover notifications or Sendy campaigns"
)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file [default: ~/.config/rss2push/config.toml]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed list [default: ~/.config/rss2push/feeds.txt]
    #[arg(long, global = true, value_name = "FILE")]
    feeds: Option<PathBuf>,

    /// Seen-state database [default: ~/.config/rss2push/seen.db]
    #[arg(long, global = true, value_name = "FILE")]
    seen_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send new entries as Pushover notifications
    Push(PushArgs),
    /// Send new entries via Pushover and/or Sendy
    Send(SendArgs),
    /// Show the configured feeds
    List,
    /// Add feeds to the list
    Add {
        #[arg(required = true, value_name = "URI")]
        uris: Vec<String>,
    },
    /// Remove feeds from the list
    Del {
        #[arg(required = true, value_name = "URI")]
        uris: Vec<String>,
    },
    /// Show the identifiers of entries already sent
    Seen,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Record new entries as seen without sending anything
    #[arg(long)]
    no_send: bool,

    /// Feeds processed at the same time
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,
}

#[derive(Args, Debug)]
struct PushArgs {
    /// Pushover application API token
    #[arg(long, env = "PUSHOVER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Pushover user (or group) key
    #[arg(long, env = "PUSHOVER_USER_KEY", hide_env_values = true)]
    user_key: Option<String>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Send Pushover notifications
    #[arg(long)]
    use_pushover: bool,

    #[arg(long, env = "PUSHOVER_API_KEY", hide_env_values = true)]
    pushover_api_key: Option<String>,

    #[arg(long, env = "PUSHOVER_USER_KEY", hide_env_values = true)]
    pushover_user_key: Option<String>,

    /// Create Sendy email campaigns
    #[arg(long)]
    use_sendy: bool,

    /// Host of the Sendy installation, e.g. sendy.example.com
    #[arg(long, value_name = "HOST")]
    sendy_api_hostname: Option<String>,

    #[arg(long, env = "SENDY_API_KEY", hide_env_values = true)]
    sendy_api_key: Option<String>,

    #[arg(long)]
    sendy_list_id: Option<String>,

    #[arg(long)]
    sendy_from_name: Option<String>,

    #[arg(long)]
    sendy_from_email: Option<String>,

    /// HTML email template with {{.Title}} and {{.Body}} placeholders
    #[arg(long, value_name = "FILE")]
    email_template: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,rss2push=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = get_config_dir()?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load '{}'", config_path.display()))?;

    let feeds_path = cli
        .feeds
        .clone()
        .or_else(|| config.feeds_file.clone())
        .unwrap_or_else(|| config_dir.join("feeds.txt"));
    let seen_path = cli
        .seen_db
        .clone()
        .or_else(|| config.seen_db.clone())
        .unwrap_or_else(|| config_dir.join("seen.db"));

    match cli.command {
        Command::List => {
            let list = FeedList::load(&feeds_path)?;
            for uri in list.entries() {
                println!("{}", uri);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Add { uris } => {
            let mut list = FeedList::load(&feeds_path)?;
            for uri in &uris {
                if !list.add(uri)? {
                    eprintln!("Already listed: {}", uri.trim());
                }
            }
            list.save()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Del { uris } => {
            let mut list = FeedList::load(&feeds_path)?;
            for uri in &uris {
                if !list.remove(uri) {
                    eprintln!("Not listed: {}", uri.trim());
                }
            }
            list.save()?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Seen => {
            let db = open_seen_db(&seen_path).await?;
            for record in db.records().await? {
                let when = DateTime::from_timestamp(record.recorded_at, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| record.recorded_at.to_string());
                println!("{}  {}", when, record.identifier);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Push(args) => {
            let selection = SinkSelection {
                pushover: config.resolve_pushover(PushoverOverrides {
                    enabled: true,
                    api_key: args.api_key,
                    user_key: args.user_key,
                })?,
                sendy: None,
            };
            poll(&config, selection, &args.run, &feeds_path, &seen_path).await
        }
        Command::Send(args) => {
            let selection = SinkSelection {
                pushover: config.resolve_pushover(PushoverOverrides {
                    enabled: args.use_pushover,
                    api_key: args.pushover_api_key,
                    user_key: args.pushover_user_key,
                })?,
                sendy: config.resolve_sendy(SendyOverrides {
                    enabled: args.use_sendy,
                    hostname: args.sendy_api_hostname,
                    api_key: args.sendy_api_key,
                    list_id: args.sendy_list_id,
                    from_name: args.sendy_from_name,
                    from_email: args.sendy_from_email,
                    template: args.email_template,
                })?,
            }
            .require_any()?;
            poll(&config, selection, &args.run, &feeds_path, &seen_path).await
        }
    }
}

async fn open_seen_db(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_config_dir(parent)?;
        }
    }
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in seen-state path"))?;
    Database::open(path_str)
        .await
        .with_context(|| format!("Failed to open seen-state database '{}'", path.display()))
}

/// One pass over the feed list with validated sinks.
async fn poll(
    config: &Config,
    selection: SinkSelection,
    args: &RunArgs,
    feeds_path: &Path,
    seen_path: &Path,
) -> Result<ExitCode> {
    let fetcher = FeedFetcher::new(config.timeout()).context("Failed to build HTTP client")?;
    let sinks = selection.into_sinks(fetcher.client())?;
    let sinks = if args.no_send {
        tracing::info!(sinks = ?sinks, "Dry run, nothing will be sent");
        SinkSet::new()
    } else {
        sinks
    };

    let list = FeedList::load(feeds_path)?;
    if list.entries().is_empty() {
        tracing::warn!(path = %feeds_path.display(), "Feed list is empty, nothing to do");
        return Ok(ExitCode::SUCCESS);
    }

    let db = open_seen_db(seen_path).await?;
    let ledger = Arc::new(SeenLedger::new(Arc::new(db)));
    let orchestrator = Orchestrator::new(FeedProcessor::new(fetcher, ledger, sinks))
        .with_concurrency(args.concurrency.unwrap_or(config.concurrency));

    let result = orchestrator.run(list.entries()).await;
    result
        .report(&mut std::io::stderr())
        .context("Failed to write error report")?;

    tracing::info!(
        feeds = list.entries().len(),
        dispatched = result.dispatched(),
        failed = result.failures.len(),
        "Done"
    );

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
