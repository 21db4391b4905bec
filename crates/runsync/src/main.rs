use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use runsync::{
    render_datasets, render_estimate, render_results, render_run_list, spawn_run_poller, CliError,
    PollerConfig, RunListCache, WatchOutcome, WatchSession,
};
use runsync_client::{HttpTransport, RunTransport};
use runsync_core::config::{load_watch_config, WatchConfig};
use runsync_core::types::{EstimateRequest, RunConfig, RunId};
use runsync_core::validation::{render_errors, Validate, ValidationLevel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "runsync.toml";

#[derive(Debug, Parser)]
#[command(name = "runsync", version, about = "Follow batch prediction runs from the terminal")]
struct Cli {
    /// TOML config file (defaults to ./runsync.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true)]
    interval_ms: Option<u64>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show run history, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show datasets available for new runs.
    Options,
    /// Follow a run until it finishes.
    Watch(WatchArgs),
    /// Start a new run.
    Submit {
        #[command(flatten)]
        run: RunArgs,
        /// Follow the run after it has been created.
        #[arg(long)]
        watch: bool,
    },
    /// Estimate cost and duration of a run without starting it.
    Estimate {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Delete all run history on the server.
    ClearHistory {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
struct WatchArgs {
    run_id: String,
    /// Print the results table once the run finishes.
    #[arg(long)]
    results: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    data_file: String,
    #[arg(long)]
    sector_map: String,
    #[arg(long)]
    max_workers: Option<u32>,
    #[arg(long)]
    chunk_size: Option<u32>,
    /// Per-row timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long)]
    fact_limit: Option<u32>,
    #[arg(long)]
    current_fact_limit: Option<u32>,
    #[arg(long)]
    top_k: Option<u32>,
    #[arg(long)]
    max_rows: Option<u64>,
}

impl RunArgs {
    fn to_config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.data_file, &self.sector_map);
        if let Some(value) = self.max_workers {
            config.max_workers = value;
        }
        if let Some(value) = self.chunk_size {
            config.chunk_size = value;
        }
        if let Some(value) = self.timeout {
            config.timeout = value;
        }
        config.fact_limit = self.fact_limit;
        config.current_fact_limit = self.current_fact_limit;
        config.top_k = self.top_k;
        config.max_rows = self.max_rows;
        config
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli).await {
        eprintln!("runsync failed: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "runsync=debug,runsync_client=debug" } else { "runsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let transport = Arc::new(
        HttpTransport::new(&config.api).context("failed to set up HTTP client")?,
    );
    let poller_config = PollerConfig::from(&config.poll);

    match cli.command {
        Command::List { json } => {
            let mut cache = RunListCache::new(transport);
            cache.refresh().await.context("failed to list runs")?;
            if json {
                let views = cache.views(Utc::now());
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                println!("{}", render_run_list(cache.runs(), Utc::now()));
            }
        }
        Command::Options => {
            let mut cache = RunListCache::new(transport);
            cache
                .refresh()
                .await
                .context("failed to load dataset options")?;
            println!("{}", render_datasets(cache.datasets()));
        }
        Command::Watch(args) => {
            watch_run(transport, RunId::new(args.run_id), poller_config, args.results).await?;
        }
        Command::Submit { run, watch } => {
            let run_config = run.to_config();
            check_run_config(&run_config)?;
            let mut cache = RunListCache::new(transport.clone());
            let run_id = cache
                .submit(&run_config)
                .await
                .context("failed to create run")?;
            println!("created run {run_id}");
            if watch {
                watch_run(transport, run_id, poller_config, false).await?;
            }
        }
        Command::Estimate { run } => {
            let request = EstimateRequest::for_config(&run.to_config());
            let estimate = transport
                .estimate(&request)
                .await
                .context("failed to estimate run")?;
            println!("{}", render_estimate(&estimate));
        }
        Command::ClearHistory { yes } => {
            if !yes {
                return Err(CliError::ConfirmationRequired.into());
            }
            let mut cache = RunListCache::new(transport);
            cache
                .clear_history()
                .await
                .context("failed to clear run history")?;
            println!("run history cleared");
        }
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<WatchConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => load_watch_config(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_watch_config(DEFAULT_CONFIG_PATH)?,
        None => WatchConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.api.base_url = base_url.clone();
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.poll.interval_ms = interval_ms;
    }

    let issues = config.validate();
    for issue in issues.iter().filter(|i| i.level == ValidationLevel::Warning) {
        tracing::warn!(code = issue.code, "{}", issue.message);
    }
    match render_errors(&issues) {
        Some(rendered) => Err(CliError::InvalidConfig(rendered)),
        None => Ok(config),
    }
}

fn check_run_config(config: &RunConfig) -> Result<(), CliError> {
    let issues = config.validate();
    for issue in issues.iter().filter(|i| i.level == ValidationLevel::Warning) {
        tracing::warn!(code = issue.code, "{}", issue.message);
    }
    match render_errors(&issues) {
        Some(rendered) => Err(CliError::InvalidRun(rendered)),
        None => Ok(()),
    }
}

async fn watch_run<T>(
    transport: T,
    run_id: RunId,
    config: PollerConfig,
    print_results: bool,
) -> anyhow::Result<()>
where
    T: RunTransport + 'static,
{
    let handle = spawn_run_poller(transport, run_id.clone(), config);
    let mut snapshots = WatchStream::new(handle.watch());
    let mut session = WatchSession::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!(run_id = %run_id, "interrupted");
                break None;
            }
            next = snapshots.next() => {
                let Some(snapshot) = next else {
                    break None;
                };
                let step = session.observe(&snapshot, Utc::now());
                if let Some(log) = step.log {
                    print!("{log}");
                }
                if let Some(line) = step.status_line {
                    eprintln!("{line}");
                }
                for notice in step.notices {
                    eprintln!("{notice}");
                }
                if let Some(outcome) = step.done {
                    break Some(outcome);
                }
            }
        }
    };

    let last = handle.snapshot();
    handle.shutdown().await;

    match outcome {
        Some(WatchOutcome::NotFound) => Err(CliError::RunNotFound(run_id).into()),
        Some(WatchOutcome::Finished(status)) => {
            if print_results {
                println!("{}", render_results(&last.results));
            }
            if let Some(error) = last.record.as_ref().and_then(|r| r.error.as_deref()) {
                eprintln!("run error: {error}");
            }
            if status.is_success() {
                Ok(())
            } else {
                anyhow::bail!("run {run_id} finished with status {status}")
            }
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("runsync").chain(args.iter().copied()))
            .expect("parse args")
    }

    #[test]
    fn global_overrides_apply_after_subcommand() {
        let cli = parse(&["watch", "r1", "--base-url", "http://api:9000", "--interval-ms", "750"]);
        let config = resolve_config(&cli).expect("config");
        assert_eq!(config.api.base_url, "http://api:9000");
        assert_eq!(config.poll.interval_ms, 750);
        assert!(matches!(cli.command, Command::Watch(WatchArgs { ref run_id, .. }) if run_id == "r1"));
    }

    #[test]
    fn config_file_is_loaded_and_validated() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "[poll]\ninterval_ms = 0").expect("write");
        let path = file.path().to_string_lossy().to_string();

        let cli = parse(&["--config", &path, "list"]);
        let err = resolve_config(&cli).expect_err("zero interval rejected");
        assert!(err.to_string().contains("poll.interval.zero"));
    }

    #[test]
    fn submit_args_map_onto_run_config() {
        let cli = parse(&[
            "submit",
            "--data-file",
            "data/full.csv",
            "--sector-map",
            "data/sectors.csv",
            "--max-workers",
            "4",
            "--top-k",
            "10",
        ]);
        let Command::Submit { run, watch } = cli.command else {
            panic!("expected submit");
        };
        assert!(!watch);
        let config = run.to_config();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.chunk_size, 2);
        assert_eq!(config.top_k, Some(10));
        assert!(check_run_config(&config).is_ok());
    }

    #[test]
    fn empty_paths_fail_run_validation() {
        let config = RunConfig::new("", "data/sectors.csv");
        let err = check_run_config(&config).expect_err("missing data file");
        assert!(err.to_string().contains("run.data_file.missing"));
    }
}
