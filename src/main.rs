// ABOUTME: Entry point for the adloop binary.
// ABOUTME: Loads .env and config, initializes tracing, and dispatches the CLI subcommands.

use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use adloop::cli::{Cli, Commands, StartArgs};
use adloop::config::AdloopConfig;
use adloop::control::{self, ControlRequest, RuntimeFiles};
use adloop::daemon;
use adloop::scheduler::{Scheduler, SchedulerControl, SchedulerStatus, spawn_signal_handler};
use adloop_agent::{AgentSettings, MarketingWorkflow, create_llm_client};
use adloop_meta::{GraphClient, OAuthManager, TokenCache};
use adloop_store::{CachePaths, HistoryStore};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let (config, paths) = match load() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_tracing(&cli, &paths) {
        eprintln!("error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match dispatch(cli, config, paths).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "adloop failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load() -> anyhow::Result<(AdloopConfig, CachePaths)> {
    let config = AdloopConfig::from_env().context("loading configuration")?;
    let paths = config.cache_paths().context("preparing the cache directory")?;
    Ok((config, paths))
}

/// Log to stderr, or to the log file when running as the background process.
fn init_tracing(cli: &Cli, paths: &CachePaths) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("adloop=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if matches!(cli.command, Commands::Run(_)) {
        let log_path = paths.log_path();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;
        builder.with_writer(Mutex::new(file)).with_ansi(false).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

async fn dispatch(cli: Cli, config: AdloopConfig, paths: CachePaths) -> anyhow::Result<()> {
    let files = RuntimeFiles::new(&paths, &cli.name);

    match cli.command {
        Commands::Start(args) if args.daemon => {
            files.ensure_free()?;
            // Authorize here, where the user can see the URL; the child reuses the cached token.
            oauth_manager(&config, &paths)
                .ensure_token()
                .await
                .context("authenticating with Meta")?;
            let pid = daemon::spawn_detached(&args.run_args(&cli.name), &files).await?;
            println!("Scheduler '{}' started in the background (pid {}).", cli.name, pid);
            println!("Log: {}", paths.log_path().display());
        }
        Commands::Start(args) => run_scheduler(args, &config, &paths, &files, false).await?,
        Commands::Run(args) => run_scheduler(args, &config, &paths, &files, true).await?,
        Commands::Status => print_status(&files).await?,
        Commands::Pause => print_reply(&files, ControlRequest::Pause).await?,
        Commands::Resume => print_reply(&files, ControlRequest::Resume).await?,
        Commands::Stop => print_reply(&files, ControlRequest::Stop).await?,
        Commands::Interval { seconds } => print_reply(&files, ControlRequest::Interval { seconds }).await?,
        Commands::Kill => {
            let pid = daemon::kill(&files)?;
            println!("Sent SIGTERM to scheduler '{}' (pid {}).", files.name, pid);
        }
    }
    Ok(())
}

fn oauth_manager(config: &AdloopConfig, paths: &CachePaths) -> OAuthManager {
    OAuthManager::new(config.oauth_config(), TokenCache::new(paths.token_path()))
}

async fn run_scheduler(
    args: StartArgs,
    config: &AdloopConfig,
    paths: &CachePaths,
    files: &RuntimeFiles,
    daemon_mode: bool,
) -> anyhow::Result<()> {
    files.ensure_free()?;

    let (client, model) = create_llm_client(&config.llm_provider, config.llm_model.as_deref())?;
    tracing::info!(provider = %config.llm_provider, %model, "using LLM");
    let settings = AgentSettings::new(client, model).max_iterations(config.max_iterations);

    let oauth = Arc::new(oauth_manager(config, paths));
    let graph = GraphClient::new(config.graph_api_base.clone(), oauth.clone())?;
    let db_path = config.db_path(paths);
    let store = HistoryStore::open(&db_path)
        .with_context(|| format!("opening history database {}", db_path.display()))?;
    let store = Arc::new(tokio::sync::Mutex::new(store));

    let workflow = MarketingWorkflow::authenticated(args.input(), settings, graph, store, &oauth).await?;

    let control = SchedulerControl::new(
        &files.name,
        args.interval_seconds(),
        daemon_mode,
        Some(files.status.clone()),
    );
    files.write_pid()?;
    let result = serve_and_run(workflow, control, files).await;
    files.cleanup();

    let status = result?;
    tracing::info!(name = %status.name, steps = status.step_count, "scheduler exited");
    Ok(())
}

async fn serve_and_run(
    workflow: MarketingWorkflow,
    control: SchedulerControl,
    files: &RuntimeFiles,
) -> anyhow::Result<SchedulerStatus> {
    let listener = control::bind(&files.socket)?;
    let server = tokio::spawn(control::serve(listener, control.clone()));
    spawn_signal_handler(control.clone()).context("installing signal handlers")?;

    if !control.status().daemon_mode {
        eprintln!(
            "Scheduler '{}' running every {}s. Press Ctrl+C to stop.",
            files.name,
            control.interval().as_secs()
        );
    }
    let status = Scheduler::new(Box::new(workflow), control).run().await;
    server.abort();
    Ok(status)
}

async fn print_status(files: &RuntimeFiles) -> anyhow::Result<()> {
    let live = match files.request(&ControlRequest::Status).await {
        Ok(response) => response
            .into_result()?
            .map(serde_json::from_value::<SchedulerStatus>)
            .transpose()?,
        Err(e) => {
            tracing::debug!(error = %e, "control socket unavailable, reading status file");
            None
        }
    };
    let (status, is_live) = match live {
        Some(status) => (status, true),
        None => (files.read_status()?, false),
    };

    println!("Scheduler '{}' status:", status.name);
    if !is_live {
        println!("  (not running; last recorded status)");
    }
    let time = |t: Option<chrono::DateTime<chrono::Utc>>, none: &str| {
        t.map(|t| t.to_rfc3339()).unwrap_or_else(|| none.to_string())
    };
    println!("  Running: {}", status.running && is_live);
    println!("  Paused: {}", status.paused);
    println!("  Daemon: {}", status.daemon_mode);
    println!("  Workflow: {} ({})", status.workflow, status.workflow_status.as_str());
    println!("  Steps completed: {}", status.step_count);
    println!("  Uptime: {:.0} seconds", status.uptime_seconds);
    println!("  Last run: {}", time(status.last_run_time, "never"));
    println!("  Next run: {}", time(status.next_run_time, "unknown"));
    println!("  Interval: {} seconds", status.interval_seconds);
    println!("  PID: {}", status.pid);
    if let Some(error) = &status.last_error {
        println!("  Last error: {}", error);
    }
    Ok(())
}

async fn print_reply(files: &RuntimeFiles, request: ControlRequest) -> anyhow::Result<()> {
    let data = files.request(&request).await?.into_result()?;
    match data.as_ref().and_then(|d| d.get("message")).and_then(|m| m.as_str()) {
        Some(message) => println!("{}", message),
        None => println!("{}", serde_json::to_string_pretty(&data)?),
    }
    Ok(())
}
