//! `supaman` - CLI for the SupaMan mission dashboard
//!
//! This binary runs the live dashboard and a few one-shot commands against
//! the configured backend.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use supaman::cli::{
    Cli, Command, ConfigCommand, DispatchCommand, ListCommand, OutputFormat, RunCommand,
    TailCommand,
};
use supaman::feed::{
    fetch_with_retry, format_mission, parse_console_line, Draft, TerminalView, UiInput,
};
use supaman::{
    backend, init_logging, Config, FeedController, FeedOptions, MemoryStore, Mission,
    MissionStore, SupabaseStore,
};

/// How long to wait for blocking work (the stdin reader) on exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let result = runtime.block_on(execute(cli));
    // Stdin reads park a blocking thread that cannot be interrupted.
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    result
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    // Validation loads its own file, so a broken default config can be checked.
    if let Command::Config(ConfigCommand::Validate { file }) = cli.command {
        validate_config(file.or(cli.config));
        return Ok(());
    }

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Run(cmd) => handle_run(&config, &cmd).await,
        Command::List(cmd) => handle_list(&config, &cmd).await,
        Command::Dispatch(cmd) => handle_dispatch(&config, &cmd).await,
        Command::Tail(cmd) => handle_tail(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn connect(config: &Config) -> anyhow::Result<Arc<dyn MissionStore>> {
    let client = backend::init(config).context("failed to set up the backend client")?;
    info!(url = %client.base_url(), table = client.table(), "connected backend client");
    Ok(Arc::new(SupabaseStore::new(client)))
}

async fn handle_run(config: &Config, cmd: &RunCommand) -> anyhow::Result<()> {
    let store: Arc<dyn MissionStore> = if cmd.offline {
        info!("running against the in-process store");
        Arc::new(MemoryStore::new())
    } else {
        connect(config)?
    };

    let controller = FeedController::new(store, FeedOptions::from_config(config));
    let (inputs_tx, inputs_rx) = mpsc::channel(16);
    let console = tokio::spawn(forward_console(inputs_tx));

    let mut view = TerminalView::new(!cmd.no_clear);
    let state = controller.run(inputs_rx, &mut view).await;

    console.abort();
    info!(missions = state.missions.len(), "dashboard closed");
    Ok(())
}

/// Feed stdin lines to the dashboard until EOF, `:q` or Ctrl-C.
async fn forward_console(inputs: mpsc::Sender<UiInput>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    for input in parse_console_line(&line) {
                        if inputs.send(input).await.is_err() {
                            return;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read console input");
                    break;
                }
            },
            _ = &mut ctrl_c => break,
        }
    }

    // The dashboard may already be gone.
    let _ = inputs.send(UiInput::Unmount).await;
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let store = connect(config)?;
    let retry = FeedOptions::from_config(config).retry;
    let mut missions = fetch_with_retry(store, retry)
        .await
        .context("failed to fetch missions")?;
    if let Some(limit) = cmd.limit {
        missions.truncate(limit);
    }

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&missions)?),
        OutputFormat::Plain => {
            for mission in &missions {
                println!("{}", format_mission(mission, &Local));
            }
        }
        OutputFormat::Table => print_table(&missions),
    }
    Ok(())
}

fn print_table(missions: &[Mission]) {
    if missions.is_empty() {
        println!("No missions.");
        return;
    }

    let id_width = missions
        .iter()
        .map(|m| m.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    println!("{:<id_width$}  {:<10}  {:<19}  TITLE", "ID", "STATUS", "CREATED");
    for mission in missions {
        println!(
            "{:<id_width$}  {:<10}  {:<19}  {}",
            mission.id.as_str(),
            mission.status.as_str().to_uppercase(),
            mission
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            mission.title
        );
    }
}

async fn handle_dispatch(config: &Config, cmd: &DispatchCommand) -> anyhow::Result<()> {
    let Some(payload) = Draft::new(cmd.title.trim(), cmd.description.trim()).to_new_mission()
    else {
        bail!("mission title must not be empty");
    };

    let store = connect(config)?;
    store
        .insert(payload)
        .await
        .context("failed to dispatch mission")?;
    println!("Mission dispatched: {}", cmd.title.trim());
    Ok(())
}

async fn handle_tail(config: &Config, cmd: &TailCommand) -> anyhow::Result<()> {
    let store = connect(config)?;
    let mut subscription = store
        .subscribe_inserts()
        .await
        .context("failed to subscribe to mission inserts")?;
    info!("waiting for new missions (Ctrl-C to stop)");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let closed = loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(mission) => print_event(&mission, cmd.format)?,
                None => break true,
            },
            _ = &mut ctrl_c => break false,
        }
    };

    subscription.release().await;
    if closed {
        bail!("the backend closed the subscription");
    }
    Ok(())
}

fn print_event(mission: &Mission, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(mission)?),
        OutputFormat::Plain | OutputFormat::Table => {
            println!("{}", format_mission(mission, &Local));
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Backend]");
                println!(
                    "  URL:                {}",
                    config.backend.url.as_deref().unwrap_or("(not set)")
                );
                println!(
                    "  API key:            {}",
                    config.backend.api_key.as_deref().unwrap_or("(not set)")
                );
                println!("  Schema:             {}", config.backend.schema);
                println!("  Table:              {}", config.backend.table);
                println!(
                    "  Request timeout:    {}s",
                    config.backend.request_timeout_secs
                );
                println!();
                println!("[Realtime]");
                println!("  Channel:            {}", config.realtime.channel);
                println!(
                    "  Heartbeat:          {}s",
                    config.realtime.heartbeat_interval_secs
                );
                println!("  Event buffer:       {}", config.realtime.event_buffer);
                println!();
                println!("[Feed]");
                println!("  Dedupe by id:       {}", config.feed.dedupe_by_id);
                println!("  Fetch attempts:     {}", config.feed.fetch_max_attempts);
                println!(
                    "  Fetch backoff:      {}ms (max {}ms)",
                    config.feed.fetch_backoff_ms, config.feed.fetch_max_backoff_ms
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => validate_config(file),
    }
    Ok(())
}

fn validate_config(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(config) => match config.credentials() {
            Ok(_) => println!("Configuration is valid."),
            Err(e) => println!("Configuration is valid, but network commands will fail: {e}"),
        },
        Err(e) => println!("Configuration error: {e}"),
    }
}
