use crate::{
    error::CliError,
    shutdown::{ExitCode, cancel_on_signal},
};
use clap::Parser;
use commands::Commands;
use engine_config::{
    env::EnvContext,
    settings::{ConnectionConfig, PollerConfig, SessionConfig, validator::ConfigValidator},
};
use engine_core::state::{OffsetStore, sled_store::SledOffsetStore};
use engine_runtime::execution::executor;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod output;
mod shutdown;

const EVENT_BUFFER: usize = 1024;

#[derive(Parser)]
#[command(
    name = "pollcdc",
    version = "0.0.1",
    about = "Polling-based change data capture"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Events go to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match execute(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::GeneralError
        }
    };
    code.into()
}

async fn execute(command: Commands) -> Result<ExitCode, CliError> {
    match command {
        Commands::Run {
            config,
            env_file,
            state_dir,
        } => {
            let mut env = EnvContext::from_process();
            if let Some(path) = env_file {
                env.load_file(path)?;
            }
            let config = PollerConfig::load(&config, &env)?;

            let state_dir = match state_dir {
                Some(dir) => PathBuf::from(dir),
                None => match &config.state_dir {
                    Some(dir) => dir.clone(),
                    None => default_state_dir()?,
                },
            };
            let store = open_offset_store(&state_dir)?;
            run_sessions(config, Some(store)).await
        }
        Commands::Poll {
            driver,
            url,
            username,
            password,
            table,
            column,
            interval,
            offset,
            seed,
            state_dir,
        } => {
            let config = PollerConfig {
                sessions: vec![SessionConfig {
                    name: None,
                    table,
                    polling_column: column,
                    polling_interval_secs: interval,
                    connection: ConnectionConfig {
                        url: Some(url),
                        username,
                        password,
                        driver: Some(driver),
                        datasource: None,
                    },
                    seed,
                    last_offset: offset,
                }],
                ..Default::default()
            };
            ConfigValidator::new(&config).validate()?;

            let store = match state_dir {
                Some(dir) => Some(open_offset_store(&PathBuf::from(dir))?),
                None => None,
            };
            run_sessions(config, store).await
        }
        Commands::TestConn { driver, url } => {
            let product = conn::test_connection(driver, &url).await?;
            println!("{product}");
            Ok(ExitCode::Success)
        }
        Commands::Offset {
            session,
            state_dir,
            json,
        } => {
            let state_dir = match state_dir {
                Some(dir) => PathBuf::from(dir),
                None => default_state_dir()?,
            };
            let store = open_offset_store(&state_dir)?;
            let checkpoints = match session {
                Some(session) => vec![
                    store
                        .load(&session)
                        .await?
                        .ok_or(CliError::NoCheckpoint(session))?,
                ],
                None => store.list().await?,
            };
            if checkpoints.is_empty() {
                info!(state_dir = %state_dir.display(), "No stored offsets.");
            }
            for checkpoint in &checkpoints {
                output::print_checkpoint(checkpoint, json)?;
            }
            Ok(ExitCode::Success)
        }
    }
}

async fn run_sessions(
    config: PollerConfig,
    store: Option<Arc<dyn OffsetStore>>,
) -> Result<ExitCode, CliError> {
    let cancel = CancellationToken::new();
    let listener = cancel_on_signal(cancel.clone());

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let printer = tokio::spawn(output::print_events(rx));

    // The executor drops every sender when it returns, which ends the printer.
    let summary = executor::run(config, store, tx, cancel.clone()).await?;
    let printed = printer.await??;

    // Only the signal listener cancels this token before the run ends.
    let interrupted = cancel.is_cancelled();
    cancel.cancel();
    listener.await?;

    output::log_summary(&summary);
    info!(events = printed, failed = summary.failed(), "Done.");

    Ok(ExitCode::for_run(interrupted, summary.failed()))
}

fn default_state_dir() -> Result<PathBuf, CliError> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?;
    Ok(home.join(".pollcdc/state"))
}

fn open_offset_store(path: &Path) -> Result<Arc<dyn OffsetStore>, CliError> {
    let store = SledOffsetStore::open(path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open offset store at {}: {err}",
            path.display()
        ))
    })?;
    Ok(Arc::new(store))
}
