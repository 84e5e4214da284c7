use std::io;
use std::process::ExitCode;

use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;
use tracing::level_filters::LevelFilter;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use clap::Parser;
use coin_shop::config::{Backend, Config};
use coin_shop::csv::{CsvError, read_commands};
use coin_shop::engine::QueryError;
use coin_shop::{AccountStore, Coins, Engine, MemoryStore, SqliteStore, StoreError, report};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Csv(#[from] CsvError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("failed to write snapshots: {0}")]
    Io(#[from] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let result = match config.backend() {
        Backend::Memory => execute(Engine::new(MemoryStore::new()), &config).await,
        Backend::SqliteInMemory => match SqliteStore::in_memory() {
            Ok(store) => execute(Engine::new(store), &config).await,
            Err(e) => Err(e.into()),
        },
        Backend::SqliteFile(path) => match SqliteStore::open(&path) {
            Ok(store) => execute(Engine::new(store), &config).await,
            Err(e) => Err(e.into()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute<S: AccountStore>(engine: Engine<S>, config: &Config) -> Result<(), AppError> {
    let engine = engine.with_starting_balance(Coins::new(config.starting_balance));

    let path = config.input.clone();
    if path.extension().is_none_or(|ext| ext != "csv") {
        warn!(path = %path.display(), "input file seems to not be a csv file");
    }

    let commands = read_commands(path)?;
    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(command_receiver)).await;

    let snapshots = report::snapshots(&engine)?;
    report::write_snapshots(io::stdout().lock(), &snapshots)?;
    Ok(())
}
