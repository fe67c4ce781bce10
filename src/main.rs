//! Binary entry point for the `ecloud` CLI.

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ecloud::cli::{Cli, DecodeIdCommand, GetCommand, WaitCommand};
use ecloud::{
    ApiRequest, DecodeError, EcloudClient, EcloudConfig, EcloudError, IdKind, TaskHandle,
    TaskOutcome, decode_id,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Api(#[from] EcloudError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("failed to write output: {0}")]
    Output(String),
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Output(err.to_string())
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, io::stdout()).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn dispatch(cli: Cli, out: impl Write) -> Result<(), CliError> {
    match cli {
        Cli::Get(command) => get(command, out).await,
        Cli::Wait(command) => wait(command, out).await,
        Cli::DecodeId(command) => decode(&command, out),
    }
}

fn client_from_env() -> Result<(EcloudConfig, EcloudClient<ecloud::ReqwestTransport>), CliError> {
    let config =
        EcloudConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let client = EcloudClient::from_config(&config)?;
    Ok((config, client))
}

async fn get(command: GetCommand, mut out: impl Write) -> Result<(), CliError> {
    let (_, client) = client_from_env()?;
    let request = command
        .query
        .into_iter()
        .fold(ApiRequest::get(command.path), |request, (name, value)| {
            request.query(name, value)
        });
    let document = client.send(&request).await?;
    writeln!(out, "{document}")?;
    Ok(())
}

async fn wait(command: WaitCommand, mut out: impl Write) -> Result<(), CliError> {
    let (config, client) = client_from_env()?;
    let interval = command
        .interval
        .map_or_else(|| config.poll_policy().interval, Duration::from_secs);
    let timeout = command
        .timeout
        .map_or_else(|| config.poll_policy().timeout, Duration::from_secs);
    let handle = TaskHandle::new(command.task);
    match client.wait_for_completion(&handle, interval, timeout).await? {
        TaskOutcome::Completed => writeln!(out, "task {handle} complete")?,
        TaskOutcome::Cancelled => writeln!(out, "stopped waiting for task {handle}")?,
    }
    Ok(())
}

fn decode(command: &DecodeIdCommand, mut out: impl Write) -> Result<(), CliError> {
    let kind: IdKind = command.kind.parse()?;
    for part in decode_id(kind, &command.id)? {
        writeln!(out, "{part}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
