// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use logparser::exporters::stdout::StdoutExporter;
use logparser::init::args::AgentRun;
use logparser::init::config::get_logparser_config;
use logparser::init::wait;
use logparser::receivers::logparser::{LogParserReceiver, accumulator};

const EXPORTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Tail and parse log files
    Start(Box<AgentRun>),

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "logparser")]
#[command(bin_name = "logparser")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "LOGPARSER_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[arg(long, global = true, env = "LOGPARSER_ENVIRONMENT", default_value = "dev")]
    /// Environment
    environment: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version())
        }
        Some(Commands::Start(agent)) => {
            let _guard = match setup_logging(&opt.log_format) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            match run_agent(agent, &opt.environment) {
                Ok(_) => {}
                Err(e) => {
                    error!(error = e, "Failed to run logparser.");
                    return ExitCode::from(1);
                }
            }
        }
        _ => {
            // it shouldn't be possible to get here since we mark a subcommand as
            // required
            error!("Must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn run_agent(agent: Box<AgentRun>, env: &str) -> Result<(), BoxError> {
    let config = get_logparser_config(&agent)?;
    info!(
        environment = env,
        files = ?config.files,
        "Starting logparser"
    );

    let (acc, measurements) = accumulator::bounded(agent.queue_size.max(1));

    let mut exporter_join_set: JoinSet<Result<(), BoxError>> = JoinSet::new();
    let exporter_cancel = CancellationToken::new();
    {
        let token = exporter_cancel.clone();
        let mut exporter = StdoutExporter::new(measurements, agent.output_format.into());
        exporter_join_set.spawn(async move {
            exporter.start(token).await;
            Ok(())
        });
    }

    let running = LogParserReceiver::new(config).start(acc).await?;
    if let Some(errors) = running.open_errors() {
        warn!(failed = errors.len(), "Continuing without files that could not be opened");
    }

    select! {
        _ = signal_wait() => {
            info!("Shutdown signal received.");
        },
        e = wait::wait_for_any_task(&mut exporter_join_set) => {
            match e {
                Ok(()) => warn!("Unexpected early exit of exporter."),
                Err(e) => error!(error = e, "Exporter failed."),
            }
        },
    }

    // Dispatchers forward what was already read before exiting, so the
    // exporter is only cancelled once the receiver has fully stopped.
    let stopped = running.stop().await;
    info!(
        files = stopped.sessions().len(),
        measurements = stopped.stats().measurements,
        "Logparser stopped"
    );

    exporter_cancel.cancel();
    if let Err(e) =
        wait::wait_for_tasks_with_timeout(&mut exporter_join_set, EXPORTER_DRAIN_TIMEOUT).await
    {
        warn!(error = e, "Exporter did not finish cleanly");
    }

    Ok(())
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(log_format: &LogFormatArg) -> Result<LoggerGuard, BoxError> {
    LogTracer::init().expect("Unable to setup log tracer!");

    // Measurements go to stdout, so logs go to stderr.
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("notify=warn".parse()?);

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber).unwrap();
    } else {
        use std::io;
        use std::io::IsTerminal;

        // Skip color codes when not in a terminal
        let use_ansi = io::stderr().is_terminal();

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber).unwrap();
    }
    Ok(guard)
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

async fn signal_wait() {
    let mut sig_term = sig(SignalKind::terminate());
    let mut sig_int = sig(SignalKind::interrupt());

    select! {
        _ = sig_term.recv() => {},
        _ = sig_int.recv() => {},
    }
}

fn sig(kind: SignalKind) -> tokio::signal::unix::Signal {
    signal(kind).unwrap()
}
