//! CLI binary entrypoint.

mod error;
mod format;

use clap::{Parser, Subcommand};
use error::{CliError, ExitCode};
use format::{LogFormat, init_tracing};
use optron_config::{
    OptronEnv, ValidatedOptronConfig, load_optron_config_from_path, load_optron_config_std_env,
    to_pretty_json,
};
use optron_exporter::{LogReporter, Optron};
use optron_metrics::{Healthcheck, Metric, Registry, RegistryExt, default_registry};
use optron_shared::CancellationToken;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const UPTIME_GAUGE: &str = "process.uptime";
const ALIVE_HEALTHCHECK: &str = "process.alive";
const UPTIME_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(
    name = "optron",
    version,
    about = "Push process metrics to an optron collector",
    long_about = None
)]
struct Cli {
    /// Log line encoding (stderr).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run an exporter for this process until Ctrl-C.
    Run(RunArgs),
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective config (file + `OPTRON_*` env) after validation.
    Check {
        /// Config file (`.json` or `.toml`).
        #[arg(long = "config")]
        path: Option<PathBuf>,
    },
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    /// Exporter identifier, sent as `id`.
    #[arg(long)]
    id: String,
    /// Application group, sent as `game`.
    #[arg(long)]
    game: Option<String>,
    /// Config file (`.json` or `.toml`).
    #[arg(long = "config")]
    path: Option<PathBuf>,
    /// Also log every metric at this period.
    #[arg(long)]
    log_interval_ms: Option<u64>,
}

pub(crate) struct CliOutput {
    stdout: String,
    exit_code: ExitCode,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(&cli.command) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

fn run(command: &Commands) -> Result<CliOutput, CliError> {
    match command {
        Commands::Config {
            command: ConfigCommands::Check { path },
        } => config_check(path.as_deref()),
        Commands::Run(args) => run_exporter(args),
    }
}

fn config_check(path: Option<&Path>) -> Result<CliOutput, CliError> {
    let env = collect_scoped_env("OPTRON_");
    config_check_with_env(&env, path)
}

fn config_check_with_env(
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
) -> Result<CliOutput, CliError> {
    let config = load_config(env, path)?;
    let stdout = to_pretty_json(config.as_ref()).map_err(CliError::Internal)?;
    Ok(CliOutput {
        stdout,
        exit_code: ExitCode::Ok,
    })
}

fn load_config(
    env: &BTreeMap<String, String>,
    path: Option<&Path>,
) -> Result<ValidatedOptronConfig, CliError> {
    let env = OptronEnv::from_map(env).map_err(|error| CliError::Config(error.into()))?;
    load_optron_config_from_path(path, &env).map_err(CliError::Config)
}

fn run_exporter(args: &RunArgs) -> Result<CliOutput, CliError> {
    let config = load_optron_config_std_env(args.path.as_deref()).map_err(CliError::Config)?;
    let registry = default_registry();
    install_process_metrics(registry.as_ref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let mut optron = Optron::new(args.id.as_str(), &config, registry.clone());
        if let Some(game) = &args.game {
            optron = optron.with_game(game.as_str());
        }

        let mut tasks = vec![
            optron.spawn(cancel.clone()),
            tokio::spawn(track_uptime(registry.clone(), cancel.clone())),
        ];
        if let Some(interval_ms) = args.log_interval_ms.filter(|value| *value > 0) {
            let reporter = LogReporter::new(registry.clone(), Duration::from_millis(interval_ms))
                .with_scale(Duration::from_millis(1));
            tasks.push(reporter.spawn(cancel.clone()));
        }

        let signal = tokio::signal::ctrl_c().await;
        cancel.cancel();
        for task in tasks {
            if let Err(error) = task.await {
                tracing::warn!(error = %error, "cli.task_failed");
            }
        }
        signal
    })?;

    Ok(CliOutput {
        stdout: String::new(),
        exit_code: ExitCode::Ok,
    })
}

fn install_process_metrics(registry: &dyn Registry) -> Result<(), CliError> {
    registry
        .gauge(UPTIME_GAUGE)
        .map_err(|error| CliError::Internal(error.into()))?;
    registry.get_or_register(ALIVE_HEALTHCHECK, Metric::from(Healthcheck::new(|| Ok(()))));
    Ok(())
}

async fn track_uptime(registry: Arc<dyn Registry>, cancel: CancellationToken) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(UPTIME_PERIOD);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {},
        }
        let uptime = i64::try_from(started.elapsed().as_secs()).unwrap_or(i64::MAX);
        if let Ok(gauge) = registry.gauge(UPTIME_GAUGE) {
            gauge.update(uptime);
        }
    }
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn collect_scoped_env(prefix: &str) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(prefix))
        .collect()
}
