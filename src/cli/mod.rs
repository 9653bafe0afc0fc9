//! CLI for pumpkins
//!
//! - `start`: bring Jenkins up and hand over to a command or shell
//! - `whoami`: show the authenticated user
//! - `jobs`: list jobs
//! - `build`: schedule a build and report its result
//! - `discover-mount`: show which directory bootstrap artifacts are read from
//! - `completions`: generate shell completions

pub mod completions;
mod connection;

use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, CommandFactory, Parser, Subcommand, ValueEnum};
use pumpkins::client::BuildResult;
use pumpkins::host::Host;
use pumpkins::infrastructure::{Config, init_logging};
use pumpkins::orchestrator::{MountFilter, Orchestrator, discover_from_table};
use pumpkins::polling::RetryPolicy;
use tracing::debug;

/// CLI arguments for pumpkins
#[derive(Parser, Debug)]
#[command(name = "pumpkins")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "PUMPKINS_LOG_LEVEL")]
    log_level: Option<String>,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "PUMPKINS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Server connection flags; unset values come from the configuration
#[derive(ClapArgs, Debug, Default, PartialEq, Eq)]
struct ConnectionArgs {
    /// Jenkins URL
    #[arg(long)]
    url: Option<String>,
    /// User name
    #[arg(long)]
    user: Option<String>,
    /// Password or API token
    #[arg(long)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start Jenkins, wait until it is ready, then run COMMAND (or a shell)
    Start {
        /// Leave setup to the web wizard and print the admin password
        #[arg(long)]
        interactive: bool,
        /// Command to run once the server is ready
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Show the authenticated user
    Whoami {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// List jobs
    Jobs {
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Schedule a build
    Build {
        /// Job name (`folder/name` for jobs in folders)
        job: String,
        /// Build parameter
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, String)>,
        /// Return once the build is queued
        #[arg(long)]
        no_wait: bool,
        /// Give up waiting after this many seconds (0 = never)
        #[arg(long, default_value_t = 0)]
        timeout: u64,
        #[command(flatten)]
        connection: ConnectionArgs,
    },

    /// Show the directory bootstrap artifacts are read from
    DiscoverMount,

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl From<ShellArg> for clap_complete::Shell {
    fn from(shell: ShellArg) -> Self {
        match shell {
            ShellArg::Bash => Self::Bash,
            ShellArg::Zsh => Self::Zsh,
            ShellArg::Fish => Self::Fish,
            ShellArg::PowerShell => Self::PowerShell,
            ShellArg::Elvish => Self::Elvish,
        }
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Loads the config file, installs logging, then applies env overrides
///
/// Logging goes first so rejected overrides are reported.
fn load_config(path: Option<&std::path::Path>, log_level: Option<&str>) -> Result<Config> {
    let mut config = Config::load(path).context("Failed to load configuration")?;
    init_logging(log_level.unwrap_or(&config.log_level));
    config.apply_env();
    Ok(config)
}

/// Shell-style exit value: the exit code, or 128 + signal
fn exit_value(status: ExitStatus) -> u8 {
    let code = status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1);
    u8::try_from(code).unwrap_or(1)
}

/// Parse and execute CLI arguments
pub async fn run() -> Result<ExitCode> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref(), args.log_level.as_deref())?;
    debug!(
        file = ?args.config,
        jenkins_home = %config.jenkins_home.display(),
        url = %config.url,
        interactive = config.interactive,
        "Configuration loaded"
    );

    match args.command {
        Command::Start {
            interactive,
            command,
        } => {
            config.interactive |= interactive;
            let status = Orchestrator::new(config)
                .run(command)
                .await
                .context("Startup failed")?;
            Ok(ExitCode::from(exit_value(status)))
        }
        Command::Whoami { connection } => {
            let host = connection::host(&connection, &config)?;
            let me = host.me().await.context("Failed to read current user")?;
            println!("{} ({})", me.full_name(), me.id());
            Ok(ExitCode::SUCCESS)
        }
        Command::Jobs { connection } => {
            let host = connection::host(&connection, &config)?;
            let jobs = host.jobs().await.context("Failed to list jobs")?;
            for job in &jobs {
                println!(
                    "{}\t{}\t{}",
                    job.full_name(),
                    job.color().unwrap_or("-"),
                    job.url()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Build {
            job,
            params,
            no_wait,
            timeout,
            connection,
        } => {
            let host = connection::host(&connection, &config)?
                .with_wait_policy(RetryPolicy::unbounded().with_timeout_secs(timeout));
            build(&host, &job, params.into_iter().collect(), no_wait).await
        }
        Command::DiscoverMount => {
            let root = discover_from_table(
                &config.mount_table,
                &MountFilter::from_config(&config),
                &config.default_mount,
            )
            .context("Mount discovery failed")?;
            println!("{root}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Completions { shell, output } => {
            let completions = completions::generate_completions(shell.into())?;
            match output {
                Some(path) => completions::save_completions(&completions, &path)?,
                None => print!("{completions}"),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn build(
    host: &Host,
    name: &str,
    params: HashMap<String, String>,
    no_wait: bool,
) -> Result<ExitCode> {
    let job = host
        .job(name)
        .await
        .with_context(|| format!("Failed to look up job '{name}'"))?
        .with_context(|| format!("No such job: {name}"))?;

    let queue = job
        .schedule(&params)
        .await
        .with_context(|| format!("Failed to schedule '{name}'"))?;
    if no_wait {
        println!("Queued {queue}");
        return Ok(ExitCode::SUCCESS);
    }

    let build = queue.wait().await.context("Build did not start")?;
    let info = build.wait().await.context("Build did not finish")?;
    let result = info.result.unwrap_or(BuildResult::Unknown);
    println!("{build}: {result}");

    if result == BuildResult::Success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
