// Shell Guard - Main Entry Point
//
// CLI front-end for the command guardrail:
// - classify the command (safe mode by default, --unsafe bypasses the policy)
// - run it when allowed and propagate its exit code
//
// Exit codes: 0 success, 2 usage error, 3 policy block, anything else comes
// from the executed command itself.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shell_guard::config::Config;
use shell_guard::error::{GuardError, EXIT_INTERNAL, EXIT_POLICY_BLOCK};
use shell_guard::policy::{Decision, Mode, PolicyEngine};
use shell_guard::tools::{CommandExecutor, ExecutionTimeout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

/// Shell Guard: run shell commands behind a lexical safety policy
#[derive(Parser, Debug)]
#[command(name = "shell-guard")]
#[command(version)]
#[command(about = "Run shell commands behind a lexical safety policy", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a command and run it if allowed
    Run {
        /// Skip every policy check (no safety guarantees)
        #[arg(long = "unsafe")]
        unsafe_mode: bool,

        /// Kill the command after this many seconds (0 disables)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Capture output and print an execution report as JSON
        #[arg(long)]
        json: bool,

        /// The command string, passed to the shell verbatim
        command: String,
    },
    /// Classify a command without running it
    Check {
        /// Skip every policy check (no safety guarantees)
        #[arg(long = "unsafe")]
        unsafe_mode: bool,

        /// The command string to classify
        command: String,
    },
    /// Print the effective policy
    Policy,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit with code 2 here
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("shell-guard: {:#}", e);
            return ExitCode::from(EXIT_INTERNAL as u8);
        }
    };

    init_tracing(&config, args.verbose);

    match dispatch(args.command, &config).await {
        Ok(code) => to_exit_code(code),
        Err(e) => {
            eprintln!("shell-guard: {:#}", e);
            let code = e
                .downcast_ref::<GuardError>()
                .map(GuardError::exit_code)
                .unwrap_or(EXIT_INTERNAL);
            to_exit_code(code)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("config file {:?} does not exist", path);
            }
            Config::load_from_path(path)
        }
        None => Config::load(),
    }
}

/// Logs go to stderr so stdout stays the command's channel
fn init_tracing(config: &Config, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        config.log_level().unwrap_or(Level::WARN)
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

fn mode_from_flag(unsafe_mode: bool) -> Mode {
    if unsafe_mode {
        Mode::Unsafe
    } else {
        Mode::Safe
    }
}

async fn dispatch(command: Commands, config: &Config) -> Result<i32> {
    let engine = PolicyEngine::new(config.pattern_library())?;

    match command {
        Commands::Run {
            unsafe_mode,
            timeout,
            json,
            command,
        } => {
            run(
                &engine,
                config,
                mode_from_flag(unsafe_mode),
                timeout,
                json,
                &command,
            )
            .await
        }
        Commands::Check {
            unsafe_mode,
            command,
        } => check(&engine, mode_from_flag(unsafe_mode), &command),
        Commands::Policy => {
            print_policy(&engine);
            Ok(0)
        }
    }
}

/// Classify, execute, and return the command's own exit code
async fn run(
    engine: &PolicyEngine,
    config: &Config,
    mode: Mode,
    timeout: Option<u64>,
    json: bool,
    command: &str,
) -> Result<i32> {
    let allowed = engine.authorize(command, mode)?;

    let mut executor_config = config.executor_config().with_capture(json);
    if let Some(secs) = timeout {
        executor_config.timeout = ExecutionTimeout::from_secs(secs);
    }
    debug!(?executor_config, "Executing authorized command");

    let executor = CommandExecutor::new(executor_config);
    let result = executor.execute(&allowed).await?;

    if json {
        let report =
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        println!("{}", report);
    }

    Ok(result.exit_code)
}

fn check(engine: &PolicyEngine, mode: Mode, command: &str) -> Result<i32> {
    match engine.classify(command, mode)? {
        Decision::Allow => {
            println!("allow");
            Ok(0)
        }
        block @ Decision::Block { .. } => {
            eprintln!("shell-guard: {}", block.message());
            Ok(EXIT_POLICY_BLOCK)
        }
    }
}

fn print_policy(engine: &PolicyEngine) {
    let library = engine.library();
    let metacharacters: Vec<String> = library
        .metacharacters
        .iter()
        .map(|c| c.escape_default().to_string())
        .collect();

    println!("allowlist: {}", library.allowlist.join(" "));
    println!("keywords: {}", library.keywords.join(" "));
    println!("sensitive paths: {}", library.sensitive_paths.join(" "));
    println!("metacharacters: {}", metacharacters.join(" "));
}

fn to_exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(EXIT_INTERNAL as u8))
}
