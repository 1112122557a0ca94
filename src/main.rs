use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use resegment::app::{InterruptAction, log_path, on_interrupt, plan_json, run_align_command};
use resegment::cli::{AlignArgs, Cli, Commands, ConfigAction};
use resegment::config::Config;
use resegment::logging::init_logging;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Conventional exit status for a process killed by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Align(args) => {
            let config = load_config(cli.config.as_deref())?;
            std::fs::create_dir_all(&args.output).with_context(|| {
                format!("Failed to create output directory {}", args.output.display())
            })?;
            init_logging(
                cli.verbose,
                cli.quiet,
                Some(&log_path(&args.output, &config)),
            )?;
            tracing::info!(version = %resegment::version_string(), "resegment starting");
            handle_align_command(config, args, cli.quiet).await?;
        }
        Commands::Plan(args) => {
            init_logging(cli.verbose, cli.quiet, None)?;
            let config = load_config(cli.config.as_deref())?.with_env_overrides();
            println!("{}", plan_json(&config, &args)?);
        }
        Commands::Config { action } => {
            init_logging(cli.verbose, cli.quiet, None)?;
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "resegment",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/resegment/config.toml)
/// 3. Built-in defaults
///
/// Environment overrides are applied by the caller once logging is up.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };
    Ok(config)
}

/// Run the alignment on a blocking thread while Ctrl+C stops dispatch.
async fn handle_align_command(config: Config, args: AlignArgs, quiet: bool) -> Result<()> {
    let mut config = config.with_env_overrides();
    args.apply_to(&mut config);

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&flag) {
                InterruptAction::FinishQueued => tracing::warn!(
                    "Ctrl+C received, finishing queued files (press again to abort)"
                ),
                InterruptAction::Abort => {
                    eprintln!("Second Ctrl+C, exiting without waiting for workers");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    });

    let summary = tokio::task::spawn_blocking(move || {
        run_align_command(&config, &args, &interrupted, quiet)
    })
    .await
    .context("Alignment thread panicked")??;

    tracing::info!(
        written = summary.written,
        discovered = summary.discovered,
        assembly_failures = summary.assembly_failures,
        alignment_failures = summary.alignment_failures,
        "run finished"
    );
    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Dump => {
            let config = load_config(custom_path)?.with_env_overrides();
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => match custom_path
            .map(Path::to_path_buf)
            .or_else(Config::default_path)
        {
            Some(path) => println!("{}", path.display()),
            None => {
                eprintln!("Error: no configuration directory on this platform");
                std::process::exit(1);
            }
        },
    }
    Ok(())
}
