//! CLI entry point for mailharvest.

use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use mailharvest::{config, scheduler};

#[derive(Parser)]
#[command(
    name = "mailharvest",
    version,
    about = "Harvest mailbox attachments into remote storage on a schedule"
)]
struct Cli {
    /// Path to the task configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all configured task loops until interrupted
    Run,
    /// Validate the configuration and print the task list
    Check,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        Some(Commands::Check) => cmd_check(cli.config),
        Some(Commands::Run) | None => cmd_run(cli.config, cli.verbose),
    }
}

/// Run the daemon: all task loops, until a shutdown signal arrives.
fn cmd_run(config_path: Option<PathBuf>, verbose: u8) -> anyhow::Result<()> {
    let path = resolve_config_path(config_path)?;
    let config = config::load(&path)?;
    setup_logging(&config.log_level, verbose);

    if config.tasks.is_empty() {
        anyhow::bail!("no tasks configured in {}", path.display());
    }
    info!(path = %path.display(), tasks = config.tasks.len(), "configuration loaded");

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(async {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received, stopping after in-flight cycles");
                let _ = tx.send(true);
            }
        });
        scheduler::run(config, rx).await;
    });

    info!("all task loops stopped");
    Ok(())
}

/// Validate the configuration and print a task summary.
fn cmd_check(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = resolve_config_path(config_path)?;
    let config = config::load(&path)?;

    println!();
    println!("  {:<14} {}", "Config", path.display());
    println!("  {:<14} {}", "Tasks", config.tasks.len());
    println!();

    for task in &config.tasks {
        println!("  [{}]", task.name);
        println!(
            "    {:<12} {}@{} ({})",
            "source", task.source.user, task.source.host, task.source.mailbox
        );
        println!("    {:<12} {}", "destination", task.destination.base_url);
        println!(
            "    {:<12} {}",
            "interval",
            humantime::format_duration(task.interval_or_default())
        );
        println!("    {:<12} {}", "format", task.format);
        if !task.tags.is_empty() {
            println!("    {:<12} {}", "tags", task.tags.join(", "));
        }
        println!("    {:<12} {}", "mark_seen", task.mark_seen);
        println!();
    }

    println!("  Configuration OK");
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailharvest", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn resolve_config_path(cli_path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    cli_path.or_else(config::config_file_path).context(
        "no configuration file given; pass --config or set MAILHARVEST_CONFIG",
    )
}

/// Set up tracing with stderr output and a log file in the cache directory.
fn setup_logging(config_level: &str, verbose: u8) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = match verbose {
        0 => config_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir();
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailharvest.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}
