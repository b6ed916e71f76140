//! stepmigrate — apply or undo database migrations
//!
//! # Usage
//!
//! ```bash
//! # Migrate to the newest migration
//! stepmigrate ./migrations -d postgres://localhost/app
//!
//! # Migrate to exactly migration 2
//! stepmigrate ./migrations 2
//!
//! # Undo the last 3 migrations
//! stepmigrate ./migrations -3
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use stepmigrate::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stepmigrate")]
#[command(version)]
#[command(about = "Apply or undo database migrations", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "EXAMPLES:
    stepmigrate ./migrations            migrate to the newest migration
    stepmigrate ./migrations 2          migrate to migration 2
    stepmigrate ./migrations -3         undo the last 3 migrations
    stepmigrate ./migrations +1         apply the next migration
    stepmigrate status ./migrations     show the current position")]
struct Cli {
    /// Directory containing the migration files
    folder: Option<PathBuf>,

    /// Target index; prefix with + or - to move relative to the current one
    #[arg(allow_negative_numbers = true)]
    index: Option<String>,

    /// Connection string of the database to migrate
    #[arg(
        short = 'd',
        long = "database",
        visible_alias = "db",
        env = "STEPMIGRATE_DATABASE_URL",
        global = true
    )]
    database: Option<String>,

    /// Path to a config file (defaults to ./stepmigrate.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Name of the table holding the migration log
    #[arg(long, global = true)]
    table: Option<String>,

    /// Fail when a .sql file does not follow the naming convention
    #[arg(long, global = true)]
    strict: bool,

    /// Print the steps that would run without applying them
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current position and the available migrations
    Status {
        /// Directory containing the migration files
        folder: Option<PathBuf>,
    },
    /// Show the log of applied migrations
    History {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

/// Where the caller wants the database to end up.
#[derive(Debug, PartialEq, Eq)]
enum Target {
    All,
    Absolute(i64),
    Relative(i64),
}

/// A leading `+` or `-` makes the index relative.
fn parse_target(arg: Option<&str>) -> Result<Target> {
    let Some(arg) = arg else {
        return Ok(Target::All);
    };
    let n: i64 = arg
        .parse()
        .with_context(|| format!("Incorrect index parameter given: '{}'", arg))?;
    if arg.starts_with('+') || arg.starts_with('-') {
        Ok(Target::Relative(n))
    } else {
        Ok(Target::Absolute(n))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "stepmigrate=debug"
    } else {
        "stepmigrate=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge the config file with command line overrides.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.database {
        config.database_url = Some(url.clone());
    }
    if let Some(table) = &cli.table {
        config.table = table.clone();
    }
    if cli.strict {
        config.strict = true;
    }
    config.validate()?;
    Ok(config)
}

fn migrations_dir(folder: Option<&PathBuf>, config: &Config) -> Result<PathBuf> {
    match folder.or(config.migrations_dir.as_ref()) {
        Some(dir) => Ok(dir.clone()),
        None => bail!("Command must contain a path to the directory containing the migrations"),
    }
}

async fn connect(config: &Config) -> Result<PgStore> {
    let Some(url) = config.database_url.as_deref() else {
        bail!("Must provide a database connection string (--database, --db, -d)");
    };
    let store = PgStore::connect(url, &config.table)
        .await
        .context("Could not connect to database")?;
    Ok(store)
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    match &cli.command {
        Some(Commands::Status { folder }) => {
            let dir = migrations_dir(folder.as_ref(), &config)?;
            show_status(&config, dir).await
        }
        Some(Commands::History { format }) => show_history(&config, format).await,
        None => {
            let dir = migrations_dir(cli.folder.as_ref(), &config)?;
            let target = parse_target(cli.index.as_deref())?;
            migrate(&config, dir, target, cli.dry_run).await
        }
    }
}

async fn migrate(config: &Config, dir: PathBuf, target: Target, dry_run: bool) -> Result<()> {
    let store = connect(config).await?;
    let mut migrator = Migrator::with_policy(store, &dir, config.scan_policy())
        .await
        .context("Could not create migrator")?;

    if dry_run {
        let absolute = match target {
            Target::All => migrator.sequence().len() as i64,
            Target::Absolute(n) => n,
            Target::Relative(n) => (migrator.current_position() as i64).saturating_add(n),
        };
        let plan = migrator.plan_to(absolute)?;
        print_plan(migrator.current_position(), &plan);
        migrator.into_store().close().await?;
        return Ok(());
    }

    let result = match target {
        Target::All => migrator.migrate_all().await,
        Target::Absolute(n) => migrator.migrate_to(n).await,
        Target::Relative(n) => migrator.migrate_relative(n).await,
    };
    let position = migrator.current_position();
    result.context("Could not apply migrations")?;
    migrator.into_store().close().await?;

    println!(
        "{} Finished applying database migrations (position {})",
        "✓".green(),
        position.to_string().cyan()
    );
    Ok(())
}

fn print_plan(current: usize, plan: &[PlannedStep]) {
    if plan.is_empty() {
        println!("{}", format!("Already at {}, nothing to do.", current).dimmed());
        return;
    }

    println!("{}", "Planned steps:".green().bold());
    for step in plan {
        let tag = match step.direction {
            Direction::Forward => "[APPLY]".green(),
            Direction::Reverse => "[UNDO]".yellow(),
        };
        println!(
            "  {} {} {} {}",
            tag,
            step.index.to_string().cyan(),
            step.label.white(),
            step.path.display().to_string().dimmed()
        );
    }
    println!();
    println!("{}", "No changes made.".yellow());
}

async fn show_status(config: &Config, dir: PathBuf) -> Result<()> {
    let store = connect(config).await?;
    let migrator = Migrator::with_policy(store, &dir, config.scan_policy()).await?;
    let current = migrator.current_position();

    println!("{}", "Migration Status".cyan().bold());
    println!();
    println!("  {} {}", "Directory:".dimmed(), dir.display().to_string().yellow());
    println!("  {} {}", "Table:".dimmed(), config.table.green());
    println!("  {} {}", "Position:".dimmed(), current.to_string().cyan());
    println!("  {} {}", "Pending:".dimmed(), migrator.pending().to_string().cyan());
    println!();

    for step in migrator.sequence().iter() {
        let mark = if step.index() <= current {
            "✓".green()
        } else {
            "○".dimmed()
        };
        println!("  {} {:>4} {}", mark, step.index(), step.label());
    }

    migrator.into_store().close().await?;
    Ok(())
}

async fn show_history(config: &Config, format: &OutputFormat) -> Result<()> {
    let mut store = connect(config).await?;
    store.ensure_store().await?;
    let history = store.history().await?;
    store.close().await?;

    if history.is_empty() {
        println!("{}", "(no migrations applied)".dimmed());
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
        OutputFormat::Table => {
            println!(
                "{}",
                format!(
                    "{:>5} │ {:25} │ {:>8} │ {:>5} │ {:4} │ {}",
                    "id", "applied_at", "position", "index", "dir", "label"
                )
                .white()
                .bold()
            );
            for entry in &history {
                println!(
                    "{:>5} │ {:25} │ {:>8} │ {:>5} │ {:4} │ {}",
                    entry.id,
                    entry.applied_at.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
                    entry.position,
                    entry.index,
                    entry.direction.to_string(),
                    entry.label.as_deref().unwrap_or("")
                );
            }
            println!();
            println!("{} record(s)", history.len().to_string().cyan());
        }
    }

    Ok(())
}
