use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use loggable::audit::JsonlChangeLog;
use loggable::cli::{handle_export_command, handle_log_command, ExportArgs, LogCommands};
use loggable::config::{LoggablePaths, Settings};

#[derive(Parser)]
#[command(
    name = "loggable",
    version,
    about = "Inspect and export the change log of stored entities",
    long_about = "Loggable records a change-log entry for every create, update and \
                  delete of registered entity types. This tool lists, inspects, \
                  soft-deletes and exports those records."
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and default settings
    Init,

    /// Show current configuration and paths
    Config,

    /// Change-log inspection commands
    #[command(subcommand)]
    Log(LogCommands),

    /// Export the change log
    Export(ExportArgs),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "loggable=debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = LoggablePaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    let store = JsonlChangeLog::new(paths.changelog_file());

    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing loggable at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            println!("Initialization complete!");
            println!();
            println!("Settings file:   {}", paths.settings_file().display());
            println!("Change log file: {}", paths.changelog_file().display());
        }
        Some(Commands::Config) => {
            println!("Loggable Configuration");
            println!("======================");
            println!("Base directory:  {}", paths.base_dir().display());
            println!("Data directory:  {}", paths.data_dir().display());
            println!("Change log file: {}", paths.changelog_file().display());
            println!("Initialized:     {}", paths.is_initialized());
            println!();
            println!("Settings:");
            println!("  Compute diff:       {}", settings.compute_diff);
            println!("  Lazy update:        {}", settings.lazy_update);
            if !settings.lazy_update_fields.is_empty() {
                println!("  Lazy update fields: {}", settings.lazy_update_fields.join(", "));
            }
            println!(
                "  Propagate create/delete errors: {}",
                settings.propagate_create_delete_errors
            );
            if store.exists() {
                println!();
                println!("Records: {}", store.entry_count()?);
            }
        }
        Some(Commands::Log(cmd)) => {
            handle_log_command(&store, cmd)?;
        }
        Some(Commands::Export(args)) => {
            handle_export_command(&store, args)?;
        }
        None => {
            println!("Loggable - change logging for stored entities");
            println!();
            println!("Run 'loggable --help' for usage information.");
        }
    }

    Ok(())
}
