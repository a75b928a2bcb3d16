//! Point d'entrée CLI pour katastr

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Parcelles du katastr nemovitostí: carte, tableau et export
#[derive(Parser)]
#[command(name = "katastr")]
#[command(author, version)]
#[command(about = "Fetch, join, style and export Czech cadastral parcels (ČÚZK)")]
#[command(long_about = "Downloads parcel archives per cadastral unit from services.cuzk.cz, joins them with the land type and land use code lists, and exports them as CSV, GeoJSON or GeoPackage in S-JTSK or WGS 84.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier de configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    match &cli.command {
        Commands::Municipalities { filter } => {
            cli::cmd_municipalities(config, filter.as_deref()).await?;
        }
        Commands::Units { municipalities } => {
            cli::cmd_units(config, municipalities).await?;
        }
        Commands::Show {
            selection,
            attribute,
            map,
            report,
        } => {
            info!(units = ?selection.units, attribute = attribute.column(), "Show selection");
            cli::cmd_show(config, selection, *attribute, map.as_deref(), report.as_deref()).await?;
        }
        Commands::Export {
            selection,
            format,
            crs,
            output,
        } => {
            info!(units = ?selection.units, format = format.name(), crs = %crs, "Export selection");
            cli::cmd_export(config, selection, *format, *crs, output.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
