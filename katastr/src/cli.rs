//! Définition et implémentation des commandes CLI
//!
//! - `municipalities`: libellés des obce de l'annuaire
//! - `units`: katastrální území des obce choisies
//! - `show`: construit la sélection, affiche légende et rapport
//! - `export`: écrit le fichier CSV / GeoJSON / GeoPackage

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use katastr::{
    Config, DisplayAttribute, ExportFormat, HttpSource, Pipeline, Progress, Session, TargetCrs,
};

#[derive(Subcommand)]
pub enum Commands {
    /// List municipality labels of the cadastral unit directory
    Municipalities {
        /// Keep only labels containing this text (name or code)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List cadastral unit names of the chosen municipalities
    Units {
        /// Municipality label, e.g. "Praha (500054)"
        #[arg(short, long = "municipality", required = true)]
        municipalities: Vec<String>,
    },

    /// Build the parcel set and print its legend and report
    Show {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Display attribute: outline, land-type, land-use
        #[arg(short, long, default_value = "land-type")]
        attribute: DisplayAttribute,

        /// Write the styled map layer as GeoJSON
        #[arg(long)]
        map: Option<PathBuf>,

        /// Write the selection report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Export the parcel set to CSV, GeoJSON or GeoPackage
    Export {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Output format: csv, geojson, gpkg
        #[arg(short, long, default_value = "geojson")]
        format: ExportFormat,

        /// Target CRS: s-jtsk, wgs84 (ignored for CSV)
        #[arg(long, default_value = "s-jtsk")]
        crs: TargetCrs,

        /// Output file (default: parcely_kn.<ext> in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Sélection commune à `show` et `export`
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Municipality label, e.g. "Praha (500054)" (repeatable)
    #[arg(short, long = "municipality", required = true)]
    pub municipalities: Vec<String>,

    /// Cadastral unit name within the municipalities (repeatable)
    #[arg(short, long = "unit", required = true)]
    pub units: Vec<String>,
}

/// Session HTTP sur la configuration résolue (défauts, fichier, env)
fn open_session(config_path: Option<&Path>) -> Result<Session<HttpSource>> {
    let config = Config::resolve(config_path).context("Failed to load configuration")?;
    let source = HttpSource::new(&config)?;
    Ok(Session::new(Pipeline::new(source, config)))
}

/// Exécute la commande municipalities
pub async fn cmd_municipalities(config_path: Option<&Path>, filter: Option<&str>) -> Result<()> {
    let mut session = open_session(config_path)?;
    let labels = session
        .load_directory()
        .await
        .context("Failed to load the cadastral unit directory")?;

    let query = filter.unwrap_or_default().trim().to_lowercase();
    let mut shown = 0;
    for label in labels.iter().filter(|l| l.to_lowercase().contains(&query)) {
        println!("{}", label);
        shown += 1;
    }
    info!(shown, total = labels.len(), "Municipalities listed");
    Ok(())
}

/// Exécute la commande units
pub async fn cmd_units(config_path: Option<&Path>, municipalities: &[String]) -> Result<()> {
    let mut session = open_session(config_path)?;
    session
        .load_directory()
        .await
        .context("Failed to load the cadastral unit directory")?;

    let names = session.choose_municipalities(municipalities);
    if names.is_empty() {
        warn!(municipalities = ?municipalities, "No cadastral unit found for these municipalities");
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

/// Exécute la commande show
pub async fn cmd_show(
    config_path: Option<&Path>,
    selection: &SelectionArgs,
    attribute: DisplayAttribute,
    map_path: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<()> {
    let mut session = open_session(config_path)?;
    if !select(&mut session, selection).await? {
        return Ok(());
    }
    session.choose_attribute(attribute);

    let set = session
        .refresh(log_progress)
        .await
        .context("Failed to build the parcel set")?;
    set.report.display();

    if let Some(path) = report_path {
        set.report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    let Some(legend) = session.legend() else {
        println!("No parcels loaded.");
        return Ok(());
    };

    println!("\n{}:", attribute.label());
    for entry in &legend.entries {
        println!("  {} {:>6}  {}", entry.color, entry.count, entry.category);
    }

    if let Some(path) = map_path {
        let set = session.current_set().context("No parcel set")?;
        let layer = session.map_layer().context("No map layer for this selection")?;
        std::fs::write(path, layer.to_geojson(set).to_string())
            .with_context(|| format!("Failed to write map layer: {}", path.display()))?;
        info!(
            path = %path.display(),
            center = ?(layer.center.x, layer.center.y),
            "Map layer saved"
        );
    }

    Ok(())
}

/// Exécute la commande export
pub async fn cmd_export(
    config_path: Option<&Path>,
    selection: &SelectionArgs,
    format: ExportFormat,
    crs: TargetCrs,
    output: Option<&Path>,
) -> Result<()> {
    let mut session = open_session(config_path)?;
    if !select(&mut session, selection).await? {
        return Ok(());
    }

    let set = session
        .refresh(log_progress)
        .await
        .context("Failed to build the parcel set")?;
    info!(summary = %set.report.summary(), "Parcel set ready");

    let Some(file) = session
        .export(format, crs)
        .await
        .with_context(|| format!("Failed to export {}", format))?
    else {
        println!("No parcels loaded, nothing to export.");
        return Ok(());
    };

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&file.name));
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(
        path = %path.display(),
        format = format.name(),
        mime = file.mime,
        bytes = file.len(),
        "Export written"
    );
    println!("{}", path.display());
    Ok(())
}

/// Charge l'annuaire et applique la sélection; faux si elle est vide
async fn select(session: &mut Session<HttpSource>, selection: &SelectionArgs) -> Result<bool> {
    session
        .load_directory()
        .await
        .context("Failed to load the cadastral unit directory")?;
    session.choose_municipalities(&selection.municipalities);
    let codes = session.choose_units(&selection.units);

    if codes.is_empty() {
        println!("No cadastral unit selected.");
        return Ok(false);
    }
    info!(units = ?codes, "Cadastral units selected");
    Ok(true)
}

fn log_progress(progress: Progress) {
    info!(
        unit = progress.unit_code,
        "Downloading cadastral data: {:.0}%",
        progress.fraction() * 100.0
    );
}
