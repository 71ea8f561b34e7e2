//! Point d'entrée CLI pour geonames-stats

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::Commands;

/// Compter les points geonames par pays
#[derive(Parser)]
#[command(name = "geonames-stats")]
#[command(author, version)]
#[command(about = "Attribuer des points geonames aux pays et compter les points par pays")]
#[command(long_about = "Lit des fichiers geonames en flux, attribue chaque point au pays qui le contient et affiche le nombre de points par pays.\n\nLes polygones de pays sont chargés une seule fois, au premier lot, depuis un service GeoJSON ou un fichier local.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Fichier .env à charger (défaut : .env du répertoire courant puis du binaire)
    #[arg(long, global = true, env = "GEONAMES_STATS_ENV")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_source = load_env(cli.env_file.as_deref())?;
    init_logging(cli.verbose, cli.quiet);
    if let Some(path) = env_source {
        debug!(path = %path.display(), "Environment loaded");
    }

    match cli.command {
        Commands::Ingest(args) => {
            info!(files = args.files.len(), config = %args.config, "Ingest");
            cli::cmd_ingest(args).await?;
        }
        Commands::Check {
            files,
            config,
            batch_size,
            lat_lon,
        } => {
            info!(files = files.len(), config = ?config, "Check");
            cli::cmd_check(&files, config.as_deref(), batch_size, lat_lon).await?;
        }
    }

    Ok(())
}

/// Un fichier explicite doit exister, sinon .env est optionnel
fn load_env(explicit: Option<&std::path::Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        dotenvy::from_path(path)?;
        return Ok(Some(path.to_path_buf()));
    }
    if let Ok(path) = dotenvy::dotenv() {
        return Ok(Some(path));
    }
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")));
    Ok(beside_exe.filter(|path| dotenvy::from_path(path).is_ok()))
}

/// Logs sur stderr : stdout ne porte que le rapport et le tableau des pays
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (_, 0) => "info",
        (_, 1) => "debug",
        (_, _) => "trace",
    };

    // RUST_LOG prend le pas sur -v/-q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,geonames={level},geonames_stats={level}"))
    });

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 0)
        .init();
}
