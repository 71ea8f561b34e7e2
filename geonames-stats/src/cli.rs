//! Définition et implémentation des commandes CLI
//!
//! - `ingest` : fichiers geonames → compteurs par pays (+ rapport, export GeoJSON)
//! - `check` : lecture à blanc, sans pays (colonnes et séparateur de la config)

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use geonames::LineParser;
use tracing::{info, warn};

use geonames_stats::config::{Config, IngestConfig};
use geonames_stats::country::{source_for, CountryPolygonCache};
use geonames_stats::export::export_statistics;
use geonames_stats::pipeline::{IngestionPipeline, TracingSink};
use geonames_stats::report::{format_statistics, IngestStatus};

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest geonames files and count points per country
    Ingest(IngestArgs),

    /// Read geonames files without attribution (line, record and batch counts)
    Check {
        /// geonames files (.txt or .bz2)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Config preset name or JSON config path (columns and delimiter)
        #[arg(long)]
        config: Option<String>,

        /// Records per batch (overrides the config)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Columns 4/5 are latitude/longitude (public geonames dumps)
        #[arg(long)]
        lat_lon: bool,
    },
}

#[derive(Args)]
pub struct IngestArgs {
    /// geonames files (.txt or .bz2), processed in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Config preset name (arcgis/natural-earth) or path to a JSON config
    #[arg(long, default_value = "arcgis")]
    pub config: String,

    /// Country polygons: URL or local GeoJSON file (overrides the config)
    #[arg(long)]
    pub countries: Option<String>,

    /// Records per batch (overrides the config)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Worker threads for attribution (défaut : nombre de cœurs)
    #[arg(long, alias = "threads")]
    pub jobs: Option<usize>,

    /// Columns 4/5 are latitude/longitude (public geonames dumps)
    #[arg(long)]
    pub lat_lon: bool,

    /// List countries without any point
    #[arg(long)]
    pub all: bool,

    /// Write the ingest report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Export visible countries with their hit count as GeoJSON
    #[arg(long)]
    pub geojson: Option<PathBuf>,
}

/// Exécute la commande ingest
pub async fn cmd_ingest(args: IngestArgs) -> Result<()> {
    let mut config = Config::resolve(&args.config)?;
    config.apply_env()?;
    apply_overrides(&mut config, &args);

    if let Some(jobs) = args.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("Failed to configure the attribution thread pool")?;
    }

    let options = config.ingest.options()?;
    let location = config.countries.location()?;
    let timeout = config.countries.timeout();
    let source = source_for(location, config.countries.fields(), timeout)?;

    println!("=== Ingest ===");
    println!("Files: {}", args.files.len());
    println!("Config: {}", args.config);
    println!("Countries: {}", location);
    println!(
        "Fields: id={} name={}",
        config.countries.id_field, config.countries.name_field
    );
    println!("Batch size: {}", options.batch_size);
    println!("Jobs: {}", rayon::current_num_threads());

    let cache = CountryPolygonCache::new(source).with_timeout(timeout);
    let sink = Arc::new(TracingSink::new());
    let pipeline = IngestionPipeline::with_cache(cache, sink.clone(), options);

    let handle = pipeline.submit(args.files.iter().cloned())?;

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current batch");
            token.cancel();
        }
    });

    let report = handle.wait().await?;
    report.display();

    let entries = pipeline.snapshot();
    println!("\n--- COUNTRIES ---");
    print!("{}", format_statistics(&entries, !args.all));
    info!(
        countries = entries.len(),
        published = sink.published(),
        hits = pipeline.aggregator().total_hits(),
        "Statistics ready"
    );

    if let Some(path) = &args.report {
        report.save_to_file(path)?;
        println!("Report written to {}", path.display());
    }

    if let Some(path) = &args.geojson {
        match pipeline.countries() {
            Some(countries) => {
                let written = export_statistics(&countries, &entries, path)?;
                println!("{} countries exported to {}", written, path.display());
            }
            None => warn!(path = %path.display(), "Countries not loaded, GeoJSON export skipped"),
        }
    }

    if report.status == IngestStatus::Failed {
        bail!("Ingest failed: {}", report.summary());
    }

    Ok(())
}

/// Exécute la commande check
pub async fn cmd_check(
    files: &[PathBuf],
    config: Option<&str>,
    batch_size: Option<usize>,
    lat_lon: bool,
) -> Result<()> {
    let mut ingest = match config {
        Some(name) => {
            let mut config = Config::resolve(name)?;
            config.apply_env()?;
            config.ingest
        }
        None => IngestConfig::default(),
    };
    ingest.apply_overrides(batch_size, lat_lon);
    let options = ingest.options()?;

    let mut failed = 0;
    for path in files {
        match check_file(path, options.parser, options.batch_size).await {
            Ok(summary) => println!(
                "{}: {} lines, {} records, {} skipped, {} batches",
                path.display(),
                summary.stats.lines,
                summary.stats.records,
                summary.stats.skipped,
                summary.batches
            ),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Check failed");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files could not be read", failed, files.len());
    }
    Ok(())
}

async fn check_file(
    path: &Path,
    parser: LineParser,
    size: NonZeroUsize,
) -> Result<geonames::ScanSummary> {
    let summary = tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        move || geonames::scan(&path, parser, size)
    })
    .await
    .context("Scan task failed")??;

    Ok(summary)
}

fn apply_overrides(config: &mut Config, args: &IngestArgs) {
    if let Some(location) = &args.countries {
        if location.starts_with("http://") || location.starts_with("https://") {
            config.countries.url = Some(location.clone());
            config.countries.path = None;
        } else {
            config.countries.path = Some(location.clone());
        }
    }
    config.ingest.apply_overrides(args.batch_size, args.lat_lon);
}
