use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use setor::balancer::BalanceReport;
use setor::models::Label;
use setor::centers::{
    CachedGeocoder, CenterCatalog, CenterSource, GeocodedCenterFile, JsonCenterFile,
    StaticGeocoder,
};
use setor::config::Config;
use setor::pipeline::{cluster, BalancedClusteringJob, JobRequest};
use setor::sector::Sector;
use setor::storage::{JsonPointSource, JsonRunStore, PointFilter, PointSource};

#[derive(Parser)]
#[command(
    name = "setor",
    version,
    about = "Balance points of sale across fixed territory centers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); SETOR_* variables are used otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Balance points over centers that already carry coordinates
    Balance {
        /// Points file (JSON array)
        #[arg(short, long)]
        points: PathBuf,

        /// Centers file (JSON array)
        #[arg(long)]
        centers: PathBuf,

        /// Write sectors and report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override max_pdv
        #[arg(long)]
        max_pdv: Option<usize>,

        /// Override min_pdv
        #[arg(long)]
        min_pdv: Option<usize>,
    },

    /// Full job: geocode centers, balance and persist the run
    Run {
        /// Points file (JSON array)
        #[arg(short, long)]
        points: PathBuf,

        /// Center address rows (JSON array)
        #[arg(long)]
        center_rows: PathBuf,

        /// Geocode lookup table (JSON array of address, lat, lon)
        #[arg(long)]
        geocodes: Option<PathBuf>,

        /// Run store directory
        #[arg(long)]
        store: Option<PathBuf>,

        /// Only points in this state
        #[arg(long)]
        state: Option<String>,

        /// Only points in this city
        #[arg(long)]
        city: Option<String>,

        /// Free-text run description
        #[arg(long)]
        description: Option<String>,

        /// Job id, generated when absent
        #[arg(long)]
        clusterization_id: Option<String>,
    },
}

#[derive(Serialize)]
struct BalanceOutput<'a> {
    sectors: &'a [Sector],
    report: &'a BalanceReport,
    /// (input label, sector label) of every surviving center
    label_map: Vec<(Label, Label)>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = cli.log_format.clone() {
        config.logging.format = format;
    }

    // Initialize tracing/logging
    setup_tracing(&config.logging.format, &config.logging.level, cli.verbose)?;

    if let Err(e) = setor::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    tracing::info!("setor starting");

    match cli.command {
        Commands::Balance {
            points,
            centers,
            output,
            max_pdv,
            min_pdv,
        } => {
            if let Some(max_pdv) = max_pdv {
                config.balance.max_pdv = max_pdv;
            }
            if let Some(min_pdv) = min_pdv {
                config.balance.min_pdv = min_pdv;
            }
            config.validate()?;

            tracing::info!(
                points = %points.display(),
                centers = %centers.display(),
                output = ?output,
                "Starting balance command"
            );
            tokio::task::spawn_blocking(move || run_balance(&config, &points, &centers, output))
                .await
                .context("Balance task did not complete")??;
        }

        Commands::Run {
            points,
            center_rows,
            geocodes,
            store,
            state,
            city,
            description,
            clusterization_id,
        } => {
            if let Some(geocodes) = geocodes {
                config.geocoding.table_path = Some(geocodes);
            }
            if let Some(store) = store {
                config.storage.runs_dir = store;
            }
            config.validate()?;

            tracing::info!(
                points = %points.display(),
                center_rows = %center_rows.display(),
                state = ?state,
                city = ?city,
                "Starting run command"
            );
            let request = JobRequest {
                clusterization_id,
                tenant_id: None,
                input_id: None,
                filter: PointFilter::new(state, city),
                description,
                params: config.balance.to_params(),
            };
            tokio::task::spawn_blocking(move || run_job(&config, request, &points, &center_rows))
                .await
                .context("Run task did not complete")??;
        }
    }

    tracing::info!("setor completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("setor=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("setor={level},warn")))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn run_balance(
    config: &Config,
    points_path: &Path,
    centers_path: &Path,
    output: Option<PathBuf>,
) -> Result<()> {
    let points = JsonPointSource::new(points_path).load_points(&PointFilter::default())?;
    let centers = JsonCenterFile::new(centers_path).load_centers()?;

    let result = cluster(points, &centers, &config.balance.to_params())?;
    let json = serde_json::to_string_pretty(&BalanceOutput {
        sectors: &result.sectors,
        report: &result.report,
        label_map: result.relabeling.pairs().collect(),
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            println!("Wrote {} sectors to {}", result.sectors.len(), path.display());
        }
        None => println!("{json}"),
    }

    if !result.report.is_balanced() {
        tracing::warn!(
            over = result.report.over_capacity.len(),
            under = result.report.under_capacity.len(),
            "Some centers remain outside capacity bounds"
        );
    }
    Ok(())
}

fn run_job(config: &Config, request: JobRequest, points_path: &Path, rows_path: &Path) -> Result<()> {
    let mut geocoder = CachedGeocoder::new();
    if let Some(table) = &config.geocoding.table_path {
        geocoder = geocoder.with_provider(StaticGeocoder::from_file(table)?);
    }
    let catalog = CenterCatalog::new().with_fallback(
        config.geocoding.fallback_city.clone(),
        config.geocoding.fallback_state.clone(),
    );

    let mut point_source = JsonPointSource::new(points_path);
    let mut center_source = GeocodedCenterFile::new(rows_path, catalog, &mut geocoder);
    let mut store = JsonRunStore::new(&config.storage.runs_dir)?;

    let job = BalancedClusteringJob::new(request);
    let summary = job.execute(&mut point_source, &mut center_source, &mut store)?;

    println!("Run {} finished", summary.run_id);
    println!("  Clusterization: {}", summary.clusterization_id);
    println!("  Sectors: {}", summary.k_final);
    println!("  Points: {}", summary.n_points);
    println!("  Converged: {}", summary.report.converged);
    println!(
        "  Duration: {}",
        setor::utils::format_duration(summary.duration_secs)
    );
    Ok(())
}
