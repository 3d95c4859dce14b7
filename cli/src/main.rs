use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geo_cluster::{ClusterAnalyzer, ClusterConfig};
use prediction_cache::{fingerprint_file, CachedAnalysis, PredictionCache};
use tracing::{info, warn};

mod config;
mod export;
mod inference;
mod pipeline;

use config::Settings;
use inference::{HttpInferenceSource, InferenceSource, JsonFileSource};
use pipeline::PipelineOutput;

#[derive(Parser)]
#[command(name = "geolens")]
#[command(about = "Geolocate photographs and corroborate predictions by geographic clustering")]
struct Cli {
    /// Settings file (defaults to <config dir>/geolens/config.toml)
    #[arg(long, global = true, env = "GEOLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster-analyze predictions and export the adjusted results
    Analyze {
        /// Saved inference service response (JSON)
        #[arg(short, long, conflicts_with = "path")]
        input: Option<PathBuf>,

        /// Image file or folder to send to the inference service
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Inference service URL (overrides settings)
        #[arg(long)]
        service_url: Option<String>,

        /// Predictions requested per image
        #[arg(long)]
        top_k: Option<u32>,

        /// Neighborhood radius in kilometers
        #[arg(long)]
        radius_km: Option<f64>,

        /// Minimum number of predictions that form a cluster
        #[arg(long)]
        min_cluster_size: Option<usize>,

        /// Boost applied when every prediction is in the cluster
        #[arg(long)]
        max_boost: Option<f64>,

        /// Write results as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write results as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Store results in the prediction cache
        #[arg(long)]
        cache: bool,
    },

    /// Show a cached analysis
    Show {
        /// Image whose contents identify the cache entry
        #[arg(long, conflicts_with = "fingerprint")]
        image: Option<PathBuf>,

        /// Fingerprint of the cache entry
        #[arg(long)]
        fingerprint: Option<String>,
    },

    /// Print prediction cache statistics
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            input,
            path,
            service_url,
            top_k,
            radius_km,
            min_cluster_size,
            max_boost,
            output,
            csv,
            cache,
        } => {
            let clustering = ClusterConfig {
                radius_km: radius_km.unwrap_or(settings.clustering.radius_km),
                minimum_cluster_size: min_cluster_size
                    .unwrap_or(settings.clustering.minimum_cluster_size),
                max_boost_fraction: max_boost.unwrap_or(settings.clustering.max_boost_fraction),
            };

            let source: Box<dyn InferenceSource> = match (input, path) {
                (Some(input), _) => Box::new(JsonFileSource::new(input)),
                (None, Some(path)) => {
                    let images = if path.is_dir() {
                        inference::scan_folder(&path)?
                    } else {
                        vec![path]
                    };
                    Box::new(HttpInferenceSource::new(
                        service_url.as_deref().unwrap_or(&settings.inference.service_url),
                        images,
                        top_k.unwrap_or(settings.inference.top_k),
                        &settings.inference.device,
                    )?)
                }
                (None, None) => bail!("Either --input or --path is required"),
            };

            let output_run = run_analysis(source.as_ref(), clustering)?;
            print_analysis_results(&output_run);

            if let Some(output_path) = output {
                export::write_json_file(&output_run.reports, &output_path)?;
                println!("Results saved to: {}", output_path.display());
            }

            if let Some(csv_path) = csv {
                export::write_csv_file(&output_run.reports, &csv_path)?;
                println!("CSV saved to: {}", csv_path.display());
            }

            if cache {
                let db = open_cache(&settings)?;
                store_results(&db, &output_run)?;
            }

            Ok(())
        }
        Commands::Show { image, fingerprint } => {
            let fingerprint = match (image, fingerprint) {
                (Some(image), _) => fingerprint_file(&image)?,
                (None, Some(fp)) => fp,
                (None, None) => bail!("Either --image or --fingerprint is required"),
            };
            let db = open_cache(&settings)?;
            match db.load(&fingerprint)? {
                Some(entry) => print_cached(&entry),
                None => println!("No cached analysis for {}", fingerprint),
            }
            Ok(())
        }
        Commands::Stats => {
            let db = open_cache(&settings)?;
            println!("Cache: {}", db.path().display());
            println!("Cached images: {}", db.entry_count()?);
            println!("Clustered images: {}", db.clustered_count()?);
            Ok(())
        }
    }
}

fn run_analysis(source: &dyn InferenceSource, clustering: ClusterConfig) -> Result<PipelineOutput> {
    let analyzer = ClusterAnalyzer::new(clustering).context("Invalid clustering settings")?;

    let response = source.fetch()?;
    if let Some(device) = &response.device {
        info!(device = %device, images = response.results.len(), "received predictions");
    }

    Ok(pipeline::process(response, &analyzer))
}

fn open_cache(settings: &Settings) -> Result<PredictionCache> {
    match &settings.cache.path {
        Some(path) => PredictionCache::open(path),
        None => PredictionCache::open_default(),
    }
}

fn store_results(db: &PredictionCache, output: &PipelineOutput) -> Result<()> {
    let mut stored = 0;
    for report in &output.reports {
        match report.to_cached() {
            Some(entry) => {
                db.store(&entry)
                    .with_context(|| format!("Failed to cache {}", report.path.display()))?;
                stored += 1;
            }
            None => warn!(path = %report.path.display(), "no fingerprint, not cached"),
        }
    }
    info!(stored, cache = %db.path().display(), "cached analyses");
    Ok(())
}

fn print_analysis_results(output: &PipelineOutput) {
    println!("\nANALYSIS RESULTS");
    println!("================");
    println!("Images analyzed: {}", output.reports.len());
    println!("Clustered: {}", output.clustered_count());
    println!("Skipped: {}", output.skipped.len());

    for report in &output.reports {
        let summary = &report.analysis.summary;
        println!("\n{}", file_label(&report.path));

        if let Some(reason) = &report.clustering_skipped {
            println!("  clustering skipped: {}", reason);
        } else if summary.is_clustered {
            println!(
                "  cluster of {} around ({:.4}, {:.4}), radius {:.1} km, avg {:.1} km, boost +{:.1}%",
                summary.cluster_size,
                summary.cluster_center_lat,
                summary.cluster_center_lon,
                summary.cluster_radius_km,
                summary.average_distance_km,
                summary.confidence_boost * 100.0,
            );
        } else {
            println!("  no cluster");
        }

        for p in &report.analysis.predictions {
            let marker = if p.is_clustered { "*" } else { " " };
            println!(
                "  {} #{} ({:.4}, {:.4}) {:.2}% -> {:.2}% [{}] {}",
                marker,
                p.rank(),
                p.prediction.latitude,
                p.prediction.longitude,
                p.base_probability * 100.0,
                p.adjusted_probability * 100.0,
                p.confidence_level(),
                report.location_for_rank(p.rank()),
            );
        }
    }

    for skipped in &output.skipped {
        println!("\nSkipped {}: {}", file_label(&skipped.path), skipped.reason);
    }
}

fn print_cached(entry: &CachedAnalysis) {
    println!("{} ({})", entry.file_path, entry.fingerprint);
    println!("Analyzed: {}", entry.analyzed_at.to_rfc3339());
    if entry.summary.is_clustered {
        println!(
            "Cluster of {} around ({:.4}, {:.4}), boost +{:.1}%",
            entry.summary.cluster_size,
            entry.summary.cluster_center_lat,
            entry.summary.cluster_center_lon,
            entry.summary.confidence_boost * 100.0,
        );
    } else {
        println!("No cluster");
    }
    for p in &entry.predictions {
        println!(
            "  #{} ({:.4}, {:.4}) {:.2}% -> {:.2}% [{}]",
            p.rank(),
            p.prediction.latitude,
            p.prediction.longitude,
            p.base_probability * 100.0,
            p.adjusted_probability * 100.0,
            p.confidence_level(),
        );
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
