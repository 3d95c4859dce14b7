//! CSV and JSON writers for analyzed images

use anyhow::{Context, Result};
use geo_cluster::{ClusterAnalysisResult, ClusteredPrediction};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use crate::pipeline::ImageReport;

pub const CSV_HEADER: [&str; 10] = [
    "Path",
    "Rank",
    "Latitude",
    "Longitude",
    "Probability",
    "ClusteringBoost",
    "AdjustedProbability",
    "IsClustered",
    "ConfidenceLevel",
    "Location",
];

/// One row per prediction, images in report order
pub fn write_csv<W: Write>(reports: &[ImageReport], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_HEADER)?;

    for report in reports {
        let path = report.path.display().to_string();
        for p in &report.analysis.predictions {
            csv.write_record([
                path.clone(),
                p.rank().to_string(),
                format!("{:.6}", p.prediction.latitude),
                format!("{:.6}", p.prediction.longitude),
                format!("{:.6}", p.base_probability),
                format!("{:.6}", p.clustering_boost),
                format!("{:.6}", p.adjusted_probability),
                p.is_clustered.to_string(),
                p.confidence_level().to_string(),
                report.location_for_rank(p.rank()),
            ])?;
        }
    }

    csv.flush()?;
    Ok(())
}

pub fn write_csv_file(reports: &[ImageReport], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV export: {}", path.display()))?;
    write_csv(reports, file).with_context(|| format!("Failed to write CSV export: {}", path.display()))
}

#[derive(Debug, Serialize)]
struct ImageExport<'a> {
    path: String,
    fingerprint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    md5: Option<&'a str>,
    predictions: &'a [ClusteredPrediction],
    cluster: &'a ClusterAnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    clustering_skipped: Option<&'a str>,
}

pub fn to_json(reports: &[ImageReport]) -> Result<String> {
    let exports: Vec<ImageExport<'_>> = reports
        .iter()
        .map(|r| ImageExport {
            path: r.path.display().to_string(),
            fingerprint: r.fingerprint.as_deref(),
            md5: r.md5.as_deref(),
            predictions: &r.analysis.predictions,
            cluster: &r.analysis.summary,
            clustering_skipped: r.clustering_skipped.as_deref(),
        })
        .collect();

    serde_json::to_string_pretty(&exports).context("Failed to serialize analysis results to JSON")
}

pub fn write_json_file(reports: &[ImageReport], path: &Path) -> Result<()> {
    let json = to_json(reports)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write output to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::PredictionCandidate;
    use geo_cluster::{ClusterAnalyzer, LocationPrediction};
    use std::path::PathBuf;

    fn report() -> ImageReport {
        let candidates = vec![
            PredictionCandidate {
                rank: 1,
                latitude: 48.8566,
                longitude: 2.3522,
                probability: 0.18,
                city: "Paris".to_string(),
                state: String::new(),
                county: String::new(),
                country: "France".to_string(),
            },
            PredictionCandidate {
                rank: 2,
                latitude: 48.8049,
                longitude: 2.1204,
                probability: 0.14,
                city: "Versailles".to_string(),
                state: String::new(),
                county: String::new(),
                country: "France".to_string(),
            },
        ];
        let predictions: Vec<LocationPrediction> =
            candidates.iter().map(PredictionCandidate::to_prediction).collect();
        let analysis = ClusterAnalyzer::with_default_config()
            .analyze_predictions(&predictions)
            .unwrap();

        ImageReport {
            path: PathBuf::from("/photos/paris.jpg"),
            fingerprint: Some("abcd".to_string()),
            md5: None,
            candidates,
            analysis,
            clustering_skipped: None,
        }
    }

    #[test]
    fn test_csv_columns_and_values() {
        let mut buf = Vec::new();
        write_csv(&[report()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Path,Rank,Latitude,Longitude,Probability,ClusteringBoost,AdjustedProbability,IsClustered,ConfidenceLevel,Location"
        );
        assert_eq!(
            lines[1],
            "/photos/paris.jpg,1,48.856600,2.352200,0.180000,0.150000,0.330000,true,High,\"Paris, France\""
        );
        assert!(lines[2].contains(",2,"));
        assert!(lines[2].contains("Versailles"));
    }

    #[test]
    fn test_json_export() {
        let json = to_json(&[report()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["path"], "/photos/paris.jpg");
        assert_eq!(value[0]["fingerprint"], "abcd");
        assert_eq!(value[0]["cluster"]["is_clustered"], true);
        assert_eq!(value[0]["predictions"].as_array().unwrap().len(), 2);
        assert!(value[0].get("clustering_skipped").is_none());
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let json_path = dir.path().join("out.json");

        write_csv_file(&[report()], &csv_path).unwrap();
        write_json_file(&[report()], &json_path).unwrap();

        assert!(std::fs::read_to_string(csv_path).unwrap().starts_with("Path,"));
        assert!(std::fs::read_to_string(json_path).unwrap().contains("adjusted_probability"));
    }
}
