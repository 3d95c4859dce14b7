//! Per-image orchestration: analyze, fall back, fingerprint.

use chrono::Utc;
use geo_cluster::{ClusterAnalysis, ClusterAnalyzer, LocationPrediction};
use prediction_cache::{fingerprint_file, CachedAnalysis};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, warn};
use crate::inference::{InferenceResponse, PredictionCandidate};

/// One image after cluster analysis
#[derive(Debug, Clone)]
pub struct ImageReport {
    pub path: PathBuf,
    /// SHA-256 content fingerprint used as the cache key; `None` when the image
    /// could not be read
    pub fingerprint: Option<String>,
    /// Caller-supplied hash echoed by the service, kept as metadata only
    pub md5: Option<String>,
    pub candidates: Vec<PredictionCandidate>,
    pub analysis: ClusterAnalysis,
    /// Set when the predictions were rejected and passed through without a boost
    pub clustering_skipped: Option<String>,
}

impl ImageReport {
    pub fn location_for_rank(&self, rank: u32) -> String {
        self.candidates
            .iter()
            .find(|c| c.rank == rank)
            .map(|c| c.location_summary())
            .unwrap_or_default()
    }

    pub fn to_cached(&self) -> Option<CachedAnalysis> {
        let fingerprint = self.fingerprint.clone()?;
        Some(CachedAnalysis {
            fingerprint,
            file_path: self.path.display().to_string(),
            analyzed_at: Utc::now(),
            predictions: self.analysis.predictions.clone(),
            summary: self.analysis.summary,
        })
    }
}

/// An image the service could not produce predictions for
#[derive(Debug, Clone)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub reports: Vec<ImageReport>,
    pub skipped: Vec<SkippedImage>,
}

impl PipelineOutput {
    pub fn clustered_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.analysis.summary.is_clustered)
            .count()
    }
}

/// Run cluster analysis over every usable image in the response.
///
/// Invalid predictions never abort the run: the image keeps its raw
/// predictions with no boost and the reason is recorded.
pub fn process(response: InferenceResponse, analyzer: &ClusterAnalyzer) -> PipelineOutput {
    let mut output = PipelineOutput::default();
    let mut usable = Vec::new();

    for result in response.results {
        for warning in &result.warnings {
            warn!(path = %result.path.display(), "{}", warning);
        }

        if let Some(error) = result.error {
            warn!(path = %result.path.display(), %error, "inference failed");
            output.skipped.push(SkippedImage { path: result.path, reason: error });
        } else if result.predictions.is_empty() {
            output.skipped.push(SkippedImage {
                path: result.path,
                reason: "Model returned no predictions".to_string(),
            });
        } else {
            usable.push(result);
        }
    }

    let batches: Vec<Vec<LocationPrediction>> = usable
        .iter()
        .map(|r| r.predictions.iter().map(PredictionCandidate::to_prediction).collect())
        .collect();
    let analyses = analyzer.analyze_batch(&batches);

    output.reports = usable
        .into_par_iter()
        .zip(batches.into_par_iter().zip(analyses))
        .map(|(result, (predictions, analysis))| {
            let (analysis, clustering_skipped) = match analysis {
                Ok(analysis) => (analysis, None),
                Err(e) => {
                    warn!(path = %result.path.display(), error = %e, "skipping clustering");
                    (ClusterAnalysis::unclustered(&predictions), Some(e.to_string()))
                }
            };

            // Same key `show --image` computes, whatever the service echoed back
            let fingerprint = match fingerprint_file(&result.path) {
                Ok(fp) => Some(fp),
                Err(e) => {
                    debug!(path = %result.path.display(), error = %e, "no fingerprint");
                    None
                }
            };

            ImageReport {
                path: result.path,
                fingerprint,
                md5: result.md5,
                candidates: result.predictions,
                analysis,
                clustering_skipped,
            }
        })
        .collect();

    output
}
