//! Cluster detection and confidence boosting for GeoLens
//!
//! Given the ranked predictions for one photograph, the analyzer looks for
//! the largest group of predictions lying within a fixed radius of a common
//! anchor prediction. Members of that group corroborate each other, so each
//! receives the same additive boost proportional to the share of predictions
//! that agree.
//!
//! Neighborhoods are evaluated per anchor. Two members of the selected
//! cluster may be farther apart than the radius, as long as both are within
//! it of the anchor. Ties between equally large neighborhoods go to the
//! anchor that appears first in rank order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{ClusterError, Result};
use crate::geometry::{compute_centroid, compute_cluster_metrics, distance_km, GeoPoint};
use crate::prediction::{ClusterAnalysisResult, ClusteredPrediction, LocationPrediction};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Maximum distance from the anchor for a prediction to join its neighborhood (km)
    pub radius_km: f64,
    /// Smallest neighborhood that counts as a cluster
    pub minimum_cluster_size: usize,
    /// Boost awarded when every prediction falls in the cluster
    pub max_boost_fraction: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_km: 100.0,
            minimum_cluster_size: 2,
            max_boost_fraction: 0.15,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.radius_km.is_finite() || self.radius_km < 0.0 {
            return Err(ClusterError::InvalidConfig(format!(
                "radius_km must be a non-negative number, got {}",
                self.radius_km
            )));
        }
        if self.minimum_cluster_size < 2 {
            return Err(ClusterError::InvalidConfig(format!(
                "minimum_cluster_size must be at least 2, got {}",
                self.minimum_cluster_size
            )));
        }
        if !self.max_boost_fraction.is_finite() || !(0.0..=1.0).contains(&self.max_boost_fraction) {
            return Err(ClusterError::InvalidConfig(format!(
                "max_boost_fraction must be within [0, 1], got {}",
                self.max_boost_fraction
            )));
        }
        Ok(())
    }
}

/// Output of one analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAnalysis {
    /// Annotated predictions, in input order
    pub predictions: Vec<ClusteredPrediction>,
    pub summary: ClusterAnalysisResult,
}

impl ClusterAnalysis {
    /// All predictions passed through untouched, with no cluster reported
    pub fn unclustered(predictions: &[LocationPrediction]) -> Self {
        Self {
            predictions: apply_boost(predictions, &[], 0.0),
            summary: ClusterAnalysisResult::not_clustered(),
        }
    }

    /// Predictions that belong to the selected cluster
    pub fn cluster_members(&self) -> impl Iterator<Item = &ClusteredPrediction> {
        self.predictions.iter().filter(|p| p.is_clustered)
    }
}

pub struct ClusterAnalyzer {
    config: ClusterConfig,
}

impl ClusterAnalyzer {
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_default_config() -> Self {
        Self {
            config: ClusterConfig::default(),
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Analyze the ranked predictions for a single image.
    ///
    /// Every prediction is validated before any geometry runs; one bad value
    /// fails the whole call with `InvalidInput`.
    pub fn analyze_predictions(&self, predictions: &[LocationPrediction]) -> Result<ClusterAnalysis> {
        for prediction in predictions {
            prediction.validate()?;
        }

        if predictions.len() < 2 {
            return Ok(ClusterAnalysis::unclustered(predictions));
        }

        let members = find_largest_cluster(
            predictions,
            self.config.radius_km,
            self.config.minimum_cluster_size,
        );

        if members.is_empty() {
            debug!(
                total = predictions.len(),
                radius_km = self.config.radius_km,
                "no qualifying cluster"
            );
            return Ok(ClusterAnalysis::unclustered(predictions));
        }

        let points: Vec<GeoPoint> = members.iter().map(|&i| predictions[i].point()).collect();
        // members holds at least minimum_cluster_size (>= 2) points here
        let center = compute_centroid(&points);
        let metrics = compute_cluster_metrics(&points, &center);
        let boost = compute_boost(members.len(), predictions.len(), self.config.max_boost_fraction);

        debug!(
            cluster_size = members.len(),
            total = predictions.len(),
            boost,
            radius_km = metrics.radius_km,
            "selected prediction cluster"
        );

        Ok(ClusterAnalysis {
            predictions: apply_boost(predictions, &members, boost),
            summary: ClusterAnalysisResult {
                is_clustered: true,
                cluster_size: members.len(),
                cluster_radius_km: metrics.radius_km,
                average_distance_km: metrics.average_distance_km,
                confidence_boost: boost,
                cluster_center_lat: center.latitude,
                cluster_center_lon: center.longitude,
            },
        })
    }

    /// Analyze many images in parallel. Results come back in input order,
    /// one per image.
    pub fn analyze_batch(&self, images: &[Vec<LocationPrediction>]) -> Vec<Result<ClusterAnalysis>> {
        images
            .par_iter()
            .map(|predictions| self.analyze_predictions(predictions))
            .collect()
    }
}

/// Indices (in input order) of the largest fixed-radius neighborhood.
///
/// Returns an empty vector when there are fewer than two predictions or when
/// the largest neighborhood is smaller than `minimum_cluster_size`.
pub fn find_largest_cluster(
    predictions: &[LocationPrediction],
    radius_km: f64,
    minimum_cluster_size: usize,
) -> Vec<usize> {
    if predictions.len() < 2 {
        return Vec::new();
    }

    let neighborhood = |anchor: &LocationPrediction| -> Vec<usize> {
        predictions
            .iter()
            .enumerate()
            .filter(|(_, other)| {
                distance_km(anchor.latitude, anchor.longitude, other.latitude, other.longitude)
                    <= radius_km
            })
            .map(|(i, _)| i)
            .collect()
    };

    let mut best: Vec<usize> = Vec::new();
    let mut best_anchor = 0;
    for (i, anchor) in predictions.iter().enumerate() {
        let candidate = neighborhood(anchor);
        // Strict comparison keeps the earliest anchor on ties
        if candidate.len() > best.len() {
            best = candidate;
            best_anchor = i;
        }
    }

    if best.len() < minimum_cluster_size {
        return Vec::new();
    }

    debug!(anchor_rank = predictions[best_anchor].rank, size = best.len(), "largest neighborhood");
    best
}

/// Boost proportional to the share of predictions inside the cluster
pub fn compute_boost(cluster_size: usize, total_predictions: usize, max_boost_fraction: f64) -> f64 {
    if total_predictions == 0 {
        return 0.0;
    }
    max_boost_fraction * (cluster_size as f64 / total_predictions as f64)
}

/// Annotate every prediction, adding `boost` to cluster members only.
/// Output order matches input order.
pub fn apply_boost(
    predictions: &[LocationPrediction],
    cluster_members: &[usize],
    boost: f64,
) -> Vec<ClusteredPrediction> {
    predictions
        .iter()
        .enumerate()
        .map(|(i, prediction)| {
            if cluster_members.contains(&i) {
                ClusteredPrediction::new(*prediction, boost, true)
            } else {
                ClusteredPrediction::unclustered(*prediction)
            }
        })
        .collect()
}
