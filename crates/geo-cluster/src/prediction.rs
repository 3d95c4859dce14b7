//! Prediction records consumed and produced by the cluster analyzer

use serde::{Deserialize, Serialize};
use crate::confidence::ConfidenceLevel;
use crate::error::{ClusterError, Result};
use crate::geometry::GeoPoint;

/// One candidate location returned by the inference step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationPrediction {
    /// 1-based rank as returned by the model
    pub rank: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Raw model likelihood (0.0 - 1.0)
    pub probability: f64,
}

impl LocationPrediction {
    pub fn new(rank: u32, latitude: f64, longitude: f64, probability: f64) -> Self {
        Self {
            rank,
            latitude,
            longitude,
            probability,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Reject coordinates and probabilities that cannot describe a real prediction.
    /// Values are never clamped.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ClusterError::invalid_input(
                self.rank,
                format!("latitude {} outside [-90, 90]", self.latitude),
            ));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ClusterError::invalid_input(
                self.rank,
                format!("longitude {} outside [-180, 180]", self.longitude),
            ));
        }
        if !self.probability.is_finite() || !(0.0..=1.0).contains(&self.probability) {
            return Err(ClusterError::invalid_input(
                self.rank,
                format!("probability {} outside [0, 1]", self.probability),
            ));
        }
        Ok(())
    }
}

/// A prediction annotated with its clustering adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteredPrediction {
    #[serde(flatten)]
    pub prediction: LocationPrediction,
    /// Copy of the original model probability
    pub base_probability: f64,
    /// Additive increment, zero for predictions outside the selected cluster
    pub clustering_boost: f64,
    /// `base_probability + clustering_boost`
    pub adjusted_probability: f64,
    /// Whether this prediction belongs to the selected cluster
    pub is_clustered: bool,
}

impl ClusteredPrediction {
    /// Wrap a prediction with the given boost. A zero boost on a non-member
    /// leaves the probability untouched.
    pub fn new(prediction: LocationPrediction, clustering_boost: f64, is_clustered: bool) -> Self {
        Self {
            prediction,
            base_probability: prediction.probability,
            clustering_boost,
            adjusted_probability: prediction.probability + clustering_boost,
            is_clustered,
        }
    }

    pub fn unclustered(prediction: LocationPrediction) -> Self {
        Self::new(prediction, 0.0, false)
    }

    pub fn rank(&self) -> u32 {
        self.prediction.rank
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_probability(self.adjusted_probability)
    }
}

/// Summary of one analysis call
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterAnalysisResult {
    /// True iff a cluster of at least the configured minimum size was found
    pub is_clustered: bool,
    /// Number of predictions in the selected cluster (0 when not clustered)
    pub cluster_size: usize,
    /// Farthest member distance from the cluster centroid (km)
    pub cluster_radius_km: f64,
    /// Mean member distance from the cluster centroid (km)
    pub average_distance_km: f64,
    /// Boost applied to every cluster member
    pub confidence_boost: f64,
    pub cluster_center_lat: f64,
    pub cluster_center_lon: f64,
}

impl ClusterAnalysisResult {
    /// The summary reported when no qualifying cluster exists
    pub fn not_clustered() -> Self {
        Self::default()
    }

    pub fn center(&self) -> Option<GeoPoint> {
        self.is_clustered
            .then(|| GeoPoint::new(self.cluster_center_lat, self.cluster_center_lon))
    }
}
