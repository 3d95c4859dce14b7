//! Geographic cluster analysis library for GeoLens
//!
//! This crate takes the ranked location predictions produced for a single
//! photograph, detects whether a subset of them agree closely in space, and
//! redistributes confidence toward that corroborating subset.

pub mod cluster;
pub mod confidence;
pub mod error;
pub mod geometry;
pub mod prediction;

pub use cluster::{
    apply_boost, compute_boost, find_largest_cluster, ClusterAnalysis, ClusterAnalyzer,
    ClusterConfig,
};
pub use confidence::ConfidenceLevel;
pub use error::{ClusterError, Result};
pub use geometry::{compute_centroid, compute_cluster_metrics, distance_km, ClusterMetrics, GeoPoint};
pub use prediction::{ClusterAnalysisResult, ClusteredPrediction, LocationPrediction};
