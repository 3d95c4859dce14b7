//! SQLite cache of clustered predictions for GeoLens.
//!
//! The orchestrator runs inference and cluster analysis once per image and
//! stores the annotated predictions here, keyed by a fingerprint of the image
//! contents. `geolens analyze --cache` writes records after each run and
//! `geolens show` reads them back, so past results can be looked up
//! without re-running the model. `analyze` itself always calls the service.
//!
//! Default location: ~/.geolens/cache/predictions.db
//!
//! Uses WAL mode so a reader never blocks the writer.

pub mod fingerprint;

pub use fingerprint::{fingerprint_bytes, fingerprint_file};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use geo_cluster::{ClusterAnalysisResult, ClusteredPrediction, LocationPrediction};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One image's cached analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnalysis {
    pub fingerprint: String,
    pub file_path: String,
    pub analyzed_at: DateTime<Utc>,
    /// Annotated predictions in the order the model returned them
    pub predictions: Vec<ClusteredPrediction>,
    pub summary: ClusterAnalysisResult,
}

/// Prediction cache handle.
pub struct PredictionCache {
    conn: Connection,
    db_path: PathBuf,
}

impl PredictionCache {
    /// Open or create the cache in the user's home directory.
    pub fn open_default() -> Result<Self> {
        Self::open(&Self::default_path())
    }

    /// Open or create a cache database at a specific path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create cache dir: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let cache = Self {
            conn,
            db_path: db_path.to_path_buf(),
        };
        cache.create_tables()?;
        Ok(cache)
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geolens")
            .join("cache")
            .join("predictions.db")
    }

    /// Get the database file path.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    // -- Schema --

    fn create_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS analyses (
                fingerprint TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                analyzed_at TEXT NOT NULL,
                is_clustered INTEGER NOT NULL DEFAULT 0,
                cluster_size INTEGER NOT NULL DEFAULT 0,
                cluster_radius_km REAL NOT NULL DEFAULT 0,
                average_distance_km REAL NOT NULL DEFAULT 0,
                confidence_boost REAL NOT NULL DEFAULT 0,
                cluster_center_lat REAL NOT NULL DEFAULT 0,
                cluster_center_lon REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS predictions (
                fingerprint TEXT NOT NULL REFERENCES analyses(fingerprint) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                rank INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                probability REAL NOT NULL,
                base_probability REAL NOT NULL,
                clustering_boost REAL NOT NULL DEFAULT 0,
                adjusted_probability REAL NOT NULL,
                is_clustered INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (fingerprint, position)
            );

            CREATE TABLE IF NOT EXISTS cache_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_analyses_path ON analyses(file_path);
            CREATE INDEX IF NOT EXISTS idx_analyses_clustered ON analyses(is_clustered);
            ",
        )?;
        Ok(())
    }

    // -- Cache metadata --

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cache_meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row(
                "SELECT value FROM cache_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    // -- Analyses --

    /// Insert or replace an image's analysis and all of its predictions.
    pub fn store(&self, entry: &CachedAnalysis) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        self.conn.execute(
            "DELETE FROM predictions WHERE fingerprint = ?1",
            params![entry.fingerprint],
        )?;

        let s = &entry.summary;
        self.conn.execute(
            "INSERT OR REPLACE INTO analyses (
                fingerprint, file_path, analyzed_at,
                is_clustered, cluster_size, cluster_radius_km, average_distance_km,
                confidence_boost, cluster_center_lat, cluster_center_lon
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.fingerprint,
                entry.file_path,
                entry.analyzed_at.to_rfc3339(),
                s.is_clustered as i32,
                s.cluster_size as i64,
                s.cluster_radius_km,
                s.average_distance_km,
                s.confidence_boost,
                s.cluster_center_lat,
                s.cluster_center_lon,
            ],
        )?;

        for (position, p) in entry.predictions.iter().enumerate() {
            self.conn.execute(
                "INSERT INTO predictions (
                    fingerprint, position, rank, latitude, longitude, probability,
                    base_probability, clustering_boost, adjusted_probability, is_clustered
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.fingerprint,
                    position as i64,
                    p.prediction.rank,
                    p.prediction.latitude,
                    p.prediction.longitude,
                    p.prediction.probability,
                    p.base_probability,
                    p.clustering_boost,
                    p.adjusted_probability,
                    p.is_clustered as i32,
                ],
            )?;
        }

        tx.commit()?;
        debug!(fingerprint = %entry.fingerprint, count = entry.predictions.len(), "cached analysis");
        Ok(())
    }

    /// Load a cached analysis by fingerprint.
    pub fn load(&self, fingerprint: &str) -> Result<Option<CachedAnalysis>> {
        let header = self
            .conn
            .query_row(
                "SELECT file_path, analyzed_at,
                    is_clustered, cluster_size, cluster_radius_km, average_distance_km,
                    confidence_boost, cluster_center_lat, cluster_center_lon
                FROM analyses WHERE fingerprint = ?1",
                params![fingerprint],
                |row| {
                    let file_path: String = row.get(0)?;
                    let analyzed_at: String = row.get(1)?;
                    let summary = ClusterAnalysisResult {
                        is_clustered: row.get::<_, i32>(2)? != 0,
                        cluster_size: row.get::<_, i64>(3)? as usize,
                        cluster_radius_km: row.get(4)?,
                        average_distance_km: row.get(5)?,
                        confidence_boost: row.get(6)?,
                        cluster_center_lat: row.get(7)?,
                        cluster_center_lon: row.get(8)?,
                    };
                    Ok((file_path, analyzed_at, summary))
                },
            )
            .optional()?;

        let Some((file_path, analyzed_at, summary)) = header else {
            return Ok(None);
        };

        let analyzed_at = DateTime::parse_from_rfc3339(&analyzed_at)
            .with_context(|| format!("Corrupt analyzed_at timestamp for {}", fingerprint))?
            .with_timezone(&Utc);

        let mut stmt = self.conn.prepare(
            "SELECT rank, latitude, longitude, probability,
                base_probability, clustering_boost, adjusted_probability, is_clustered
            FROM predictions WHERE fingerprint = ?1 ORDER BY position",
        )?;

        let rows = stmt.query_map(params![fingerprint], |row| {
            Ok(ClusteredPrediction {
                prediction: LocationPrediction {
                    rank: row.get(0)?,
                    latitude: row.get(1)?,
                    longitude: row.get(2)?,
                    probability: row.get(3)?,
                },
                base_probability: row.get(4)?,
                clustering_boost: row.get(5)?,
                adjusted_probability: row.get(6)?,
                is_clustered: row.get::<_, i32>(7)? != 0,
            })
        })?;
        let predictions = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CachedAnalysis {
            fingerprint: fingerprint.to_string(),
            file_path,
            analyzed_at,
            predictions,
            summary,
        }))
    }

    pub fn contains(&self, fingerprint: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM analyses WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Remove an image from the cache. Returns whether anything was deleted.
    pub fn remove(&self, fingerprint: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "DELETE FROM predictions WHERE fingerprint = ?1",
            params![fingerprint],
        )?;
        let removed = self.conn.execute(
            "DELETE FROM analyses WHERE fingerprint = ?1",
            params![fingerprint],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Drop every cached analysis. Metadata is kept.
    pub fn clear(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM predictions; DELETE FROM analyses;")?;
        Ok(())
    }

    // -- Statistics --

    pub fn entry_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM analyses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of cached images whose predictions formed a cluster.
    pub fn clustered_count(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM analyses WHERE is_clustered = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
