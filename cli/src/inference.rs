//! Inference service response types and sources
//!
//! The GeoCLIP service accepts image paths and answers with ranked
//! coordinate predictions per image. Responses can come straight from the
//! running service or from a JSON file saved earlier.

use anyhow::{bail, Context, Result};
use geo_cluster::LocationPrediction;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Supported image file extensions
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "heic", "webp"];

/// The service rejects requests carrying more items than this
pub const MAX_IMAGES_PER_REQUEST: usize = 100;

/// Split `images` into request-sized groups, preserving order
pub fn request_batches(images: &[PathBuf]) -> std::slice::Chunks<'_, PathBuf> {
    images.chunks(MAX_IMAGES_PER_REQUEST)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub device: Option<String>,
    pub results: Vec<ImageResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    pub path: PathBuf,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub predictions: Vec<PredictionCandidate>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A ranked prediction plus the reverse-geocoded place names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionCandidate {
    pub rank: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub probability: f64,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub country: String,
}

impl PredictionCandidate {
    pub fn to_prediction(&self) -> LocationPrediction {
        LocationPrediction::new(self.rank, self.latitude, self.longitude, self.probability)
    }

    /// "City, State, County, Country" with empty parts dropped
    pub fn location_summary(&self) -> String {
        [&self.city, &self.state, &self.county, &self.country]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub trait InferenceSource {
    fn fetch(&self) -> Result<InferenceResponse>;
}

/// A saved service response on disk
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl InferenceSource for JsonFileSource {
    fn fetch(&self) -> Result<InferenceResponse> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read inference output: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inference output: {}", self.path.display()))
    }
}

#[derive(Debug, Serialize)]
struct InferenceItem<'a> {
    path: &'a Path,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    items: Vec<InferenceItem<'a>>,
    top_k: u32,
    device: &'a str,
    skip_missing: bool,
}

/// The running GeoCLIP service, reached over HTTP
pub struct HttpInferenceSource {
    base_url: String,
    images: Vec<PathBuf>,
    top_k: u32,
    device: String,
    client: reqwest::blocking::Client,
}

impl HttpInferenceSource {
    pub fn new(base_url: &str, images: Vec<PathBuf>, top_k: u32, device: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            images,
            top_k,
            device: device.to_string(),
            client,
        })
    }

    fn check_health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Inference service unreachable at {}", self.base_url))?;
        if !response.status().is_success() {
            bail!("Inference service health check failed: {}", response.status());
        }
        Ok(())
    }

    fn infer(&self, batch: &[PathBuf]) -> Result<InferenceResponse> {
        let request = InferenceRequest {
            items: batch.iter().map(|p| InferenceItem { path: p }).collect(),
            top_k: self.top_k,
            device: &self.device,
            skip_missing: true,
        };

        let response = self
            .client
            .post(format!("{}/infer", self.base_url))
            .json(&request)
            .send()
            .context("Inference request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("Inference service returned {}: {}", status, body);
        }

        response
            .json::<InferenceResponse>()
            .context("Failed to decode inference response")
    }
}

impl InferenceSource for HttpInferenceSource {
    fn fetch(&self) -> Result<InferenceResponse> {
        if self.images.is_empty() {
            return Ok(InferenceResponse {
                device: None,
                results: Vec::new(),
            });
        }

        self.check_health()?;

        info!(count = self.images.len(), url = %self.base_url, "requesting predictions");
        let mut combined = InferenceResponse {
            device: None,
            results: Vec::with_capacity(self.images.len()),
        };

        for batch in request_batches(&self.images) {
            match self.infer(batch) {
                Ok(response) => {
                    combined.device = combined.device.or(response.device);
                    combined.results.extend(response.results);
                }
                // A failed batch marks its images as failed; the rest still run
                Err(e) => {
                    warn!(count = batch.len(), error = %e, "inference batch failed");
                    combined.results.extend(batch.iter().map(|path| ImageResult {
                        path: path.clone(),
                        md5: None,
                        predictions: Vec::new(),
                        warnings: Vec::new(),
                        error: Some(format!("{:#}", e)),
                    }));
                }
            }
        }

        Ok(combined)
    }
}

/// Recursively scan a folder for supported image files
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read directory: {}", folder.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            paths.extend(scan_folder(&path)?);
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                paths.push(path);
            }
        }
    }

    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = r#"{
        "device": "cpu",
        "results": [
            {
                "path": "/photos/eiffel.jpg",
                "md5": "d41d8cd98f00b204e9800998ecf8427e",
                "predictions": [
                    {"rank": 1, "latitude": 48.8566, "longitude": 2.3522, "probability": 0.18,
                     "city": "Paris", "state": "Ile-de-France", "county": "", "country": "France",
                     "location_summary": "Paris, Ile-de-France, France"}
                ],
                "warnings": [],
                "error": null
            },
            {"path": "/photos/missing.jpg", "predictions": [], "warnings": ["File does not exist"]}
        ]
    }"#;

    #[test]
    fn test_parse_service_response() {
        let response: InferenceResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.device.as_deref(), Some("cpu"));
        assert_eq!(response.results.len(), 2);

        let first = &response.results[0];
        assert_eq!(first.predictions[0].to_prediction(), LocationPrediction::new(1, 48.8566, 2.3522, 0.18));
        assert_eq!(first.predictions[0].location_summary(), "Paris, Ile-de-France, France");
        assert!(response.results[1].error.is_none());
        assert_eq!(response.results[1].warnings.len(), 1);
    }

    #[test]
    fn test_json_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, SAMPLE).unwrap();

        let response = JsonFileSource::new(path).fetch().unwrap();
        assert_eq!(response.results.len(), 2);

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{not json").unwrap();
        assert!(JsonFileSource::new(broken).fetch().is_err());
    }

    #[test]
    fn test_scan_folder_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.JPG"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("a.png"), b"x").unwrap();

        let found = scan_folder(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.extension().is_some()));
        assert!(!found.iter().any(|p| p.ends_with("notes.txt")));
    }

    #[test]
    fn test_request_batches_respect_service_limit() {
        let images: Vec<PathBuf> = (0..250).map(|i| PathBuf::from(format!("/photos/{}.jpg", i))).collect();
        let sizes: Vec<usize> = request_batches(&images).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);

        let last = request_batches(&images).last().unwrap();
        assert_eq!(last[0], PathBuf::from("/photos/200.jpg"));

        assert_eq!(request_batches(&images[..100]).count(), 1);
        assert_eq!(request_batches(&[]).count(), 0);
    }

    #[test]
    fn test_http_source_without_images_skips_network() {
        let source = HttpInferenceSource::new("http://127.0.0.1:1/", Vec::new(), 5, "auto").unwrap();
        assert!(source.fetch().unwrap().results.is_empty());
    }
}
