// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Model acquisition.
//!
//! Models live in an Open Model Zoo style cache:
//!
//! ```text
//! <models>/intel/<model>/<precision>/<model>.xml
//! <models>/intel/<model>/<precision>/<model>.bin
//! ```
//!
//! Missing models are fetched by trying each [`ModelSource`] in order: the
//! configured downloader tool first, then direct downloads built from a base
//! URL. A model that no source can provide is reported as unavailable and
//! the planner drops every trial that uses it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use streambench_benchmarks::io::atomic_write;
use streambench_core::config::BenchConfig;
use streambench_core::{Error, ModelId, Result};
use tokio::process::Command;
use tracing::{info, warn};

/// Locations of model files under a models root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLayout {
    root: PathBuf,
    precision: String,
}

impl ModelLayout {
    /// Create a layout.
    pub fn new(root: impl Into<PathBuf>, precision: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            precision: precision.into(),
        }
    }

    /// Models root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Precision directory name.
    pub fn precision(&self) -> &str {
        &self.precision
    }

    /// Directory holding one model's files.
    pub fn model_dir(&self, model: &ModelId) -> PathBuf {
        self.root
            .join("intel")
            .join(model.as_str())
            .join(&self.precision)
    }

    /// IR topology file.
    pub fn xml(&self, model: &ModelId) -> PathBuf {
        self.model_dir(model).join(format!("{model}.xml"))
    }

    /// IR weights file.
    pub fn bin(&self, model: &ModelId) -> PathBuf {
        self.model_dir(model).join(format!("{model}.bin"))
    }

    /// Whether both IR files exist.
    pub fn is_present(&self, model: &ModelId) -> bool {
        self.xml(model).is_file() && self.bin(model).is_file()
    }
}

/// A way of obtaining model files.
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Place the model's files into `layout`.
    async fn fetch(&self, model: &ModelId, layout: &ModelLayout) -> Result<()>;
}

/// Runs an external downloader such as `omz_downloader`.
#[derive(Debug, Clone)]
pub struct DownloaderSource {
    argv: Vec<String>,
}

impl DownloaderSource {
    /// Create a source from an argv prefix.
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            return Err(Error::configuration("downloader command is empty"));
        }
        Ok(Self { argv })
    }
}

#[async_trait]
impl ModelSource for DownloaderSource {
    fn name(&self) -> &str {
        &self.argv[0]
    }

    async fn fetch(&self, model: &ModelId, layout: &ModelLayout) -> Result<()> {
        let output = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .arg("--name")
            .arg(model.as_str())
            .arg("--precisions")
            .arg(layout.precision())
            .arg("--output_dir")
            .arg(layout.root())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::acquisition(model.as_str(), format!("{}: {e}", self.argv[0])))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            return Err(Error::acquisition(
                model.as_str(),
                format!("{} exited with {}: {last_line}", self.argv[0], output.status),
            ));
        }
        if !layout.is_present(model) {
            return Err(Error::acquisition(
                model.as_str(),
                format!(
                    "{} succeeded but {} is missing",
                    self.argv[0],
                    layout.xml(model).display()
                ),
            ));
        }
        Ok(())
    }
}

/// Downloads `<base>/<model>/<precision>/<model>.{xml,bin}` over HTTP.
#[derive(Debug, Clone)]
pub struct UrlSource {
    client: reqwest::Client,
    base_url: String,
}

impl UrlSource {
    /// Create a source for `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL of one model file.
    pub fn url(&self, model: &ModelId, precision: &str, ext: &str) -> String {
        format!("{}/{model}/{precision}/{model}.{ext}", self.base_url)
    }
}

#[async_trait]
impl ModelSource for UrlSource {
    fn name(&self) -> &str {
        "direct-url"
    }

    async fn fetch(&self, model: &ModelId, layout: &ModelLayout) -> Result<()> {
        let fail = |e: reqwest::Error| Error::acquisition(model.as_str(), e.to_string());
        for (ext, dest) in [("xml", layout.xml(model)), ("bin", layout.bin(model))] {
            let url = self.url(model, layout.precision(), ext);
            let bytes = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(|resp| resp.error_for_status())
                .map_err(fail)?
                .bytes()
                .await
                .map_err(fail)?;
            atomic_write(&dest, &bytes)
                .map_err(|e| Error::acquisition(model.as_str(), format!("{}: {e}", dest.display())))?;
        }
        Ok(())
    }
}

/// Where a model came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// Already in the cache.
    Cached,
    /// Fetched by the named source.
    Fetched(String),
}

/// Result of acquiring every model of a plan.
#[derive(Debug, Default)]
pub struct AcquisitionReport {
    /// Models ready to use.
    pub available: Vec<ModelId>,
    /// Models no source could provide, with the reason.
    pub unavailable: Vec<(ModelId, Error)>,
}

impl AcquisitionReport {
    /// Ids of the unavailable models.
    pub fn unavailable_ids(&self) -> Vec<ModelId> {
        self.unavailable.iter().map(|(id, _)| id.clone()).collect()
    }
}

/// Ensures models are present in the cache.
pub struct ModelAcquirer {
    layout: ModelLayout,
    sources: Vec<Box<dyn ModelSource>>,
}

impl ModelAcquirer {
    /// Create an acquirer with explicit sources, tried in order.
    pub fn new(layout: ModelLayout, sources: Vec<Box<dyn ModelSource>>) -> Self {
        Self { layout, sources }
    }

    /// Downloader first, then direct URLs.
    pub fn from_config(config: &BenchConfig) -> Result<Self> {
        let layout = ModelLayout::new(&config.paths.models_dir, &config.runtime.precision);
        let acq = &config.acquisition;
        let sources: Vec<Box<dyn ModelSource>> = vec![
            Box::new(DownloaderSource::new(acq.downloader.clone())?),
            Box::new(UrlSource::new(
                acq.fallback_base_url.clone(),
                Duration::from_secs(acq.http_timeout_secs),
            )?),
        ];
        Ok(Self::new(layout, sources))
    }

    /// Model layout on the host.
    pub fn layout(&self) -> &ModelLayout {
        &self.layout
    }

    /// Make one model available.
    pub async fn acquire(&self, model: &ModelId) -> Result<Acquired> {
        if self.layout.is_present(model) {
            return Ok(Acquired::Cached);
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            info!(model = %model, source = source.name(), "Fetching model");
            match source.fetch(model, &self.layout).await {
                Ok(()) if self.layout.is_present(model) => {
                    return Ok(Acquired::Fetched(source.name().to_string()));
                }
                Ok(()) => failures.push(format!("{}: files missing after fetch", source.name())),
                Err(e) => {
                    warn!(model = %model, source = source.name(), error = %e, "Model source failed");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }
        Err(Error::acquisition(
            model.as_str(),
            if failures.is_empty() {
                "no model sources configured".to_string()
            } else {
                failures.join("; ")
            },
        ))
    }

    /// Acquire every model, collecting failures instead of stopping.
    pub async fn acquire_all(&self, models: &[ModelId]) -> AcquisitionReport {
        let mut report = AcquisitionReport::default();
        for model in models {
            match self.acquire(model).await {
                Ok(from) => {
                    info!(model = %model, from = ?from, "Model ready");
                    report.available.push(model.clone());
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Model unavailable; its trials are skipped");
                    report.unavailable.push((model.clone(), e));
                }
            }
        }
        report
    }
}
