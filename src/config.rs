//! Plugin configuration, read from `plugins.pdf-renderer` in `tauri.conf.json`
//! or supplied through [`crate::Builder`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the directory that holds rendered pages.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "pdf-renderer";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererConfig {
    /// Where rendered PNGs are written. Inside a Tauri app this defaults to
    /// `<user cache>/<app identifier>/pdf-renderer`.
    pub output_dir: Option<PathBuf>,
    /// PDFium shared library, either the file itself or its directory.
    pub library_path: Option<PathBuf>,
    /// Device pixels per PDF point (1.0 = 72 DPI).
    pub scale: f32,
    /// Upper bound on render jobs running at the same time.
    pub max_concurrent_jobs: usize,
    pub render_annotations: bool,
    /// Remove files left in the output directory by a previous run.
    pub sweep_on_startup: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            library_path: None,
            scale: 1.0,
            max_concurrent_jobs: 2,
            render_annotations: true,
            sweep_on_startup: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("scale must be a positive finite number, got {0}")]
    InvalidScale(f32),
    #[error("maxConcurrentJobs must be at least 1")]
    NoJobSlots,
}

/// Per-user, per-app output directory under `cache_root`.
pub fn app_output_dir(cache_root: &Path, identifier: &str) -> PathBuf {
    cache_root.join(identifier).join(DEFAULT_OUTPUT_DIR_NAME)
}

impl RendererConfig {
    /// Fill in `output_dir` from the app when it was not configured.
    pub fn with_app_defaults(mut self, cache_root: &Path, identifier: &str) -> Self {
        if self.output_dir.is_none() {
            self.output_dir = Some(app_output_dir(cache_root, identifier));
        }
        self
    }

    /// The configured directory, or `<temp>/pdf-renderer` when the config was
    /// never resolved against an app.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_OUTPUT_DIR_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::InvalidScale(self.scale));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::NoJobSlots);
        }
        Ok(())
    }
}
