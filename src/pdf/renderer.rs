//! Renders every page of a document to its own PNG file.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use super::backend::{RasterBackend, RasterDocument};
use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::output;

/// Settings for one render job.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Device pixels per PDF point
    pub scale: f32,
    /// Directory that receives the PNG files
    pub output_dir: PathBuf,
}

impl From<&RendererConfig> for RenderOptions {
    fn from(config: &RendererConfig) -> Self {
        Self {
            scale: config.scale,
            output_dir: config.output_dir(),
        }
    }
}

/// What happened to a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PageStatus {
    Rendered {
        path: String,
        width: u32,
        height: u32,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-based page number
    pub page: u32,
    #[serde(flatten)]
    pub status: PageStatus,
}

/// Per-page results of a render job, in ascending page order. Every page of
/// the document appears exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub page_count: u32,
    pub pages: Vec<PageOutcome>,
}

impl RenderReport {
    /// Paths of the rendered pages, in page order.
    pub fn paths(&self) -> Vec<String> {
        self.pages
            .iter()
            .filter_map(|outcome| match &outcome.status {
                PageStatus::Rendered { path, .. } => Some(path.clone()),
                PageStatus::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|outcome| matches!(outcome.status, PageStatus::Failed { .. }))
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Read the whole file into memory.
pub fn read_document(path: &Path) -> Result<Vec<u8>, RenderError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RenderError::FileNotFound(path.to_path_buf()),
        _ => RenderError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// Render every page of the PDF at `path`.
///
/// Failing to read or decode the document is an error. A page that fails to
/// render is recorded in the report and the remaining pages still render.
pub fn render_file<B: RasterBackend + ?Sized>(
    backend: &B,
    path: &Path,
    options: &RenderOptions,
) -> Result<RenderReport, RenderError> {
    let bytes = read_document(path)?;
    let document = backend.open(&bytes)?;
    let page_count = document.page_count();

    log::debug!(
        "[PdfRenderer] Rendering {} page(s) of {:?} into {:?}",
        page_count,
        path,
        options.output_dir
    );

    let mut pages = Vec::with_capacity(page_count as usize);
    for index in 0..page_count {
        let page = index + 1;
        let status = match render_page(&*document, index, options) {
            Ok(status) => status,
            Err(e) => {
                log::warn!("[PdfRenderer] Page {} of {:?} failed: {}", page, path, e);
                PageStatus::Failed {
                    error: e.to_string(),
                }
            }
        };
        pages.push(PageOutcome { page, status });
    }

    let report = RenderReport { page_count, pages };
    log::info!(
        "[PdfRenderer] Rendered {}/{} page(s) of {:?}",
        page_count as usize - report.failed_count(),
        page_count,
        path
    );
    Ok(report)
}

fn render_page(
    document: &dyn RasterDocument,
    index: u32,
    options: &RenderOptions,
) -> Result<PageStatus, RenderError> {
    let page = index + 1;
    let geometry = document.page_geometry(index)?;
    let (width, height) = geometry.pixel_size(options.scale);

    let image = document.rasterize(index, width, height)?;
    let png_bytes = encode_png(&image).map_err(|reason| RenderError::PageRenderFailed { page, reason })?;

    let path = output::write_unique(&options.output_dir, &png_bytes)?;

    Ok(PageStatus::Rendered {
        path: path.to_string_lossy().into_owned(),
        width: image.width(),
        height: image.height(),
    })
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, String> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(png_bytes)
}
