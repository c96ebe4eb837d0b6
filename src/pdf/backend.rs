//! The narrow surface the renderer needs from a PDF engine, and its PDFium
//! implementation.
//!
//! Note: pdfium-render's Pdfium struct is not shared between jobs. Each render
//! job binds its own instance on the blocking thread that runs it.

use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::RenderError;

/// Media box size and page rotation, both as stored in the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// Media box width in PDF points (1/72 inch)
    pub width: f32,
    /// Media box height in PDF points
    pub height: f32,
    /// Page rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
}

impl PageGeometry {
    /// Output bitmap size in pixels. Quarter-turn pages swap their sides so
    /// the rendered image is upright.
    pub fn pixel_size(&self, scale: f32) -> (u32, u32) {
        let (width, height) = if self.rotation.rem_euclid(180) == 90 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        };
        let to_pixels = |points: f32| (points * scale).round().max(1.0) as u32;
        (to_pixels(width), to_pixels(height))
    }
}

/// Opens documents from raw bytes.
pub trait RasterBackend {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterDocument + 'a>, RenderError>;
}

/// An open document. Page indices are 0-based here; the renderer reports
/// 1-based page numbers.
pub trait RasterDocument {
    fn page_count(&self) -> u32;

    fn page_geometry(&self, index: u32) -> Result<PageGeometry, RenderError>;

    /// Draw the whole page into a `width` x `height` bitmap.
    fn rasterize(&self, index: u32, width: u32, height: u32) -> Result<DynamicImage, RenderError>;
}

/// PDFium-backed engine.
pub struct PdfiumBackend {
    pdfium: Pdfium,
    render_annotations: bool,
}

impl PdfiumBackend {
    pub fn bind(library_path: Option<&Path>, render_annotations: bool) -> Result<Self, RenderError> {
        Ok(Self {
            pdfium: bind_pdfium(library_path)?,
            render_annotations,
        })
    }
}

impl RasterBackend for PdfiumBackend {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterDocument + 'a>, RenderError> {
        let doc = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| RenderError::DocumentDecodeFailed(e.to_string()))?;

        Ok(Box::new(PdfiumDocument {
            doc,
            render_annotations: self.render_annotations,
        }))
    }
}

struct PdfiumDocument<'a> {
    doc: PdfDocument<'a>,
    render_annotations: bool,
}

impl<'a> PdfiumDocument<'a> {
    fn page(&self, index: u32) -> Result<PdfPage<'a>, RenderError> {
        self.doc
            .pages()
            .get(index as u16)
            .map_err(|e| RenderError::PageRenderFailed {
                page: index + 1,
                reason: e.to_string(),
            })
    }
}

impl RasterDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> u32 {
        self.doc.pages().len() as u32
    }

    fn page_geometry(&self, index: u32) -> Result<PageGeometry, RenderError> {
        let page = self.page(index)?;

        match page.boundaries().media() {
            Ok(media) => Ok(PageGeometry {
                width: media.bounds.width().value,
                height: media.bounds.height().value,
                rotation: match page.rotation() {
                    Ok(rot) => match rot {
                        PdfPageRenderRotation::None => 0,
                        PdfPageRenderRotation::Degrees90 => 90,
                        PdfPageRenderRotation::Degrees180 => 180,
                        PdfPageRenderRotation::Degrees270 => 270,
                    },
                    Err(_) => 0,
                },
            }),
            Err(e) => {
                // PDFium reports the page size already rotated
                log::debug!(
                    "[PdfRenderer] No media box on page {}, using page size: {}",
                    index + 1,
                    e
                );
                Ok(PageGeometry {
                    width: page.width().value,
                    height: page.height().value,
                    rotation: 0,
                })
            }
        }
    }

    fn rasterize(&self, index: u32, width: u32, height: u32) -> Result<DynamicImage, RenderError> {
        let mut page = self.page(index)?;

        // PDFium scales the crop box into the target bitmap, and the bitmap
        // is sized from the media box, so draw the media box.
        if let Ok(media) = page.boundaries().media() {
            page.boundaries_mut()
                .set_crop(media.bounds)
                .map_err(|e| RenderError::PageRenderFailed {
                    page: index + 1,
                    reason: e.to_string(),
                })?;
        }

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .render_form_data(self.render_annotations)
            .render_annotations(self.render_annotations);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| RenderError::PageRenderFailed {
                page: index + 1,
                reason: e.to_string(),
            })?;

        Ok(bitmap.as_image())
    }
}

/// Candidate locations for the PDFium library, most specific first.
fn library_search_paths(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(path) = configured {
        if path.is_dir() {
            paths.push(Pdfium::pdfium_platform_library_name_at_path(path));
        } else {
            paths.push(path.to_path_buf());
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            // Tauri bundles resources next to the exe on Windows and Linux
            paths.push(Pdfium::pdfium_platform_library_name_at_path(exe_dir));

            // .app/Contents/MacOS/app -> .app/Contents/{Frameworks,Resources}
            #[cfg(target_os = "macos")]
            {
                if let Some(contents_dir) = exe_dir.parent() {
                    paths.push(Pdfium::pdfium_platform_library_name_at_path(
                        &contents_dir.join("Frameworks"),
                    ));
                    paths.push(Pdfium::pdfium_platform_library_name_at_path(
                        &contents_dir.join("Resources"),
                    ));
                }
            }
        }
    }

    paths
}

/// Bind to the PDFium library and return a usable Pdfium instance.
fn bind_pdfium(configured: Option<&Path>) -> Result<Pdfium, RenderError> {
    static LOGGED_SUCCESS: AtomicBool = AtomicBool::new(false);

    for path in library_search_paths(configured) {
        match Pdfium::bind_to_library(&path) {
            Ok(bindings) => {
                if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
                    log::info!("[PdfRenderer] Loaded PDFium from {:?}", path);
                }
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => log::debug!("[PdfRenderer] No PDFium at {:?}: {:?}", path, e),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
                log::info!("[PdfRenderer] Loaded system PDFium library");
            }
            Ok(Pdfium::new(bindings))
        }
        Err(e) => Err(RenderError::BackendUnavailable(format!(
            "could not load the PDFium library ({:?}); set libraryPath in the plugin config",
            e
        ))),
    }
}
