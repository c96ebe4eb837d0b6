//! In-memory engine for unit tests, so they run without a PDFium library.

use image::{DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::RenderError;
use crate::pdf::{PageGeometry, RasterBackend, RasterDocument};

const FAKE_HEADER: &[u8] = b"%PDF-";

#[derive(Debug, Clone)]
pub struct FakePage {
    pub geometry: PageGeometry,
    pub fail: bool,
}

impl FakePage {
    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            geometry: PageGeometry {
                width,
                height,
                rotation: 0,
            },
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::sized(10.0, 10.0)
        }
    }
}

/// Accepts any bytes starting with `%PDF-` and serves the configured pages.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pages: Vec<FakePage>,
    rendered: Mutex<Vec<u32>>,
}

impl FakeBackend {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            pages,
            rendered: Mutex::new(Vec::new()),
        }
    }

    /// 0-based indices passed to `rasterize`, in call order.
    pub fn rendered_pages(&self) -> Vec<u32> {
        self.rendered.lock().unwrap().clone()
    }
}

impl RasterBackend for FakeBackend {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn RasterDocument + 'a>, RenderError> {
        if !bytes.starts_with(FAKE_HEADER) {
            return Err(RenderError::DocumentDecodeFailed("missing %PDF- header".to_string()));
        }
        Ok(Box::new(FakeDocument { backend: self }))
    }
}

struct FakeDocument<'a> {
    backend: &'a FakeBackend,
}

impl FakeDocument<'_> {
    fn page(&self, index: u32) -> Result<&FakePage, RenderError> {
        self.backend
            .pages
            .get(index as usize)
            .ok_or_else(|| RenderError::PageRenderFailed {
                page: index + 1,
                reason: "no such page".to_string(),
            })
    }
}

impl RasterDocument for FakeDocument<'_> {
    fn page_count(&self) -> u32 {
        self.backend.pages.len() as u32
    }

    fn page_geometry(&self, index: u32) -> Result<PageGeometry, RenderError> {
        Ok(self.page(index)?.geometry)
    }

    fn rasterize(&self, index: u32, width: u32, height: u32) -> Result<DynamicImage, RenderError> {
        if self.page(index)?.fail {
            return Err(RenderError::PageRenderFailed {
                page: index + 1,
                reason: "simulated failure".to_string(),
            });
        }
        self.backend.rendered.lock().unwrap().push(index);
        Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        )))
    }
}

/// Write a file the fake backend accepts and return its path.
pub fn write_fake_pdf(dir: &Path) -> PathBuf {
    let path = dir.join("input.pdf");
    std::fs::write(&path, b"%PDF-1.7\n% fake document\n").unwrap();
    path
}
