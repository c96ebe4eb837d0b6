//! PDF rendering using pdfium-render.
//!
//! This module provides:
//! - A small engine abstraction (open, page count, media box, rasterize)
//! - The PDFium implementation of it
//! - The page loop that turns a document into one PNG per page

mod backend;
mod renderer;

pub use backend::*;
pub use renderer::*;
