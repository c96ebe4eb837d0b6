// PDF Renderer - Tauri plugin
//
// Renders every page of a PDF to its own PNG file using PDFium and hands the
// file paths back to the WebView.

mod bridge;
mod commands;
mod config;
mod error;
mod output;
mod pdf;

#[cfg(test)]
mod testing;

pub use bridge::{
    cleanup, complete_paths, execute, handle, CleanupRequest, Method, MethodCall, RenderRequest,
    CLEANUP_RENDERS, RENDER_PDF, RENDER_PDF_PAGES,
};
pub use commands::RendererState;
pub use config::{app_output_dir, ConfigError, RendererConfig, DEFAULT_OUTPUT_DIR_NAME};
pub use error::{BridgeError, RenderError};
pub use pdf::{
    read_document, render_file, PageGeometry, PageOutcome, PageStatus, PdfiumBackend,
    RasterBackend, RasterDocument, RenderOptions, RenderReport,
};

use tauri::plugin::{Builder as PluginBuilder, TauriPlugin};
use tauri::{Manager, Runtime};

/// Name the plugin registers under; commands are `plugin:pdf-renderer|<name>`.
pub const PLUGIN_NAME: &str = "pdf-renderer";

/// Access to the renderer from Rust code holding an app, window or handle.
pub trait PdfRendererExt<R: Runtime> {
    fn pdf_renderer(&self) -> &RendererState;
}

impl<R: Runtime, T: Manager<R>> PdfRendererExt<R> for T {
    fn pdf_renderer(&self) -> &RendererState {
        self.state::<RendererState>().inner()
    }
}

/// Plugin builder. Configuration passed here wins over `plugins.pdf-renderer`
/// in `tauri.conf.json`.
#[derive(Debug, Default)]
pub struct Builder {
    config: Option<RendererConfig>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: RendererConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build<R: Runtime>(self) -> TauriPlugin<R, Option<RendererConfig>> {
        let preset = self.config;

        PluginBuilder::<R, Option<RendererConfig>>::new(PLUGIN_NAME)
            .invoke_handler(tauri::generate_handler![
                commands::render_pdf,
                commands::render_pdf_pages,
                commands::cleanup_renders,
                commands::invoke_method,
            ])
            .setup(move |app, api| {
                let mut config = preset
                    .or_else(|| api.config().clone())
                    .unwrap_or_default();
                if config.output_dir.is_none() {
                    config = config.with_app_defaults(&app.path().cache_dir()?, &app.config().identifier);
                }
                config.validate()?;

                log::debug!("[PdfRenderer] Plugin ready: {:?}", config);
                let sweep_on_startup = config.sweep_on_startup;
                app.manage(RendererState::new(config));

                // Setup runs on the main thread; the sweep waits for job slots
                // and does its I/O on the blocking pool.
                if sweep_on_startup {
                    let app = app.clone();
                    tauri::async_runtime::spawn(async move {
                        match app.pdf_renderer().sweep().await {
                            Ok(removed) => log::info!("[PdfRenderer] Swept {} stale file(s)", removed),
                            Err(e) => log::warn!("[PdfRenderer] Could not sweep stale files: {}", e),
                        }
                    });
                }
                Ok(())
            })
            .build()
    }
}

/// Initialize the plugin with configuration from `tauri.conf.json`.
pub fn init<R: Runtime>() -> TauriPlugin<R, Option<RendererConfig>> {
    Builder::new().build()
}
