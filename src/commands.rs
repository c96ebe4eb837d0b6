//! Tauri commands for the renderer.
//!
//! These commands expose the dispatcher to the WebView frontend via IPC.
//!
//! Note: pdfium-render's Pdfium struct is not Send+Sync, so we don't store
//! it in plugin state. Each job binds PDFium on the blocking thread that runs
//! it, and jobs never run on the IPC thread.

use serde_json::Value;
use std::sync::Arc;
use tauri::State;
use tokio::sync::Semaphore;

use crate::bridge::{self, CleanupRequest, Method, MethodCall, RenderRequest};
use crate::config::RendererConfig;
use crate::error::{BridgeError, RenderError};
use crate::pdf::{PdfiumBackend, RasterBackend};

/// Plugin state: the resolved configuration and the job limiter.
pub struct RendererState {
    config: RendererConfig,
    jobs: Arc<Semaphore>,
    job_slots: u32,
}

impl RendererState {
    pub fn new(config: RendererConfig) -> Self {
        let max_slots = Semaphore::MAX_PERMITS.min(u32::MAX as usize);
        let job_slots = config.max_concurrent_jobs.clamp(1, max_slots) as u32;
        let jobs = Arc::new(Semaphore::new(job_slots as usize));
        Self {
            config,
            jobs,
            job_slots,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Validate and run a raw method call.
    pub async fn dispatch(&self, call: MethodCall) -> Result<Value, BridgeError> {
        self.run(Method::parse(&call)?).await
    }

    /// Run a validated call against PDFium.
    pub async fn run(&self, method: Method) -> Result<Value, BridgeError> {
        self.run_with(method, |config| {
            PdfiumBackend::bind(config.library_path.as_deref(), config.render_annotations)
        })
        .await
    }

    /// Clear the whole output directory once no render job is running.
    pub async fn sweep(&self) -> Result<usize, BridgeError> {
        let removed = self
            .run(Method::CleanupRenders(CleanupRequest::default()))
            .await?;
        Ok(removed.as_u64().unwrap_or(0) as usize)
    }

    /// Job slots a call must hold while it runs. Rendering takes one slot;
    /// clearing the whole directory takes all of them so it never removes
    /// pages of a job that is still running.
    fn slots_for(&self, method: &Method) -> u32 {
        match method {
            Method::RenderPdf(_) | Method::RenderPdfPages(_) => 1,
            Method::CleanupRenders(CleanupRequest { paths: None }) => self.job_slots,
            Method::CleanupRenders(_) => 0,
        }
    }

    /// Run a validated call on the blocking pool after taking its job slots;
    /// `connect` builds the engine on the worker thread.
    pub async fn run_with<B, F>(&self, method: Method, connect: F) -> Result<Value, BridgeError>
    where
        B: RasterBackend,
        F: FnOnce(&RendererConfig) -> Result<B, RenderError> + Send + 'static,
    {
        let slots = self.slots_for(&method);
        let _permit = if slots > 0 {
            let permit = self
                .jobs
                .clone()
                .acquire_many_owned(slots)
                .await
                .map_err(|e| BridgeError::Internal(e.to_string()))?;
            Some(permit)
        } else {
            None
        };

        let config = self.config.clone();
        tauri::async_runtime::spawn_blocking(move || {
            bridge::execute(method, &config, || connect(&config))
        })
        .await
        .map_err(|e| BridgeError::Internal(format!("render job failed: {}", e)))?
    }
}

/// Render every page and return the PNG paths in page order.
#[tauri::command]
pub(crate) async fn render_pdf(
    path: String,
    state: State<'_, RendererState>,
) -> Result<Value, BridgeError> {
    state
        .run(Method::RenderPdf(RenderRequest::from_path(&path)?))
        .await
}

/// Render every page and return the per-page report.
#[tauri::command]
pub(crate) async fn render_pdf_pages(
    path: String,
    state: State<'_, RendererState>,
) -> Result<Value, BridgeError> {
    state
        .run(Method::RenderPdfPages(RenderRequest::from_path(&path)?))
        .await
}

/// Remove rendered files. Without `paths`, clears the whole output directory
/// after every running render job has finished.
#[tauri::command]
pub(crate) async fn cleanup_renders(
    paths: Option<Vec<String>>,
    state: State<'_, RendererState>,
) -> Result<Value, BridgeError> {
    state
        .run(Method::CleanupRenders(CleanupRequest::from_paths(paths)?))
        .await
}

/// Generic entry point: `{ method, arguments }` routed through the dispatcher.
#[tauri::command]
pub(crate) async fn invoke_method(
    method: String,
    arguments: Option<Value>,
    state: State<'_, RendererState>,
) -> Result<Value, BridgeError> {
    state
        .dispatch(MethodCall::new(method, arguments.unwrap_or(Value::Null)))
        .await
}
