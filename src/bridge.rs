//! Method-call dispatcher.
//!
//! Calls arrive as a method name plus an untyped argument map. The map is
//! validated into a typed request before anything runs, and every call gets a
//! response: a JSON value on success or a [`BridgeError`] otherwise.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::config::RendererConfig;
use crate::error::{BridgeError, RenderError};
use crate::output;
use crate::pdf::{self, RasterBackend, RenderOptions, RenderReport};

pub const RENDER_PDF: &str = "renderPdf";
pub const RENDER_PDF_PAGES: &str = "renderPdfPages";
pub const CLEANUP_RENDERS: &str = "cleanupRenders";

/// An inbound call as delivered by the host.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub path: PathBuf,
}

impl RenderRequest {
    /// Accepts a plain path, a `file://` URL or a percent-encoded path.
    pub fn from_path(raw: &str) -> Result<Self, BridgeError> {
        Ok(Self {
            path: normalize_path(raw)?,
        })
    }

    pub fn from_arguments(arguments: &Value) -> Result<Self, BridgeError> {
        let map = argument_map(arguments)?;
        match map.get("path") {
            Some(Value::String(raw)) => Self::from_path(raw),
            Some(other) => Err(BridgeError::InvalidArgument(format!(
                "`path` must be a string, got {}",
                type_name(other)
            ))),
            None => Err(BridgeError::InvalidArgument("missing `path`".to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanupRequest {
    /// Files to remove. `None` removes every rendered file.
    pub paths: Option<Vec<PathBuf>>,
}

impl CleanupRequest {
    pub fn from_paths(paths: Option<Vec<String>>) -> Result<Self, BridgeError> {
        let paths = paths
            .map(|paths| paths.iter().map(|p| normalize_path(p)).collect::<Result<Vec<_>, _>>())
            .transpose()?;
        Ok(Self { paths })
    }

    pub fn from_arguments(arguments: &Value) -> Result<Self, BridgeError> {
        if arguments.is_null() {
            return Ok(Self::default());
        }
        let map = argument_map(arguments)?;
        match map.get("paths") {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Array(items)) => {
                let raw = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            BridgeError::InvalidArgument(format!(
                                "`paths` entries must be strings, got {}",
                                type_name(item)
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Self::from_paths(Some(raw))
            }
            Some(other) => Err(BridgeError::InvalidArgument(format!(
                "`paths` must be a list, got {}",
                type_name(other)
            ))),
        }
    }
}

/// A validated call.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    RenderPdf(RenderRequest),
    RenderPdfPages(RenderRequest),
    CleanupRenders(CleanupRequest),
}

impl Method {
    pub fn parse(call: &MethodCall) -> Result<Self, BridgeError> {
        match call.method.as_str() {
            RENDER_PDF => Ok(Method::RenderPdf(RenderRequest::from_arguments(&call.arguments)?)),
            RENDER_PDF_PAGES => Ok(Method::RenderPdfPages(RenderRequest::from_arguments(
                &call.arguments,
            )?)),
            CLEANUP_RENDERS => Ok(Method::CleanupRenders(CleanupRequest::from_arguments(
                &call.arguments,
            )?)),
            other => Err(BridgeError::UnsupportedMethod(other.to_string())),
        }
    }

    pub fn needs_backend(&self) -> bool {
        !matches!(self, Method::CleanupRenders(_))
    }
}

/// Parse and run a call. `connect` is only invoked for methods that render.
pub fn handle<B, F>(call: &MethodCall, config: &RendererConfig, connect: F) -> Result<Value, BridgeError>
where
    B: RasterBackend,
    F: FnOnce() -> Result<B, RenderError>,
{
    execute(Method::parse(call)?, config, connect)
}

/// Run an already validated call.
pub fn execute<B, F>(method: Method, config: &RendererConfig, connect: F) -> Result<Value, BridgeError>
where
    B: RasterBackend,
    F: FnOnce() -> Result<B, RenderError>,
{
    match method {
        Method::RenderPdf(request) => {
            let report = render(&connect()?, &request, config)?;
            to_value(complete_paths(report)?)
        }
        Method::RenderPdfPages(request) => to_value(render(&connect()?, &request, config)?),
        Method::CleanupRenders(request) => to_value(cleanup(&request, config)?),
    }
}

fn render<B: RasterBackend>(
    backend: &B,
    request: &RenderRequest,
    config: &RendererConfig,
) -> Result<RenderReport, RenderError> {
    pdf::render_file(backend, &request.path, &RenderOptions::from(config))
}

/// The path list for a fully rendered document. A document with failed pages
/// becomes a `PartialRender` error that still carries the written paths.
pub fn complete_paths(report: RenderReport) -> Result<Vec<String>, BridgeError> {
    if report.is_complete() {
        Ok(report.paths())
    } else {
        Err(BridgeError::PartialRender(report))
    }
}

/// Remove rendered files from the output directory.
pub fn cleanup(request: &CleanupRequest, config: &RendererConfig) -> Result<usize, RenderError> {
    let dir = config.output_dir();
    let removed = match &request.paths {
        Some(paths) => output::remove_rendered(&dir, paths)?,
        None => output::sweep(&dir)?,
    };
    log::debug!("[PdfRenderer] Removed {} rendered file(s) from {:?}", removed, dir);
    Ok(removed)
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, BridgeError> {
    serde_json::to_value(value).map_err(|e| BridgeError::Internal(e.to_string()))
}

fn argument_map(arguments: &Value) -> Result<&Map<String, Value>, BridgeError> {
    arguments.as_object().ok_or_else(|| {
        BridgeError::InvalidArgument(format!(
            "arguments must be a map, got {}",
            type_name(arguments)
        ))
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

/// Convert an incoming path string into a filesystem path.
fn normalize_path(raw: &str) -> Result<PathBuf, BridgeError> {
    if raw.trim().is_empty() {
        return Err(BridgeError::InvalidArgument("`path` must not be empty".to_string()));
    }

    // Handle file:// URLs
    if raw.starts_with("file://") {
        return url::Url::parse(raw)
            .ok()
            .and_then(|url| url.to_file_path().ok())
            .ok_or_else(|| BridgeError::InvalidArgument(format!("not a usable file URL: {}", raw)));
    }

    // Handle URL-encoded paths (e.g., spaces as %20)
    if !Path::new(raw).exists() {
        if let Ok(decoded) = urlencoding::decode(raw) {
            if decoded != raw && Path::new(decoded.as_ref()).exists() {
                return Ok(PathBuf::from(decoded.into_owned()));
            }
        }
    }

    Ok(PathBuf::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_fake_pdf, FakeBackend, FakePage};
    use serde_json::json;

    fn config_in(dir: &Path) -> RendererConfig {
        RendererConfig {
            output_dir: Some(dir.join("renders")),
            ..RendererConfig::default()
        }
    }

    fn two_pages() -> Result<FakeBackend, RenderError> {
        Ok(FakeBackend::new(vec![
            FakePage::sized(20.0, 10.0),
            FakePage::sized(10.0, 20.0),
        ]))
    }

    fn no_backend() -> Result<FakeBackend, RenderError> {
        panic!("backend must not be bound for this call")
    }

    #[test]
    fn test_render_pdf_returns_ordered_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = write_fake_pdf(tmp.path());
        let call = MethodCall::new(RENDER_PDF, json!({ "path": pdf.to_str().unwrap() }));

        let value = handle(&call, &config_in(tmp.path()), two_pages).unwrap();
        let paths: Vec<String> = serde_json::from_value(value).unwrap();

        assert_eq!(paths.len(), 2);
        let sizes: Vec<(u32, u32)> = paths
            .iter()
            .map(|p| {
                let img = image::open(p).unwrap();
                (img.width(), img.height())
            })
            .collect();
        assert_eq!(sizes, vec![(20, 10), (10, 20)]);
        for path in &paths {
            assert!(Path::new(path).starts_with(tmp.path().join("renders")));
        }
    }

    #[test]
    fn test_render_pdf_with_failed_page_is_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = write_fake_pdf(tmp.path());
        let call = MethodCall::new(RENDER_PDF, json!({ "path": pdf.to_str().unwrap() }));

        let err = handle(&call, &config_in(tmp.path()), || {
            Ok(FakeBackend::new(vec![FakePage::failing(), FakePage::sized(5.0, 5.0)]))
        })
        .unwrap_err();

        match err {
            BridgeError::PartialRender(report) => {
                assert_eq!(report.page_count, 2);
                assert_eq!(report.failed_count(), 1);
                assert_eq!(report.paths().len(), 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_render_pdf_pages_reports_each_page() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = write_fake_pdf(tmp.path());
        let call = MethodCall::new(RENDER_PDF_PAGES, json!({ "path": pdf.to_str().unwrap() }));

        let value = handle(&call, &config_in(tmp.path()), || {
            Ok(FakeBackend::new(vec![FakePage::sized(5.0, 5.0), FakePage::failing()]))
        })
        .unwrap();

        assert_eq!(value["pageCount"], 2);
        assert_eq!(value["pages"][0]["status"], "rendered");
        assert_eq!(value["pages"][1]["status"], "failed");
        assert_eq!(value["pages"][1]["page"], 2);
    }

    #[test]
    fn test_zero_page_document_returns_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = write_fake_pdf(tmp.path());
        let call = MethodCall::new(RENDER_PDF, json!({ "path": pdf.to_str().unwrap() }));

        let value = handle(&call, &config_in(tmp.path()), || Ok(FakeBackend::new(Vec::new()))).unwrap();
        assert_eq!(value, json!([]));
    }

    #[test]
    fn test_missing_file_is_a_structured_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.pdf");
        let call = MethodCall::new(RENDER_PDF, json!({ "path": missing.to_str().unwrap() }));

        let err = handle(&call, &config_in(tmp.path()), two_pages).unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let call = MethodCall::new("getPlatformVersion", Value::Null);
        let err = handle(&call, &RendererConfig::default(), no_backend).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedMethod(ref m) if m == "getPlatformVersion"));
    }

    #[test]
    fn test_bad_arguments_are_rejected_before_binding() {
        let config = RendererConfig::default();
        for arguments in [
            Value::Null,
            json!("just a string"),
            json!({}),
            json!({ "path": 42 }),
            json!({ "path": "" }),
            json!({ "path": "   " }),
        ] {
            let call = MethodCall::new(RENDER_PDF, arguments.clone());
            let err = handle(&call, &config, no_backend).unwrap_err();
            assert_eq!(err.code(), "INVALID_ARGUMENT", "arguments: {}", arguments);
        }
    }

    #[test]
    fn test_backend_failure_surfaces() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = write_fake_pdf(tmp.path());
        let call = MethodCall::new(RENDER_PDF, json!({ "path": pdf.to_str().unwrap() }));

        let err = handle(&call, &config_in(tmp.path()), || -> Result<FakeBackend, RenderError> {
            Err(RenderError::BackendUnavailable("no library".to_string()))
        })
        .unwrap_err();
        assert_eq!(err.code(), "BACKEND_UNAVAILABLE");
    }

    #[test]
    fn test_file_urls_and_encoded_paths_resolve() {
        let tmp = tempfile::tempdir().unwrap();
        let spaced = tmp.path().join("my report.pdf");
        std::fs::write(&spaced, b"%PDF-1.7").unwrap();

        let url = url::Url::from_file_path(&spaced).unwrap();
        assert_eq!(RenderRequest::from_path(url.as_str()).unwrap().path, spaced);

        let encoded = spaced.to_str().unwrap().replace(' ', "%20");
        assert_eq!(RenderRequest::from_path(&encoded).unwrap().path, spaced);

        let plain = tmp.path().join("absent%20file.pdf");
        assert_eq!(RenderRequest::from_path(plain.to_str().unwrap()).unwrap().path, plain);
    }

    #[test]
    fn test_cleanup_removes_rendered_files() {
        let tmp = tempfile::tempdir().unwrap();
        let pdf = write_fake_pdf(tmp.path());
        let config = config_in(tmp.path());

        let render = MethodCall::new(RENDER_PDF, json!({ "path": pdf.to_str().unwrap() }));
        let paths: Vec<String> =
            serde_json::from_value(handle(&render, &config, two_pages).unwrap()).unwrap();

        let first = paths[0].clone();
        let one = MethodCall::new(CLEANUP_RENDERS, json!({ "paths": [first] }));
        assert_eq!(handle(&one, &config, no_backend).unwrap(), json!(1));
        assert!(!Path::new(&paths[0]).exists());
        assert!(Path::new(&paths[1]).exists());

        let all = MethodCall::new(CLEANUP_RENDERS, Value::Null);
        assert_eq!(handle(&all, &config, no_backend).unwrap(), json!(1));
        assert!(!Path::new(&paths[1]).exists());
        assert!(pdf.exists());
    }

    #[test]
    fn test_cleanup_rejects_malformed_paths() {
        let config = RendererConfig::default();
        for arguments in [json!({ "paths": "a.png" }), json!({ "paths": [1, 2] })] {
            let call = MethodCall::new(CLEANUP_RENDERS, arguments);
            let err = handle(&call, &config, no_backend).unwrap_err();
            assert_eq!(err.code(), "INVALID_ARGUMENT");
        }
    }

    #[test]
    fn test_method_call_deserializes_without_arguments() {
        let call: MethodCall = serde_json::from_str(r#"{ "method": "cleanupRenders" }"#).unwrap();
        assert!(call.arguments.is_null());
        assert_eq!(Method::parse(&call).unwrap(), Method::CleanupRenders(CleanupRequest::default()));
        assert!(!Method::parse(&call).unwrap().needs_backend());
    }
}
