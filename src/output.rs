//! Output files for rendered pages.
//!
//! Every page is written to `<output dir>/<uuid>.png`. Nothing keeps track of
//! issued names; callers remove files with [`remove_rendered`] or the whole
//! directory is swept with [`sweep`].

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const OUTPUT_EXTENSION: &str = "png";

const MAX_NAME_ATTEMPTS: usize = 4;

/// Fresh candidate path. Not reserved until [`write_unique`] creates it.
pub fn unique_path(dir: &Path) -> PathBuf {
    dir.join(format!("{}.{}", Uuid::new_v4(), OUTPUT_EXTENSION))
}

/// Write `bytes` to a newly created, uniquely named file under `dir`.
///
/// The file is opened with `create_new`, so an existing file is never
/// overwritten even if two ids collide.
pub fn write_unique(dir: &Path, bytes: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    for _ in 0..MAX_NAME_ATTEMPTS {
        let path = unique_path(dir);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };

        if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        return Ok(path);
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "could not allocate a unique output file name",
    ))
}

/// Whether `path` looks like a file this plugin produced.
fn is_rendered_file(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION))
        .unwrap_or(false);
    let has_uuid_stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| Uuid::parse_str(stem).is_ok())
        .unwrap_or(false);
    has_extension && has_uuid_stem
}

/// Remove the given rendered files. Paths outside `dir`, paths that were not
/// produced by the renderer and paths that no longer exist are skipped.
/// Returns how many files were removed.
pub fn remove_rendered(dir: &Path, paths: &[PathBuf]) -> io::Result<usize> {
    let root = match dir.canonicalize() {
        Ok(root) => root,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for path in paths {
        let Ok(resolved) = path.canonicalize() else {
            log::debug!("[PdfRenderer] Skipping missing file {:?}", path);
            continue;
        };
        if resolved.parent() != Some(root.as_path()) || !is_rendered_file(&resolved) {
            log::warn!("[PdfRenderer] Refusing to remove {:?}: not a rendered page", path);
            continue;
        }
        fs::remove_file(&resolved)?;
        removed += 1;
    }
    Ok(removed)
}

/// Remove every rendered file in `dir`. A missing directory counts as empty.
pub fn sweep(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_rendered_file(&path) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
