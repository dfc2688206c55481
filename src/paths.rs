//! Path helpers shared by the settings store and the build services.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Separator that is foreign to the host platform.
#[cfg(windows)]
const FOREIGN_SEPARATOR: char = '/';
#[cfg(not(windows))]
const FOREIGN_SEPARATOR: char = '\\';

/// Rewrite foreign path separators to the host separator.
///
/// Editor preferences are frequently copied between machines, so a JDK path
/// written on Windows can show up on macOS with backslashes. A separator in
/// the very first position is left alone (UNC prefixes, absolute roots).
pub fn as_native_path(path: &str) -> String {
    match path.find(FOREIGN_SEPARATOR) {
        Some(index) if index > 0 => path.replace(FOREIGN_SEPARATOR, std::path::MAIN_SEPARATOR_STR),
        _ => path.to_string(),
    }
}

/// Join several components onto a base path.
pub fn combine<I, S>(base: &Utf8Path, parts: I) -> Utf8PathBuf
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut path = base.to_path_buf();
    for part in parts {
        path.push(part.as_ref());
    }
    path
}

/// Resolve `path` against the current directory without touching the
/// filesystem. Symlinks are kept as they are.
pub fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let resolved = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve absolute path: {}", path))?;
    Utf8PathBuf::try_from(resolved)
        .with_context(|| format!("Resolved path for {} is not valid UTF-8", path))
}

/// Make sure `path` can be written, clearing a read-only attribute if needed.
///
/// Returns `Ok(false)` when the file does not exist.
pub fn ensure_file_is_writable(path: &Utf8Path) -> Result<bool> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("Failed to stat {}", path)),
    };

    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        tracing::debug!("Clearing read-only attribute on {}", path);
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("Failed to clear read-only attribute on {}", path))?;
    }

    Ok(true)
}
