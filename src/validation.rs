//! Input validation run before any build work starts.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{NcdbError, NcdbResult};

/// Validate and absolutize a file path.
///
/// `allowed_extensions` are compared case-insensitively and without the leading dot.
pub fn validate_path(
    path: impl AsRef<Path>,
    must_exist: bool,
    allowed_extensions: &[&str],
    description: &str,
) -> NcdbResult<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(NcdbError::validation(format!("{description} path is empty")));
    }

    let resolved = absolutize(path)?;

    if must_exist && !resolved.exists() {
        return Err(NcdbError::validation(format!(
            "{} does not exist: {}",
            capitalize(description),
            path.display()
        )));
    }

    if !allowed_extensions.is_empty() {
        let ext = resolved
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        {
            return Err(NcdbError::validation(format!(
                "{} must have extension: {} (got '{}')",
                capitalize(description),
                allowed_extensions.join(", "),
                ext
            )));
        }
    }

    Ok(resolved)
}

/// Validate a directory path, optionally creating it.
pub fn validate_directory(
    path: impl AsRef<Path>,
    must_exist: bool,
    create: bool,
    description: &str,
) -> NcdbResult<PathBuf> {
    let resolved = validate_path(path.as_ref(), false, &[], description)?;

    if resolved.exists() && !resolved.is_dir() {
        return Err(NcdbError::validation(format!(
            "{} is not a directory: {}",
            capitalize(description),
            path.as_ref().display()
        )));
    }

    if !resolved.exists() {
        if create {
            fs::create_dir_all(&resolved)?;
        } else if must_exist {
            return Err(NcdbError::validation(format!(
                "{} does not exist: {}",
                capitalize(description),
                path.as_ref().display()
            )));
        }
    }

    Ok(resolved)
}

/// A memory budget in bytes, parsed from strings such as `"4GB"` or `"512 mb"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryLimit(u64);

impl MemoryLimit {
    pub fn bytes(self) -> u64 {
        self.0
    }

    /// Parse a memory limit with an optional unit (`B`, `KB`, `MB`, `GB`, `TB`).
    /// A bare number is read as GB.
    pub fn parse(raw: &str) -> NcdbResult<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(NcdbError::validation("memory limit is empty"));
        }

        // Longest suffix first so "GB" is not read as "B".
        const UNITS: [(&str, u64); 5] = [
            ("TB", 1 << 40),
            ("GB", 1 << 30),
            ("MB", 1 << 20),
            ("KB", 1 << 10),
            ("B", 1),
        ];

        let (number, multiplier) = UNITS
            .iter()
            .find_map(|&(suffix, multiplier)| {
                normalized.strip_suffix(suffix).map(|number| (number, multiplier))
            })
            .unwrap_or((normalized.as_str(), 1 << 30));

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| NcdbError::validation(format!("invalid memory limit format: {raw}")))?;
        if !(value > 0.0) || !value.is_finite() {
            return Err(NcdbError::validation(format!(
                "memory limit must be positive: {raw}"
            )));
        }
        Ok(Self((value * multiplier as f64) as u64))
    }
}

/// Only the final path component, for log lines that should not leak directory layout.
pub fn sanitize_path_for_logging(path: &Path) -> String {
    match path.file_name() {
        Some(name) => format!(".../{}", name.to_string_lossy()),
        None => "...".to_string(),
    }
}

fn absolutize(path: &Path) -> NcdbResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
