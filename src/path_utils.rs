//! Path utilities for source validation and output naming.
//!
//! Output packages are named by prefixing the source file name, and are
//! placed either next to the source or in a configured target directory.
//! Paths are validated up front so a conversion fails before any work is done.

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Maximum path length for Windows without long path support
const WINDOWS_MAX_PATH: usize = 260;

/// Windows long path prefix
const WINDOWS_LONG_PATH_PREFIX: &str = r"\\?\";

/// Converts a path to a string, failing if it is not valid UTF-8.
pub fn path_to_string_safe(path: &Path) -> Result<String> {
    path.to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| Error::PathUtf8Error(path.to_path_buf()))
}

/// Converts a path to a string, replacing invalid UTF-8 sequences.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// File name component of `path` as UTF-8.
///
/// # Arguments
///
/// * `path` - A file path such as `library/novel.epub`
///
/// # Returns
///
/// * `Ok(String)` - The last component, e.g. `novel.epub`
/// * `Err(Error::PathUtf8Error)` - The path has no file name (`""`, `..`) or
///   the name is not valid UTF-8
pub fn file_name_safe(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::PathUtf8Error(path.to_path_buf()))
}

/// Checks a path for platform length limits and characters that are not
/// allowed in file names.
///
/// Runs before any file is opened or created, for both the source and the
/// output path. Paths that do not exist yet are fine.
///
/// # Arguments
///
/// * `path` - The path to check
///
/// # Returns
///
/// * `Err(Error::PathTooLong)` - Longer than 260 bytes on Windows without the `\\?\` prefix
/// * `Err(Error::InvalidPath)` - Contains one of `< > " | ? *`
pub fn validate_path(path: &Path) -> Result<()> {
    let path_str = path_to_string_lossy(path);

    if cfg!(windows)
        && path_str.len() > WINDOWS_MAX_PATH
        && !path_str.starts_with(WINDOWS_LONG_PATH_PREFIX)
    {
        return Err(Error::PathTooLong(path.to_path_buf()));
    }

    let path_to_check = path_str
        .strip_prefix(WINDOWS_LONG_PATH_PREFIX)
        .unwrap_or(&path_str);

    if path_to_check
        .chars()
        .any(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*'))
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Replaces characters that are not allowed in file names.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' | ':' | '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Name of the converted package: `prefix` followed by the source file name.
///
/// The combined name goes through [`sanitize_filename`], so a prefix with
/// characters that are invalid in file names cannot produce an unusable path.
///
/// # Arguments
///
/// * `source` - Path of the source package
/// * `prefix` - Text prepended to the source file name
///
/// # Returns
///
/// * `Result<String>` - The output file name, e.g. `Bionic_` and
///   `library/novel.epub` give `Bionic_novel.epub`; an error when `source`
///   has no UTF-8 file name
pub fn output_file_name(source: &Path, prefix: &str) -> Result<String> {
    let name = file_name_safe(source)?;
    Ok(sanitize_filename(&format!("{}{}", prefix, name)))
}

/// Directory the output goes to.
///
/// # Arguments
///
/// * `source` - Path of the source package
/// * `target_dir` - Configured target directory; empty means "not set"
///
/// # Returns
///
/// * `PathBuf` - `target_dir` when set, otherwise the directory holding the
///   source (`.` for a bare file name)
pub fn output_directory(source: &Path, target_dir: &Path) -> PathBuf {
    if !target_dir.as_os_str().is_empty() {
        return target_dir.to_path_buf();
    }
    match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether two paths name the same file, comparing canonical forms when both exist.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
