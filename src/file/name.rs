//! File and folder naming rules.

use std::collections::HashSet;
use std::path::Path;

use crate::{CabinetError, Result};

/// Maximum length of a folder name, in characters.
pub const MAX_FOLDER_NAME_LENGTH: usize = 255;

/// Maximum length of a stored file name, in characters.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Turn a client-supplied file name into a safe display name.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
///
/// ```
/// use cabinet::file::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("../etc/pass wd.txt").unwrap(), "pass_wd.txt");
/// assert!(sanitize_file_name("   ").is_err());
/// ```
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let base = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .trim();

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.' || c == '_') {
        return Err(CabinetError::Validation(
            "file name must contain at least one letter or digit".to_string(),
        ));
    }

    if sanitized.chars().count() > MAX_FILE_NAME_LENGTH {
        return Err(CabinetError::Validation(format!(
            "file name must be at most {MAX_FILE_NAME_LENGTH} characters"
        )));
    }

    Ok(sanitized)
}

/// Validate a folder name and return it trimmed.
pub fn validate_folder_name(name: &str) -> Result<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(CabinetError::Validation(
            "folder name must not be empty".to_string(),
        ));
    }
    if name == "." || name == ".." {
        return Err(CabinetError::Validation(format!(
            "'{name}' is not a valid folder name"
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(CabinetError::Validation(
            "folder name must not contain '/' or '\\'".to_string(),
        ));
    }
    if name.chars().any(char::is_control) {
        return Err(CabinetError::Validation(
            "folder name must not contain control characters".to_string(),
        ));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LENGTH {
        return Err(CabinetError::Validation(format!(
            "folder name must be at most {MAX_FOLDER_NAME_LENGTH} characters"
        )));
    }

    Ok(name.to_string())
}

/// Lowercase extension without the dot.
///
/// ```
/// use cabinet::file::extension;
///
/// assert_eq!(extension("Report.PDF").as_deref(), Some("pdf"));
/// assert_eq!(extension("README"), None);
/// assert_eq!(extension(".bashrc"), None);
/// ```
pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
}

/// Normalize a user-supplied extension filter (`".PDF"` -> `"pdf"`).
pub fn normalize_extension(filter: &str) -> Option<String> {
    let ext = filter.trim().trim_start_matches('.').to_lowercase();
    (!ext.is_empty()).then_some(ext)
}

/// Split a name into stem and `.ext` suffix (the suffix may be empty).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx < name.len() - 1 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Pick a name that does not collide with `taken` (compared case-insensitively).
///
/// ```
/// use std::collections::HashSet;
/// use cabinet::file::unique_name;
///
/// let taken: HashSet<String> = ["report.pdf".to_string()].into();
/// assert_eq!(unique_name("Report.pdf", &taken), "Report (1).pdf");
/// assert_eq!(unique_name("notes.txt", &taken), "notes.txt");
/// ```
pub fn unique_name(name: &str, taken: &HashSet<String>) -> String {
    let is_taken = |candidate: &str| taken.contains(&candidate.to_lowercase());
    if !is_taken(name) {
        return name.to_string();
    }

    let (stem, ext) = split_name(name);
    let mut n = 1;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Pick a folder name for a copy: `Docs (copy)`, `Docs (copy 2)`, ...
pub fn copy_name(name: &str, taken: &HashSet<String>) -> String {
    let is_taken = |candidate: &str| taken.contains(&candidate.to_lowercase());
    if !is_taken(name) {
        return name.to_string();
    }

    let first = format!("{name} (copy)");
    if !is_taken(&first) {
        return first;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{name} (copy {n})");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Human-readable byte size.
///
/// ```
/// use cabinet::file::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{:.1} GB", b / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taken(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_lowercase()).collect()
    }

    #[test]
    fn test_sanitize_keeps_safe_names() {
        assert_eq!(sanitize_file_name("report-2024_v1.pdf").unwrap(), "report-2024_v1.pdf");
        assert_eq!(sanitize_file_name("  spaced.txt  ").unwrap(), "spaced.txt");
    }

    #[test]
    fn test_sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_file_name("my file (1).txt").unwrap(), "my_file__1_.txt");
        assert_eq!(sanitize_file_name("résumé.doc").unwrap(), "r_sum_.doc");
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("a/b/c.txt").unwrap(), "c.txt");
        assert_eq!(sanitize_file_name("C:\\Users\\x\\d.txt").unwrap(), "d.txt");
        assert_eq!(sanitize_file_name("../../secret").unwrap(), "secret");
    }

    #[test]
    fn test_sanitize_rejects_empty_results() {
        for bad in ["", "   ", "..", "/", "a/", "日本"] {
            assert!(sanitize_file_name(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_validate_folder_name() {
        assert_eq!(validate_folder_name("  Docs ").unwrap(), "Docs");
        assert_eq!(validate_folder_name("Año 2024").unwrap(), "Año 2024");

        for bad in ["", "  ", ".", "..", "a/b", "a\\b", "tab\there"] {
            assert!(
                matches!(validate_folder_name(bad), Err(CabinetError::Validation(_))),
                "accepted {bad:?}"
            );
        }

        assert!(validate_folder_name(&"x".repeat(255)).is_ok());
        assert!(validate_folder_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a.tar.GZ").as_deref(), Some("gz"));
        assert_eq!(extension("noext"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".PDF").as_deref(), Some("pdf"));
        assert_eq!(normalize_extension(" txt ").as_deref(), Some("txt"));
        assert_eq!(normalize_extension("."), None);
        assert_eq!(normalize_extension(""), None);
    }

    #[test]
    fn test_unique_name_counts_up() {
        let names = taken(&["a.txt", "a (1).txt", "a (2).txt"]);
        assert_eq!(unique_name("a.txt", &names), "a (3).txt");
        assert_eq!(unique_name("A.TXT", &names), "A (3).TXT");
    }

    #[test]
    fn test_unique_name_without_extension() {
        let names = taken(&["Makefile", ".env"]);
        assert_eq!(unique_name("Makefile", &names), "Makefile (1)");
        assert_eq!(unique_name(".env", &names), ".env (1)");
    }

    #[test]
    fn test_copy_name() {
        assert_eq!(copy_name("Docs", &taken(&[])), "Docs");
        assert_eq!(copy_name("Docs", &taken(&["docs"])), "Docs (copy)");
        assert_eq!(
            copy_name("Docs", &taken(&["docs", "docs (copy)", "docs (copy 2)"])),
            "Docs (copy 3)"
        );
    }

    #[test]
    fn test_format_size_boundaries() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024 - 1), "1024.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }
}
