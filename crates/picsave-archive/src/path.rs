//! Archive path sanitation
//!
//! Turns arbitrary user or URL supplied strings into safe file names and
//! `/`-separated archive paths. A trailing `/` marks a directory path.

use once_cell::sync::Lazy;
use regex::Regex;

/// Name used when sanitation leaves nothing behind
pub const DEFAULT_FILE_NAME: &str = "file";

/// Path separator inside an archive
pub const SEPARATOR: char = '/';

static RESERVED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]+"#).expect("reserved character pattern is valid"));

static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x1F\x7F]").expect("control character pattern is valid"));

static WHITESPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static EDGE_DOTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[.\s]+|[.\s]+$").expect("edge dot pattern is valid"));

/// Sanitize a single file name segment
///
/// # Examples
/// - `My:File?.png` → `My-File-.png`
/// - `"  a   b  "` → `a b`
/// - `...` → `file`
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let name = RESERVED_CHARS.replace_all(name.trim(), "-");
    let name = CONTROL_CHARS.replace_all(&name, "");
    let name = WHITESPACE_RUNS.replace_all(&name, " ");
    let name = EDGE_DOTS.replace_all(&name, "");

    if name.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Sanitize a `/`-separated archive path
///
/// Empty and `.` segments are dropped, `..` removes the segment before it,
/// every remaining segment goes through [`sanitize_filename`]. A trailing
/// slash on the input survives.
///
/// # Examples
/// - `a//b/../c.png` → `a/c.png`
/// - `/photos/./2024/` → `photos/2024/`
#[must_use]
pub fn sanitize_filepath(path: &str) -> String {
    let directory = path.trim().ends_with(SEPARATOR);
    let mut segments: Vec<String> = Vec::new();

    for raw in path.split(SEPARATOR) {
        match raw.trim() {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(sanitize_filename(segment)),
        }
    }

    if segments.is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }

    let mut joined = segments.join("/");
    if directory {
        joined.push(SEPARATOR);
    }
    joined
}

/// Join present, non-empty parts with `/` and sanitize the result
#[must_use]
pub fn path_join<S: AsRef<str>>(parts: impl IntoIterator<Item = Option<S>>) -> String {
    let joined = parts
        .into_iter()
        .flatten()
        .filter(|part| !part.as_ref().is_empty())
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("/");
    sanitize_filepath(&joined)
}

/// Whether a (sanitized) path denotes a directory
#[inline]
#[must_use]
pub fn is_directory_path(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

/// Force a trailing separator onto a path
#[must_use]
pub fn as_directory_path(path: &str) -> String {
    if is_directory_path(path) {
        path.to_string()
    } else {
        format!("{path}{SEPARATOR}")
    }
}

/// Split a file path into `(parent, file name)`
///
/// The parent keeps its trailing separator and is empty for top-level names.
#[must_use]
pub fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind(SEPARATOR) {
        Some(idx) => (&path[..=idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Split a file name into base name and extension
///
/// The extension is whatever follows the last dot, as long as that dot is
/// neither the first nor the last character.
///
/// # Examples
/// - `a.b.png` → (`a.b`, `Some("png")`)
/// - `.hidden` → (`.hidden`, `None`)
/// - `trailing.` → (`trailing.`, `None`)
#[must_use]
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Append ` (n)` to the directory name or file base name of `path`
///
/// # Examples
/// - (`a/b.png`, 1) → `a/b (1).png`
/// - (`a/b/`, 2) → `a/b (2)/`
#[must_use]
pub fn with_counter(path: &str, n: usize) -> String {
    if let Some(dir) = path.strip_suffix(SEPARATOR) {
        return format!("{dir} ({n}){SEPARATOR}");
    }

    let (parent, name) = split_parent(path);
    match split_extension(name) {
        (base, Some(ext)) => format!("{parent}{base} ({n}).{ext}"),
        (base, None) => format!("{parent}{base} ({n})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn filename_replaces_reserved_runs() {
        assert_eq!(sanitize_filename("My:File?.png"), "My-File-.png");
        assert_eq!(sanitize_filename("a<>|b"), "a-b");
        assert_eq!(sanitize_filename(r"back\slash"), "back-slash");
    }

    #[test]
    fn filename_strips_controls_and_collapses_whitespace() {
        assert_eq!(sanitize_filename("  tab here \u{7}bell  "), "tab here bell");
        assert_eq!(sanitize_filename("a \n\n b"), "a b");
    }

    #[test]
    fn filename_strips_edge_dots() {
        assert_eq!(sanitize_filename("..secret.."), "secret");
        assert_eq!(sanitize_filename("..."), DEFAULT_FILE_NAME);
        assert_eq!(sanitize_filename("   "), DEFAULT_FILE_NAME);
    }

    #[test]
    fn filepath_resolves_dot_segments() {
        assert_eq!(sanitize_filepath("a//b/../c.png"), "a/c.png");
        assert_eq!(sanitize_filepath("./x/./y.gif"), "x/y.gif");
        assert_eq!(sanitize_filepath("../../escape.png"), "escape.png");
    }

    #[test]
    fn filepath_keeps_directory_marker() {
        assert_eq!(sanitize_filepath("/photos/2024/"), "photos/2024/");
        assert_eq!(sanitize_filepath(" dir / sub: x /"), "dir/sub- x/");
    }

    #[test]
    fn filepath_empty_falls_back() {
        assert_eq!(sanitize_filepath(""), DEFAULT_FILE_NAME);
        assert_eq!(sanitize_filepath("/"), DEFAULT_FILE_NAME);
        assert_eq!(sanitize_filepath("a/.."), DEFAULT_FILE_NAME);
    }

    #[test]
    fn join_skips_missing_parts() {
        assert_eq!(path_join([Some("a"), None, Some(""), Some("b.png")]), "a/b.png");
        assert_eq!(path_join([Some("dir/"), Some("/x.png")]), "dir/x.png");
        assert_eq!(path_join(Vec::<Option<&str>>::new()), DEFAULT_FILE_NAME);
    }

    #[test]
    fn extension_split() {
        assert_eq!(split_extension("a.b.png"), ("a.b", Some("png")));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
        assert_eq!(split_extension("trailing."), ("trailing.", None));
        assert_eq!(split_extension("plain"), ("plain", None));
    }

    #[test]
    fn parent_split() {
        assert_eq!(split_parent("a/b/c.png"), ("a/b/", "c.png"));
        assert_eq!(split_parent("c.png"), ("", "c.png"));
    }

    #[test]
    fn counter_placement() {
        assert_eq!(with_counter("a/b.png", 1), "a/b (1).png");
        assert_eq!(with_counter("a/b/", 2), "a/b (2)/");
        assert_eq!(with_counter("noext", 3), "noext (3)");
        assert_eq!(with_counter(".hidden", 1), ".hidden (1)");
    }

    #[test]
    fn directory_helpers() {
        assert!(is_directory_path("a/"));
        assert!(!is_directory_path("a"));
        assert_eq!(as_directory_path("a"), "a/");
        assert_eq!(as_directory_path("a/"), "a/");
    }

    proptest! {
        #[test]
        fn sanitized_filename_is_clean(name in ".{0,40}") {
            let clean = sanitize_filename(&name);
            prop_assert!(!clean.is_empty());
            prop_assert!(!clean.contains(['\\', '/', ':', '*', '?', '"', '<', '>', '|']));
            prop_assert!(!clean.starts_with('.'));
            prop_assert!(!clean.ends_with('.'));
        }

        #[test]
        fn sanitized_filepath_has_no_traversal(path in "[a-z./]{0,30}") {
            let clean = sanitize_filepath(&path);
            prop_assert!(!clean.is_empty());
            prop_assert!(!clean.starts_with('/'));
            prop_assert!(clean.split('/').all(|seg| seg != ".." && seg != "."));
        }
    }
}
