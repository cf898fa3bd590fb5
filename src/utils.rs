//! Utility functions for titles, file names and path manipulation

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Maximum length (in characters) of a sanitized title
const MAX_TITLE_CHARS: usize = 100;

// Literal patterns, cannot fail to compile
#[allow(clippy::unwrap_used)]
fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-. ]").unwrap())
}

#[allow(clippy::unwrap_used)]
fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Keep at most `max` characters of `text`
///
/// # Examples
///
/// ```
/// use media_dl::utils::truncate_chars;
///
/// assert_eq!(truncate_chars("héllo", 2), "hé");
/// assert_eq!(truncate_chars("abc", 10), "abc");
/// ```
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Turn a media title into a filesystem-safe file stem
///
/// Word characters (any script), `-`, `.`, `_` and spaces are kept, everything
/// else becomes `_`. Whitespace runs collapse to a single space and the result
/// is capped at 100 characters. Titles shorter than two characters are replaced
/// by `video_{id}`.
///
/// # Examples
///
/// ```
/// use media_dl::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("AC/DC:  Live!", 7), "AC_DC_ Live_");
/// assert_eq!(sanitize_title(" x ", 7), "video_7");
/// ```
pub fn sanitize_title(title: &str, job_id: i64) -> String {
    let title = title.trim();
    let title = if title.chars().count() < 2 {
        format!("video_{}", job_id)
    } else {
        title.to_string()
    };

    let safe = unsafe_chars().replace_all(&title, "_");
    let safe = whitespace_runs().replace_all(&safe, " ");
    truncate_chars(safe.trim(), MAX_TITLE_CHARS)
}

/// File name a run is expected to produce
///
/// The job id is prefixed unless the sanitized title already contains it.
pub fn expected_file_name(job_id: i64, safe_title: &str, extension: &str) -> String {
    let id = job_id.to_string();
    if safe_title.contains(&id) {
        format!("{}.{}", safe_title, extension)
    } else {
        format!("{}_{}.{}", id, safe_title, extension)
    }
}

/// Path of `path` relative to `root`, with `/` separators
///
/// Returns `None` when `path` is not below `root`.
pub fn relative_path_string(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
