//! Parsing of yt-dlp console output
//!
//! The adapter asks yt-dlp to print one progress line per update using
//! [`PROGRESS_TEMPLATE`]. Fields the engine does not know are printed as `NA`.

use super::{AdapterEvent, MediaInfo};
use crate::error::{ExtractionError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Marker prefixed to every progress line
pub const PROGRESS_MARKER: &str = "[media-dl]";

/// Value for yt-dlp's `--progress-template`
pub const PROGRESS_TEMPLATE: &str = "download:[media-dl] %(progress.status)s \
     %(progress.downloaded_bytes)s %(progress.total_bytes)s \
     %(progress.total_bytes_estimate)s %(progress._percent_str)s";

// Literal pattern, cannot fail to compile
#[allow(clippy::unwrap_used)]
fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)%").unwrap())
}

fn parse_number(field: Option<&str>) -> Option<f64> {
    field
        .filter(|f| *f != "NA" && *f != "None")
        .and_then(|f| f.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Interpret one stdout line, returning the event it carries (if any)
pub fn parse_progress_line(line: &str) -> Option<AdapterEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = rest.split_whitespace();

    match fields.next()? {
        "downloading" => {
            let downloaded = parse_number(fields.next());
            let total = parse_number(fields.next());
            let estimate = parse_number(fields.next());
            let percent_str: String = fields.collect::<Vec<_>>().join(" ");

            let fraction = match (downloaded, total.or(estimate)) {
                (Some(done), Some(total)) if total > 0.0 => Some(done / total),
                _ => parse_percent(&percent_str).map(|p| p / 100.0),
            }?;
            Some(AdapterEvent::Downloading { fraction })
        }
        "finished" => Some(AdapterEvent::Finished),
        "error" => Some(AdapterEvent::Error {
            message: "download interrupted".to_string(),
        }),
        _ => None,
    }
}

/// Extract a percentage from a string such as `" 42.3%"`
pub fn parse_percent(text: &str) -> Option<f64> {
    percent_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Message of a stderr line starting with `ERROR:`
pub fn parse_error_line(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix("ERROR:")
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Decode the JSON printed by `--dump-single-json`
pub fn parse_media_info(stdout: &[u8]) -> Result<MediaInfo> {
    serde_json::from_slice(stdout).map_err(|e| {
        ExtractionError::Metadata(format!("could not decode yt-dlp metadata: {}", e)).into()
    })
}
