//! Range-aware delivery of downloaded files
//!
//! [`MediaServer`] maps a client-supplied relative path onto a file below the
//! download root and opens it for streaming. The path is normalized lexically,
//! resolved through the filesystem (symlinks included) and then checked to still
//! live inside the canonical root, so neither `..` segments nor links can escape.

use crate::error::{Error, MediaError, Result};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

mod range;

pub use range::{ByteRange, parse_range_header};


/// An opened file, ready to be streamed
#[derive(Debug)]
pub struct MediaResponse {
    /// HTTP status: 200 for the whole file, 206 for a range
    pub status: u16,
    /// MIME type derived from the file extension
    pub content_type: &'static str,
    /// Number of bytes in `body`
    pub content_length: u64,
    /// Size of the whole file
    pub total_size: u64,
    /// `Content-Range` value, set for 206 responses
    pub content_range: Option<String>,
    /// Final path component of the served file
    pub file_name: String,
    /// Whether the client should save the file instead of playing it
    pub attachment: bool,
    /// File handle positioned at the first byte and limited to `content_length` bytes
    pub body: tokio::io::Take<tokio::fs::File>,
}

impl MediaResponse {
    /// `Content-Disposition` value for attachment responses
    pub fn content_disposition(&self) -> Option<String> {
        if !self.attachment {
            return None;
        }
        let name: String = self
            .file_name
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                c if c.is_ascii() && !c.is_ascii_control() => c,
                _ => '_',
            })
            .collect();
        Some(format!("attachment; filename=\"{}\"", name))
    }
}

/// MIME type for a file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg") => "video/ogg",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// Serves files from below a single download root
#[derive(Clone, Debug)]
pub struct MediaServer {
    root: PathBuf,
}

impl MediaServer {
    /// Create a server for the given download root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The download root as configured
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a file for playback, honoring an optional `Range` header
    pub async fn open(&self, requested: &str, range: Option<&str>) -> Result<MediaResponse> {
        let path = self.resolve(requested).await?;
        let mut file = tokio::fs::File::open(&path).await.map_err(map_open_error)?;
        let size = file.metadata().await?.len();

        let range = range.and_then(|header| parse_range_header(header, size));
        let (status, content_length, content_range) = match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                (206, range.len(), Some(range.content_range(size)))
            }
            None => (200, size, None),
        };

        tracing::debug!(
            status,
            content_length,
            total_size = size,
            "Serving media file"
        );

        Ok(MediaResponse {
            status,
            content_type: content_type_for(&path),
            content_length,
            total_size: size,
            content_range,
            file_name: file_name_of(&path),
            attachment: false,
            body: file.take(content_length),
        })
    }

    /// Open the whole file as an attachment download
    pub async fn open_download(&self, requested: &str) -> Result<MediaResponse> {
        let mut response = self.open(requested, None).await?;
        response.attachment = true;
        Ok(response)
    }

    /// Map a client-supplied relative path onto a regular file below the root
    ///
    /// Fails with [`MediaError::AccessDenied`] when the path escapes the root and
    /// [`MediaError::NotFound`] when it names nothing, or something other than a
    /// regular file.
    pub async fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let root_name = self.root.file_name().and_then(|n| n.to_str());
        let relative = normalize_request(requested, root_name)?;

        let canonical_root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(map_open_error)?;
        let canonical = tokio::fs::canonicalize(canonical_root.join(&relative))
            .await
            .map_err(map_open_error)?;

        if !canonical.starts_with(&canonical_root) {
            tracing::warn!("Rejected media request resolving outside the download root");
            return Err(MediaError::AccessDenied.into());
        }

        let metadata = tokio::fs::metadata(&canonical)
            .await
            .map_err(map_open_error)?;
        if !metadata.is_file() {
            return Err(MediaError::NotFound.into());
        }

        Ok(canonical)
    }
}

/// Lexically normalize a requested path into components below the root
///
/// `\` is treated like `/`, empty and `.` segments are dropped and `..` pops the
/// previous segment. Popping past the root is an escape attempt. A leading segment
/// equal to the root directory's own name is dropped, so `downloads/a.mp4` and
/// `a.mp4` name the same file.
pub(crate) fn normalize_request(requested: &str, root_name: Option<&str>) -> Result<PathBuf> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in requested.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(MediaError::AccessDenied.into());
                }
            }
            other => parts.push(other),
        }
    }

    if parts.len() > 1 && root_name.is_some_and(|name| parts[0] == name) {
        parts.remove(0);
    }
    if parts.is_empty() {
        return Err(MediaError::NotFound.into());
    }

    Ok(parts.iter().collect())
}

fn map_open_error(error: std::io::Error) -> Error {
    match error.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory => {
            MediaError::NotFound.into()
        }
        _ => Error::Io(error),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
