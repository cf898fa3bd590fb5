//! Single-range `Range` header parsing

/// Inclusive byte range within a file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// A range always covers at least one byte
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` header value for a file of `size` bytes
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a `Range` header against a file of `size` bytes
///
/// Accepts `bytes=start-end`, `bytes=start-` and `bytes=-suffix`. The end is
/// clamped to the last byte of the file. Multi-range requests, malformed values
/// and ranges that cannot be satisfied yield `None`, and the caller serves the
/// whole file instead.
pub fn parse_range_header(header: &str, size: u64) -> Option<ByteRange> {
    let spec = header.trim().strip_prefix("bytes=")?.trim();
    if spec.contains(',') || size == 0 {
        return None;
    }

    let (first, last) = spec.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());
    let last_byte = size - 1;

    let (start, end) = if first.is_empty() {
        let suffix = last.parse::<u64>().ok()?;
        if suffix == 0 {
            return None;
        }
        (size.saturating_sub(suffix), last_byte)
    } else {
        let start = first.parse::<u64>().ok()?;
        let end = if last.is_empty() {
            last_byte
        } else {
            last.parse::<u64>().ok()?.min(last_byte)
        };
        (start, end)
    };

    if start > end || start > last_byte {
        return None;
    }
    Some(ByteRange { start, end })
}
