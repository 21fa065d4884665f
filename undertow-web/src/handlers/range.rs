//! HTTP Range request handling for file streaming
//!
//! Supports a single `bytes=` range in the three RFC 7233 forms:
//! `start-end`, `start-` and `-suffix`. Multi-range and malformed headers are
//! ignored and the whole file is served.

use axum::http::HeaderMap;
use axum::http::header::RANGE;

/// Inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range covering a whole non-empty file.
    pub fn full(total_size: u64) -> Option<Self> {
        (total_size > 0).then(|| Self {
            start: 0,
            end: total_size - 1,
        })
    }

    /// Number of bytes covered; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this range.
    pub fn content_range(&self, total_size: u64) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// The requested range lies entirely outside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Range not satisfiable for {total_size} bytes")]
pub struct RangeNotSatisfiable {
    pub total_size: u64,
}

/// Parses a `Range` header value against a file of `total_size` bytes.
///
/// Returns `Ok(None)` when the header should be ignored and `Ok(Some(_))`
/// with the end clamped to the file.
///
/// # Errors
/// - `RangeNotSatisfiable` - Start is past the end of file or suffix is zero
///
/// # Examples
/// ```
/// use undertow_web::handlers::range::{ByteRange, parse_range_header};
/// let range = parse_range_header("bytes=100-199", 1000).unwrap();
/// assert_eq!(range, Some(ByteRange { start: 100, end: 199 }));
/// ```
pub fn parse_range_header(
    range: &str,
    total_size: u64,
) -> Result<Option<ByteRange>, RangeNotSatisfiable> {
    let Some(ranges) = range.trim().strip_prefix("bytes=") else {
        return Ok(None);
    };
    if ranges.contains(',') {
        return Ok(None);
    }
    let Some((start_str, end_str)) = ranges.trim().split_once('-') else {
        return Ok(None);
    };
    let unsatisfiable = RangeNotSatisfiable { total_size };

    if start_str.is_empty() {
        let Ok(suffix) = end_str.parse::<u64>() else {
            return Ok(None);
        };
        if suffix == 0 || total_size == 0 {
            return Err(unsatisfiable);
        }
        return Ok(Some(ByteRange {
            start: total_size.saturating_sub(suffix),
            end: total_size - 1,
        }));
    }

    let Ok(start) = start_str.parse::<u64>() else {
        return Ok(None);
    };
    let end = if end_str.is_empty() {
        u64::MAX
    } else {
        match end_str.parse::<u64>() {
            Ok(end) if end >= start => end,
            _ => return Ok(None),
        }
    };

    if start >= total_size {
        return Err(unsatisfiable);
    }

    Ok(Some(ByteRange {
        start,
        end: end.min(total_size - 1),
    }))
}

/// Returns the `Range` header value if present and valid UTF-8.
pub fn extract_range_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(RANGE).and_then(|range| range.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u64, end: u64) -> Option<ByteRange> {
        Some(ByteRange { start, end })
    }

    #[test]
    fn test_parse_range_header_valid() {
        assert_eq!(parse_range_header("bytes=100-199", 1000), Ok(range(100, 199)));
        assert_eq!(range(100, 199).unwrap().len(), 100);
    }

    #[test]
    fn test_parse_range_header_open_end() {
        assert_eq!(parse_range_header("bytes=500-", 1000), Ok(range(500, 999)));
    }

    #[test]
    fn test_parse_range_header_suffix() {
        assert_eq!(parse_range_header("bytes=-100", 1000), Ok(range(900, 999)));
        assert_eq!(parse_range_header("bytes=-5000", 1000), Ok(range(0, 999)));
    }

    #[test]
    fn test_parse_range_header_clamps_end() {
        assert_eq!(parse_range_header("bytes=100-5000", 500), Ok(range(100, 499)));
    }

    #[test]
    fn test_parse_range_header_ignores_invalid() {
        assert_eq!(parse_range_header("invalid", 1000), Ok(None));
        assert_eq!(parse_range_header("bytes=abc-def", 1000), Ok(None));
        assert_eq!(parse_range_header("bytes=200-100", 1000), Ok(None));
        assert_eq!(parse_range_header("bytes=0-1,5-9", 1000), Ok(None));
    }

    #[test]
    fn test_parse_range_header_unsatisfiable() {
        let err = RangeNotSatisfiable { total_size: 400 };
        assert_eq!(parse_range_header("bytes=400-", 400), Err(err));
        assert_eq!(parse_range_header("bytes=500-599", 400), Err(err));
        assert_eq!(parse_range_header("bytes=-0", 400), Err(err));
        assert!(parse_range_header("bytes=0-", 0).is_err());
    }

    #[test]
    fn test_content_range_format() {
        assert_eq!(range(0, 9).unwrap().content_range(100), "bytes 0-9/100");
        assert_eq!(ByteRange::full(0), None);
        assert_eq!(ByteRange::full(10), range(0, 9));
    }
}
