//! Single-range `Range` header resolution.
//!
//! Resolution is lenient in the same places common players rely on: an
//! unparseable start means 0, an unparseable or oversized end is clamped
//! to the last byte, and only the first range of a multi-range header is
//! honored.

use thiserror::Error;

const BYTES_PREFIX: &str = "bytes=";

/// Errors from resolving a `Range` header against an artifact size.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The header is not of the form `bytes=<start>-<end>`. Maps to 400.
    #[error("malformed range header: {0}")]
    Malformed(String),

    /// The range does not overlap the artifact. Maps to 416.
    #[error("range not satisfiable for size {size}")]
    Unsatisfiable { size: u64 },
}

/// A parsed `bytes=<start>-<end>` specifier, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: Option<u64>, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Parse the first range of a `Range` header value.
    pub fn parse(value: &str) -> Result<ByteRange, RangeError> {
        let spec = value
            .strip_prefix(BYTES_PREFIX)
            .ok_or_else(|| RangeError::Malformed(value.to_string()))?;

        let first = spec.split(',').next().unwrap_or_default();
        let parts: Vec<&str> = first.split('-').collect();
        if parts.len() != 2 {
            return Err(RangeError::Malformed(value.to_string()));
        }

        Ok(ByteRange {
            start: parts[0].trim().parse::<u64>().ok(),
            end: parts[1].trim().parse::<u64>().ok(),
        })
    }
}

/// The byte span to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedRange {
    /// No `Range` header: the whole artifact with a 200.
    Full { size: u64 },
    /// Inclusive `start..=end` of `size` bytes with a 206.
    Partial { start: u64, end: u64, size: u64 },
}

impl ServedRange {
    /// First byte offset to serve.
    pub fn start(&self) -> u64 {
        match self {
            ServedRange::Full { .. } => 0,
            ServedRange::Partial { start, .. } => *start,
        }
    }

    /// Number of bytes in the response body.
    pub fn content_length(&self) -> u64 {
        match self {
            ServedRange::Full { size } => *size,
            ServedRange::Partial { start, end, .. } => end - start + 1,
        }
    }

    /// `Content-Range` header value for partial responses.
    pub fn content_range(&self) -> Option<String> {
        match self {
            ServedRange::Full { .. } => None,
            ServedRange::Partial { start, end, size } => {
                Some(format!("bytes {}-{}/{}", start, end, size))
            }
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ServedRange::Partial { .. })
    }
}

/// Resolve an optional `Range` header value against an artifact of `size` bytes.
pub fn resolve_range(header: Option<&str>, size: u64) -> Result<ServedRange, RangeError> {
    let Some(value) = header else {
        return Ok(ServedRange::Full { size });
    };

    let range = ByteRange::parse(value)?;
    let start = range.start.unwrap_or(0);

    if start >= size {
        return Err(RangeError::Unsatisfiable { size });
    }

    let last = size - 1;
    let end = match range.end {
        Some(end) if end < size => end,
        _ => last,
    };

    if end < start {
        return Err(RangeError::Unsatisfiable { size });
    }

    Ok(ServedRange::Partial { start, end, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(start: u64, end: u64, size: u64) -> ServedRange {
        ServedRange::Partial { start, end, size }
    }

    fn assert_malformed(header: &str) {
        assert!(
            matches!(resolve_range(Some(header), 1000), Err(RangeError::Malformed(_))),
            "expected malformed: {}",
            header
        );
    }

    fn assert_unsatisfiable(header: &str, size: u64) {
        assert_eq!(
            resolve_range(Some(header), size),
            Err(RangeError::Unsatisfiable { size }),
            "expected unsatisfiable: {}",
            header
        );
    }

    #[test]
    fn parses_byte_range() {
        assert_eq!(ByteRange::parse("bytes=-").unwrap(), ByteRange::new(None, None));
        assert_eq!(ByteRange::parse("bytes=11-").unwrap(), ByteRange::new(Some(11), None));
        assert_eq!(ByteRange::parse("bytes=-111").unwrap(), ByteRange::new(None, Some(111)));
        assert_eq!(
            ByteRange::parse("bytes=11-111").unwrap(),
            ByteRange::new(Some(11), Some(111))
        );
        assert!(ByteRange::parse("asd").is_err());
        assert!(ByteRange::parse("bytes=").is_err());
    }

    #[test]
    fn no_header_serves_everything() {
        let served = resolve_range(None, 1000).unwrap();
        assert_eq!(served, ServedRange::Full { size: 1000 });
        assert_eq!(served.content_length(), 1000);
        assert_eq!(served.start(), 0);
        assert!(served.content_range().is_none());
        assert!(!served.is_partial());
    }

    #[test]
    fn closed_range() {
        let served = resolve_range(Some("bytes=100-199"), 1000).unwrap();
        assert_eq!(served, partial(100, 199, 1000));
        assert_eq!(served.content_length(), 100);
        assert_eq!(served.content_range().as_deref(), Some("bytes 100-199/1000"));
    }

    #[test]
    fn open_ended_range_runs_to_eof() {
        let served = resolve_range(Some("bytes=900-"), 1000).unwrap();
        assert_eq!(served, partial(900, 999, 1000));
        assert_eq!(served.content_length(), 100);
    }

    #[test]
    fn start_beyond_size_is_unsatisfiable() {
        assert_unsatisfiable("bytes=2000-3000", 1000);
        assert_unsatisfiable("bytes=1000-", 1000);
    }

    #[test]
    fn end_is_clamped() {
        assert_eq!(resolve_range(Some("bytes=500-5000"), 1000).unwrap(), partial(500, 999, 1000));
        assert_eq!(resolve_range(Some("bytes=500-999"), 1000).unwrap(), partial(500, 999, 1000));
        assert_eq!(resolve_range(Some("bytes=500-abc"), 1000).unwrap(), partial(500, 999, 1000));
    }

    #[test]
    fn unparseable_start_falls_back_to_zero() {
        assert_eq!(resolve_range(Some("bytes=abc-99"), 1000).unwrap(), partial(0, 99, 1000));
        // Suffix form has no start either, so it reads from the beginning.
        assert_eq!(resolve_range(Some("bytes=-100"), 1000).unwrap(), partial(0, 100, 1000));
    }

    #[test]
    fn only_first_of_multiple_ranges_is_honored() {
        assert_eq!(
            resolve_range(Some("bytes=0-9, 20-29"), 1000).unwrap(),
            partial(0, 9, 1000)
        );
    }

    #[test]
    fn single_byte_ranges() {
        assert_eq!(resolve_range(Some("bytes=0-0"), 1000).unwrap(), partial(0, 0, 1000));
        assert_eq!(resolve_range(Some("bytes=999-"), 1000).unwrap(), partial(999, 999, 1000));
    }

    #[test]
    fn end_before_start_is_unsatisfiable() {
        assert_unsatisfiable("bytes=500-100", 1000);
    }

    #[test]
    fn empty_artifact_rejects_any_range() {
        assert_unsatisfiable("bytes=0-", 0);
        assert_eq!(resolve_range(None, 0).unwrap(), ServedRange::Full { size: 0 });
    }

    #[test]
    fn malformed_headers() {
        assert_malformed("items=0-10");
        assert_malformed("0-10");
        assert_malformed("bytes=10");
        assert_malformed("bytes=1-2-3");
        assert_malformed("");
    }
}
