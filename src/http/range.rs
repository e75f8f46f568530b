//! HTTP Range header parsing and resolution.
//!
//! Single-range subset of RFC 7233 (bytes unit only). Parsing is a small
//! explicit grammar check rather than pattern matching: split once on `-`,
//! accept empty-or-digit substrings, reject everything else. Resolution
//! turns the parsed bounds plus the file length into the final status
//! decision.

/// Parsed Range header bounds, before resolution against a file length.
///
/// At least one bound is always present; `bytes=-` is rejected at parse
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRequest {
    /// First byte position, when given.
    pub start: Option<u64>,
    /// Last byte position (inclusive) for `A-B`, suffix length for `-B`.
    pub end: Option<u64>,
}

/// Outcome of resolving a Range header against a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Missing header, missing file, or malformed range - respond 400.
    BadRequest,
    /// Start lies at or beyond the end of the file - respond 416.
    NotSatisfiable,
    /// Serve bytes `[start, end]` inclusive out of `length` - respond 206.
    Partial {
        /// First byte to serve.
        start: u64,
        /// Last byte to serve, inclusive; `start <= end < length`.
        end: u64,
        /// Total file length in bytes.
        length: u64,
    },
}

/// Parse a raw Range header value against the `bytes=<start?>-<end?>`
/// grammar.
///
/// Returns `None` for anything outside the grammar: a different unit,
/// whitespace, non-digit characters, multiple ranges, a second dash, both
/// bounds empty, or a value that overflows `u64`.
pub fn parse_range_header(raw: &str) -> Option<RangeRequest> {
    let rest = raw.strip_prefix("bytes=")?;
    let (start_str, end_str) = rest.split_once('-')?;
    if end_str.contains('-') {
        return None;
    }

    let start = parse_bound(start_str)?;
    let end = parse_bound(end_str)?;
    if start.is_none() && end.is_none() {
        return None;
    }

    Some(RangeRequest { start, end })
}

/// Parse one side of the dash: empty means absent, otherwise digits only.
///
/// The outer `Option` is the parse verdict, the inner one the bound.
fn parse_bound(s: &str) -> Option<Option<u64>> {
    if s.is_empty() {
        return Some(None);
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u64>().ok().map(Some)
}

/// Resolve a Range header against a file length.
///
/// `length` is `None` when the referenced file does not exist. The decision
/// procedure:
///
/// 1. Absent header, absent file, grammar mismatch, or `start > end` as
///    given - [`RangeOutcome::BadRequest`].
/// 2. Suffix form `-B`: `start = length - B` (floored at 0),
///    `end = length - 1`. Open form `A-`: `end = length - 1`.
/// 3. `end` is clamped to `length - 1`.
/// 4. `start >= length` - [`RangeOutcome::NotSatisfiable`].
/// 5. Otherwise [`RangeOutcome::Partial`].
///
/// # Examples
/// ```
/// use respond::http::range::{resolve_range, RangeOutcome};
///
/// let outcome = resolve_range(Some("bytes=-20"), Some(100));
/// assert_eq!(outcome, RangeOutcome::Partial { start: 80, end: 99, length: 100 });
///
/// assert_eq!(resolve_range(None, Some(100)), RangeOutcome::BadRequest);
/// ```
#[must_use]
pub fn resolve_range(header: Option<&str>, length: Option<u64>) -> RangeOutcome {
    let (Some(header), Some(length)) = (header, length) else {
        return RangeOutcome::BadRequest;
    };
    let Some(range) = parse_range_header(header) else {
        return RangeOutcome::BadRequest;
    };

    let (start, end) = match (range.start, range.end) {
        // Suffix form: last `suffix` bytes of the file.
        (None, Some(suffix)) => (length.saturating_sub(suffix), length.saturating_sub(1)),
        (Some(start), None) => (start, length.saturating_sub(1)),
        (Some(start), Some(end)) => {
            if start > end {
                return RangeOutcome::BadRequest;
            }
            (start, end)
        }
        // Rejected by the parser already.
        (None, None) => return RangeOutcome::BadRequest,
    };

    // Checked before touching `end`, so an empty file never underflows.
    if start >= length {
        return RangeOutcome::NotSatisfiable;
    }

    RangeOutcome::Partial {
        start,
        end: end.min(length - 1),
        length,
    }
}

/// Format a `Content-Range` header value for a 206 response.
#[must_use]
pub fn content_range_value(start: u64, end: u64, length: u64) -> String {
    format!("bytes {start}-{end}/{length}")
}
