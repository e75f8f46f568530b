//! HTTP protocol layer.
//!
//! Range grammar and resolution, decoupled from the response entity so any
//! file-serving front end can reuse it.

pub mod range;

// Re-export commonly used items
pub use range::{parse_range_header, resolve_range, RangeOutcome, RangeRequest};
