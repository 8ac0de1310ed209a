//! HTTP protocol layer module
//!
//! Protocol helpers shared by the request handlers: validators, MIME
//! detection, range parsing and response builders.

pub mod etag;
pub mod mime;
pub mod range;
pub mod response;

// Re-export commonly used types
pub use range::{parse_range_header, ByteRange, RangeParseResult};
pub use response::{
    build_304_response, build_404_response, build_405_response, build_416_response,
    build_500_response, build_empty_response, build_file_response, build_json_response,
    build_partial_response,
};
