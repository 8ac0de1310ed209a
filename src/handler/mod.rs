//! Request handler module
//!
//! Routing dispatch plus the two proxy routes: bucket listing and cached
//! object download.

pub mod files;
pub mod list;
pub mod router;

// Re-export main entry point
pub use list::ListFiles;
pub use router::{client_address, handle_request, RequestContext};
