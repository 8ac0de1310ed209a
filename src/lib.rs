//! Bucket proxy
//!
//! A small HTTP front end for a single S3 bucket: `GET /list` returns the
//! object keys as JSON and `GET /<cache-dir>/<key>` serves an object from a
//! local pull-through cache, downloading it on first request.

pub mod cache;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
pub mod storage;

pub use error::{ProxyError, Result};
