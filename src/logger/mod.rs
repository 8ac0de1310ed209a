//! Logger module
//!
//! Logging utilities for the proxy:
//! - Server lifecycle logging
//! - Per-request and access logging with multiple formats
//! - Cache and store outcome logging
//!
//! Only the HTTP front end and startup code log; the storage adapter and the
//! cache return errors without printing them.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use crate::error::ProxyError;
use chrono::Local;
use std::net::SocketAddr;
use std::path::Path;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn timestamped(message: &str) -> String {
    format!("{} {message}", Local::now().format("%Y/%m/%d %H:%M:%S"))
}

/// Write to info log
fn write_info(message: &str) {
    let line = timestamped(message);
    match writer::get() {
        Some(w) => w.write_access(&line),
        None => println!("{line}"),
    }
}

/// Write to error log
fn write_error(message: &str) {
    let line = timestamped(message);
    match writer::get() {
        Some(w) => w.write_error(&line),
        None => eprintln!("{line}"),
    }
}

/// Write to access log (entries carry their own timestamp)
fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info(&format!("Listening at http://{addr}"));
    write_info(&format!(
        "Bucket: {} (region {}), cache directory: {}",
        config.bucket_name, config.region, config.cache_dir
    ));
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
}

pub fn log_shutdown() {
    write_info("Shutdown signal received, stopping listener");
}

/// Log an incoming request with its resolved client address
pub fn log_request(client: &str, target: &str) {
    write_info(&format!("[Request] {target} Client: {client}"));
}

pub fn log_listing(client: &str, count: usize) {
    write_info(&format!("[List] {count} keys returned to {client}"));
}

pub fn log_cache_hit(key: &str, path: &Path) {
    write_info(&format!("[Cache] Hit {key} -> {}", path.display()));
}

pub fn log_downloaded(key: &str, path: &Path, bytes: u64) {
    write_info(&format!(
        "[Cache] Downloaded {key} -> {} ({bytes} bytes)",
        path.display()
    ));
}

/// Log a store or cache failure for the given operation
pub fn log_proxy_error(operation: &str, err: &ProxyError) {
    if err.is_not_found() {
        write_info(&format!("[{operation}] {err}"));
    } else {
        write_error(&format!("[ERROR] [{operation}] {err}"));
    }
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}
