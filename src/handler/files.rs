//! Cached object serving module
//!
//! Resolves the requested object through the local cache, then serves the file
//! with `ETag`, conditional and Range support.

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http::{self, etag, mime, ByteRange, RangeParseResult};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::io::{self, SeekFrom};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Serve `/<cache-dir>/<name>`, downloading the object on a cache miss
pub async fn serve_object(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let resolved = match state.cache.resolve(ctx.path).await {
        Ok(resolved) => resolved,
        Err(e) => {
            logger::log_proxy_error("Download", &e);
            return if e.is_not_found() {
                http::build_404_response()
            } else {
                http::build_500_response()
            };
        }
    };

    match resolved.fetched_bytes {
        Some(bytes) => logger::log_downloaded(&resolved.key, &resolved.path, bytes),
        None => logger::log_cache_hit(&resolved.key, &resolved.path),
    }

    serve_file(ctx, &resolved.path).await
}

/// Serve a local file
pub async fn serve_file(ctx: &RequestContext<'_>, path: &Path) -> Response<Full<Bytes>> {
    match build_static_file_response(ctx, path).await {
        Ok(resp) => resp,
        // Removed from the cache directory between resolve and open
        Err(e) if e.kind() == io::ErrorKind::NotFound => http::build_404_response(),
        Err(e) => {
            logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
            http::build_500_response()
        }
    }
}

/// Build static file response with `ETag` and Range support
async fn build_static_file_response(
    ctx: &RequestContext<'_>,
    path: &Path,
) -> io::Result<Response<Full<Bytes>>> {
    let mut file = File::open(path).await?;
    let meta = file.metadata().await?;
    let total_size = meta.len();
    let etag = etag::generate_etag(total_size, meta.modified().ok());

    // Check if client has cached version
    if etag::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return Ok(http::build_304_response(&etag));
    }

    let content_type = mime::content_type_for(path);

    match http::parse_range_header(ctx.range_header.as_deref(), total_size) {
        RangeParseResult::Valid(range) => {
            let body = if ctx.is_head {
                Bytes::new()
            } else {
                read_range(&mut file, range).await?
            };
            Ok(http::build_partial_response(
                body,
                content_type,
                &etag,
                range,
                total_size,
            ))
        }
        RangeParseResult::NotSatisfiable => Ok(http::build_416_response(total_size)),
        RangeParseResult::None => {
            let body = if ctx.is_head {
                Bytes::new()
            } else {
                let mut data = Vec::with_capacity(usize::try_from(total_size).unwrap_or(0));
                file.read_to_end(&mut data).await?;
                Bytes::from(data)
            };
            Ok(http::build_file_response(body, content_type, &etag, total_size))
        }
    }
}

async fn read_range(file: &mut File, range: ByteRange) -> io::Result<Bytes> {
    let len = usize::try_from(range.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "range too large"))?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let mut data = vec![0u8; len];
    file.read_exact(&mut data).await?;
    Ok(Bytes::from(data))
}
