//! Bucket listing handler

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http;
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use serde::{Deserialize, Serialize};

/// JSON body of `GET /list`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListFiles {
    pub file_names: Vec<String>,
}

/// List up to `max_keys` object keys from the configured bucket
pub async fn list_objects(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let keys = match state.store.list_objects(state.config.max_keys).await {
        Ok(keys) => keys,
        Err(e) => {
            logger::log_proxy_error("List", &e);
            return http::build_500_response();
        }
    };

    logger::log_listing(&ctx.client, keys.len());

    match serde_json::to_vec(&ListFiles { file_names: keys }) {
        Ok(body) => http::build_json_response(body, ctx.is_head),
        Err(e) => {
            logger::log_error(&format!("Failed to encode listing: {e}"));
            http::build_500_response()
        }
    }
}
