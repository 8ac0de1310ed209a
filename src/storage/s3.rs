//! S3 object store backed by `aws-sdk-s3`

use super::{ObjectStore, StagedFile};
use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::Client;
use std::path::Path;

/// Store error codes that mean the bucket or key does not exist
const NOT_FOUND_CODES: &[&str] = &["NoSuchBucket", "NoSuchKey", "NotFound"];

/// Object store for a single S3 bucket
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client for `region` using the default credential chain
    pub async fn connect(bucket: &str, region: &str) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::with_client(Client::new(&sdk_config), bucket)
    }

    pub fn with_client(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    async fn fetch_into(&self, key: &str, staged: &mut StagedFile) -> Result<()> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, GetObjectError::is_no_such_key))?;

        let mut body = output.body;
        while let Some(chunk) = body.try_next().await.map_err(|e| {
            ProxyError::ConnectionError(format!(
                "reading object '{key}': {}",
                DisplayErrorContext(&e)
            ))
        })? {
            staged.write(&chunk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, max_keys: i32) -> Result<Vec<String>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| classify_sdk_error(e, ListObjectsV2Error::is_no_such_bucket))?;

        let limit = usize::try_from(max_keys).unwrap_or(0);
        Ok(output
            .contents()
            .iter()
            .filter_map(|object| object.key())
            .take(limit)
            .map(ToString::to_string)
            .collect())
    }

    async fn download_object(&self, key: &str, destination: &Path) -> Result<u64> {
        let mut staged = StagedFile::create(destination)?;
        self.fetch_into(key, &mut staged).await?;
        staged.commit().await
    }
}

/// Translate an SDK failure into the proxy error taxonomy.
///
/// `is_not_found` recognises the operation's modeled "absent" variant; the
/// error code is checked as well since S3 does not always model it.
fn classify_sdk_error<E, R>(err: SdkError<E, R>, is_not_found: fn(&E) -> bool) -> ProxyError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service) => {
            let inner = service.err();
            if is_not_found(inner) {
                ProxyError::NotFound(message)
            } else {
                classify_service_code(inner.code(), message)
            }
        }
        SdkError::DispatchFailure(_)
        | SdkError::TimeoutError(_)
        | SdkError::ResponseError(_)
        | SdkError::ConstructionFailure(_) => ProxyError::ConnectionError(message),
        _ => ProxyError::StoreError(message),
    }
}

fn classify_service_code(code: Option<&str>, message: String) -> ProxyError {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ProxyError::NotFound(message),
        _ => ProxyError::StoreError(message),
    }
}
