//! AWS S3 object store client.
//!
//! Talks to S3 or any S3-compatible store through `aws-sdk-s3`.  The client
//! is built once per driver factory from the validated [`BridgeConfig`]:
//! static credentials, explicit region and endpoint, optional path-style
//! addressing.  Stores that only speak the legacy v2 scheme get an unsigned
//! SDK client plus [`V2SigningInterceptor`], which signs each attempt right
//! before it goes on the wire.

use std::time::SystemTime;

use aws_sdk_s3::config::{Credentials, RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::backend::{
    ListedObject, ObjectMeta, ObjectReader, ObjectStore, StoreFuture, StoredObject,
};
use crate::auth::V2SigningInterceptor;
use crate::driver::factory::BridgeConfig;
use crate::errors::StoreError;

/// Upload part size.  Bodies shorter than this go out as a single PUT.
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// Provider name attached to the static credentials.
const CREDENTIALS_PROVIDER: &str = "f3-config";

/// [`ObjectStore`] backed by an S3 client.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build the S3 client for `config`.
    pub async fn connect(config: &BridgeConfig) -> Self {
        debug!(
            region = %config.region,
            path_style = config.path_style,
            endpoint = %config.endpoint,
            "Creating S3 client"
        );

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint);

        loader = if config.signature_v2 {
            // Requests leave the SDK unsigned; the interceptor signs them.
            loader.no_credentials()
        } else {
            loader.credentials_provider(Credentials::new(
                &config.credentials.access_key,
                &config.credentials.secret_key,
                config.credentials.session_token.clone(),
                None,
                CREDENTIALS_PROVIDER,
            ))
        };

        let sdk_config = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.path_style);

        if config.signature_v2 {
            debug!("Using Signature V2 Format");
            builder = builder
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
                .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
                .interceptor(V2SigningInterceptor::new(
                    Some(config.credentials.clone()),
                    config.path_style,
                ));
        }

        info!(
            bucket = %config.bucket_name,
            endpoint = %config.endpoint,
            signature_v2 = config.signature_v2,
            "S3 client initialized"
        );

        Self::from_client(Client::from_conf(builder.build()))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Upload `first` and the rest of `body` as parts of `upload_id`, then
    /// complete the upload.
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        first: Vec<u8>,
        body: &mut ObjectReader,
    ) -> Result<(), StoreError> {
        let mut parts = Vec::new();
        let mut part_number = 1;
        let mut chunk = first;

        loop {
            debug!(bucket, key, upload_id, part_number, bytes = chunk.len(), "S3 upload_part");
            let resp = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(store_error)?;

            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .set_e_tag(resp.e_tag().map(str::to_string))
                    .build(),
            );

            chunk = read_part(body).await?;
            if chunk.is_empty() {
                break;
            }
            part_number += 1;
        }

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

/// Read up to [`PART_SIZE`] bytes from `body`.  A short result means the
/// body is exhausted.
async fn read_part(body: &mut ObjectReader) -> Result<Vec<u8>, StoreError> {
    let mut part = Vec::with_capacity(PART_SIZE);
    (&mut *body)
        .take(PART_SIZE as u64)
        .read_to_end(&mut part)
        .await
        .map_err(|e| StoreError::new("SourceReadError", e.to_string()))?;
    Ok(part)
}

/// Convert an SDK failure into a [`StoreError`].
///
/// Service errors keep the code the store sent.  Failures that never got a
/// response are named after their class (`DispatchFailure`, `TimeoutError`,
/// ...).
pub fn store_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let class = match &err {
        SdkError::ConstructionFailure(_) => "ConstructionFailure",
        SdkError::TimeoutError(_) => "TimeoutError",
        SdkError::DispatchFailure(_) => "DispatchFailure",
        SdkError::ResponseError(_) => "ResponseError",
        SdkError::ServiceError(_) => "ServiceError",
        _ => "Unknown",
    };
    let code = err.code().unwrap_or(class).to_string();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    StoreError::new(code, message)
}

fn to_system_time(time: Option<&DateTime>) -> Option<SystemTime> {
    time.and_then(|t| SystemTime::try_from(*t).ok())
}

fn to_size(size: Option<i64>) -> u64 {
    size.and_then(|s| u64::try_from(s).ok()).unwrap_or(0)
}

impl ObjectStore for S3Store {
    fn head_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            debug!(bucket, "S3 head_bucket");
            self.client
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(store_error)?;
            Ok(())
        })
    }

    fn head_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ObjectMeta> {
        Box::pin(async move {
            debug!(bucket, key, "S3 head_object");
            let resp = self
                .client
                .head_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    // HEAD responses carry no body, so the code may be missing.
                    let not_found = e.as_service_error().is_some_and(|s| s.is_not_found());
                    let mut err = store_error(e);
                    if not_found {
                        err.code = "NotFound".to_string();
                    }
                    err
                })?;

            Ok(ObjectMeta {
                size: to_size(resp.content_length()),
                last_modified: to_system_time(resp.last_modified()),
            })
        })
    }

    fn list_objects<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<ListedObject>> {
        Box::pin(async move {
            debug!(bucket, "S3 list_objects");
            let resp = self
                .client
                .list_objects()
                .bucket(bucket)
                .send()
                .await
                .map_err(store_error)?;

            if resp.is_truncated() == Some(true) {
                warn!(bucket, "Listing is truncated; only the first page is used");
            }

            Ok(resp
                .contents()
                .iter()
                .filter_map(|object| {
                    Some(ListedObject {
                        key: object.key()?.to_string(),
                        size: to_size(object.size()),
                        last_modified: to_system_time(object.last_modified()),
                        owner: object.owner().and_then(|o| o.id()).map(str::to_string),
                    })
                })
                .collect())
        })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, StoredObject> {
        Box::pin(async move {
            debug!(bucket, key, "S3 get_object");
            let resp = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    let no_such_key = e.as_service_error().is_some_and(|s| s.is_no_such_key());
                    let mut err = store_error(e);
                    if no_such_key {
                        err.code = "NoSuchKey".to_string();
                    }
                    err
                })?;

            Ok(StoredObject {
                size: to_size(resp.content_length()),
                body: Box::new(Box::pin(resp.body.into_async_read())),
            })
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            debug!(bucket, key, "S3 delete_object");
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(store_error)?;
            Ok(())
        })
    }

    fn upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        mut body: ObjectReader,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let first = read_part(&mut body).await?;

            if first.len() < PART_SIZE {
                debug!(bucket, key, bytes = first.len(), "S3 put_object");
                self.client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(first))
                    .send()
                    .await
                    .map_err(store_error)?;
                return Ok(());
            }

            debug!(bucket, key, "S3 create_multipart_upload");
            let create = self
                .client
                .create_multipart_upload()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(store_error)?;
            let upload_id = create
                .upload_id()
                .ok_or_else(|| StoreError::new("MissingUploadId", "S3 did not return upload ID"))?
                .to_string();

            let result = self
                .upload_parts(bucket, key, &upload_id, first, &mut body)
                .await;

            if let Err(ref e) = result {
                warn!(
                    upload_id = %upload_id,
                    "Aborting S3 multipart upload due to error: {e}"
                );
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        "Failed to abort S3 multipart upload: {}",
                        DisplayErrorContext(&abort_err)
                    );
                }
            }
            result
        })
    }
}
