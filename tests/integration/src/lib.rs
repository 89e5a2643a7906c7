//! End-to-end tests for the ObjStack storage engine.
//!
//! The tests drive [`ObjStackS3`] through its public operations only, the
//! way an HTTP front end would, with several identities and concurrent
//! callers. Run them with:
//! ```text
//! cargo test -p objstack-integration
//! ```
//! Set `RUST_LOG=objstack_s3_core=debug` to see the engine's logs.

use std::sync::Once;

use bytes::Bytes;
use objstack_core::Identity;
use objstack_s3_core::auth::CannedAcl;
use objstack_s3_core::context::RequestContext;
use objstack_s3_core::error::S3ServiceResult;
use objstack_s3_core::model::{GetObjectInput, PutObjectInput, PutObjectOutput};
use objstack_s3_core::storage::Body;
use objstack_s3_core::{ObjStackS3, S3Config};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// An engine with the default configuration.
#[must_use]
pub fn engine() -> ObjStackS3 {
    engine_with(S3Config::default())
}

/// An engine with a custom configuration.
#[must_use]
pub fn engine_with(config: S3Config) -> ObjStackS3 {
    init_tracing();
    ObjStackS3::new(config)
}

/// Request context of an authenticated user.
#[must_use]
pub fn user(id: &str) -> RequestContext {
    let identity = Identity::user(id, format!("{id} (test)"))
        .unwrap_or_else(|e| panic!("invalid identity {id}: {e}"));
    RequestContext::new(identity)
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// Create a bucket owned by `ctx` and return its name.
pub async fn create_test_bucket(
    engine: &ObjStackS3,
    ctx: &RequestContext,
    prefix: &str,
    acl: CannedAcl,
) -> String {
    let name = test_bucket_name(prefix);
    engine
        .make_bucket(ctx, &name, Some(acl))
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    name
}

/// Store `data` under `key`.
pub async fn put_bytes(
    engine: &ObjStackS3,
    ctx: &RequestContext,
    bucket: &str,
    key: &str,
    data: impl Into<Bytes>,
) -> S3ServiceResult<PutObjectOutput> {
    let data = data.into();
    engine
        .put_object(
            ctx,
            PutObjectInput::builder()
                .bucket(bucket)
                .key(key)
                .content_length(data.len() as u64)
                .body(Body::from(data))
                .build(),
        )
        .await
}

/// Read the current version of `key`.
pub async fn get_bytes(
    engine: &ObjStackS3,
    ctx: &RequestContext,
    bucket: &str,
    key: &str,
) -> S3ServiceResult<Bytes> {
    engine
        .get_object(ctx, GetObjectInput::builder().bucket(bucket).key(key).build())
        .await
        .map(|out| out.body)
}

mod test_acl;
mod test_bucket;
mod test_concurrency;
mod test_multipart;
mod test_object;
mod test_versioning;
