//! S3-compatible object storage engine for ObjStack.
//!
//! The engine keeps bucket and object state in memory and delegates object
//! bytes to a pluggable [`storage::ContentStore`]. It supports bucket CRUD,
//! versioned objects with delete markers, multipart uploads, server-side
//! copy, canned ACLs, CORS rules and checksums. There is no HTTP layer:
//! callers pass an authenticated [`objstack_core::Identity`] inside a
//! [`context::RequestContext`] and get typed results back.
//!
//! # Architecture
//!
//! ```text
//! caller (identity + cancellation token)
//!        |
//!        v
//! ObjStackS3 (operations, ACL guard)
//!        |
//!        +--> S3ServiceState (bucket registry)
//!        |        |
//!        |        v
//!        |    S3Bucket (config, ObjectStore of version chains, uploads)
//!        |
//!        v
//!   ContentStore (in-memory + spillover blobs)
//! ```
//!
//! # Example
//!
//! ```
//! # tokio_test::block_on(async {
//! use objstack_core::Identity;
//! use objstack_s3_core::context::RequestContext;
//! use objstack_s3_core::model::{GetObjectInput, PutObjectInput};
//! use objstack_s3_core::storage::Body;
//! use objstack_s3_core::{ObjStackS3, S3Config};
//!
//! let engine = ObjStackS3::new(S3Config::default());
//! let ctx = RequestContext::new(Identity::user("alice", "Alice").unwrap());
//!
//! engine.make_bucket(&ctx, "photos", None).await.unwrap();
//! engine
//!     .put_object(
//!         &ctx,
//!         PutObjectInput::builder()
//!             .bucket("photos")
//!             .key("cat.jpg")
//!             .body(Body::from("meow"))
//!             .content_length(4)
//!             .build(),
//!     )
//!     .await
//!     .unwrap();
//!
//! let got = engine
//!     .get_object(&ctx, GetObjectInput::builder().bucket("photos").key("cat.jpg").build())
//!     .await
//!     .unwrap();
//! assert_eq!(&got.body[..], b"meow");
//! # });
//! ```

pub mod auth;
pub mod checksums;
pub mod config;
pub mod context;
pub mod copy;
pub mod cors;
pub mod error;
pub mod model;
mod ops;
pub mod provider;
pub mod state;
pub mod storage;
pub mod utils;
pub mod validation;

pub use config::S3Config;
pub use provider::ObjStackS3;
