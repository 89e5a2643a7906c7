//! Object put/get/copy/delete integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use objstack_s3_core::auth::CannedAcl;
    use objstack_s3_core::checksums::{ChecksumAlgorithm, ChecksumValue, compute_checksum};
    use objstack_s3_core::error::S3ServiceError;
    use objstack_s3_core::model::{
        ByteRange, CopyObjectInput, CopySource, GetObjectInput, MetadataDirective, PutObjectInput,
    };
    use objstack_s3_core::state::ObjectMetadata;
    use objstack_s3_core::storage::Body;

    use crate::{create_test_bucket, engine, get_bytes, put_bytes, user};

    #[tokio::test]
    async fn test_should_put_and_get_object() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "obj", CannedAcl::Private).await;

        let put = put_bytes(&engine, &alice, &bucket, "docs/readme.txt", "hello world")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));
        assert_eq!(put.etag, "\"5eb63bbbe01eeed093cb22bb8f5acdc3\"");
        assert_eq!(put.size, 11);
        assert!(put.version_id.is_none());

        let body = get_bytes(&engine, &alice, &bucket, "docs/readme.txt")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body, Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn test_should_read_byte_ranges() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "range", CannedAcl::Private).await;
        put_bytes(&engine, &alice, &bucket, "digits", "0123456789")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));

        let get = |range: ByteRange| {
            engine.get_object(
                &alice,
                GetObjectInput::builder()
                    .bucket(bucket.as_str())
                    .key("digits")
                    .range(range)
                    .build(),
            )
        };

        let middle = get(ByteRange::Offset {
            offset: 2,
            length: Some(3),
        })
        .await
        .unwrap_or_else(|e| panic!("ranged get: {e}"));
        assert_eq!(middle.body, Bytes::from_static(b"234"));
        assert_eq!(middle.range, Some((2, 4)));

        let tail = get(ByteRange::Header("bytes=-4".to_owned()))
            .await
            .unwrap_or_else(|e| panic!("suffix get: {e}"));
        assert_eq!(tail.body, Bytes::from_static(b"6789"));

        assert!(matches!(
            get(ByteRange::Offset {
                offset: 10,
                length: None
            })
            .await,
            Err(S3ServiceError::InvalidRange)
        ));
    }

    #[tokio::test]
    async fn test_should_reject_mismatched_bodies_without_leaking_content() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "verify", CannedAcl::Private).await;

        let short = engine
            .put_object(
                &alice,
                PutObjectInput::builder()
                    .bucket(bucket.as_str())
                    .key("short")
                    .body(Body::from("abc"))
                    .content_length(10)
                    .build(),
            )
            .await;
        assert!(matches!(
            short,
            Err(S3ServiceError::IncompleteBody {
                expected: 10,
                received: 3
            })
        ));

        let wrong_checksum = engine
            .put_object(
                &alice,
                PutObjectInput::builder()
                    .bucket(bucket.as_str())
                    .key("sum")
                    .body(Body::from("abc"))
                    .content_length(3)
                    .checksum(ChecksumValue::new(
                        ChecksumAlgorithm::Crc32,
                        compute_checksum(ChecksumAlgorithm::Crc32, b"xyz"),
                    ))
                    .build(),
            )
            .await;
        assert!(matches!(wrong_checksum, Err(S3ServiceError::BadDigest)));

        assert!(engine.storage().is_empty());
        assert!(matches!(
            get_bytes(&engine, &alice, &bucket, "short").await,
            Err(S3ServiceError::NoSuchKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_copy_object_with_metadata_directive() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "copy", CannedAcl::Private).await;

        let metadata = ObjectMetadata {
            content_type: Some("text/plain".to_owned()),
            ..ObjectMetadata::default()
        };
        engine
            .put_object(
                &alice,
                PutObjectInput::builder()
                    .bucket(bucket.as_str())
                    .key("src")
                    .body(Body::from("payload"))
                    .content_length(7)
                    .metadata(metadata)
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));

        let copied = engine
            .copy_object(
                &alice,
                CopyObjectInput::builder()
                    .source(CopySource::builder().bucket(bucket.as_str()).key("src").build())
                    .bucket(bucket.as_str())
                    .key("dst")
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("copy: {e}"));
        assert_eq!(copied.size, 7);

        let replaced = ObjectMetadata {
            content_type: Some("application/json".to_owned()),
            ..ObjectMetadata::default()
        };
        engine
            .copy_object(
                &alice,
                CopyObjectInput::builder()
                    .source(CopySource::builder().bucket(bucket.as_str()).key("src").build())
                    .bucket(bucket.as_str())
                    .key("replaced")
                    .metadata_directive(MetadataDirective::Replace)
                    .metadata(replaced)
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("copy: {e}"));

        let info = |key: &'static str| {
            engine.get_object_info(
                &alice,
                GetObjectInput::builder().bucket(bucket.as_str()).key(key).build(),
            )
        };
        let dst = info("dst").await.unwrap_or_else(|e| panic!("head dst: {e}"));
        assert_eq!(dst.metadata.content_type.as_deref(), Some("text/plain"));
        let replaced = info("replaced")
            .await
            .unwrap_or_else(|e| panic!("head replaced: {e}"));
        assert_eq!(replaced.metadata.content_type.as_deref(), Some("application/json"));

        // copying an object onto itself without changes is rejected
        let noop = engine
            .copy_object(
                &alice,
                CopyObjectInput::builder()
                    .source(CopySource::builder().bucket(bucket.as_str()).key("src").build())
                    .bucket(bucket.as_str())
                    .key("src")
                    .build(),
            )
            .await;
        assert!(matches!(noop, Err(S3ServiceError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_should_copy_across_buckets_with_source_preconditions() {
        let engine = engine();
        let alice = user("alice");
        let src_bucket = create_test_bucket(&engine, &alice, "from", CannedAcl::Private).await;
        let dst_bucket = create_test_bucket(&engine, &alice, "to", CannedAcl::Private).await;
        let put = put_bytes(&engine, &alice, &src_bucket, "k", "cross")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));

        let stale = engine
            .copy_object(
                &alice,
                CopyObjectInput::builder()
                    .source(
                        CopySource::builder()
                            .bucket(src_bucket.as_str())
                            .key("k")
                            .if_match("\"0000\"")
                            .build(),
                    )
                    .bucket(dst_bucket.as_str())
                    .key("k")
                    .build(),
            )
            .await;
        assert!(matches!(stale, Err(S3ServiceError::PreconditionFailed)));

        engine
            .copy_object(
                &alice,
                CopyObjectInput::builder()
                    .source(
                        CopySource::builder()
                            .bucket(src_bucket.as_str())
                            .key("k")
                            .if_match(put.etag)
                            .build(),
                    )
                    .bucket(dst_bucket.as_str())
                    .key("k")
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("copy: {e}"));
        let body = get_bytes(&engine, &alice, &dst_bucket, "k")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body, Bytes::from_static(b"cross"));
        assert_eq!(engine.storage().len(), 2);
    }

    #[tokio::test]
    async fn test_should_overwrite_and_release_previous_content() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "over", CannedAcl::Private).await;

        for body in ["one", "two", "three"] {
            put_bytes(&engine, &alice, &bucket, "k", body)
                .await
                .unwrap_or_else(|e| panic!("put: {e}"));
        }
        assert_eq!(engine.storage().len(), 1);
        let body = get_bytes(&engine, &alice, &bucket, "k")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body, Bytes::from_static(b"three"));

        let deleted = engine
            .delete_object(&alice, &bucket, "k", None)
            .await
            .unwrap_or_else(|e| panic!("delete: {e}"));
        assert!(!deleted.delete_marker);
        assert!(engine.storage().is_empty());

        // deleting again is not an error
        engine
            .delete_object(&alice, &bucket, "k", None)
            .await
            .unwrap_or_else(|e| panic!("second delete: {e}"));
    }
}
