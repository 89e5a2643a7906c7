//! Multipart upload integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use objstack_s3_core::ObjStackS3;
    use objstack_s3_core::auth::CannedAcl;
    use objstack_s3_core::checksums::{
        ChecksumAlgorithm, compute_checksum, compute_composite_checksum, compute_md5,
        compute_multipart_etag,
    };
    use objstack_s3_core::context::RequestContext;
    use objstack_s3_core::error::{S3ServiceError, S3ServiceResult};
    use objstack_s3_core::model::{
        CompleteMultipartUploadInput, CompleteMultipartUploadOutput, CompletedPart,
        GetObjectInput, ListMultipartUploadsInput, NewMultipartUploadInput, PutObjectPartInput,
        PutObjectPartOutput,
    };
    use objstack_s3_core::state::VersioningStatus;
    use objstack_s3_core::storage::Body;

    use crate::{create_test_bucket, engine, get_bytes, user};

    const MIB: usize = 1024 * 1024;

    async fn initiate(
        engine: &ObjStackS3,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        algorithm: Option<ChecksumAlgorithm>,
    ) -> String {
        let mut input = NewMultipartUploadInput::builder().bucket(bucket).key(key).build();
        input.checksum_algorithm = algorithm;
        engine
            .new_multipart_upload(ctx, input)
            .await
            .unwrap_or_else(|e| panic!("new_multipart_upload: {e}"))
            .upload_id
    }

    async fn upload_part(
        engine: &ObjStackS3,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> S3ServiceResult<PutObjectPartOutput> {
        engine
            .put_object_part(
                ctx,
                PutObjectPartInput::builder()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .content_length(data.len() as u64)
                    .body(Body::from(data))
                    .build(),
            )
            .await
    }

    async fn complete(
        engine: &ObjStackS3,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> S3ServiceResult<CompleteMultipartUploadOutput> {
        engine
            .complete_multipart_upload(
                ctx,
                CompleteMultipartUploadInput::builder()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .parts(parts)
                    .build(),
            )
            .await
    }

    #[tokio::test]
    async fn test_should_assemble_large_object_from_parts() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "mpu", CannedAcl::Private).await;
        let id = initiate(&engine, &alice, &bucket, "video.bin", None).await;

        let first = Bytes::from(vec![0xAA_u8; 6 * MIB]);
        let second = Bytes::from(vec![0xBB_u8; 3 * MIB]);
        let p1 = upload_part(&engine, &alice, &bucket, "video.bin", &id, 1, first.clone())
            .await
            .unwrap_or_else(|e| panic!("part 1: {e}"));
        let p2 = upload_part(&engine, &alice, &bucket, "video.bin", &id, 2, second.clone())
            .await
            .unwrap_or_else(|e| panic!("part 2: {e}"));

        let done = complete(
            &engine,
            &alice,
            &bucket,
            "video.bin",
            &id,
            vec![CompletedPart::new(1, p1.etag), CompletedPart::new(2, p2.etag)],
        )
        .await
        .unwrap_or_else(|e| panic!("complete: {e}"));
        assert_eq!(done.size, (9 * MIB) as u64);
        assert_eq!(
            done.etag,
            compute_multipart_etag(&[compute_md5(&first), compute_md5(&second)])
        );
        assert!(done.etag.ends_with("-2\""));

        let body = get_bytes(&engine, &alice, &bucket, "video.bin")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body.len(), 9 * MIB);
        assert_eq!(&body[..6 * MIB], &first[..]);
        assert_eq!(&body[6 * MIB..], &second[..]);

        // only the assembled blob survives
        assert_eq!(engine.storage().len(), 1);
    }

    #[tokio::test]
    async fn test_should_validate_completion_list() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "order", CannedAcl::Private).await;
        let id = initiate(&engine, &alice, &bucket, "k", None).await;

        let small = Bytes::from_static(b"tiny");
        let big = Bytes::from(vec![1_u8; 5 * MIB]);
        upload_part(&engine, &alice, &bucket, "k", &id, 1, small.clone())
            .await
            .unwrap_or_else(|e| panic!("part 1: {e}"));
        upload_part(&engine, &alice, &bucket, "k", &id, 2, big.clone())
            .await
            .unwrap_or_else(|e| panic!("part 2: {e}"));

        let reversed = vec![
            CompletedPart {
                part_number: 2,
                etag: None,
            },
            CompletedPart {
                part_number: 1,
                etag: None,
            },
        ];
        assert!(matches!(
            complete(&engine, &alice, &bucket, "k", &id, reversed).await,
            Err(S3ServiceError::InvalidPartOrder)
        ));

        let wrong_etag = vec![CompletedPart::new(1, "\"00000000000000000000000000000000\"")];
        assert!(matches!(
            complete(&engine, &alice, &bucket, "k", &id, wrong_etag).await,
            Err(S3ServiceError::InvalidPart { part_number: 1 })
        ));

        let undersized_first = vec![
            CompletedPart {
                part_number: 1,
                etag: None,
            },
            CompletedPart {
                part_number: 2,
                etag: None,
            },
        ];
        assert!(matches!(
            complete(&engine, &alice, &bucket, "k", &id, undersized_first).await,
            Err(S3ServiceError::EntityTooSmall)
        ));

        assert!(matches!(
            complete(&engine, &alice, &bucket, "k", &id, Vec::new()).await,
            Err(S3ServiceError::InvalidArgument { .. })
        ));

        // a small final part is fine
        upload_part(&engine, &alice, &bucket, "k", &id, 3, small)
            .await
            .unwrap_or_else(|e| panic!("part 3: {e}"));
        let done = complete(
            &engine,
            &alice,
            &bucket,
            "k",
            &id,
            vec![
                CompletedPart {
                    part_number: 2,
                    etag: None,
                },
                CompletedPart {
                    part_number: 3,
                    etag: None,
                },
            ],
        )
        .await
        .unwrap_or_else(|e| panic!("complete: {e}"));
        assert_eq!(done.size, (5 * MIB + 4) as u64);
        // the undeclared part 1 was released with the session
        assert_eq!(engine.storage().len(), 1);
    }

    #[tokio::test]
    async fn test_should_compute_composite_checksum() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "sum", CannedAcl::Private).await;
        let algorithm = ChecksumAlgorithm::Sha256;
        let id = initiate(&engine, &alice, &bucket, "k", Some(algorithm)).await;

        let first = Bytes::from(vec![7_u8; 5 * MIB]);
        let second = Bytes::from_static(b"tail");
        let p1 = upload_part(&engine, &alice, &bucket, "k", &id, 1, first.clone())
            .await
            .unwrap_or_else(|e| panic!("part 1: {e}"));
        let p2 = upload_part(&engine, &alice, &bucket, "k", &id, 2, second.clone())
            .await
            .unwrap_or_else(|e| panic!("part 2: {e}"));
        assert_eq!(
            p1.checksum.as_ref().map(|c| c.value.clone()),
            Some(compute_checksum(algorithm, &first))
        );

        let done = complete(
            &engine,
            &alice,
            &bucket,
            "k",
            &id,
            vec![CompletedPart::new(1, p1.etag), CompletedPart::new(2, p2.etag)],
        )
        .await
        .unwrap_or_else(|e| panic!("complete: {e}"));

        let expected = compute_composite_checksum(
            algorithm,
            &[
                compute_checksum(algorithm, &first),
                compute_checksum(algorithm, &second),
            ],
        );
        let checksum = done.checksum.unwrap_or_else(|| panic!("missing checksum"));
        assert_eq!(checksum.algorithm, algorithm);
        assert_eq!(checksum.value, expected);
    }

    #[tokio::test]
    async fn test_should_version_completed_uploads() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "vmpu", CannedAcl::Private).await;
        engine
            .set_bucket_versioning(&alice, &bucket, VersioningStatus::Enabled)
            .await
            .unwrap_or_else(|e| panic!("versioning: {e}"));

        let id = initiate(&engine, &alice, &bucket, "k", None).await;
        let part = upload_part(&engine, &alice, &bucket, "k", &id, 1, Bytes::from_static(b"v"))
            .await
            .unwrap_or_else(|e| panic!("part: {e}"));
        let done = complete(
            &engine,
            &alice,
            &bucket,
            "k",
            &id,
            vec![CompletedPart::new(1, part.etag)],
        )
        .await
        .unwrap_or_else(|e| panic!("complete: {e}"));
        let version_id = done
            .version_id
            .unwrap_or_else(|| panic!("versioned bucket must report a version id"));

        let got = engine
            .get_object(
                &alice,
                GetObjectInput::builder()
                    .bucket(bucket.as_str())
                    .key("k")
                    .version_id(version_id)
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("get version: {e}"));
        assert_eq!(got.object.parts_count, Some(1));
    }

    #[tokio::test]
    async fn test_should_abort_and_forget_upload() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "abort", CannedAcl::Private).await;
        let id = initiate(&engine, &alice, &bucket, "k", None).await;
        upload_part(&engine, &alice, &bucket, "k", &id, 1, Bytes::from_static(b"data"))
            .await
            .unwrap_or_else(|e| panic!("part: {e}"));

        // an open upload keeps the bucket alive
        assert!(matches!(
            engine.delete_bucket(&alice, &bucket).await,
            Err(S3ServiceError::BucketNotEmpty { .. })
        ));

        engine
            .abort_multipart_upload(&alice, &bucket, "k", &id)
            .await
            .unwrap_or_else(|e| panic!("abort: {e}"));
        assert!(engine.storage().is_empty());

        let listed = engine
            .list_multipart_uploads(
                &alice,
                ListMultipartUploadsInput::builder().bucket(bucket.as_str()).build(),
            )
            .await
            .unwrap_or_else(|e| panic!("list uploads: {e}"));
        assert!(listed.uploads.is_empty());

        assert!(matches!(
            complete(&engine, &alice, &bucket, "k", &id, vec![CompletedPart::new(1, "x")]).await,
            Err(S3ServiceError::NoSuchUpload { .. })
        ));
        engine
            .delete_bucket(&alice, &bucket)
            .await
            .unwrap_or_else(|e| panic!("delete bucket: {e}"));
    }

    #[tokio::test]
    async fn test_should_deny_uploads_to_strangers() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "deny", CannedAcl::Private).await;

        let denied = engine
            .new_multipart_upload(
                &user("bob"),
                NewMultipartUploadInput::builder()
                    .bucket(bucket.as_str())
                    .key("k")
                    .build(),
            )
            .await;
        assert!(matches!(denied, Err(S3ServiceError::AccessDenied)));

        let id = initiate(&engine, &alice, &bucket, "k", None).await;
        assert!(matches!(
            upload_part(&engine, &user("bob"), &bucket, "k", &id, 1, Bytes::from_static(b"x")).await,
            Err(S3ServiceError::AccessDenied)
        ));
    }
}
