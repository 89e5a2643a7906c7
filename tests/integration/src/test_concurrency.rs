//! Concurrency, cancellation and conditional-write integration tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use futures::future::join_all;
    use objstack_s3_core::ObjStackS3;
    use objstack_s3_core::auth::CannedAcl;
    use objstack_s3_core::context::RequestContext;
    use objstack_s3_core::error::{S3ServiceError, S3ServiceResult};
    use objstack_s3_core::model::{
        CompleteMultipartUploadInput, CompletedPart, NewMultipartUploadInput, PutObjectInput,
        PutObjectOutput, PutObjectPartInput,
    };
    use objstack_s3_core::storage::Body;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    use crate::{create_test_bucket, engine, get_bytes, put_bytes, user};

    /// Start a put whose body is fed through the returned stream.
    fn streaming_put(
        engine: &ObjStackS3,
        ctx: RequestContext,
        bucket: &str,
        key: &str,
        content_length: u64,
        if_none_match: Option<&str>,
    ) -> (DuplexStream, JoinHandle<S3ServiceResult<PutObjectOutput>>) {
        let (tx, rx) = tokio::io::duplex(1);
        let mut input = PutObjectInput::builder()
            .bucket(bucket)
            .key(key)
            .body(Body::from_reader(rx))
            .content_length(content_length)
            .build();
        input.if_none_match = if_none_match.map(ToOwned::to_owned);

        let engine = engine.clone();
        let handle = tokio::spawn(async move { engine.put_object(&ctx, input).await });
        (tx, handle)
    }

    async fn join(handle: JoinHandle<S3ServiceResult<PutObjectOutput>>) -> S3ServiceResult<PutObjectOutput> {
        handle
            .await
            .unwrap_or_else(|e| panic!("put task panicked: {e}"))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_keep_one_version_after_racing_puts() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "race", CannedAcl::Private).await;

        let bodies: Vec<String> = (0..16).map(|i| format!("writer-{i:02}")).collect();
        let puts = bodies.iter().map(|body| {
            let engine = engine.clone();
            let alice = alice.clone();
            let bucket = bucket.clone();
            let body = body.clone();
            tokio::spawn(async move { put_bytes(&engine, &alice, &bucket, "hot", body).await })
        });
        for result in join_all(puts).await {
            result
                .unwrap_or_else(|e| panic!("task: {e}"))
                .unwrap_or_else(|e| panic!("put: {e}"));
        }

        let winner = get_bytes(&engine, &alice, &bucket, "hot")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert!(bodies.iter().any(|b| b.as_bytes() == &winner[..]));
        assert_eq!(engine.storage().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_let_exactly_one_completion_win() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "complete", CannedAcl::Private).await;

        let upload_id = engine
            .new_multipart_upload(
                &alice,
                NewMultipartUploadInput::builder()
                    .bucket(bucket.as_str())
                    .key("k")
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("initiate: {e}"))
            .upload_id;
        let part = engine
            .put_object_part(
                &alice,
                PutObjectPartInput::builder()
                    .bucket(bucket.as_str())
                    .key("k")
                    .upload_id(upload_id.as_str())
                    .part_number(1)
                    .body(Body::from("only part"))
                    .content_length(9)
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("part: {e}"));

        let attempts = (0..8).map(|_| {
            let engine = engine.clone();
            let alice = alice.clone();
            let input = CompleteMultipartUploadInput::builder()
                .bucket(bucket.as_str())
                .key("k")
                .upload_id(upload_id.as_str())
                .parts(vec![CompletedPart::new(1, part.etag.clone())])
                .build();
            tokio::spawn(async move { engine.complete_multipart_upload(&alice, input).await })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap_or_else(|e| panic!("task: {e}")))
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, S3ServiceError::NoSuchUpload { .. }))
        );
        assert!(matches!(
            engine.abort_multipart_upload(&alice, &bucket, "k", &upload_id).await,
            Err(S3ServiceError::NoSuchUpload { .. })
        ));
        let body = get_bytes(&engine, &alice, &bucket, "k")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body, Bytes::from_static(b"only part"));
        assert_eq!(engine.storage().len(), 1);
    }

    #[tokio::test]
    async fn test_should_release_content_of_cancelled_put() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "cancel", CannedAcl::Private).await;

        let token = CancellationToken::new();
        let ctx = alice.clone().with_cancellation(token.clone());
        let (mut tx, handle) = streaming_put(&engine, ctx, &bucket, "k", 8, None);

        tx.write_all(b"half")
            .await
            .unwrap_or_else(|e| panic!("write: {e}"));
        token.cancel();

        assert!(matches!(join(handle).await, Err(S3ServiceError::RequestCancelled)));
        drop(tx);
        assert!(engine.storage().is_empty());
        assert!(matches!(
            get_bytes(&engine, &alice, &bucket, "k").await,
            Err(S3ServiceError::NoSuchKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_time_out_stalled_put() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "stall", CannedAcl::Private).await;

        let ctx = alice.clone().with_timeout(Duration::from_millis(50));
        let (tx, handle) = streaming_put(&engine, ctx, &bucket, "k", 4, None);

        assert!(matches!(join(handle).await, Err(S3ServiceError::RequestTimeout)));
        drop(tx);
        assert!(engine.storage().is_empty());
    }

    #[tokio::test]
    async fn test_should_fail_conditional_put_when_key_appears_mid_stream() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "cond", CannedAcl::Private).await;

        let (mut tx, handle) =
            streaming_put(&engine, alice.clone(), &bucket, "k", 4, Some("*"));
        // the body has started flowing, so the precondition was evaluated
        tx.write_all(b"ab")
            .await
            .unwrap_or_else(|e| panic!("write: {e}"));

        put_bytes(&engine, &alice, &bucket, "k", "winner")
            .await
            .unwrap_or_else(|e| panic!("competing put: {e}"));

        tx.write_all(b"cd")
            .await
            .unwrap_or_else(|e| panic!("write: {e}"));
        drop(tx);

        assert!(matches!(
            join(handle).await,
            Err(S3ServiceError::ConditionalRequestConflict)
        ));
        let body = get_bytes(&engine, &alice, &bucket, "k")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body, Bytes::from_static(b"winner"));
        assert_eq!(engine.storage().len(), 1);

        // evaluated up front, the same condition fails immediately
        assert!(matches!(
            engine
                .put_object(
                    &alice,
                    PutObjectInput::builder()
                        .bucket(bucket.as_str())
                        .key("k")
                        .body(Body::from("late"))
                        .content_length(4)
                        .if_none_match("*")
                        .build(),
                )
                .await,
            Err(S3ServiceError::PreconditionFailed)
        ));
    }

    #[tokio::test]
    async fn test_should_abandon_put_into_deleted_bucket() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "gone", CannedAcl::Private).await;

        let (mut tx, handle) = streaming_put(&engine, alice.clone(), &bucket, "k", 4, None);
        tx.write_all(b"ab")
            .await
            .unwrap_or_else(|e| panic!("write: {e}"));

        engine
            .delete_bucket(&alice, &bucket)
            .await
            .unwrap_or_else(|e| panic!("delete bucket: {e}"));

        tx.write_all(b"cd")
            .await
            .unwrap_or_else(|e| panic!("write: {e}"));
        drop(tx);

        assert!(matches!(join(handle).await, Err(S3ServiceError::NoSuchBucket { .. })));
        assert!(engine.storage().is_empty());
    }
}
