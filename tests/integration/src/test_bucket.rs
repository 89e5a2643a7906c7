//! Bucket registry integration tests.

#[cfg(test)]
mod tests {
    use objstack_s3_core::auth::CannedAcl;
    use objstack_s3_core::context::RequestContext;
    use objstack_s3_core::error::S3ServiceError;

    use crate::{create_test_bucket, engine, put_bytes, test_bucket_name, user};

    #[tokio::test]
    async fn test_should_create_list_and_delete_bucket() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "crud", CannedAcl::Private).await;

        let listed = engine
            .list_buckets(&alice)
            .await
            .unwrap_or_else(|e| panic!("list_buckets: {e}"));
        assert!(listed.iter().any(|b| b.name == bucket));

        let info = engine
            .get_bucket_info(&alice, &bucket)
            .await
            .unwrap_or_else(|e| panic!("get_bucket_info: {e}"));
        assert_eq!(info.owner.id, "alice");

        engine
            .delete_bucket(&alice, &bucket)
            .await
            .unwrap_or_else(|e| panic!("delete_bucket: {e}"));
        assert!(matches!(
            engine.get_bucket(&bucket),
            Err(S3ServiceError::NoSuchBucket { .. })
        ));
        // the name is free again
        engine
            .make_bucket(&user("bob"), &bucket, None)
            .await
            .unwrap_or_else(|e| panic!("recreate: {e}"));
    }

    #[tokio::test]
    async fn test_should_report_name_conflicts_by_owner() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "dup", CannedAcl::Private).await;

        assert!(matches!(
            engine.make_bucket(&alice, &bucket, None).await,
            Err(S3ServiceError::BucketAlreadyOwnedByYou { .. })
        ));
        assert!(matches!(
            engine.make_bucket(&user("bob"), &bucket, None).await,
            Err(S3ServiceError::BucketAlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_refuse_to_delete_non_empty_bucket() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "full", CannedAcl::Private).await;
        put_bytes(&engine, &alice, &bucket, "k", "v")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));

        assert!(matches!(
            engine.delete_bucket(&alice, &bucket).await,
            Err(S3ServiceError::BucketNotEmpty { .. })
        ));

        engine
            .delete_object(&alice, &bucket, "k", None)
            .await
            .unwrap_or_else(|e| panic!("delete_object: {e}"));
        engine
            .delete_bucket(&alice, &bucket)
            .await
            .unwrap_or_else(|e| panic!("delete_bucket: {e}"));
    }

    #[tokio::test]
    async fn test_should_restrict_bucket_deletion_to_owner() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "owned", CannedAcl::PublicReadWrite).await;

        assert!(matches!(
            engine.delete_bucket(&user("bob"), &bucket).await,
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(matches!(
            engine.delete_bucket(&RequestContext::anonymous(), &bucket).await,
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(engine.get_bucket(&bucket).is_ok());
    }

    #[tokio::test]
    async fn test_should_hide_buckets_from_strangers() {
        let engine = engine();
        let alice = user("alice");
        let private = create_test_bucket(&engine, &alice, "hidden", CannedAcl::Private).await;
        let public = create_test_bucket(&engine, &alice, "shown", CannedAcl::PublicRead).await;

        let seen: Vec<String> = engine
            .list_buckets(&user("bob"))
            .await
            .unwrap_or_else(|e| panic!("list_buckets: {e}"))
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert!(seen.contains(&public));
        assert!(!seen.contains(&private));

        // a missing bucket and a forbidden one look the same
        let missing = test_bucket_name("missing");
        assert!(matches!(
            engine.get_bucket_info(&user("bob"), &missing).await,
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(matches!(
            engine.get_bucket_info(&user("bob"), &private).await,
            Err(S3ServiceError::AccessDenied)
        ));
    }
}
