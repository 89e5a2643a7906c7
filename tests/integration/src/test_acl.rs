//! Canned ACL integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use objstack_s3_core::auth::{CannedAcl, Grantee, Permission};
    use objstack_s3_core::context::RequestContext;
    use objstack_s3_core::error::S3ServiceError;
    use objstack_s3_core::model::{ListObjectsInput, PutObjectInput};
    use objstack_s3_core::storage::Body;

    use crate::{create_test_bucket, engine, get_bytes, put_bytes, user};

    #[tokio::test]
    async fn test_should_serve_public_read_objects_to_anyone() {
        let engine = engine();
        let alice = user("alice");
        let anonymous = RequestContext::anonymous();
        let bucket = create_test_bucket(&engine, &alice, "pub", CannedAcl::Private).await;

        engine
            .put_object(
                &alice,
                PutObjectInput::builder()
                    .bucket(bucket.as_str())
                    .key("index.html")
                    .body(Body::from("<html/>"))
                    .content_length(7)
                    .acl(CannedAcl::PublicRead)
                    .build(),
            )
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));
        put_bytes(&engine, &alice, &bucket, "secret.txt", "s3cr3t")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));

        let page = get_bytes(&engine, &anonymous, &bucket, "index.html")
            .await
            .unwrap_or_else(|e| panic!("anonymous get: {e}"));
        assert_eq!(page, Bytes::from_static(b"<html/>"));

        assert!(matches!(
            get_bytes(&engine, &anonymous, &bucket, "secret.txt").await,
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(matches!(
            get_bytes(&engine, &user("bob"), &bucket, "secret.txt").await,
            Err(S3ServiceError::AccessDenied)
        ));
        // listing the private bucket is still denied
        assert!(matches!(
            engine
                .list_objects(&anonymous, ListObjectsInput::builder().bucket(bucket.as_str()).build())
                .await,
            Err(S3ServiceError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn test_should_let_anyone_write_to_public_read_write_bucket() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "drop", CannedAcl::PublicReadWrite).await;

        put_bytes(&engine, &RequestContext::anonymous(), &bucket, "anon.txt", "a")
            .await
            .unwrap_or_else(|e| panic!("anonymous put: {e}"));
        put_bytes(&engine, &user("bob"), &bucket, "bob.txt", "b")
            .await
            .unwrap_or_else(|e| panic!("bob put: {e}"));

        // anonymous writes belong to the bucket owner
        let anon = engine
            .get_object_acl(&alice, &bucket, "anon.txt", None)
            .await
            .unwrap_or_else(|e| panic!("get acl: {e}"));
        assert_eq!(anon.owner.id, "alice");

        // bob owns his object; alice cannot read it under a private ACL
        assert!(matches!(
            get_bytes(&engine, &alice, &bucket, "bob.txt").await,
            Err(S3ServiceError::AccessDenied)
        ));
        let own = get_bytes(&engine, &user("bob"), &bucket, "bob.txt")
            .await
            .unwrap_or_else(|e| panic!("bob get: {e}"));
        assert_eq!(own, Bytes::from_static(b"b"));

        // bucket-owner-full-control hands the bucket owner access
        engine
            .set_object_acl(&user("bob"), &bucket, "bob.txt", None, CannedAcl::BucketOwnerFullControl)
            .await
            .unwrap_or_else(|e| panic!("set acl: {e}"));
        get_bytes(&engine, &alice, &bucket, "bob.txt")
            .await
            .unwrap_or_else(|e| panic!("alice get after grant: {e}"));
    }

    #[tokio::test]
    async fn test_should_guard_acl_changes() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "guard", CannedAcl::PublicRead).await;
        put_bytes(&engine, &alice, &bucket, "k", "v")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));

        assert!(matches!(
            engine
                .set_object_acl(&user("bob"), &bucket, "k", None, CannedAcl::PublicRead)
                .await,
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(matches!(
            engine.set_bucket_acl(&user("bob"), &bucket, CannedAcl::PublicReadWrite).await,
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(matches!(
            put_bytes(&engine, &user("bob"), &bucket, "k2", "x").await,
            Err(S3ServiceError::AccessDenied)
        ));

        engine
            .set_object_acl(&alice, &bucket, "k", None, CannedAcl::AuthenticatedRead)
            .await
            .unwrap_or_else(|e| panic!("set acl: {e}"));
        let policy = engine
            .get_object_acl(&alice, &bucket, "k", None)
            .await
            .unwrap_or_else(|e| panic!("get acl: {e}"));
        assert_eq!(policy.canned, CannedAcl::AuthenticatedRead);
        assert!(policy.grants.iter().any(|g| matches!(g.grantee, Grantee::Group { .. })
            && g.permission == Permission::Read));

        get_bytes(&engine, &user("bob"), &bucket, "k")
            .await
            .unwrap_or_else(|e| panic!("authenticated get: {e}"));
        assert!(matches!(
            get_bytes(&engine, &RequestContext::anonymous(), &bucket, "k").await,
            Err(S3ServiceError::AccessDenied)
        ));
    }

    #[tokio::test]
    async fn test_should_mask_missing_keys_for_readers_without_list() {
        let engine = engine();
        let alice = user("alice");
        let listable = create_test_bucket(&engine, &alice, "listable", CannedAcl::PublicRead).await;
        let private = create_test_bucket(&engine, &alice, "closed", CannedAcl::Private).await;

        assert!(matches!(
            get_bytes(&engine, &user("bob"), &listable, "nothing").await,
            Err(S3ServiceError::NoSuchKey { .. })
        ));
        assert!(matches!(
            get_bytes(&engine, &user("bob"), &private, "nothing").await,
            Err(S3ServiceError::AccessDenied)
        ));
    }
}
