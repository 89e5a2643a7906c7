//! Versioning integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use objstack_s3_core::ObjStackS3;
    use objstack_s3_core::auth::CannedAcl;
    use objstack_s3_core::context::RequestContext;
    use objstack_s3_core::error::S3ServiceError;
    use objstack_s3_core::model::{GetObjectInput, ListObjectVersionsInput, ListObjectsInput};
    use objstack_s3_core::state::VersioningStatus;

    use crate::{create_test_bucket, engine, get_bytes, put_bytes, user};

    async fn set_versioning(
        engine: &ObjStackS3,
        ctx: &RequestContext,
        bucket: &str,
        status: VersioningStatus,
    ) {
        engine
            .set_bucket_versioning(ctx, bucket, status)
            .await
            .unwrap_or_else(|e| panic!("set versioning {status:?}: {e}"));
    }

    async fn get_version(
        engine: &ObjStackS3,
        ctx: &RequestContext,
        bucket: &str,
        key: &str,
        version_id: &str,
    ) -> Result<Bytes, S3ServiceError> {
        engine
            .get_object(
                ctx,
                GetObjectInput::builder()
                    .bucket(bucket)
                    .key(key)
                    .version_id(version_id)
                    .build(),
            )
            .await
            .map(|out| out.body)
    }

    #[tokio::test]
    async fn test_should_keep_every_version_when_enabled() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "ver", CannedAcl::Private).await;
        set_versioning(&engine, &alice, &bucket, VersioningStatus::Enabled).await;

        let v1 = put_bytes(&engine, &alice, &bucket, "doc", "first")
            .await
            .unwrap_or_else(|e| panic!("put v1: {e}"));
        let v2 = put_bytes(&engine, &alice, &bucket, "doc", "second")
            .await
            .unwrap_or_else(|e| panic!("put v2: {e}"));
        let v1_id = v1.version_id.unwrap_or_else(|| panic!("v1 has no version id"));
        let v2_id = v2.version_id.unwrap_or_else(|| panic!("v2 has no version id"));
        assert_ne!(v1_id, v2_id);

        let old = get_version(&engine, &alice, &bucket, "doc", &v1_id)
            .await
            .unwrap_or_else(|e| panic!("get v1: {e}"));
        assert_eq!(old, Bytes::from_static(b"first"));
        let latest = get_bytes(&engine, &alice, &bucket, "doc")
            .await
            .unwrap_or_else(|e| panic!("get latest: {e}"));
        assert_eq!(latest, Bytes::from_static(b"second"));
        assert_eq!(engine.storage().len(), 2);
    }

    #[tokio::test]
    async fn test_should_hide_key_behind_delete_marker() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "marker", CannedAcl::Private).await;
        set_versioning(&engine, &alice, &bucket, VersioningStatus::Enabled).await;

        let put = put_bytes(&engine, &alice, &bucket, "doc", "body")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));
        let deleted = engine
            .delete_object(&alice, &bucket, "doc", None)
            .await
            .unwrap_or_else(|e| panic!("delete: {e}"));
        assert!(deleted.delete_marker);
        let marker_id = deleted
            .version_id
            .unwrap_or_else(|| panic!("marker has no version id"));

        assert!(matches!(
            get_bytes(&engine, &alice, &bucket, "doc").await,
            Err(S3ServiceError::NoSuchKey { .. })
        ));
        assert!(matches!(
            get_version(&engine, &alice, &bucket, "doc", &marker_id).await,
            Err(S3ServiceError::MethodNotAllowed)
        ));

        let listed = engine
            .list_objects(&alice, ListObjectsInput::builder().bucket(bucket.as_str()).build())
            .await
            .unwrap_or_else(|e| panic!("list: {e}"));
        assert!(listed.contents.is_empty());

        // the data version is still there
        let version_id = put.version_id.unwrap_or_default();
        let body = get_version(&engine, &alice, &bucket, "doc", &version_id)
            .await
            .unwrap_or_else(|e| panic!("get old version: {e}"));
        assert_eq!(body, Bytes::from_static(b"body"));

        // removing the marker restores the key
        let purged = engine
            .delete_object(&alice, &bucket, "doc", Some(&marker_id))
            .await
            .unwrap_or_else(|e| panic!("purge marker: {e}"));
        assert!(purged.delete_marker);
        let restored = get_bytes(&engine, &alice, &bucket, "doc")
            .await
            .unwrap_or_else(|e| panic!("get restored: {e}"));
        assert_eq!(restored, Bytes::from_static(b"body"));
    }

    #[tokio::test]
    async fn test_should_replace_null_version_when_suspended() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "susp", CannedAcl::Private).await;
        set_versioning(&engine, &alice, &bucket, VersioningStatus::Enabled).await;

        let kept = put_bytes(&engine, &alice, &bucket, "doc", "versioned")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));
        set_versioning(&engine, &alice, &bucket, VersioningStatus::Suspended).await;

        for body in ["null one", "null two"] {
            let out = put_bytes(&engine, &alice, &bucket, "doc", body)
                .await
                .unwrap_or_else(|e| panic!("put {body}: {e}"));
            assert!(out.version_id.is_none());
        }

        let versions = engine
            .list_object_versions(
                &alice,
                ListObjectVersionsInput::builder().bucket(bucket.as_str()).build(),
            )
            .await
            .unwrap_or_else(|e| panic!("list versions: {e}"));
        let ids: Vec<&str> = versions
            .versions
            .iter()
            .map(|v| v.version.version_id())
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], "null");
        assert_eq!(Some(ids[1]), kept.version_id.as_deref());
        assert_eq!(engine.storage().len(), 2);

        let null = get_version(&engine, &alice, &bucket, "doc", "null")
            .await
            .unwrap_or_else(|e| panic!("get null: {e}"));
        assert_eq!(null, Bytes::from_static(b"null two"));
    }

    #[tokio::test]
    async fn test_should_purge_single_version() {
        let engine = engine();
        let alice = user("alice");
        let bucket = create_test_bucket(&engine, &alice, "purge", CannedAcl::Private).await;
        set_versioning(&engine, &alice, &bucket, VersioningStatus::Enabled).await;

        let v1 = put_bytes(&engine, &alice, &bucket, "doc", "one")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));
        let v2 = put_bytes(&engine, &alice, &bucket, "doc", "two")
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));

        let latest_id = v2.version_id.unwrap_or_default();
        engine
            .delete_object(&alice, &bucket, "doc", Some(&latest_id))
            .await
            .unwrap_or_else(|e| panic!("purge: {e}"));
        assert_eq!(engine.storage().len(), 1);

        let body = get_bytes(&engine, &alice, &bucket, "doc")
            .await
            .unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body, Bytes::from_static(b"one"));

        assert!(matches!(
            get_version(&engine, &alice, &bucket, "doc", &latest_id).await,
            Err(S3ServiceError::NoSuchVersion { .. })
        ));
        // strangers learn nothing about versions
        assert!(matches!(
            get_version(&engine, &user("bob"), &bucket, "doc", &latest_id).await,
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(v1.version_id.is_some());
    }
}
