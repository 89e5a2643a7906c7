//! Typed inputs and outputs of the public operations on
//! [`crate::ObjStackS3`].

mod input;
mod output;

pub use input::{
    ByteRange, CompleteMultipartUploadInput, CopyObjectInput, CopyObjectPartInput,
    GetObjectInput, ListMultipartUploadsInput, ListObjectPartsInput, ListObjectVersionsInput,
    ListObjectsInput, NewMultipartUploadInput, PutObjectInput, PutObjectPartInput,
};
pub(crate) use output::reported_version_id;
pub use output::{
    AccessControlPolicy, BucketInfo, CompleteMultipartUploadOutput, CopyObjectOutput,
    DeleteObjectOutput, GetObjectOutput, ListMultipartUploadsOutput, ListObjectPartsOutput,
    ListObjectVersionsOutput, ListObjectsOutput, NewMultipartUploadOutput, PutObjectOutput,
    PutObjectPartOutput, UploadInfo,
};
pub use crate::copy::{CopySource, MetadataDirective};
pub use crate::state::CompletedPart;
