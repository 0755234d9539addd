use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use crate::error::PipelineError;

pub const ANNOTATED_CONTENT_TYPE: &str = "image/jpeg";

/// Uploads the annotated image in a single `PutObject`.
#[tracing::instrument(skip(client, image), fields(bytes = image.len()))]
pub async fn publish(
    client: &S3Client,
    bucket: &str,
    key: &str,
    image: Vec<u8>,
) -> Result<(), PipelineError> {
    let content_length = image.len() as i64;
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type(ANNOTATED_CONTENT_TYPE)
        .content_length(content_length)
        .body(ByteStream::from(image))
        .send()
        .await
        .map_err(|e| PipelineError::Publish {
            object: format!("s3://{bucket}/{key}"),
            source: e.into(),
        })?;
    Ok(())
}
