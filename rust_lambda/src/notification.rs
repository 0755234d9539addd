use std::fmt;

use aws_lambda_events::event::s3::S3Event;
use aws_lambda_events::event::sqs::SqsMessage;
use lambda_runtime::tracing;
use percent_encoding::percent_decode_str;

use crate::error::PipelineError;

/// A stored object, with its key already URL-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl ObjectRef {
    /// Extracts the source object from a queued S3 notification.
    ///
    /// Only the first record of the embedded event is consulted.
    pub fn from_message(message: &SqsMessage) -> Result<Self, PipelineError> {
        let body = message
            .body
            .as_deref()
            .ok_or_else(|| PipelineError::Parse("message has no body".to_string()))?;
        let event: S3Event = serde_json::from_str(body)
            .map_err(|e| PipelineError::Parse(format!("body is not an S3 event: {e}")))?;
        Self::from_event(&event)
    }

    pub fn from_event(event: &S3Event) -> Result<Self, PipelineError> {
        let record = event
            .records
            .first()
            .ok_or_else(|| PipelineError::Parse("S3 event has no records".to_string()))?;
        if event.records.len() > 1 {
            tracing::warn!(
                skipped = event.records.len() - 1,
                "S3 event carries more than one record, only the first is processed"
            );
        }
        let bucket = record
            .s3
            .bucket
            .name
            .clone()
            .ok_or_else(|| PipelineError::Parse("no bucket name in S3 record".to_string()))?;
        let raw_key = record
            .s3
            .object
            .key
            .as_deref()
            .ok_or_else(|| PipelineError::Parse("no object key in S3 record".to_string()))?;
        Ok(Self {
            bucket,
            key: decode_key(raw_key)?,
        })
    }
}

/// S3 notifications carry form-encoded keys: `+` for space, `%XX` otherwise.
///
/// A `%` not followed by two hex digits is rejected. Byte sequences that are
/// not valid UTF-8 decode to U+FFFD.
pub fn decode_key(raw: &str) -> Result<String, PipelineError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while let Some(offset) = bytes[i..].iter().position(|b| *b == b'%') {
        let at = i + offset;
        let escape = bytes.get(at + 1..at + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            return Err(PipelineError::Parse(format!(
                "object key {raw:?} has a malformed escape at byte {at}"
            )));
        }
        i = at + 3;
    }
    let spaced = raw.replace('+', " ");
    Ok(percent_decode_str(&spaced).decode_utf8_lossy().into_owned())
}
