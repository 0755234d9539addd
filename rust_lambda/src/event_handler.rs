use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent, SqsMessage};
use aws_sdk_rekognition::Client as RekognitionClient;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{tracing, Error, LambdaEvent};
use serde::Serialize;

use crate::config::{FailureMode, LabelConfig};
use crate::detector::{detect_labels, DetectionParams};
use crate::error::PipelineError;
use crate::notification::ObjectRef;
use crate::overlay::{fetch_object, render_overlay, OverlayStyle};
use crate::publisher::publish;

pub(crate) const LEGACY_SUCCESS_MESSAGE: &str = "Lambda Successful";

/// Clients and settings built once per cold start and shared by every
/// invocation.
pub(crate) struct Pipeline {
    pub s3: S3Client,
    pub rekognition: RekognitionClient,
    pub config: LabelConfig,
    pub style: OverlayStyle,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum HandlerResponse {
    Message(&'static str),
    Batch(SqsBatchResponse),
}

async fn process_message(pipeline: &Pipeline, message: &SqsMessage) -> Result<(), PipelineError> {
    let object = ObjectRef::from_message(message)?;
    let labels = detect_labels(
        &pipeline.rekognition,
        &object,
        DetectionParams {
            max_labels: pipeline.config.max_labels,
            min_confidence: pipeline.config.min_confidence,
        },
    )
    .await?;
    let source = fetch_object(&pipeline.s3, &object).await?;
    let annotated = render_overlay(&source, &labels, &pipeline.style)?;

    let destination_key = pipeline.config.destination_key(&object.key);
    publish(
        &pipeline.s3,
        &pipeline.config.destination_bucket,
        &destination_key,
        annotated,
    )
    .await?;
    tracing::info!(
        source = %object,
        destination_key = %destination_key,
        labels = labels.len(),
        "labels overlaid and result image uploaded"
    );
    Ok(())
}

/// Upstream and render failures abort the batch; publish failures are
/// logged and the message counts as done.
async fn process_legacy(pipeline: &Pipeline, records: &[SqsMessage]) -> Result<HandlerResponse, Error> {
    for message in records {
        match process_message(pipeline, message).await {
            Ok(()) => {}
            Err(err) if err.is_publish() => {
                tracing::error!(
                    message_id = message.message_id.as_deref().unwrap_or_default(),
                    error = %DisplayErrorContext(&err),
                    "failed to upload annotated image"
                );
            }
            Err(err) => {
                tracing::error!(
                    message_id = message.message_id.as_deref().unwrap_or_default(),
                    error = %DisplayErrorContext(&err),
                    "aborting batch"
                );
                return Err(err.into());
            }
        }
    }
    Ok(HandlerResponse::Message(LEGACY_SUCCESS_MESSAGE))
}

/// Every failure is isolated to its message and handed back to SQS for
/// redelivery.
async fn process_reporting(pipeline: &Pipeline, records: &[SqsMessage]) -> SqsBatchResponse {
    let mut response = SqsBatchResponse::default();
    for message in records {
        if let Err(err) = process_message(pipeline, message).await {
            let item_identifier = message.message_id.clone().unwrap_or_default();
            tracing::error!(
                message_id = %item_identifier,
                error = %DisplayErrorContext(&err),
                "failed to process message"
            );
            response
                .batch_item_failures
                .push(BatchItemFailure { item_identifier });
        }
    }
    response
}

pub(crate) async fn function_handler(
    event: LambdaEvent<SqsEvent>,
    pipeline: &Pipeline,
) -> Result<HandlerResponse, Error> {
    let records = event.payload.records;
    if records.is_empty() {
        tracing::warn!("No records found in SQS event");
    }
    match pipeline.config.failure_mode {
        FailureMode::Legacy => process_legacy(pipeline, &records).await,
        FailureMode::Report => {
            let response = process_reporting(pipeline, &records).await;
            if !response.batch_item_failures.is_empty() {
                tracing::warn!(
                    failed = response.batch_item_failures.len(),
                    total = records.len(),
                    "reporting failed messages for redelivery"
                );
            }
            Ok(HandlerResponse::Batch(response))
        }
    }
}
