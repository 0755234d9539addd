use aws_sdk_rekognition::types::{Image, S3Object};
use aws_sdk_rekognition::Client as RekognitionClient;

use crate::error::PipelineError;
use crate::notification::ObjectRef;

/// Rectangle as fractions of the image width and height.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// One localized occurrence of a label.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
    pub instances: Vec<Instance>,
}

/// Limits forwarded to the detection service.
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    pub max_labels: i32,
    pub min_confidence: f32,
}

/// Runs label detection directly against the stored object; no image bytes
/// leave S3 for this call.
#[tracing::instrument(skip_all, fields(object = %object))]
pub async fn detect_labels(
    client: &RekognitionClient,
    object: &ObjectRef,
    params: DetectionParams,
) -> Result<Vec<Label>, PipelineError> {
    let image = Image::builder()
        .s3_object(
            S3Object::builder()
                .bucket(&object.bucket)
                .name(&object.key)
                .build(),
        )
        .build();
    let output = client
        .detect_labels()
        .image(image)
        .max_labels(params.max_labels)
        .min_confidence(params.min_confidence)
        .send()
        .await
        .map_err(|e| PipelineError::Detect {
            object: object.to_string(),
            source: e.into(),
        })?;

    let labels: Vec<Label> = output.labels().iter().map(Label::from).collect();
    for label in &labels {
        tracing::debug!(
            name = %label.name,
            confidence = label.confidence,
            instances = label.instances.len(),
            "label"
        );
    }
    tracing::info!(count = labels.len(), "labels detected");
    Ok(labels)
}

impl From<&aws_sdk_rekognition::types::Label> for Label {
    fn from(label: &aws_sdk_rekognition::types::Label) -> Self {
        let instances = label
            .instances()
            .iter()
            .filter_map(|instance| instance.bounding_box())
            .map(|bbox| Instance {
                bounding_box: BoundingBox {
                    left: bbox.left().unwrap_or_default(),
                    top: bbox.top().unwrap_or_default(),
                    width: bbox.width().unwrap_or_default(),
                    height: bbox.height().unwrap_or_default(),
                },
            })
            .collect();
        Self {
            name: label.name().unwrap_or_default().to_string(),
            confidence: label.confidence().unwrap_or_default(),
            instances,
        }
    }
}
