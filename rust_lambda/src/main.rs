use aws_config::BehaviorVersion;
use aws_sdk_rekognition::Client as RekognitionClient;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, tracing, Error};
mod config;
mod detector;
mod error;
mod event_handler;
mod notification;
mod overlay;
mod publisher;
use config::LabelConfig;
use event_handler::{function_handler, Pipeline};
use overlay::OverlayStyle;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::subscriber::fmt().json().init();
    let config = LabelConfig::from_env()?;
    let style = OverlayStyle::load(&config)?;
    tracing::info!(
        destination_bucket = %config.destination_bucket,
        max_labels = config.max_labels,
        min_confidence = config.min_confidence,
        failure_mode = ?config.failure_mode,
        "configuration loaded"
    );
    let shared_config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
    let pipeline = Pipeline {
        s3: S3Client::new(&shared_config),
        rekognition: RekognitionClient::new(&shared_config),
        config,
        style,
    };
    run(service_fn(|event| function_handler(event, &pipeline))).await
}
