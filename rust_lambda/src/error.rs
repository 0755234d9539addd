use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure while processing a single queued notification.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("malformed notification: {0}")]
    Parse(String),

    #[error("label detection failed for {object}")]
    Detect {
        object: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to fetch {object}")]
    Fetch {
        object: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to decode image")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode annotated image as JPEG")]
    Encode(#[source] image::ImageError),

    #[error("failed to publish {object}")]
    Publish {
        object: String,
        #[source]
        source: BoxError,
    },
}

impl PipelineError {
    /// Render and upstream failures abort the batch in legacy mode; only
    /// publish failures are absorbed there.
    pub fn is_publish(&self) -> bool {
        matches!(self, PipelineError::Publish { .. })
    }
}

/// Failure while loading configuration at cold start.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("failed to read font {}", path.display())]
    FontRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse font {name}")]
    FontParse { name: String },
}
