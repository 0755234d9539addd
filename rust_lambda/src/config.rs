use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

pub const DEFAULT_DESTINATION_BUCKET: &str = "bucket-for-labelled-images";
pub const DEFAULT_KEY_PREFIX: &str = "labeled_";
pub const DEFAULT_MAX_LABELS: i32 = 10;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 75.0;
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// How per-message failures surface to the invoking environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Every failed message is logged and reported back to SQS as a batch
    /// item failure; the rest of the batch carries on.
    Report,
    /// Upstream and render failures abort the batch, publish failures are
    /// logged and swallowed.
    Legacy,
}

impl FromStr for FailureMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(FailureMode::Report),
            "legacy" => Ok(FailureMode::Legacy),
            _ => Err(ConfigError::Invalid {
                name: "FAILURE_MODE",
                expected: "one of `report`, `legacy`",
                value: s.to_string(),
            }),
        }
    }
}

/// Function configuration, read once per cold start.
///
/// | Env var              | Default                       |
/// |----------------------|-------------------------------|
/// | `DESTINATION_BUCKET` | `bucket-for-labelled-images`  |
/// | `KEY_PREFIX`         | `labeled_`                    |
/// | `MAX_LABELS`         | `10`                          |
/// | `MIN_CONFIDENCE`     | `75.0`                        |
/// | `JPEG_QUALITY`       | `75`                          |
/// | `LABEL_FONT_PATH`    | unset, bundled font is used   |
/// | `FAILURE_MODE`       | `report`                      |
#[derive(Debug, Clone)]
pub struct LabelConfig {
    pub destination_bucket: String,
    pub key_prefix: String,
    pub max_labels: i32,
    pub min_confidence: f32,
    pub jpeg_quality: u8,
    pub font_path: Option<PathBuf>,
    pub failure_mode: FailureMode,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            destination_bucket: DEFAULT_DESTINATION_BUCKET.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            max_labels: DEFAULT_MAX_LABELS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            font_path: None,
            failure_mode: FailureMode::Report,
        }
    }
}

impl LabelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let max_labels = match non_empty("MAX_LABELS") {
            Some(raw) => parse_number::<i32>(&raw)
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid("MAX_LABELS", "a positive integer", &raw))?,
            None => defaults.max_labels,
        };

        let min_confidence = match non_empty("MIN_CONFIDENCE") {
            Some(raw) => parse_number::<f32>(&raw)
                .filter(|n| (0.0..=100.0).contains(n))
                .ok_or_else(|| invalid("MIN_CONFIDENCE", "a number between 0 and 100", &raw))?,
            None => defaults.min_confidence,
        };

        let jpeg_quality = match non_empty("JPEG_QUALITY") {
            Some(raw) => parse_number::<u8>(&raw)
                .filter(|n| (1..=100).contains(n))
                .ok_or_else(|| invalid("JPEG_QUALITY", "an integer between 1 and 100", &raw))?,
            None => defaults.jpeg_quality,
        };

        let failure_mode = match non_empty("FAILURE_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.failure_mode,
        };

        Ok(Self {
            destination_bucket: non_empty("DESTINATION_BUCKET")
                .unwrap_or(defaults.destination_bucket),
            key_prefix: lookup("KEY_PREFIX").unwrap_or(defaults.key_prefix),
            max_labels,
            min_confidence,
            jpeg_quality,
            font_path: non_empty("LABEL_FONT_PATH").map(PathBuf::from),
            failure_mode,
        })
    }

    /// Key under which the annotated copy of `source_key` is stored.
    pub fn destination_key(&self, source_key: &str) -> String {
        format!("{}{}", self.key_prefix, source_key)
    }
}

fn parse_number<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

fn invalid(name: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        expected,
        value: value.to_string(),
    }
}
