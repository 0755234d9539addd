//! Burns detected labels into the source image.
//!
//! Every instance of every label becomes an unfilled rectangle plus the label
//! name, whose baseline sits a few pixels above the rectangle. The result is
//! always re-encoded as JPEG, whatever the source format was.

use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use aws_sdk_s3::Client as S3Client;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::config::LabelConfig;
use crate::detector::{BoundingBox, Label};
use crate::error::{ConfigError, PipelineError};
use crate::notification::ObjectRef;

const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const FONT_SCALE: f32 = 16.0;

/// Distance between a caption's baseline and the top edge of its box.
const CAPTION_OFFSET: i32 = 5;

/// Lambda images ship without fonts, so captions use this one unless
/// `LABEL_FONT_PATH` names another.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans-Bold.ttf");

/// Drawing settings shared by every invocation of a warm container.
pub struct OverlayStyle {
    pub font: FontArc,
    pub font_scale: f32,
    pub color: Rgb<u8>,
    pub jpeg_quality: u8,
}

impl OverlayStyle {
    /// Style with the bundled caption font.
    pub fn bundled() -> Result<Self, ConfigError> {
        let font = FontArc::try_from_slice(BUNDLED_FONT).map_err(|_| ConfigError::FontParse {
            name: "bundled DejaVuSans-Bold".to_string(),
        })?;
        Ok(Self {
            font,
            font_scale: FONT_SCALE,
            color: OVERLAY_COLOR,
            jpeg_quality: crate::config::DEFAULT_JPEG_QUALITY,
        })
    }

    /// Uses the font named by the config, falling back to the bundled one.
    pub fn load(config: &LabelConfig) -> Result<Self, ConfigError> {
        let mut style = Self::bundled()?;
        if let Some(path) = &config.font_path {
            style.font = load_font(path)?;
            tracing::info!(path = %path.display(), "loaded caption font");
        }
        style.jpeg_quality = config.jpeg_quality;
        Ok(style)
    }
}

fn load_font(path: &Path) -> Result<FontArc, ConfigError> {
    let data = std::fs::read(path).map_err(|source| ConfigError::FontRead {
        path: path.to_path_buf(),
        source,
    })?;
    FontArc::try_from_vec(data).map_err(|_| ConfigError::FontParse {
        name: path.display().to_string(),
    })
}

/// Reads the whole stored object into memory.
#[tracing::instrument(skip_all, fields(object = %object))]
pub async fn fetch_object(client: &S3Client, object: &ObjectRef) -> Result<Vec<u8>, PipelineError> {
    let fetch_error = |source: crate::error::BoxError| PipelineError::Fetch {
        object: object.to_string(),
        source,
    };
    let output = client
        .get_object()
        .bucket(&object.bucket)
        .key(&object.key)
        .send()
        .await
        .map_err(|e| fetch_error(e.into()))?;
    let body = output.body.collect().await.map_err(|e| fetch_error(e.into()))?;
    Ok(body.into_bytes().to_vec())
}

/// Decodes `source`, draws `labels` onto it and returns JPEG bytes.
pub fn render_overlay(
    source: &[u8],
    labels: &[Label],
    style: &OverlayStyle,
) -> Result<Vec<u8>, PipelineError> {
    let mut raster = image::load_from_memory(source)
        .map_err(PipelineError::Decode)?
        .to_rgb8();
    draw_labels(&mut raster, labels, style);
    encode_jpeg(&raster, style.jpeg_quality)
}

pub fn draw_labels(raster: &mut RgbImage, labels: &[Label], style: &OverlayStyle) {
    let (width, height) = raster.dimensions();
    for label in labels {
        for instance in &label.instances {
            let rect = pixel_rect(&instance.bounding_box, width, height);
            draw_hollow_rect_mut(raster, rect, style.color);

            let scale = PxScale::from(style.font_scale);
            let ascent = style.font.as_scaled(scale).ascent().round() as i32;
            let caption_top = rect.top() - CAPTION_OFFSET - ascent;
            draw_text_mut(
                raster,
                style.color,
                rect.left(),
                caption_top,
                scale,
                &style.font,
                &label.name,
            );
        }
    }
}

/// Scales a normalized box to pixels, truncating each component.
///
/// The outline spans `x..=x + width` and `y..=y + height`, so a box of zero
/// size still shows as a single pixel or line.
pub fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Rect {
    let (w, h) = (width as f32, height as f32);
    let x = (bbox.left * w) as i32;
    let y = (bbox.top * h) as i32;
    let rect_width = (bbox.width * w) as u32;
    let rect_height = (bbox.height * h) as u32;
    Rect::at(x, y).of_size(rect_width + 1, rect_height + 1)
}

pub fn encode_jpeg(raster: &RgbImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .encode_image(raster)
        .map_err(PipelineError::Encode)?;
    Ok(encoded)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::detector::Instance;
    use aws_sdk_s3::operation::get_object::GetObjectOutput;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_smithy_mocks::{mock, mock_client};
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let raster = RgbImage::from_pixel(width, height, WHITE);
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(raster)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn label(name: &str, boxes: &[[f32; 4]]) -> Label {
        Label {
            name: name.to_string(),
            confidence: 90.0,
            instances: boxes
                .iter()
                .map(|[left, top, width, height]| Instance {
                    bounding_box: BoundingBox {
                        left: *left,
                        top: *top,
                        width: *width,
                        height: *height,
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn test_pixel_rect_truncates() {
        let rect = pixel_rect(
            &BoundingBox {
                left: 0.339,
                top: 0.5,
                width: 0.259,
                height: 0.25,
            },
            100,
            50,
        );
        assert_eq!((rect.left(), rect.top()), (33, 25));
        assert_eq!((rect.right(), rect.bottom()), (58, 37));
    }

    #[test]
    fn test_pixel_rect_degenerate_box() {
        let rect = pixel_rect(&BoundingBox::default(), 100, 50);
        assert_eq!((rect.left(), rect.top()), (0, 0));
        assert_eq!((rect.right(), rect.bottom()), (0, 0));
    }

    #[test]
    fn test_draw_labels_outlines_each_instance() {
        let mut raster = RgbImage::from_pixel(100, 50, WHITE);
        let labels = [label("Cat", &[[0.1, 0.2, 0.5, 0.4], [0.8, 0.0, 0.1, 0.1]])];
        draw_labels(&mut raster, &labels, &OverlayStyle::bundled().unwrap());

        // first instance: x=10 y=10 w=50 h=20, outline covers 10..=60 x 10..=30
        for (x, y) in [(10, 10), (60, 10), (10, 30), (60, 30), (35, 10), (60, 20), (30, 30)] {
            assert_eq!(*raster.get_pixel(x, y), OVERLAY_COLOR, "edge pixel ({x}, {y})");
        }
        assert_eq!(*raster.get_pixel(35, 20), WHITE);
        assert_eq!(*raster.get_pixel(9, 20), WHITE);
        assert_eq!(*raster.get_pixel(61, 20), WHITE);
        assert_eq!(*raster.get_pixel(35, 31), WHITE);

        // second instance: x=80 y=0 w=10 h=5
        assert_eq!(*raster.get_pixel(80, 0), OVERLAY_COLOR);
        assert_eq!(*raster.get_pixel(90, 5), OVERLAY_COLOR);
        assert_eq!(*raster.get_pixel(91, 3), WHITE);
    }

    #[test]
    fn test_labels_without_instances_draw_nothing() {
        let mut raster = RgbImage::from_pixel(40, 40, WHITE);
        let untouched = raster.clone();
        draw_labels(
            &mut raster,
            &[label("Indoors", &[])],
            &OverlayStyle::bundled().unwrap(),
        );
        assert_eq!(raster, untouched);
    }

    #[test]
    fn test_caption_sits_above_box() {
        let style = OverlayStyle::bundled().unwrap();
        let mut raster = RgbImage::from_pixel(200, 100, WHITE);
        draw_labels(&mut raster, &[label("Cat", &[[0.1, 0.5, 0.5, 0.4]])], &style);

        // box top edge is y=50; caption baseline is y=45
        let caption_pixels = (20..120)
            .flat_map(|x| (20..46).map(move |y| (x, y)))
            .filter(|&(x, y)| *raster.get_pixel(x, y) != WHITE)
            .count();
        assert!(caption_pixels > 20, "caption drew {caption_pixels} pixels");
        let gap_pixels = (21..119)
            .flat_map(|x| (47..50).map(move |y| (x, y)))
            .filter(|&(x, y)| *raster.get_pixel(x, y) != WHITE)
            .count();
        assert_eq!(gap_pixels, 0);
    }

    #[test]
    fn test_render_without_labels_only_reencodes() {
        let source = png_bytes(32, 24);
        let rendered = render_overlay(&source, &[], &OverlayStyle::bundled().unwrap()).unwrap();

        let expected = encode_jpeg(&RgbImage::from_pixel(32, 24, WHITE), 75).unwrap();
        assert_eq!(rendered, expected);
        assert_eq!(
            image::guess_format(&rendered).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_render_rejects_undecodable_bytes() {
        let err = render_overlay(b"definitely not an image", &[], &OverlayStyle::bundled().unwrap())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_load_style_with_missing_font_path() {
        let config = LabelConfig {
            font_path: Some("/nonexistent/font.ttf".into()),
            ..LabelConfig::default()
        };
        assert!(matches!(
            OverlayStyle::load(&config),
            Err(ConfigError::FontRead { .. })
        ));
    }

    #[test]
    fn test_load_style_defaults_to_bundled_font() {
        let style = OverlayStyle::load(&LabelConfig {
            jpeg_quality: 90,
            ..LabelConfig::default()
        })
        .unwrap();
        assert_eq!(style.jpeg_quality, 90);
        assert!(style.font.glyph_id('C').0 != 0);
    }

    #[tokio::test]
    async fn test_fetch_object_reads_body() {
        let get_rule = mock!(aws_sdk_s3::Client::get_object)
            .match_requests(|req| req.bucket() == Some("originals") && req.key() == Some("cat.png"))
            .then_output(|| {
                GetObjectOutput::builder()
                    .body(ByteStream::from_static(b"image bytes"))
                    .build()
            });
        let s3 = mock_client!(aws_sdk_s3, [&get_rule]);
        let object = ObjectRef {
            bucket: "originals".to_string(),
            key: "cat.png".to_string(),
        };

        let bytes = fetch_object(&s3, &object).await.unwrap();
        assert_eq!(bytes, b"image bytes");
        assert_eq!(get_rule.num_calls(), 1);
    }
}
