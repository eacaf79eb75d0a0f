//! Pure-Rust backend: `image` for resizing, `kamadak-exif` for metadata.
//!
//! Both run on blocking threads since decoding and encoding are CPU-bound.

use async_trait::async_trait;
use exif::{In, Reader, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::{
    parse_raw_metadata, render_raw_line, ExtractedMetadata, ImageTransformer, MetadataExtractor,
    TransformRequest,
};
use crate::error::{PipelineError, PipelineResult};

/// JPEG quality for thumbnail variants.
const THUMBNAIL_QUALITY: u8 = 85;

/// EXIF tags rendered into raw text, with their exiftool labels.
const EXIF_LABELS: &[(Tag, &str)] = &[
    (Tag::Make, "Make"),
    (Tag::Model, "Camera Model Name"),
    (Tag::Software, "Software"),
    (Tag::Artist, "Artist"),
    (Tag::ExposureTime, "Exposure Time"),
    (Tag::FNumber, "F Number"),
    (Tag::ExposureProgram, "Exposure Program"),
    (Tag::PhotographicSensitivity, "ISO"),
    (Tag::DateTimeOriginal, "Date/Time Original"),
    (Tag::DateTimeDigitized, "Create Date"),
    (Tag::LightSource, "Light Source"),
    (Tag::FocalLength, "Focal Length"),
    (Tag::WhiteBalance, "White Balance"),
    (Tag::LensModel, "Lens ID"),
];

/// Resizes images with the `image` crate.
pub struct NativeTransformer {
    jpeg_quality: u8,
}

impl NativeTransformer {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    fn transform_sync(request: &TransformRequest, jpeg_quality: u8) -> PipelineResult<()> {
        let fail = |message: String| PipelineError::Transform {
            path: request.source.clone(),
            message,
        };

        let image = image::open(&request.source).map_err(|e| fail(format!("decode: {e}")))?;
        let resized = resize_for(&image, request);

        if request.is_jpeg() {
            let quality = if request.thumbnail {
                THUMBNAIL_QUALITY
            } else {
                jpeg_quality
            };
            let file = File::create(&request.dest).map_err(|e| PipelineError::io(&request.dest, e))?;
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
            // JPEG has no alpha channel
            DynamicImage::ImageRgb8(resized.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| fail(format!("encode: {e}")))?;
        } else {
            resized
                .save(&request.dest)
                .map_err(|e| fail(format!("encode: {e}")))?;
        }
        Ok(())
    }
}

/// Apply the size policy of a request to a decoded image.
///
/// Square variants fill the box and are centre-cropped (upscaling allowed);
/// other variants fit inside the box and never upscale.
pub(crate) fn resize_for(image: &DynamicImage, request: &TransformRequest) -> DynamicImage {
    let size = request.size_limit;
    if request.square {
        return image.resize_to_fill(size, size, FilterType::Lanczos3);
    }

    let (width, height) = image.dimensions();
    if width <= size && height <= size {
        return image.clone();
    }
    if request.thumbnail {
        image.thumbnail(size, size)
    } else {
        image.resize(size, size, FilterType::Lanczos3)
    }
}

#[async_trait]
impl ImageTransformer for NativeTransformer {
    async fn transform(&self, request: &TransformRequest) -> PipelineResult<()> {
        let owned = request.clone();
        let quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || Self::transform_sync(&owned, quality))
            .await
            .map_err(|e| PipelineError::Transform {
                path: request.source.clone(),
                message: format!("Task join error: {e}"),
            })?
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Reads EXIF with `kamadak-exif` and renders it as exiftool-style raw text.
#[derive(Default)]
pub struct NativeExifExtractor;

impl NativeExifExtractor {
    pub fn new() -> Self {
        Self
    }

    fn raw_text(path: &Path) -> PipelineResult<String> {
        let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let mut raw = String::new();

        if let Ok(format) = ImageFormat::from_path(path) {
            raw.push_str(&render_raw_line("File Type", &format!("{format:?}").to_uppercase()));
        }

        // Images without EXIF are not an error; they just have fewer fields.
        let mut reader = BufReader::new(file);
        let Ok(exif) = Reader::new().read_from_container(&mut reader) else {
            return Ok(raw);
        };

        for (tag, label) in EXIF_LABELS {
            if let Some(field) = exif.get_field(*tag, In::PRIMARY) {
                let value = field.display_value().with_unit(&exif).to_string();
                let value = value.trim_matches('"');
                if !value.is_empty() {
                    raw.push_str(&render_raw_line(label, value));
                }
            }
        }
        Ok(raw)
    }
}

#[async_trait]
impl MetadataExtractor for NativeExifExtractor {
    async fn extract(&self, source: &Path) -> PipelineResult<ExtractedMetadata> {
        let path = source.to_path_buf();
        let raw = tokio::task::spawn_blocking(move || Self::raw_text(&path))
            .await
            .map_err(|e| PipelineError::Metadata {
                path: source.to_path_buf(),
                message: format!("Task join error: {e}"),
            })??;
        Ok(parse_raw_metadata(&raw))
    }

    fn name(&self) -> &'static str {
        "kamadak-exif"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn request(dir: &Path, size: u32, thumbnail: bool, square: bool, name: &str) -> TransformRequest {
        TransformRequest {
            source: dir.join("source.png"),
            dest: dir.join(name),
            size_limit: size,
            thumbnail,
            square,
        }
    }

    fn write_source(dir: &Path, width: u32, height: u32) {
        DynamicImage::new_rgb8(width, height)
            .save(dir.join("source.png"))
            .unwrap();
    }

    #[test]
    fn test_resize_fits_within_box() {
        let img = DynamicImage::new_rgb8(1000, 500);
        let req = request(Path::new("/tmp"), 200, false, false, "200.jpg");
        assert_eq!(resize_for(&img, &req).dimensions(), (200, 100));
    }

    #[test]
    fn test_resize_never_upscales() {
        let img = DynamicImage::new_rgb8(100, 50);
        let req = request(Path::new("/tmp"), 200, true, false, "t.jpg");
        assert_eq!(resize_for(&img, &req).dimensions(), (100, 50));
    }

    #[test]
    fn test_square_fills_and_crops() {
        let img = DynamicImage::new_rgb8(1000, 500);
        let req = request(Path::new("/tmp"), 80, true, true, "80s.jpg");
        assert_eq!(resize_for(&img, &req).dimensions(), (80, 80));
    }

    #[tokio::test]
    async fn test_transform_writes_jpeg() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), 640, 480);
        let req = request(tmp.path(), 64, false, false, "64.jpg");

        NativeTransformer::new(60).transform(&req).await.unwrap();

        let out = image::open(&req.dest).unwrap();
        assert_eq!(out.dimensions(), (64, 48));
        let bytes = std::fs::read(&req.dest).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_transform_undecodable_source_fails() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("source.png"), b"not an image").unwrap();
        let req = request(tmp.path(), 64, false, false, "64.jpg");

        let err = NativeTransformer::new(60).transform(&req).await.unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[tokio::test]
    async fn test_extract_without_exif_reports_file_type() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), 8, 8);

        let meta = NativeExifExtractor::new()
            .extract(&tmp.path().join("source.png"))
            .await
            .unwrap();
        assert_eq!(meta.fields.get("File Type").map(String::as_str), Some("PNG"));
        assert!(meta.tags.is_empty());
    }

    #[tokio::test]
    async fn test_extract_missing_file_fails() {
        let err = NativeExifExtractor::new()
            .extract(&PathBuf::from("/nonexistent/file.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
