//! Subprocess backend: ImageMagick `convert` and `exiftool`.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use super::{parse_raw_metadata, ExtractedMetadata, ImageTransformer, MetadataExtractor, TransformRequest};
use crate::error::{PipelineError, PipelineResult};

/// Resizes images by running ImageMagick's `convert`.
pub struct ImageMagickTransformer {
    convert_bin: String,
    jpeg_quality: u8,
}

impl ImageMagickTransformer {
    pub fn new(convert_bin: impl Into<String>, jpeg_quality: u8) -> Self {
        Self {
            convert_bin: convert_bin.into(),
            jpeg_quality,
        }
    }
}

/// Build the `convert` argument vector for a request.
///
/// Thumbnails use `-thumbnail`; full variants use `-resize`, strip metadata and
/// set the JPEG quality. Square variants fill the box (`^`) and are cropped to
/// it around the centre; other variants only ever shrink (`>`).
pub fn convert_args(request: &TransformRequest, jpeg_quality: u8) -> Vec<String> {
    let size = request.size_limit;
    let geometry = if request.square {
        format!("{size}x{size}^")
    } else {
        format!("{size}x{size}>")
    };

    let mut args = vec![request.source.to_string_lossy().into_owned()];
    if request.thumbnail {
        args.push("-thumbnail".into());
        args.push(geometry);
    } else {
        args.push("-resize".into());
        args.push(geometry);
        args.push("-strip".into());
        if request.is_jpeg() {
            args.push("-quality".into());
            args.push(jpeg_quality.to_string());
        }
    }
    if request.square {
        args.push("-gravity".into());
        args.push("center".into());
        args.push("-extent".into());
        args.push(format!("{size}x{size}"));
    }
    args.push(request.dest.to_string_lossy().into_owned());
    args
}

#[async_trait]
impl ImageTransformer for ImageMagickTransformer {
    async fn transform(&self, request: &TransformRequest) -> PipelineResult<()> {
        let args = convert_args(request, self.jpeg_quality);
        tracing::trace!("{} {}", self.convert_bin, args.join(" "));

        let output = Command::new(&self.convert_bin)
            .args(&args)
            .output()
            .await
            .map_err(|e| PipelineError::Transform {
                path: request.source.clone(),
                message: format!("failed to run {}: {e}", self.convert_bin),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Transform {
                path: request.source.clone(),
                message: format!(
                    "{} exited with {}: {}",
                    self.convert_bin,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "imagemagick"
    }
}

/// Reads metadata by running `exiftool <file>` and keeping its stdout as raw text.
pub struct ExifToolExtractor {
    exiftool_bin: String,
}

impl ExifToolExtractor {
    pub fn new(exiftool_bin: impl Into<String>) -> Self {
        Self {
            exiftool_bin: exiftool_bin.into(),
        }
    }
}

#[async_trait]
impl MetadataExtractor for ExifToolExtractor {
    async fn extract(&self, source: &Path) -> PipelineResult<ExtractedMetadata> {
        let output = Command::new(&self.exiftool_bin)
            .arg(source)
            .output()
            .await
            .map_err(|e| PipelineError::Metadata {
                path: source.to_path_buf(),
                message: format!("failed to run {}: {e}", self.exiftool_bin),
            })?;

        if !output.status.success() {
            return Err(PipelineError::Metadata {
                path: source.to_path_buf(),
                message: format!(
                    "{} exited with {}: {}",
                    self.exiftool_bin,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let raw = String::from_utf8(output.stdout).map_err(|e| PipelineError::Metadata {
            path: source.to_path_buf(),
            message: format!("output is not UTF-8: {e}"),
        })?;
        Ok(parse_raw_metadata(&raw))
    }

    fn name(&self) -> &'static str {
        "exiftool"
    }
}
