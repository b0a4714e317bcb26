//! Fixed resize + recompress transform.
//!
//! Every image is scaled to a target width (aspect ratio preserved) and
//! re-encoded as JPEG at a fixed quality. Decoding and encoding are CPU
//! bound, so the async entry point runs on the blocking thread pool.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::config::PipelineConfig;
use crate::error::TransformError;

/// Largest output image accepted, in pixels (16383 x 16383).
///
/// Extreme aspect ratios can turn a tiny source into a huge resized buffer;
/// anything above this is rejected before allocation.
pub const MAX_OUTPUT_PIXELS: u64 = 16_383 * 16_383;

/// Resizes images to a fixed width and writes them as JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransformer {
    target_width: u32,
    quality: u8,
}

impl ImageTransformer {
    pub fn new(target_width: u32, quality: u8) -> Self {
        Self {
            target_width: target_width.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.target_width, config.jpeg_quality)
    }

    /// Output dimensions for a `width` x `height` source.
    ///
    /// Width is always the target width; height is scaled proportionally
    /// and rounded, never below 1.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let width = u64::from(width.max(1));
        let scaled = (u64::from(height) * u64::from(self.target_width) + width / 2) / width;
        let height = u32::try_from(scaled).unwrap_or(u32::MAX).max(1);
        (self.target_width, height)
    }

    /// Decode `bytes`, resize, and write the JPEG result to `output`.
    pub fn transform(&self, bytes: &[u8], output: &Path) -> Result<(), TransformError> {
        let source = image::load_from_memory(bytes).map_err(TransformError::Decode)?;
        let resized = self.resize(&source)?;

        let file = std::fs::File::create(output).map_err(|source| TransformError::Write {
            path: output.to_path_buf(),
            source,
        })?;

        if let Err(err) = self.encode(&resized, file, output) {
            let _ = std::fs::remove_file(output);
            return Err(err);
        }
        Ok(())
    }

    /// Run [`transform`](Self::transform) on the blocking pool.
    ///
    /// Returns the output path on success.
    pub async fn transform_blocking(
        self,
        bytes: Vec<u8>,
        output: PathBuf,
    ) -> Result<PathBuf, TransformError> {
        tokio::task::spawn_blocking(move || {
            self.transform(&bytes, &output)?;
            Ok(output)
        })
        .await?
    }

    fn resize(&self, source: &DynamicImage) -> Result<DynamicImage, TransformError> {
        let (width, height) = self.target_dimensions(source.width(), source.height());
        if u64::from(width) * u64::from(height) > MAX_OUTPUT_PIXELS {
            return Err(TransformError::TooLarge { width, height });
        }
        if (width, height) == (source.width(), source.height()) {
            return Ok(source.clone());
        }
        Ok(source.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        file: std::fs::File,
        output: &Path,
    ) -> Result<(), TransformError> {
        let mut writer = BufWriter::new(file);

        // JPEG has no alpha channel.
        let rgb = image.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(&mut writer, self.quality);
        rgb.write_with_encoder(encoder)
            .map_err(TransformError::Encode)?;

        writer.flush().map_err(|source| TransformError::Write {
            path: output.to_path_buf(),
            source,
        })
    }
}
