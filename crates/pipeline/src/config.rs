use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default width (in pixels) every processed image is scaled to.
pub const DEFAULT_TARGET_WIDTH: u32 = 500;

/// Default JPEG quality factor (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 60;

/// Default timeout for a single remote image download.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Pipeline configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where processed images are written (default: `compressed_images`).
    pub images_dir: PathBuf,
    /// Where output tables are written (default: `processed_files`).
    pub tables_dir: PathBuf,
    /// Width every image is resized to, aspect ratio preserved.
    pub target_width: u32,
    /// JPEG quality factor used when re-encoding.
    pub jpeg_quality: u8,
    /// Timeout for one remote download, in seconds.
    pub fetch_timeout_secs: u64,
    /// Upper bound on images in flight across all jobs. `None` means
    /// every image is dispatched as soon as its row is read.
    pub image_concurrency: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("compressed_images"),
            tables_dir: PathBuf::from("processed_files"),
            target_width: DEFAULT_TARGET_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            image_concurrency: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default             |
    /// |----------------------|---------------------|
    /// | `IMAGES_DIR`         | `compressed_images` |
    /// | `TABLES_DIR`         | `processed_files`   |
    /// | `TARGET_WIDTH`       | `500`               |
    /// | `JPEG_QUALITY`       | `60`                |
    /// | `FETCH_TIMEOUT_SECS` | `30`                |
    /// | `IMAGE_CONCURRENCY`  | unset (unbounded)   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    ///
    /// Unset variables take their defaults; malformed or out-of-range values
    /// are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let images_dir = lookup("IMAGES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.images_dir);

        let tables_dir = lookup("TABLES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.tables_dir);

        let target_width = parse_var(&lookup, "TARGET_WIDTH", "a positive integer", |v: &u32| {
            *v > 0
        })?
        .unwrap_or(defaults.target_width);

        let jpeg_quality = parse_var(
            &lookup,
            "JPEG_QUALITY",
            "an integer between 1 and 100",
            |v: &u8| (1..=100).contains(v),
        )?
        .unwrap_or(defaults.jpeg_quality);

        let fetch_timeout_secs = parse_var(
            &lookup,
            "FETCH_TIMEOUT_SECS",
            "a whole number of seconds",
            |_: &u64| true,
        )?
        .unwrap_or(defaults.fetch_timeout_secs);

        let image_concurrency = parse_var(
            &lookup,
            "IMAGE_CONCURRENCY",
            "a positive integer",
            |v: &usize| *v > 0,
        )?;

        Ok(Self {
            images_dir,
            tables_dir,
            target_width,
            jpeg_quality,
            fetch_timeout_secs,
            image_concurrency,
        })
    }

    /// Create the image and table directories if they do not exist yet.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.images_dir).await?;
        tokio::fs::create_dir_all(&self.tables_dir).await?;
        Ok(())
    }
}

/// Parse `var` if set. `None` when unset.
fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    expected: &'static str,
    valid: impl Fn(&T) -> bool,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => Ok(Some(value)),
        _ => Err(ConfigError {
            var,
            value: raw,
            expected,
        }),
    }
}
