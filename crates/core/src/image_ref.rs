//! Image reference classification and output naming.
//!
//! A reference is either a remote URL (`http://` or `https://`) or a path on
//! the local filesystem. Output file names are derived from the reference's
//! extension so the processed file keeps a familiar suffix.

use std::path::{Path, PathBuf};

/// Extension used when a reference carries none.
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Prefix of every processed image file name.
pub const OUTPUT_IMAGE_PREFIX: &str = "compressed";

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A classified image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Remote resource, fetched over HTTP(S).
    Url(String),
    /// File on the local filesystem.
    Local(PathBuf),
}

impl ImageRef {
    /// Classify a raw reference string.
    ///
    /// The scheme check is case-insensitive; anything else is a local path.
    pub fn classify(raw: &str) -> Self {
        if is_url(raw) {
            ImageRef::Url(raw.to_string())
        } else {
            ImageRef::Local(PathBuf::from(raw))
        }
    }

    /// The reference as it appeared in the input.
    pub fn as_display(&self) -> std::borrow::Cow<'_, str> {
        match self {
            ImageRef::Url(url) => std::borrow::Cow::Borrowed(url.as_str()),
            ImageRef::Local(path) => path.to_string_lossy(),
        }
    }

    /// File extension (with leading dot) of the referenced resource, if any.
    ///
    /// For URLs the query string and fragment are ignored.
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            ImageRef::Url(url) => url_last_segment(url)?.to_string(),
            ImageRef::Local(path) => path.file_name()?.to_string_lossy().into_owned(),
        };
        Path::new(&name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_display())
    }
}

/// Whether `raw` starts with an `http://` or `https://` scheme.
pub fn is_url(raw: &str) -> bool {
    let lower = raw.get(..8).unwrap_or(raw).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Last non-empty path segment of a URL, without query or fragment.
fn url_last_segment(url: &str) -> Option<&str> {
    let clean = url.split(['?', '#']).next().unwrap_or(url);
    let rest = clean
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(clean);
    let path = rest.find('/').map(|i| &rest[i..])?;
    path.rsplit('/').find(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Output naming
// ---------------------------------------------------------------------------

/// Build the file name for one processed image.
///
/// `stamp` is a millisecond timestamp, `job` a short job tag, `row` the row's
/// position in the input and `index` the image's position within the row.
/// Together they make the name unique across concurrent jobs and rows.
pub fn output_file_name(
    reference: &ImageRef,
    stamp: i64,
    job: &str,
    row: usize,
    index: usize,
) -> String {
    let ext = reference
        .extension()
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{OUTPUT_IMAGE_PREFIX}-{stamp}-{job}-{row}-{index}{ext}")
}

/// Reduce an uploaded file name to its final component.
///
/// Strips any directory parts (either separator) so the name can be joined
/// onto a storage directory safely. Falls back to `"upload.csv"`.
pub fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .map(str::trim)
        .find(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("upload.csv")
        .to_string()
}
