//! Test helpers shared by the pipeline's unit tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgba};
use imgbatch_core::image_ref::ImageRef;

use crate::error::FetchError;
use crate::fetcher::ImageFetcher;

/// Encode a solid `width` x `height` RGBA PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgba([200u8, 40, 40, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// In-memory fetcher keyed by the raw reference string.
///
/// Unknown references fail as not found. An optional per-reference delay
/// lets tests force out-of-order completion. Concurrent fetches are counted
/// so tests can check the in-flight high-water mark.
#[derive(Default)]
pub struct StubFetcher {
    images: HashMap<String, (Vec<u8>, Duration)>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubFetcher {
    pub fn with(mut self, reference: &str, bytes: Vec<u8>) -> Self {
        self.images
            .insert(reference.to_string(), (bytes, Duration::ZERO));
        self
    }

    pub fn with_delay(mut self, reference: &str, bytes: Vec<u8>, delay: Duration) -> Self {
        self.images.insert(reference.to_string(), (bytes, delay));
        self
    }

    /// Most fetches that were ever running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, reference: &ImageRef) -> Result<Vec<u8>, FetchError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        let key = reference.to_string();
        let result = match self.images.get(&key) {
            Some((bytes, delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(bytes.clone())
            }
            None => Err(FetchError::NotFound(key.into())),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
