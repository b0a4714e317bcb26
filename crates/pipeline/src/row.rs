//! Per-row fan-out.
//!
//! [`RowProcessor`] runs fetch-then-transform for every image of a row
//! concurrently and collapses the outcomes into a [`RowResult`]. Outcomes are
//! placed by index, so the output list lines up with the input list no
//! matter which image finishes first.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use imgbatch_core::image_ref::{output_file_name, ImageRef};
use imgbatch_core::table::{ImageOutcome, InputRow, RowResult};
use tokio::sync::Semaphore;

use crate::error::ImageError;
use crate::fetcher::ImageFetcher;
use crate::transformer::ImageTransformer;

/// Processes the images of one row.
///
/// Shared between all rows of all jobs; cheap to wrap in `Arc`.
pub struct RowProcessor {
    fetcher: Arc<dyn ImageFetcher>,
    transformer: ImageTransformer,
    images_dir: PathBuf,
    /// Global bound on images in flight, when configured.
    gate: Option<Arc<Semaphore>>,
}

impl RowProcessor {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        transformer: ImageTransformer,
        images_dir: PathBuf,
        image_concurrency: Option<usize>,
    ) -> Self {
        Self {
            fetcher,
            transformer,
            images_dir,
            gate: image_concurrency.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    /// Process every image of `row`. Never fails: per-image errors are
    /// logged and recorded as [`ImageOutcome::Failed`].
    ///
    /// `job_tag` is folded into output file names to keep them unique
    /// across jobs.
    pub async fn process(&self, job_tag: &str, row: InputRow) -> RowResult {
        let stamp = chrono::Utc::now().timestamp_millis();
        let ordinal = row.ordinal;

        let stages = row.image_refs.iter().enumerate().map(|(index, raw)| {
            let reference = ImageRef::classify(raw);
            let output = self.images_dir.join(output_file_name(
                &reference,
                stamp,
                job_tag,
                ordinal,
                index,
            ));
            async move {
                match self.process_image(&reference, output).await {
                    Ok(path) => ImageOutcome::Processed(path),
                    Err(e) => {
                        tracing::warn!(
                            job = job_tag,
                            row = ordinal,
                            reference = %reference,
                            error = %e,
                            "Error processing image",
                        );
                        ImageOutcome::Failed
                    }
                }
            }
        });

        let outputs = join_all(stages).await;

        let processed = outputs.iter().filter(|o| o.is_processed()).count();
        tracing::debug!(
            job = job_tag,
            row = ordinal,
            processed,
            failed = outputs.len() - processed,
            "Row processed",
        );

        RowResult {
            ordinal: row.ordinal,
            sequence: row.sequence,
            product_name: row.product_name,
            input_refs: row.image_refs,
            outputs,
        }
    }

    /// Fetch one image and write its transformed version to `output`.
    async fn process_image(
        &self,
        reference: &ImageRef,
        output: PathBuf,
    ) -> Result<PathBuf, ImageError> {
        // A closed semaphore only means the gate is gone; carry on ungated.
        let _permit = match &self.gate {
            Some(gate) => gate.acquire().await.ok(),
            None => None,
        };

        let bytes = self.fetcher.fetch(reference).await?;
        let path = self.transformer.transform_blocking(bytes, output).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use imgbatch_core::table::IMAGE_ERROR_SENTINEL;

    use super::*;
    use crate::testing::{png_bytes, StubFetcher};

    fn row(refs: &[&str]) -> InputRow {
        InputRow {
            ordinal: 4,
            sequence: "1".into(),
            product_name: "Widget".into(),
            image_refs: refs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn processor(fetcher: StubFetcher, dir: &std::path::Path, gate: Option<usize>) -> RowProcessor {
        RowProcessor::new(
            Arc::new(fetcher),
            ImageTransformer::new(50, 60),
            dir.to_path_buf(),
            gate,
        )
    }

    #[tokio::test]
    async fn failed_image_keeps_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default().with("https://x/a.png", png_bytes(100, 40));
        let processor = processor(fetcher, dir.path(), None);

        let result = processor
            .process("job1", row(&["https://x/a.png", "https://x/missing.png"]))
            .await;

        assert_eq!(result.outputs.len(), 2);
        assert_eq!(result.input_refs, vec!["https://x/a.png", "https://x/missing.png"]);
        match &result.outputs[0] {
            ImageOutcome::Processed(path) => {
                assert!(path.starts_with(dir.path()));
                assert!(path.exists());
                assert!(path.to_string_lossy().ends_with("-job1-4-0.png"));
            }
            other => panic!("expected processed image, got {other:?}"),
        }
        assert_eq!(result.outputs[1], ImageOutcome::Failed);
        assert_eq!(result.outputs[1].render(), IMAGE_ERROR_SENTINEL);
    }

    #[tokio::test]
    async fn order_is_preserved_when_completion_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default()
            .with_delay("slow.png", png_bytes(10, 10), Duration::from_millis(150))
            .with("fast.png", png_bytes(10, 10))
            .with_delay("medium.png", png_bytes(10, 10), Duration::from_millis(50));
        let processor = processor(fetcher, dir.path(), None);

        let result = processor
            .process("job2", row(&["slow.png", "fast.png", "medium.png"]))
            .await;

        let names: Vec<String> = result.outputs.iter().map(ImageOutcome::render).collect();
        assert!(names[0].ends_with("-4-0.png"), "{names:?}");
        assert!(names[1].ends_with("-4-1.png"), "{names:?}");
        assert!(names[2].ends_with("-4-2.png"), "{names:?}");
    }

    #[tokio::test]
    async fn every_image_failing_still_yields_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = StubFetcher::default().with("garbage.png", b"not an image".to_vec());
        let processor = processor(fetcher, dir.path(), None);

        let result = processor.process("job3", row(&["garbage.png", "gone.png"])).await;

        assert_eq!(result.outputs, vec![ImageOutcome::Failed, ImageOutcome::Failed]);
        assert_eq!(result.sequence, "1");
        assert_eq!(result.product_name, "Widget");
    }

    #[tokio::test]
    async fn gate_bounds_images_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let delay = Duration::from_millis(40);
        let refs = ["a.png", "b.png", "c.png", "d.png", "e.png"];
        let fetcher = Arc::new(refs.iter().fold(StubFetcher::default(), |f, r| {
            f.with_delay(r, png_bytes(10, 10), delay)
        }));
        let processor = RowProcessor::new(
            fetcher.clone(),
            ImageTransformer::new(50, 60),
            dir.path().to_path_buf(),
            Some(2),
        );

        let result = processor.process("job4", row(&refs)).await;

        assert!(result.outputs.iter().all(ImageOutcome::is_processed));
        assert_eq!(fetcher.peak_in_flight(), 2);
    }

    #[tokio::test]
    async fn ungated_processor_fetches_all_images_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let delay = Duration::from_millis(40);
        let refs = ["a.png", "b.png", "c.png", "d.png"];
        let fetcher = Arc::new(refs.iter().fold(StubFetcher::default(), |f, r| {
            f.with_delay(r, png_bytes(10, 10), delay)
        }));
        let processor = RowProcessor::new(
            fetcher.clone(),
            ImageTransformer::new(50, 60),
            dir.path().to_path_buf(),
            None,
        );

        processor.process("job5", row(&refs)).await;

        assert_eq!(fetcher.peak_in_flight(), refs.len());
    }
}
