//! Batch engine: job admission, row streaming, aggregation and output.
//!
//! ```text
//! submit ──► register (processing) ──► stream rows ──► spawn RowProcessor per row
//!                                          │
//!                              end of table │
//!                                          ▼
//!                       await all rows ──► sort by row position ──► write table
//!                                                                      │
//!                                          finalize (completed | error) ◄┘
//! ```
//!
//! The input table is read on the blocking pool and handed over row by row
//! through a bounded channel, so image work starts while the table is still
//! being read. Admitted jobs always run to completion.

use std::io::{BufWriter, Read};
use std::path::PathBuf;
use std::sync::Arc;

use imgbatch_core::image_ref::sanitize_file_name;
use imgbatch_core::job::JobStatus;
use imgbatch_core::registry::JobRegistry;
use imgbatch_core::table::{write_table, InputRow, RowResult, TableError, TableReader};
use imgbatch_core::types::JobId;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::PipelineConfig;
use crate::error::EngineError;
use crate::fetcher::ImageFetcher;
use crate::row::RowProcessor;
use crate::transformer::ImageTransformer;

/// Rows buffered between the table reader and the dispatcher.
const ROW_CHANNEL_CAPACITY: usize = 64;

/// Prefix of every output table file name.
pub const OUTPUT_TABLE_PREFIX: &str = "processed";

/// Counters gathered while a job runs, logged when it finishes.
#[derive(Debug, Default, Clone, Copy)]
struct JobStats {
    rows: usize,
    skipped: usize,
    images: usize,
    failed_images: usize,
}

/// Drives batch jobs from admission to their terminal state.
///
/// Cheap to clone; all state is behind `Arc`.
#[derive(Clone)]
pub struct BatchEngine {
    registry: Arc<JobRegistry>,
    processor: Arc<RowProcessor>,
    tables_dir: PathBuf,
}

impl BatchEngine {
    pub fn new(
        config: &PipelineConfig,
        registry: Arc<JobRegistry>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let processor = RowProcessor::new(
            fetcher,
            ImageTransformer::from_config(config),
            config.images_dir.clone(),
            config.image_concurrency,
        );
        Self {
            registry,
            processor: Arc::new(processor),
            tables_dir: config.tables_dir.clone(),
        }
    }

    /// The registry this engine reports into.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Admit a job and start processing it in the background.
    ///
    /// Returns the job handle as soon as the job is registered; `input` is
    /// consumed on the blocking pool. `original_name` names the output table.
    pub async fn submit<R>(&self, input: R, original_name: &str) -> Result<JobId, EngineError>
    where
        R: Read + Send + 'static,
    {
        let id = uuid::Uuid::new_v4();
        let name = sanitize_file_name(original_name);
        self.registry.register(id, &name).await?;
        tracing::info!(job_id = %id, original_name = %name, "Job admitted");

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(id, input, name).await;
        });

        Ok(id)
    }

    /// Run a job to completion and record its terminal state.
    async fn run<R>(self, id: JobId, input: R, name: String)
    where
        R: Read + Send + 'static,
    {
        let (status, output) = match self.process(id, input, &name).await {
            Ok(Some(path)) => (JobStatus::Completed, Some(path)),
            Ok(None) => {
                tracing::warn!(job_id = %id, "No valid rows in input table");
                (JobStatus::Error, None)
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Job failed");
                (JobStatus::Error, None)
            }
        };

        match self.registry.finalize(id, status, output).await {
            Ok(job) => tracing::info!(
                job_id = %id,
                status = %job.status,
                output = ?job.output_path,
                "Job finished",
            ),
            Err(e) => tracing::error!(job_id = %id, error = %e, "Failed to finalize job"),
        }
    }

    /// Stream, fan out, aggregate and write. `Ok(None)` means no row
    /// produced a result.
    async fn process<R>(
        &self,
        id: JobId,
        input: R,
        name: &str,
    ) -> Result<Option<PathBuf>, EngineError>
    where
        R: Read + Send + 'static,
    {
        let job_tag = job_tag(id);
        let (tx, mut rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let reader = tokio::task::spawn_blocking(move || stream_rows(input, tx));

        let mut stats = JobStats::default();
        let mut fatal: Option<EngineError> = None;
        let mut rows = JoinSet::new();

        while let Some(item) = rx.recv().await {
            match item {
                Ok(row) => {
                    stats.rows += 1;
                    let processor = Arc::clone(&self.processor);
                    let tag = job_tag.clone();
                    rows.spawn(async move { processor.process(&tag, row).await });
                }
                Err(TableError::Row(e)) => {
                    stats.skipped += 1;
                    tracing::warn!(job_id = %id, error = %e, "Skipping row");
                }
                Err(e @ TableError::Read(_)) => {
                    fatal = Some(e.into());
                }
            }
        }
        if let Err(e) = reader.await {
            fatal.get_or_insert(e.into());
        }

        // Everything already dispatched runs to completion, even on failure.
        let mut results: Vec<RowResult> = Vec::with_capacity(stats.rows);
        while let Some(joined) = rows.join_next().await {
            match joined {
                Ok(result) => {
                    stats.images += result.outputs.len();
                    stats.failed_images += result.outputs.iter().filter(|o| !o.is_processed()).count();
                    results.push(result);
                }
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "Row task failed");
                    fatal.get_or_insert(e.into());
                }
            }
        }

        tracing::info!(
            job_id = %id,
            rows = stats.rows,
            skipped = stats.skipped,
            images = stats.images,
            failed_images = stats.failed_images,
            "All rows processed",
        );

        if let Some(e) = fatal {
            return Err(e);
        }
        if results.is_empty() {
            return Ok(None);
        }

        results.sort_by_key(|r| r.ordinal);
        let path = self.tables_dir.join(output_table_name(id, name));
        write_output_table(path.clone(), results).await?;
        Ok(Some(path))
    }
}

/// Read the table and forward each row to the dispatcher.
///
/// Stops early if the receiver is gone.
fn stream_rows<R: Read>(input: R, tx: mpsc::Sender<Result<InputRow, TableError>>) {
    let reader = match TableReader::new(input) {
        Ok(reader) => reader,
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
            return;
        }
    };

    for item in reader {
        if tx.blocking_send(item).is_err() {
            return;
        }
    }
}

/// Render `results` to `path` on the blocking pool.
async fn write_output_table(path: PathBuf, results: Vec<RowResult>) -> Result<(), EngineError> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::create(&path).map_err(|e| EngineError::WriteTable {
            path: path.clone(),
            source: e.into(),
        })?;
        write_table(BufWriter::new(file), &results)
            .map_err(|source| EngineError::WriteTable { path, source })
    })
    .await?
}

/// Short, file-name-safe tag derived from a job handle.
fn job_tag(id: JobId) -> String {
    id.simple().to_string()[..8].to_string()
}

/// File name of the output table for job `id`.
pub fn output_table_name(id: JobId, original_name: &str) -> String {
    format!("{OUTPUT_TABLE_PREFIX}-{id}-{}", sanitize_file_name(original_name))
}
