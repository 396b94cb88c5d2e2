//! Main processing entry points.
//!
//! [`process_file`] selects a strategy from the global registry and runs it.
//! [`batch_process_files`] fans a list of paths out over a bounded number of
//! concurrent tasks and returns one [`Document`] per input, in input order.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::config::ProcessingOptions;
use crate::core::io;
use crate::plugins::DocumentProcessor;
use crate::plugins::registry::{StrategyRegistry, get_strategy_registry, poisoned};
use crate::types::Document;
use crate::{Result, ThreatdocError};

fn select_strategy(registry: &RwLock<StrategyRegistry>, path: &Path) -> Result<Arc<dyn DocumentProcessor>> {
    let registry = registry.read().map_err(poisoned)?;
    registry.get_strategy(path)
}

/// Process a single file with the best registered strategy.
///
/// # Errors
///
/// - `Validation` for invalid options
/// - `NotFound` when the path does not exist or is not a regular file
/// - `SizeExceeded` when the file is larger than `options.max_file_size_mb`
/// - `UnsupportedFormat` when no strategy accepts the extension
///
/// Any failure after processing begins is recorded on the returned document.
///
/// # Example
///
/// ```rust,no_run
/// use threatdoc::{CancellationToken, ProcessingOptions, process_file};
///
/// # async fn example() -> threatdoc::Result<()> {
/// let document = process_file("report.pdf", &ProcessingOptions::default(), &CancellationToken::new()).await?;
/// println!("{} -> {}", document.file_name, document.tlp);
/// # Ok(())
/// # }
/// ```
pub async fn process_file(
    path: impl AsRef<Path>,
    options: &ProcessingOptions,
    cancel: &CancellationToken,
) -> Result<Document> {
    crate::processors::ensure_initialized()?;
    process_file_with_registry(&get_strategy_registry(), path, options, cancel).await
}

/// Process a single file with a strategy from `registry`.
pub async fn process_file_with_registry(
    registry: &RwLock<StrategyRegistry>,
    path: impl AsRef<Path>,
    options: &ProcessingOptions,
    cancel: &CancellationToken,
) -> Result<Document> {
    let path = path.as_ref();
    options.validate()?;
    io::check_preconditions(path, options.max_file_size_mb).await?;

    let processor = select_strategy(registry, path)?;
    tracing::debug!(path = %path.display(), strategy = processor.name(), "Selected strategy");

    processor.process(path, options, cancel).await
}

/// Process many files concurrently.
///
/// At most `max_concurrent` files (default: twice the CPU count) are in
/// flight at once. Precondition errors do not abort the batch: they come back
/// as `Failed` documents in the corresponding slot.
///
/// # Errors
///
/// Only a panicked task or a poisoned registry aborts the batch.
///
/// # Example
///
/// ```rust,no_run
/// use threatdoc::{CancellationToken, ProcessingOptions, batch_process_files};
///
/// # tokio_test::block_on(async {
/// let paths = vec!["advisory.pdf", "indicators.xlsx", "missing.docx"];
/// let documents = batch_process_files(paths, &ProcessingOptions::default(), Some(4), &CancellationToken::new()).await?;
///
/// for doc in &documents {
///     println!("{}: {:?} {}", doc.file_name, doc.status, doc.tlp);
/// }
/// # Ok::<(), threatdoc::ThreatdocError>(())
/// # });
/// ```
pub async fn batch_process_files(
    paths: Vec<impl AsRef<Path>>,
    options: &ProcessingOptions,
    max_concurrent: Option<usize>,
    cancel: &CancellationToken,
) -> Result<Vec<Document>> {
    crate::processors::ensure_initialized()?;
    batch_process_files_with_registry(get_strategy_registry(), paths, options, max_concurrent, cancel).await
}

/// Batch variant of [`process_file_with_registry`].
pub async fn batch_process_files_with_registry(
    registry: Arc<RwLock<StrategyRegistry>>,
    paths: Vec<impl AsRef<Path>>,
    options: &ProcessingOptions,
    max_concurrent: Option<usize>,
    cancel: &CancellationToken,
) -> Result<Vec<Document>> {
    if paths.is_empty() {
        return Ok(vec![]);
    }

    let options = Arc::new(options.clone());
    let max_concurrent = max_concurrent.unwrap_or_else(|| num_cpus::get() * 2).max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    let mut tasks = JoinSet::new();
    let paths: Vec<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
    let total = paths.len();

    for (index, path) in paths.into_iter().enumerate() {
        let registry = Arc::clone(&registry);
        let options = Arc::clone(&options);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let outcome = match semaphore.acquire().await {
                Ok(_permit) => process_file_with_registry(&registry, &path, &options, &cancel).await,
                Err(_) => Err(ThreatdocError::Cancelled),
            };
            (index, path, outcome)
        });
    }

    let mut results: Vec<Option<Document>> = (0..total).map(|_| None).collect();

    while let Some(task_result) = tasks.join_next().await {
        match task_result {
            Ok((index, _, Ok(document))) => {
                results[index] = Some(document);
            }
            Ok((index, path, Err(err))) => {
                if matches!(err, ThreatdocError::LockPoisoned(_)) {
                    return Err(err);
                }
                tracing::debug!(path = %path.display(), kind = %err.kind(), "Rejected before processing: {}", err);
                results[index] = Some(Document::rejected(&path, &err));
            }
            Err(join_err) => {
                return Err(ThreatdocError::Other(format!("Task panicked: {}", join_err)));
            }
        }
    }

    Ok(results.into_iter().flatten().collect())
}
