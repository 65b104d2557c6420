//! The atomic batch writer

use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use batchwrite_config::WriterConfig;
use batchwrite_errors::{Error, Phase, WriteError};
use batchwrite_events::{EventEmitter, EventSender, FailureContext, WriteEvent};
use batchwrite_types::WriteRequest;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::exit::ExitGuard;
use crate::pipeline::{self, PhaseContext};
use crate::registry::TempRegistry;

/// Writes batches of files so that each target shows either its old or its
/// new content, never a partial write.
#[derive(Debug, Clone, Default)]
pub struct AtomicWriter {
    config: WriterConfig,
    events: Option<EventSender>,
}

impl EventEmitter for AtomicWriter {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

/// Held for the duration of a batch. If the batch future is dropped before
/// it finishes, dropping the guard sweeps the registry.
struct BatchGuard {
    registry: &'static TempRegistry,
    armed: bool,
    _exit: ExitGuard,
}

impl BatchGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if self.armed {
            self.registry.sweep();
        }
    }
}

impl AtomicWriter {
    #[must_use]
    pub fn new(config: WriterConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    /// Report progress of every batch on `sender`
    #[must_use]
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    #[must_use]
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Write every request, staging each file to a temp path and renaming it
    /// over its target.
    ///
    /// All targets are resolved before any content is written, and all
    /// contents are staged before any rename happens. Each rename is atomic;
    /// the batch as a whole is not, so targets renamed before a failing
    /// rename keep their new content. Temp files never outlive the call.
    ///
    /// # Errors
    ///
    /// Returns the first `WriteError` raised by any request. The remaining
    /// requests of the failing phase run to completion first, then every
    /// registered temp file is unlinked.
    #[tracing::instrument(
        skip_all,
        fields(batch_id = tracing::field::Empty, files = tracing::field::Empty)
    )]
    pub async fn write_batch<I>(&self, requests: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = WriteRequest>,
    {
        let requests: Vec<WriteRequest> = requests.into_iter().collect();
        let files = requests.len();
        let batch_id = Uuid::new_v4();
        let span = tracing::Span::current();
        span.record("batch_id", tracing::field::display(batch_id));
        span.record("files", files);

        let registry = TempRegistry::global();
        let mut guard = BatchGuard {
            registry,
            armed: true,
            _exit: ExitGuard::acquire(self.config.exit_hook.handle_signals),
        };

        let ctx = Arc::new(PhaseContext {
            batch_id,
            registry,
            location: self.config.staging.temp_location(),
            prefix: self.config.staging.prefix.clone(),
            sync_files: self.config.durability.sync_files,
            events: self.events.clone(),
        });

        let started = Instant::now();
        self.emit(WriteEvent::BatchStarted { batch_id, files });

        match self.run_pipeline(&ctx, requests).await {
            Ok(()) => {
                guard.disarm();
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::debug!(files, duration_ms, "batch committed");
                self.emit(WriteEvent::BatchCompleted {
                    batch_id,
                    files,
                    duration_ms,
                });
                Ok(())
            }
            Err((phase, err)) => {
                let removed = sweep(registry).await;
                guard.disarm();
                tracing::debug!(%phase, error = %err, removed, "batch failed");
                self.emit(WriteEvent::CleanupSwept { removed });
                self.emit(WriteEvent::BatchFailed {
                    batch_id,
                    phase: phase.to_string(),
                    failure: FailureContext::from_error(&err),
                });
                Err(err.into())
            }
        }
    }

    async fn run_pipeline(
        &self,
        ctx: &Arc<PhaseContext>,
        requests: Vec<WriteRequest>,
    ) -> Result<(), (Phase, WriteError)> {
        let resolved = self
            .run_phase(requests, |request| pipeline::resolve(ctx.clone(), request))
            .await
            .map_err(|e| (Phase::Resolve, e))?;

        let staged = self
            .run_phase(resolved, |write| pipeline::stage(ctx.clone(), write))
            .await
            .map_err(|e| (Phase::Stage, e))?;

        let committed = self
            .run_phase(staged, |write| pipeline::commit(ctx.clone(), write))
            .await
            .map_err(|e| (Phase::Commit, e))?;

        if self.config.durability.sync_directories {
            let dirs: BTreeSet<PathBuf> = committed
                .iter()
                .filter_map(|path| path.parent().map(PathBuf::from))
                .collect();
            self.run_phase(dirs.into_iter().collect(), pipeline::sync_directory)
                .await
                .map_err(|e| (Phase::Commit, e))?;
        }

        Ok(())
    }

    /// Run `task` for every item concurrently and wait for all of them.
    ///
    /// Outputs keep the order of `items`. On failure the first error in
    /// completion order is returned, but only after every task has finished.
    async fn run_phase<T, O, F, Fut>(&self, items: Vec<T>, task: F) -> Result<Vec<O>, WriteError>
    where
        T: Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<O, WriteError>> + Send + 'static,
    {
        let limit = self.config.concurrency.max_concurrency;
        let semaphore = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));

        let mut tasks = JoinSet::new();
        for (index, item) in items.into_iter().enumerate() {
            let work = task(item);
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(e) => {
                            return (
                                index,
                                Err(WriteError::Task {
                                    message: format!("semaphore acquire error: {e}"),
                                }),
                            )
                        }
                    },
                    None => None,
                };
                (index, work.await)
            });
        }

        let mut outputs = Vec::with_capacity(tasks.len());
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(output))) => outputs.push((index, output)),
                Ok((_, Err(e))) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(WriteError::Task {
                        message: format!("task join error: {e}"),
                    });
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        outputs.sort_by_key(|(index, _)| *index);
        Ok(outputs.into_iter().map(|(_, output)| output).collect())
    }
}

/// Unlink everything in the registry without blocking the runtime.
async fn sweep(registry: &'static TempRegistry) -> usize {
    match tokio::task::spawn_blocking(move || registry.sweep()).await {
        Ok(removed) => removed,
        Err(e) => {
            tracing::debug!(error = %e, "sweep task failed, sweeping inline");
            registry.sweep()
        }
    }
}

/// Write a batch with the default configuration.
///
/// # Errors
///
/// See [`AtomicWriter::write_batch`].
pub async fn write_batch<I>(requests: I) -> Result<(), Error>
where
    I: IntoIterator<Item = WriteRequest>,
{
    AtomicWriter::default().write_batch(requests).await
}
