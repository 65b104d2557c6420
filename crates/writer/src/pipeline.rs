//! Per-request steps of the resolve → stage → commit pipeline
//!
//! Each function handles one file. `AtomicWriter` runs a step for every
//! request concurrently and waits for all of them before starting the next.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use batchwrite_config::TempLocation;
use batchwrite_errors::WriteError;
use batchwrite_events::{EventEmitter, EventSender, WriteEvent};
use batchwrite_types::{Encoding, FileContents, Ownership, WriteRequest};
use tokio::fs;
use uuid::Uuid;

use crate::registry::TempRegistry;
use crate::staging::{staging_dir, temp_path_in};

/// Settings and handles shared by every task of one batch.
pub(crate) struct PhaseContext {
    pub batch_id: Uuid,
    pub registry: &'static TempRegistry,
    pub location: TempLocation,
    pub prefix: String,
    pub sync_files: bool,
    pub events: Option<EventSender>,
}

impl EventEmitter for PhaseContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

/// A request after symlink resolution and metadata inheritance.
#[derive(Debug)]
pub(crate) struct ResolvedWrite {
    /// Absolute form of the path the caller asked for
    pub target: PathBuf,
    pub temp_path: PathBuf,
    pub resolved_path: PathBuf,
    pub contents: FileContents,
    pub encoding: Encoding,
    pub mode: Option<u32>,
    pub ownership: Option<Ownership>,
}

pub(crate) async fn resolve(
    ctx: Arc<PhaseContext>,
    request: WriteRequest,
) -> Result<ResolvedWrite, WriteError> {
    let encoding = request.effective_encoding();
    let WriteRequest {
        path,
        contents,
        mode,
        ownership,
        ..
    } = request;

    let target = std::path::absolute(&path).map_err(|e| WriteError::resolve(&path, e))?;

    // A missing file is written at the path as given.
    let resolved_path = match fs::canonicalize(&target).await {
        Ok(real) => real,
        Err(e) if e.kind() == io::ErrorKind::NotFound => target.clone(),
        Err(e) => return Err(WriteError::resolve(&target, e)),
    };

    let mut mode = mode;
    let mut ownership = ownership;
    let mut inherited_mode = None;
    if mode.is_none() || ownership.is_none() {
        match fs::metadata(&resolved_path).await {
            Ok(metadata) => {
                let (existing_mode, existing_owner) = existing_attributes(&metadata);
                if mode.is_none() {
                    mode = existing_mode;
                    inherited_mode = existing_mode;
                }
                if ownership.is_none() {
                    ownership = existing_owner;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(WriteError::metadata(&resolved_path, e)),
        }
    }

    let dir = staging_dir(&ctx.location, &resolved_path)
        .map_err(|e| WriteError::resolve(&resolved_path, e))?;
    let temp_path = temp_path_in(&dir, &ctx.prefix);
    ctx.registry.register(temp_path.clone());

    tracing::trace!(
        target_path = %target.display(),
        resolved = %resolved_path.display(),
        temp_path = %temp_path.display(),
        "resolved write"
    );
    ctx.emit(WriteEvent::FileResolved {
        batch_id: ctx.batch_id,
        target: target.clone(),
        resolved: resolved_path.clone(),
        inherited_mode,
    });

    Ok(ResolvedWrite {
        target,
        temp_path,
        resolved_path,
        contents,
        encoding,
        mode,
        ownership,
    })
}

#[cfg(unix)]
fn existing_attributes(metadata: &std::fs::Metadata) -> (Option<u32>, Option<Ownership>) {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    (
        Some(metadata.permissions().mode() & batchwrite_types::PERMISSION_MASK),
        Some(Ownership::new(metadata.uid(), metadata.gid())),
    )
}

#[cfg(not(unix))]
fn existing_attributes(_metadata: &std::fs::Metadata) -> (Option<u32>, Option<Ownership>) {
    (None, None)
}

pub(crate) async fn stage(
    ctx: Arc<PhaseContext>,
    write: ResolvedWrite,
) -> Result<ResolvedWrite, WriteError> {
    // A blocking task runs to completion even when the batch is dropped, so
    // the registry check inside `write_temp_file` always sees the file.
    let registry = ctx.registry;
    let sync_files = ctx.sync_files;
    let (write, staged) = tokio::task::spawn_blocking(move || {
        let staged = write_temp_file(&write, registry, sync_files);
        (write, staged)
    })
    .await
    .map_err(|e| WriteError::Task {
        message: format!("stage task failed: {e}"),
    })?;
    let staged = staged?;

    tracing::trace!(
        target_path = %write.target.display(),
        bytes = staged,
        "staged write"
    );
    ctx.emit(WriteEvent::FileStaged {
        batch_id: ctx.batch_id,
        target: write.target.clone(),
        bytes: staged,
    });

    Ok(write)
}

/// Create the temp file and fill it. Returns the number of bytes written.
fn write_temp_file(
    write: &ResolvedWrite,
    registry: &TempRegistry,
    sync_files: bool,
) -> Result<u64, WriteError> {
    let bytes = write.contents.encode(write.encoding, &write.target)?;
    let stage_error = |e: io::Error| WriteError::stage(&write.target, &write.temp_path, e);

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    if let Some(mode) = write.mode {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    let mut file = options.open(&write.temp_path).map_err(stage_error)?;

    // Swept while the file was being created: nobody else will unlink it.
    if !registry.contains(&write.temp_path) {
        drop(file);
        if let Err(e) = std::fs::remove_file(&write.temp_path) {
            tracing::debug!(temp_path = %write.temp_path.display(), error = %e, "temp file not removed");
        }
        return Err(WriteError::Task {
            message: format!("{} was cleaned up while staging", write.temp_path.display()),
        });
    }

    file.write_all(&bytes).map_err(stage_error)?;

    // chown clears setuid and setgid, so ownership goes first. The creation
    // mode is filtered by the umask; set the exact bits afterwards.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Some(owner) = write.ownership {
            std::os::unix::fs::fchown(&file, Some(owner.uid), Some(owner.gid)).map_err(|e| {
                WriteError::ownership(&write.target, &write.temp_path, owner.uid, owner.gid, e)
            })?;
        }
        if let Some(mode) = write.mode {
            file.set_permissions(std::fs::Permissions::from_mode(mode))
                .map_err(stage_error)?;
        }
    }

    if sync_files {
        file.sync_all().map_err(stage_error)?;
    }

    Ok(u64::try_from(bytes.len()).unwrap_or(u64::MAX))
}

pub(crate) async fn commit(
    ctx: Arc<PhaseContext>,
    write: ResolvedWrite,
) -> Result<PathBuf, WriteError> {
    fs::rename(&write.temp_path, &write.resolved_path)
        .await
        .map_err(|e| WriteError::commit(&write.temp_path, &write.resolved_path, e))?;
    ctx.registry.unregister(&write.temp_path);

    tracing::trace!(
        target_path = %write.target.display(),
        resolved = %write.resolved_path.display(),
        "committed write"
    );
    ctx.emit(WriteEvent::FileCommitted {
        batch_id: ctx.batch_id,
        target: write.target,
    });

    Ok(write.resolved_path)
}

/// fsync a directory so the renames inside it survive a crash.
#[cfg(unix)]
pub(crate) async fn sync_directory(dir: PathBuf) -> Result<(), WriteError> {
    let handle = fs::File::open(&dir)
        .await
        .map_err(|e| WriteError::sync(&dir, e))?;
    handle.sync_all().await.map_err(|e| WriteError::sync(&dir, e))
}

#[cfg(not(unix))]
pub(crate) async fn sync_directory(_dir: PathBuf) -> Result<(), WriteError> {
    Ok(())
}
