//! On-disk persistence for an [`IndexSnapshot`].
//!
//! Each saved snapshot lives in its own build directory, and a `CURRENT`
//! file names the build that [`load`] reads:
//!
//! ```text
//! vector_db/
//!   CURRENT                  build id of the published snapshot
//!   <build_id>/vectors.idx   16-byte build id, then the FlatL2Index encoding
//!   <build_id>/chunks.json   { build_id, dimension, chunks }
//! ```
//!
//! [`save`] writes both files into `<build_id>.tmp/`, renames that to
//! `<build_id>/`, and only then swaps `CURRENT` with a single rename. A save
//! that fails at any step leaves `CURRENT` and the build it names untouched.
//! Superseded build directories are removed after the swap.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::document::Chunk;
use crate::error::{RagError, Result};
use crate::index::{FlatL2Index, VectorIndex};
use crate::snapshot::IndexSnapshot;

pub const VECTORS_FILE: &str = "vectors.idx";
pub const CHUNKS_FILE: &str = "chunks.json";
pub const CURRENT_FILE: &str = "CURRENT";

#[derive(Serialize)]
struct ChunksFileRef<'a> {
    build_id: Uuid,
    dimension: usize,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
struct ChunksFile {
    build_id: Uuid,
    dimension: usize,
    chunks: Vec<Chunk>,
}

fn persistence_error(path: &Path, message: impl std::fmt::Display) -> RagError {
    RagError::Persistence { path: path.display().to_string(), message: message.to_string() }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Directory holding the files of build `build_id` under `dir`.
pub fn build_dir(dir: &Path, build_id: Uuid) -> PathBuf {
    dir.join(build_id.to_string())
}

fn write_vectors(path: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    let file = File::create(path).map_err(|e| persistence_error(path, e))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(snapshot.build_id().as_bytes()).map_err(|e| persistence_error(path, e))?;
    snapshot.index().persist(&mut writer)?;
    let file = writer.into_inner().map_err(|e| persistence_error(path, e.error()))?;
    file.sync_all().map_err(|e| persistence_error(path, e))?;
    Ok(())
}

fn write_chunks(path: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    let file = File::create(path).map_err(|e| persistence_error(path, e))?;
    let mut writer = BufWriter::new(file);
    let body = ChunksFileRef {
        build_id: snapshot.build_id(),
        dimension: snapshot.dimension(),
        chunks: snapshot.chunks(),
    };
    serde_json::to_writer(&mut writer, &body)?;
    let file = writer.into_inner().map_err(|e| persistence_error(path, e.error()))?;
    file.sync_all().map_err(|e| persistence_error(path, e))?;
    Ok(())
}

fn write_current(dir: &Path, build_id: Uuid) -> Result<()> {
    let path = dir.join(CURRENT_FILE);
    let tmp = tmp_path(&path);
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(build_id.to_string().as_bytes())?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, &path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(persistence_error(&path, e));
    }
    Ok(())
}

/// Write both files of `snapshot` into a fresh `<build_id>/` directory.
fn stage(dir: &Path, snapshot: &IndexSnapshot) -> Result<PathBuf> {
    let target = build_dir(dir, snapshot.build_id());
    let staging = tmp_path(&target);
    fs::create_dir_all(&staging).map_err(|e| persistence_error(&staging, e))?;

    let written = write_vectors(&staging.join(VECTORS_FILE), snapshot)
        .and_then(|()| write_chunks(&staging.join(CHUNKS_FILE), snapshot))
        .and_then(|()| fs::rename(&staging, &target).map_err(|e| persistence_error(&target, e)));
    if let Err(e) = written {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }
    Ok(target)
}

/// Remove build directories other than `keep`.
fn prune(dir: &Path, keep: Uuid) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let stem = name.strip_suffix(".tmp").unwrap_or(&*name);
        let Ok(id) = Uuid::parse_str(stem) else {
            continue;
        };
        if id == keep || !path.is_dir() {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => debug!(path = %path.display(), "removed superseded build"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove old build"),
        }
    }
}

/// Write `snapshot` into `dir` and publish it as the current snapshot.
///
/// # Errors
///
/// Returns [`RagError::Persistence`] if any file cannot be written. The
/// previously published snapshot stays current and loadable on failure.
pub fn save(dir: impl AsRef<Path>, snapshot: &IndexSnapshot) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| persistence_error(dir, e))?;

    let target = stage(dir, snapshot).inspect_err(|e| {
        error!(dir = %dir.display(), error = %e, "failed to write index; discarding partial files");
    })?;
    if let Err(e) = write_current(dir, snapshot.build_id()) {
        error!(dir = %dir.display(), error = %e, "failed to publish index; keeping previous");
        let _ = fs::remove_dir_all(&target);
        return Err(e);
    }
    prune(dir, snapshot.build_id());

    info!(
        dir = %dir.display(),
        rows = snapshot.len(),
        dimension = snapshot.dimension(),
        build_id = %snapshot.build_id(),
        "saved index"
    );
    Ok(())
}

/// Build id named by `dir/CURRENT`.
pub fn current_build(dir: impl AsRef<Path>) -> Result<Uuid> {
    let path = dir.as_ref().join(CURRENT_FILE);
    let content = fs::read_to_string(&path).map_err(|e| persistence_error(&path, e))?;
    Uuid::parse_str(content.trim()).map_err(|e| persistence_error(&path, e))
}

/// Load the snapshot published by the last successful [`save`].
///
/// # Errors
///
/// Returns [`RagError::Persistence`] if `CURRENT` or either file is missing
/// or malformed, or if the files belong to different builds.
pub fn load(dir: impl AsRef<Path>) -> Result<IndexSnapshot> {
    let dir = dir.as_ref();
    let build_id = current_build(dir)?;
    let build = build_dir(dir, build_id);
    let vectors = build.join(VECTORS_FILE);
    let chunks = build.join(CHUNKS_FILE);

    let file = File::open(&vectors).map_err(|e| persistence_error(&vectors, e))?;
    let mut reader = BufReader::new(file);
    let mut id = [0u8; 16];
    reader.read_exact(&mut id).map_err(|e| persistence_error(&vectors, e))?;
    let index_build_id = Uuid::from_bytes(id);
    let index = FlatL2Index::load(&mut reader).map_err(|e| persistence_error(&vectors, e))?;

    let file = File::open(&chunks).map_err(|e| persistence_error(&chunks, e))?;
    let parsed: ChunksFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| persistence_error(&chunks, e))?;

    if index_build_id != build_id || parsed.build_id != build_id {
        return Err(persistence_error(
            &build,
            format!(
                "{CURRENT_FILE} names build {build_id} but {VECTORS_FILE} is from \
                 {index_build_id} and {CHUNKS_FILE} is from {}",
                parsed.build_id
            ),
        ));
    }
    if parsed.dimension != index.dimension() {
        return Err(persistence_error(
            &build,
            format!(
                "dimension {} in {CHUNKS_FILE} does not match index dimension {}",
                parsed.dimension,
                index.dimension()
            ),
        ));
    }

    let snapshot = IndexSnapshot::from_loaded(build_id, index, parsed.chunks)?;
    info!(dir = %dir.display(), rows = snapshot.len(), build_id = %build_id, "loaded index");
    Ok(snapshot)
}
