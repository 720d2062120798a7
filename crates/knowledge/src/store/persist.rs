//! On-disk format for the record store.
//!
//! A store directory holds one committed generation of two artifacts plus a
//! manifest naming them:
//!
//! ```text
//! manifest.json
//! embeddings-<generation>.bin   "MNTREMB1", u64 rows, u64 dims, rows*dims f32 (LE, row-major)
//! documents-<generation>.json   JSON array of documents in insertion order
//! ```
//!
//! A save writes a fresh generation and then swaps the manifest with an
//! atomic rename, so readers see either the old pair or the new pair.

use super::StoreState;
use crate::types::Document;
use mentor_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub(crate) const MANIFEST_FILE: &str = "manifest.json";
const FORMAT_VERSION: u32 = 1;
const MATRIX_MAGIC: &[u8; 8] = b"MNTREMB1";
const MATRIX_HEADER_LEN: usize = 24;

/// Commit record for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub format_version: u32,
    pub generation: u64,
    pub count: usize,
    pub dimensions: usize,
    pub next_sequence: u64,
    pub embeddings_file: String,
    pub documents_file: String,
    pub embeddings_sha256: String,
    pub documents_sha256: String,
}

pub(crate) fn embeddings_file_name(generation: u64) -> String {
    format!("embeddings-{}.bin", generation)
}

pub(crate) fn documents_file_name(generation: u64) -> String {
    format!("documents-{}.json", generation)
}

/// Load the committed generation. `Ok(None)` means nothing was ever saved.
pub(crate) fn load(dir: &Path) -> AppResult<Option<StoreState>> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest_bytes = match fs::read(&manifest_path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let manifest: Manifest = serde_json::from_slice(&manifest_bytes).map_err(|e| {
        AppError::StoreCorruption(format!("Unreadable manifest {:?}: {}", manifest_path, e))
    })?;

    if manifest.format_version != FORMAT_VERSION {
        return Err(AppError::StoreCorruption(format!(
            "Unsupported store format version {}",
            manifest.format_version
        )));
    }

    let matrix_bytes = read_artifact(dir, &manifest.embeddings_file)?;
    verify_digest(&manifest.embeddings_file, &matrix_bytes, &manifest.embeddings_sha256)?;

    let documents_bytes = read_artifact(dir, &manifest.documents_file)?;
    verify_digest(&manifest.documents_file, &documents_bytes, &manifest.documents_sha256)?;

    let (rows, dims, embeddings) = decode_matrix(&matrix_bytes)?;

    let documents: Vec<Document> = serde_json::from_slice(&documents_bytes).map_err(|e| {
        AppError::StoreCorruption(format!(
            "Unreadable documents file '{}': {}",
            manifest.documents_file, e
        ))
    })?;

    if documents.len() != rows {
        return Err(AppError::StoreCorruption(format!(
            "{} documents but {} embedding rows",
            documents.len(),
            rows
        )));
    }

    if rows != manifest.count || dims != manifest.dimensions {
        return Err(AppError::StoreCorruption(format!(
            "Manifest records {}x{} but embeddings matrix is {}x{}",
            manifest.count, manifest.dimensions, rows, dims
        )));
    }

    if rows > 0 && dims == 0 {
        return Err(AppError::StoreCorruption(format!(
            "{} embedding rows with zero dimensions",
            rows
        )));
    }

    validate_documents(&documents, manifest.next_sequence)?;

    Ok(Some(StoreState {
        documents,
        embeddings,
        dimensions: (dims > 0).then_some(dims),
        next_sequence: manifest.next_sequence,
        generation: manifest.generation,
        dirty: false,
    }))
}

/// Write `state` as the next generation and commit it. Returns the new
/// generation number.
pub(crate) fn save(dir: &Path, state: &StoreState) -> AppResult<u64> {
    let generation = state.generation + 1;
    let dims = state.dimensions.unwrap_or(0);

    let matrix_bytes = encode_matrix(state.documents.len(), dims, &state.embeddings);
    let documents_bytes = serde_json::to_vec_pretty(&state.documents)?;

    write_generation(
        dir,
        generation,
        &documents_bytes,
        &matrix_bytes,
        state.documents.len(),
        dims,
        state.next_sequence,
    )?;

    remove_stale_generations(dir, generation);
    Ok(generation)
}

/// Write both artifacts for `generation`, then commit the manifest.
pub(crate) fn write_generation(
    dir: &Path,
    generation: u64,
    documents_bytes: &[u8],
    matrix_bytes: &[u8],
    count: usize,
    dimensions: usize,
    next_sequence: u64,
) -> AppResult<()> {
    fs::create_dir_all(dir)?;

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        generation,
        count,
        dimensions,
        next_sequence,
        embeddings_file: embeddings_file_name(generation),
        documents_file: documents_file_name(generation),
        embeddings_sha256: sha256_hex(matrix_bytes),
        documents_sha256: sha256_hex(documents_bytes),
    };

    write_atomic(dir, &manifest.embeddings_file, matrix_bytes)?;
    write_atomic(dir, &manifest.documents_file, documents_bytes)?;

    // Commit point
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)?;
    write_atomic(dir, MANIFEST_FILE, &manifest_bytes)?;
    sync_dir(dir);

    Ok(())
}

/// Serialize a row-major `[rows, dims]` matrix.
pub(crate) fn encode_matrix(rows: usize, dims: usize, data: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(MATRIX_HEADER_LEN + data.len() * 4);
    bytes.extend_from_slice(MATRIX_MAGIC);
    bytes.extend_from_slice(&(rows as u64).to_le_bytes());
    bytes.extend_from_slice(&(dims as u64).to_le_bytes());
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Parse a matrix written by [`encode_matrix`]. Never truncates or pads.
pub(crate) fn decode_matrix(bytes: &[u8]) -> AppResult<(usize, usize, Vec<f32>)> {
    if bytes.len() < MATRIX_HEADER_LEN || &bytes[..8] != MATRIX_MAGIC {
        return Err(AppError::StoreCorruption(
            "Embeddings matrix has a missing or invalid header".to_string(),
        ));
    }

    let read_u64 = |offset: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[offset..offset + 8]);
        u64::from_le_bytes(buf)
    };
    let rows = read_u64(8) as usize;
    let dims = read_u64(16) as usize;

    let body = &bytes[MATRIX_HEADER_LEN..];
    let expected = rows
        .checked_mul(dims)
        .and_then(|cells| cells.checked_mul(4))
        .ok_or_else(|| {
            AppError::StoreCorruption(format!("Embeddings matrix shape {}x{} overflows", rows, dims))
        })?;

    if body.len() != expected {
        return Err(AppError::StoreCorruption(format!(
            "Embeddings matrix declares {}x{} but holds {} bytes of data",
            rows,
            dims,
            body.len()
        )));
    }

    let data = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok((rows, dims, data))
}

fn validate_documents(documents: &[Document], next_sequence: u64) -> AppResult<()> {
    let mut ids = HashSet::with_capacity(documents.len());
    let mut previous: Option<u64> = None;

    for document in documents {
        if !ids.insert(document.id.as_str()) {
            return Err(AppError::StoreCorruption(format!(
                "Duplicate document id '{}'",
                document.id
            )));
        }
        if previous.is_some_and(|prev| document.sequence <= prev) {
            return Err(AppError::StoreCorruption(format!(
                "Document '{}' breaks insertion order",
                document.id
            )));
        }
        if document.sequence >= next_sequence {
            return Err(AppError::StoreCorruption(format!(
                "Document '{}' has sequence {} beyond the recorded counter {}",
                document.id, document.sequence, next_sequence
            )));
        }
        previous = Some(document.sequence);
    }

    Ok(())
}

fn read_artifact(dir: &Path, name: &str) -> AppResult<Vec<u8>> {
    if name.contains(['/', '\\']) {
        return Err(AppError::StoreCorruption(format!(
            "Manifest names an artifact outside the store: '{}'",
            name
        )));
    }

    match fs::read(dir.join(name)) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::StoreCorruption(format!(
            "Manifest names missing artifact '{}'",
            name
        ))),
        Err(e) => Err(e.into()),
    }
}

fn verify_digest(name: &str, bytes: &[u8], expected: &str) -> AppResult<()> {
    let actual = sha256_hex(bytes);
    if actual != expected {
        return Err(AppError::StoreCorruption(format!(
            "Checksum mismatch for '{}'",
            name
        )));
    }
    Ok(())
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Write `bytes` to `dir/name` via a synced temp file and a rename.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> AppResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| e.error)?;
    Ok(())
}

/// Make the renames durable. Not every platform can open a directory.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

fn remove_stale_generations(dir: &Path, keep: u64) {
    let keep_files = [embeddings_file_name(keep), documents_file_name(keep)];

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Could not list store directory {:?}: {}", dir, e);
            return;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_artifact = (name.starts_with("embeddings-") && name.ends_with(".bin"))
            || (name.starts_with("documents-") && name.ends_with(".json"));

        if is_artifact && !keep_files.contains(&name) {
            if let Err(e) = fs::remove_file(entry.path()) {
                tracing::warn!("Could not remove stale artifact {:?}: {}", entry.path(), e);
            }
        }
    }
}
