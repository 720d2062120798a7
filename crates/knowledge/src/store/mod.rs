//! Record store: documents and their embeddings in strict 1:1 order.
//!
//! Embeddings live in one flat row-major buffer so the in-memory layout
//! matches the persisted `[N, D]` matrix. A single store-wide `RwLock`
//! guards both sequences: appends hold the write lock across
//! append-plus-persist, searches share the read lock.

pub(crate) mod persist;

use crate::types::{Document, NewDocument};
use chrono::Utc;
use mentor_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Raw store contents.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub documents: Vec<Document>,
    pub embeddings: Vec<f32>,
    /// Fixed by the first stored embedding
    pub dimensions: Option<usize>,
    pub next_sequence: u64,
    /// Last committed generation on disk (0 = never saved)
    pub generation: u64,
    /// In-memory state is ahead of disk
    pub dirty: bool,
}

impl StoreState {
    fn row(&self, index: usize) -> &[f32] {
        let dims = self.dimensions.unwrap_or(0);
        &self.embeddings[index * dims..(index + 1) * dims]
    }

    fn push(&mut self, new: NewDocument, embedding: Vec<f32>) -> Document {
        let sequence = self.next_sequence;
        let document = Document {
            id: format!("doc_{}", sequence),
            content: new.content,
            job_role: new.job_role,
            content_type: new.content_type,
            sequence,
            source: new.source,
            created_at: Utc::now(),
        };

        self.dimensions.get_or_insert(embedding.len());
        self.embeddings.extend_from_slice(&embedding);
        self.documents.push(document.clone());
        self.next_sequence += 1;
        document
    }
}

/// The first embedding fixes the dimensionality; empty vectors never fit.
fn check_dimensions(expected: Option<usize>, actual: usize) -> AppResult<()> {
    match expected {
        Some(expected) if expected != actual => Err(AppError::DimensionMismatch { expected, actual }),
        _ if actual == 0 => Err(AppError::DimensionMismatch {
            expected: expected.unwrap_or(1),
            actual,
        }),
        _ => Ok(()),
    }
}

/// Borrowed, read-only view of the store contents.
#[derive(Clone, Copy)]
pub struct Records<'a> {
    state: &'a StoreState,
}

impl<'a> Records<'a> {
    /// (document, embedding) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a Document, &'a [f32])> + 'a {
        let state = self.state;
        state
            .documents
            .iter()
            .enumerate()
            .map(move |(i, document)| (document, state.row(i)))
    }

    /// Look up a document and its embedding by id.
    pub fn get(&self, id: &str) -> Option<(&'a Document, &'a [f32])> {
        self.iter().find(|(document, _)| document.id == id)
    }

    pub fn len(&self) -> usize {
        self.state.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.documents.is_empty()
    }

    /// Embedding dimensionality, once fixed.
    pub fn dimensions(&self) -> Option<usize> {
        self.state.dimensions
    }
}

/// Read guard over the store. Holds off appends until dropped; iterate as
/// many times as needed.
pub struct RecordsView<'a> {
    guard: RwLockReadGuard<'a, StoreState>,
}

impl RecordsView<'_> {
    pub fn records(&self) -> Records<'_> {
        Records {
            state: &self.guard,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Document, &[f32])> + '_ {
        self.records().iter()
    }

    pub fn get(&self, id: &str) -> Option<(&Document, &[f32])> {
        self.records().get(id)
    }

    pub fn len(&self) -> usize {
        self.guard.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.documents.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.guard.dimensions
    }
}

/// What `reload` found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No persisted state; the store starts empty
    Fresh,
    /// A committed generation was restored
    Restored { count: usize },
}

/// Persistent, process-wide record store.
#[derive(Debug)]
pub struct RecordStore {
    dir: PathBuf,
    state: RwLock<StoreState>,
    /// Save attempts left to fail before disk is touched
    #[cfg(test)]
    failing_saves: AtomicUsize,
}

impl RecordStore {
    /// Create an empty in-memory store bound to `dir`. Nothing is read or
    /// written until `reload` or the first append.
    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: RwLock::new(StoreState::default()),
            #[cfg(test)]
            failing_saves: AtomicUsize::new(0),
        }
    }

    /// Open the store persisted under `dir`, or an empty one if none exists.
    ///
    /// # Errors
    /// * `AppError::StoreCorruption` - documents and embeddings disagree
    pub fn load(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let store = Self::empty(dir);
        store.reload()?;
        Ok(store)
    }

    /// Replace the in-memory state with the persisted one.
    ///
    /// On error the current in-memory state is left untouched.
    pub fn reload(&self) -> AppResult<LoadOutcome> {
        let mut state = self.write()?;
        match persist::load(&self.dir)? {
            Some(loaded) => {
                let count = loaded.documents.len();
                *state = loaded;
                tracing::info!(
                    "Loaded knowledge store from {:?}: {} documents",
                    self.dir,
                    count
                );
                Ok(LoadOutcome::Restored { count })
            }
            None => {
                tracing::debug!("No persisted knowledge store at {:?}", self.dir);
                Ok(LoadOutcome::Fresh)
            }
        }
    }

    /// Persist the current state, retrying once.
    pub fn save(&self) -> AppResult<()> {
        let mut state = self.write()?;
        self.persist(&mut state)
    }

    /// Persist only if an earlier save failed.
    pub fn flush(&self) -> AppResult<()> {
        let mut state = self.write()?;
        if state.dirty {
            tracing::info!("Flushing pending knowledge store changes");
            self.persist(&mut state)?;
        }
        Ok(())
    }

    /// Append one document and persist before returning.
    pub fn append(&self, new: NewDocument, embedding: Vec<f32>) -> AppResult<Document> {
        self.append_if(new, embedding, |_| Ok(()))
    }

    /// Append one document if `check` accepts the current contents.
    ///
    /// The check runs under the same write lock as the append, so no other
    /// append can slip in between.
    pub fn append_if<F>(&self, new: NewDocument, embedding: Vec<f32>, check: F) -> AppResult<Document>
    where
        F: FnOnce(Records<'_>) -> AppResult<()>,
    {
        let mut state = self.write()?;
        check(Records { state: &state })?;
        check_dimensions(state.dimensions, embedding.len())?;

        let document = state.push(new, embedding);
        tracing::debug!(
            "Appended '{}' ({} / {})",
            document.id,
            document.job_role,
            document.content_type
        );

        self.persist(&mut state)?;
        Ok(document)
    }

    /// Append a batch with a single persistence flush. Either every
    /// embedding fits the store's dimensionality or nothing is appended.
    pub fn append_batch(&self, batch: Vec<(NewDocument, Vec<f32>)>) -> AppResult<Vec<Document>> {
        let mut state = self.write()?;

        let mut expected = state.dimensions;
        for (_, embedding) in &batch {
            check_dimensions(expected, embedding.len())?;
            expected = Some(embedding.len());
        }

        let documents: Vec<Document> = batch
            .into_iter()
            .map(|(new, embedding)| state.push(new, embedding))
            .collect();

        self.persist(&mut state)?;
        Ok(documents)
    }

    /// Remove every document. Dimensionality and the sequence counter are
    /// kept so ids are never reused.
    pub fn reset(&self) -> AppResult<()> {
        let mut state = self.write()?;
        state.documents.clear();
        state.embeddings.clear();
        tracing::info!("Reset knowledge store at {:?}", self.dir);
        self.persist(&mut state)
    }

    /// Read-only view over all records in insertion order.
    pub fn all(&self) -> AppResult<RecordsView<'_>> {
        let guard = self
            .state
            .read()
            .map_err(|e| AppError::Storage(format!("Store lock poisoned: {}", e)))?;
        Ok(RecordsView { guard })
    }

    pub fn len(&self) -> usize {
        self.all().map(|view| view.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.all().ok().and_then(|view| view.dimensions())
    }

    /// Whether in-memory changes are waiting for a successful save.
    pub fn has_pending_changes(&self) -> bool {
        self.all().map(|view| view.guard.dirty).unwrap_or(false)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|e| AppError::Storage(format!("Store lock poisoned: {}", e)))
    }

    /// Save with one retry. On final failure the state is kept in memory
    /// and marked dirty so a later save or flush can catch up.
    fn persist(&self, state: &mut StoreState) -> AppResult<()> {
        let result = self.save_once(state).or_else(|first| {
            tracing::warn!("Saving knowledge store failed, retrying: {}", first);
            self.save_once(state)
        });

        match result {
            Ok(generation) => {
                state.generation = generation;
                state.dirty = false;
                tracing::debug!(
                    "Persisted generation {} ({} documents) to {:?}",
                    generation,
                    state.documents.len(),
                    self.dir
                );
                Ok(())
            }
            Err(e) => {
                state.dirty = true;
                tracing::error!("Saving knowledge store to {:?} failed: {}", self.dir, e);
                Err(AppError::Storage(format!(
                    "Failed to persist knowledge store to {:?}: {}",
                    self.dir, e
                )))
            }
        }
    }

    #[cfg(not(test))]
    fn save_once(&self, state: &StoreState) -> AppResult<u64> {
        persist::save(&self.dir, state)
    }

    #[cfg(test)]
    fn save_once(&self, state: &StoreState) -> AppResult<u64> {
        let injected = self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::Io(std::io::Error::other("injected save failure")));
        }
        persist::save(&self.dir, state)
    }

    /// Make the next `count` save attempts fail.
    #[cfg(test)]
    pub(crate) fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }
}
