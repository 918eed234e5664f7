//! The persistent store.
//!
//! A [`Store`] owns the in-memory document and the master key, and moves
//! through an explicit lifecycle:
//!
//! ```text
//! Uninitialized ──▶ Loading ──▶ Ready
//!                      │
//!                      └──────▶ Fault
//! ```
//!
//! Loading happens on the first operation (or on [`Store::open`] /
//! [`Store::ready`]) while holding the store's single `tokio::sync::Mutex`.
//! That mutex is FIFO-fair, so calls issued during `Loading` queue behind it
//! and resolve in issue order once the store is `Ready`. The same lock
//! serializes every read-modify-write, so no two mutations interleave.
//!
//! Every mutation runs the same cycle: change the document in memory,
//! serialize it, encrypt it under the master key with a fresh nonce, re-wrap
//! the master key, write the envelope to a staging file and rename it over
//! the store file. If any step of the save fails the in-memory change is
//! rolled back, so the document always matches what was last written.

use std::io;
use std::path::Path;

use serde_json::{Number, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::envelope::Envelope;
use crate::error::StoreError;
use crate::keys::{self, MasterKey};
use crate::{path, payload, Document};

/// Observable lifecycle phase of a [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, file not touched yet.
    Uninitialized,
    /// Reading, unwrapping and decrypting (or creating) the file.
    Loading,
    /// Document in memory; operations are served.
    Ready,
    /// Loading failed. Every operation returns the load error.
    Fault,
}

/// A loaded store: the master key and the document it protects.
struct Session {
    master: MasterKey,
    doc: Document,
}

enum State {
    Uninitialized,
    Ready(Session),
    Fault(StoreError),
}

#[derive(Clone, Copy)]
enum Step {
    Add,
    Subtract,
}

/// An encrypted, path-addressable document store backed by one file.
pub struct Store {
    config: StoreConfig,
    state: Mutex<State>,
    phase: watch::Sender<Phase>,
}

impl Store {
    /// Create a store without touching the file. The first operation loads it.
    pub fn new(config: StoreConfig) -> Self {
        let (phase, _) = watch::channel(Phase::Uninitialized);
        Self {
            config,
            state: Mutex::new(State::Uninitialized),
            phase,
        }
    }

    /// Create a store and load it immediately.
    ///
    /// A missing file is not an error: a fresh master key and an empty
    /// document are created and written.
    pub async fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let store = Self::new(config);
        store.ready().await?;
        Ok(store)
    }

    /// Wait until the store is `Ready`, loading it if nobody has yet.
    pub async fn ready(&self) -> Result<(), StoreError> {
        self.acquire().await.map(|_| ())
    }

    /// Current lifecycle phase. Does not wait.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Subscribe to lifecycle transitions.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        self.config.path()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Read the value at `path`. Served from memory.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let session = self.acquire().await?;
        Ok(path::get(&session.doc, path).cloned())
    }

    /// Overwrite the value at `path`, returning the value written.
    pub async fn set(&self, path: &str, value: Value) -> Result<Value, StoreError> {
        self.mutate(|doc| {
            path::set(doc, path, value.clone())?;
            Ok(value)
        })
        .await
    }

    /// Remove the value at `path`, returning whether it existed.
    ///
    /// The file is rewritten even when nothing was removed.
    pub async fn delete(&self, path: &str) -> Result<bool, StoreError> {
        self.mutate(|doc| Ok(path::delete(doc, path))).await
    }

    /// Add `n` to the number at `path`. A missing or non-numeric value
    /// counts as zero. Returns the new value.
    pub async fn add(&self, path: &str, n: impl Into<Number>) -> Result<Number, StoreError> {
        self.count(path, n.into(), Step::Add).await
    }

    /// Subtract `n` from the number at `path`. A missing or non-numeric
    /// value counts as zero. Returns the new value.
    pub async fn subtract(&self, path: &str, n: impl Into<Number>) -> Result<Number, StoreError> {
        self.count(path, n.into(), Step::Subtract).await
    }

    /// Append `value` to the sequence at `path` and return the sequence.
    ///
    /// Anything at `path` that is not a sequence is discarded and replaced by
    /// a new sequence holding only `value`.
    pub async fn push(&self, path: &str, value: Value) -> Result<Vec<Value>, StoreError> {
        self.mutate(|doc| {
            if let Some(Value::Array(items)) = path::get_mut(doc, path) {
                items.push(value);
                return Ok(items.clone());
            }
            let items = vec![value];
            path::set(doc, path, Value::Array(items.clone()))?;
            Ok(items)
        })
        .await
    }

    /// Test `path`.
    ///
    /// - `value` is `None`: whether anything (including `null`) is stored at `path`.
    /// - the stored value is a sequence: whether it contains `value`.
    /// - otherwise: whether the stored value equals `value`.
    ///
    /// Equality is structural, with numbers compared by value (`1 == 1.0`).
    pub async fn has(&self, path: &str, value: Option<&Value>) -> Result<bool, StoreError> {
        let session = self.acquire().await?;
        let Some(current) = path::get(&session.doc, path) else {
            return Ok(false);
        };
        Ok(match (current, value) {
            (_, None) => true,
            (Value::Array(items), Some(wanted)) => items.iter().any(|item| same_value(item, wanted)),
            (current, Some(wanted)) => same_value(current, wanted),
        })
    }

    /// A copy of the whole in-memory document.
    pub async fn snapshot(&self) -> Result<Document, StoreError> {
        let session = self.acquire().await?;
        Ok(session.doc.clone())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn count(&self, path: &str, n: Number, step: Step) -> Result<Number, StoreError> {
        self.mutate(|doc| {
            let next = offset(path::get(doc, path), &n, step)?;
            path::set(doc, path, Value::Number(next.clone()))?;
            Ok(next)
        })
        .await
    }

    /// Run `change` against the document and persist the result.
    ///
    /// `change` must not modify the document when it returns an error.
    async fn mutate<R>(
        &self,
        change: impl FnOnce(&mut Document) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut session = self.acquire().await?;
        let previous = session.doc.clone();
        let result = change(&mut session.doc)?;

        if let Err(err) = self.persist(&session).await {
            session.doc = previous;
            return Err(err);
        }
        Ok(result)
    }

    /// Take the exclusive lock and return the loaded session, loading the
    /// file first if this is the first caller.
    async fn acquire(&self) -> Result<MappedMutexGuard<'_, Session>, StoreError> {
        let mut state = self.state.lock().await;

        match &*state {
            State::Ready(_) => {}
            State::Fault(err) => return Err(err.clone()),
            State::Uninitialized => {
                let loading = LoadingPhase::enter(&self.phase);
                match self.initialize().await {
                    Ok(session) => {
                        *state = State::Ready(session);
                        loading.settle(Phase::Ready);
                    }
                    Err(err) => {
                        warn!(path = %self.path().display(), error = %err, "store entered fault state");
                        *state = State::Fault(err.clone());
                        loading.settle(Phase::Fault);
                        return Err(err);
                    }
                }
            }
        }

        Ok(MutexGuard::map(state, |state| match state {
            State::Ready(session) => session,
            _ => unreachable!("only a ready state reaches here"),
        }))
    }

    async fn initialize(&self) -> Result<Session, StoreError> {
        match fs::read(self.path()).await {
            Ok(bytes) => self.load(&bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => self.create().await,
            Err(err) => Err(err.into()),
        }
    }

    fn load(&self, bytes: &[u8]) -> Result<Session, StoreError> {
        let envelope = Envelope::from_json(bytes)?;
        let master = keys::unwrap(&envelope.meta.key, self.config.wrapping_key())?;
        let doc = payload::decrypt(&envelope.payload, &master)?;

        debug!(path = %self.path().display(), entries = doc.len(), "store loaded");
        Ok(Session { master, doc })
    }

    async fn create(&self) -> Result<Session, StoreError> {
        if let Some(parent) = self.path().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let session = Session {
            master: keys::generate()?,
            doc: Document::new(),
        };
        self.persist(&session).await?;

        debug!(path = %self.path().display(), "store created");
        Ok(session)
    }

    /// Encrypt `session` and atomically replace the store file with it.
    async fn persist(&self, session: &Session) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(&session.doc)?;
        let envelope = Envelope::new(
            keys::wrap(&session.master, self.config.wrapping_key())?,
            payload::encrypt_bytes(&plaintext, &session.master)?,
        );
        let bytes = envelope.to_json()?;

        let staging = self.config.staging_path();
        let replaced = match write_synced(&staging, &bytes).await {
            Ok(()) => fs::rename(&staging, self.path()).await,
            Err(err) => Err(err),
        };
        if let Err(err) = replaced {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }

        debug!(path = %self.path().display(), bytes = plaintext.len(), "store saved");
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Publishes `Loading` for as long as it is held.
///
/// If the loading future is dropped before it settles, the state is still
/// `Uninitialized`, so the phase goes back to `Uninitialized` and the next
/// caller starts the load again.
struct LoadingPhase<'a> {
    phase: &'a watch::Sender<Phase>,
    settled: bool,
}

impl<'a> LoadingPhase<'a> {
    fn enter(phase: &'a watch::Sender<Phase>) -> Self {
        phase.send_replace(Phase::Loading);
        Self {
            phase,
            settled: false,
        }
    }

    fn settle(mut self, outcome: Phase) {
        self.phase.send_replace(outcome);
        self.settled = true;
    }
}

impl Drop for LoadingPhase<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.phase.send_replace(Phase::Uninitialized);
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Apply `step` to the current value, treating anything non-numeric as zero.
///
/// Integers stay integers while the arithmetic fits in an `i64`; otherwise
/// the result is a float.
fn offset(current: Option<&Value>, delta: &Number, step: Step) -> Result<Number, StoreError> {
    let zero = Number::from(0);
    let current = match current {
        Some(Value::Number(n)) => n,
        _ => &zero,
    };

    if let (Some(a), Some(b)) = (current.as_i64(), delta.as_i64()) {
        let exact = match step {
            Step::Add => a.checked_add(b),
            Step::Subtract => a.checked_sub(b),
        };
        if let Some(n) = exact {
            return Ok(Number::from(n));
        }
    }

    let a = current.as_f64().unwrap_or(0.0);
    let b = delta.as_f64().unwrap_or(0.0);
    let result = match step {
        Step::Add => a + b,
        Step::Subtract => a - b,
    };
    Number::from_f64(result).ok_or(StoreError::NonFiniteNumber)
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => same_number(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| same_value(x, y)))
        }
        _ => a == b,
    }
}

fn same_number(x: &Number, y: &Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    x.as_f64() == y.as_f64()
}
