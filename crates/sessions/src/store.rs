//! The live session store.
//!
//! Holds the current [`Session`] snapshot behind an `Arc`.  Readers get a
//! cheap clone of the `Arc`; writers go through [`SessionStore::update`],
//! which applies a transform to the *latest* snapshot under the write lock
//! and publishes the result to every subscriber.  Background tasks keep an
//! `Arc<SessionStore>` rather than a `Session`, so they never act on a stale
//! copy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use hearth_domain::error::{Error, Result};
use hearth_domain::trace::TraceEvent;
use hearth_domain::Session;

use crate::durable::{DurableStore, MemoryStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    key: String,
    durable: Arc<dyn DurableStore>,
    current: RwLock<Arc<Session>>,
    published: watch::Sender<Arc<Session>>,
    dirty: AtomicBool,
}

impl SessionStore {
    /// Load the session stored under `key`, or start a fresh one.
    ///
    /// A stored document that no longer parses is logged and replaced by a
    /// default session; I/O errors are returned.
    pub fn open(durable: Arc<dyn DurableStore>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let (session, restored) = match durable.load(&key) {
            Ok(Some(session)) => (session, true),
            Ok(None) => (Session::default(), false),
            Err(Error::Json(e)) => {
                tracing::warn!(
                    session_key = %key,
                    error = %e,
                    "stored session is unreadable, starting fresh"
                );
                (Session::default(), false)
            }
            Err(e) => return Err(e),
        };

        TraceEvent::SessionLoaded {
            session_key: key.clone(),
            messages: session.messages.len(),
            restored,
        }
        .emit();

        Ok(Self::with_durable(durable, key, session))
    }

    /// A store that never touches disk, seeded with `session`.
    pub fn ephemeral(session: Session) -> Self {
        Self::with_durable(Arc::new(MemoryStore::new()), "ephemeral".into(), session)
    }

    fn with_durable(durable: Arc<dyn DurableStore>, key: String, session: Session) -> Self {
        let snapshot = Arc::new(session);
        let (published, _) = watch::channel(snapshot.clone());
        Self {
            key,
            durable,
            current: RwLock::new(snapshot),
            published,
            dirty: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The latest published snapshot.
    pub fn read(&self) -> Arc<Session> {
        self.current.read().clone()
    }

    /// Apply `transform` to the latest snapshot and publish the result.
    ///
    /// The whole read-modify-write happens under the write lock, so two
    /// concurrent updates never lose each other's changes.  `transform` must
    /// not call back into the store.
    pub fn update<R>(&self, transform: impl FnOnce(&mut Session) -> R) -> R {
        let mut current = self.current.write();
        let mut next = Session::clone(&current);
        let out = transform(&mut next);
        let next = Arc::new(next);
        *current = next.clone();
        self.dirty.store(true, Ordering::Release);
        // Published while still holding the lock so observers see updates
        // in commit order.
        self.published.send_replace(next);
        out
    }

    /// Like [`SessionStore::update`], but the transform may decline by
    /// returning `None`, in which case nothing is published.
    pub fn try_update<R>(&self, transform: impl FnOnce(&mut Session) -> Option<R>) -> Option<R> {
        let mut current = self.current.write();
        let mut next = Session::clone(&current);
        let out = transform(&mut next)?;
        let next = Arc::new(next);
        *current = next.clone();
        self.dirty.store(true, Ordering::Release);
        self.published.send_replace(next);
        Some(out)
    }

    /// Receive every snapshot published after this call.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.published.subscribe()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Persist the current snapshot if anything changed since the last flush.
    /// Returns `true` when a save happened.
    pub fn flush(&self) -> Result<bool> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        let snapshot = self.read();
        if let Err(e) = self.durable.save(&self.key, &snapshot) {
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }

        TraceEvent::SessionFlushed {
            session_key: self.key.clone(),
            messages: snapshot.messages.len(),
        }
        .emit();

        Ok(true)
    }
}
