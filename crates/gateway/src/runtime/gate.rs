//! Generation gate.
//!
//! Two single-permit flags: "generation in progress" (held by the message
//! pipeline for a whole turn) and "proactive send in progress" (held by the
//! heartbeat while it talks to the backend).  At most one of them is held at
//! a time, so a user turn and a proactive send never generate concurrently.
//! Acquisition never waits: a caller that finds either flag held skips its
//! work.  Permits release on drop, so every exit path (including errors and
//! panics) frees the flag.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Which flag a [`GatePermit`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    Generation,
    ProactiveSend,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateKind::Generation => f.write_str("generation"),
            GateKind::ProactiveSend => f.write_str("proactive send"),
        }
    }
}

/// Proof that a gate flag is held.  Dropping it releases the flag.
#[derive(Debug)]
pub struct GatePermit {
    kind: GateKind,
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    pub fn kind(&self) -> GateKind {
        self.kind
    }
}

pub struct GenerationGate {
    generation: Arc<Semaphore>,
    proactive: Arc<Semaphore>,
    // Serializes check-then-take across the two flags.
    acquire: Mutex<()>,
}

impl Default for GenerationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationGate {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(Semaphore::new(1)),
            proactive: Arc::new(Semaphore::new(1)),
            acquire: Mutex::new(()),
        }
    }

    /// Take the "generation in progress" flag.  Refused while either flag
    /// is held; the error names the flag in the way.
    pub fn try_acquire_generation(&self) -> Result<GatePermit, GateBusy> {
        let _guard = self.acquire.lock();
        if self.is_sending_proactive() {
            return Err(GateBusy(GateKind::ProactiveSend));
        }
        Self::try_take(&self.generation, GateKind::Generation)
    }

    /// Take the heartbeat's re-entrancy flag.  Refused while either flag
    /// is held; the error names the flag in the way.
    pub fn try_acquire_proactive(&self) -> Result<GatePermit, GateBusy> {
        let _guard = self.acquire.lock();
        if self.is_generating() {
            return Err(GateBusy(GateKind::Generation));
        }
        Self::try_take(&self.proactive, GateKind::ProactiveSend)
    }

    pub fn is_generating(&self) -> bool {
        self.generation.available_permits() == 0
    }

    pub fn is_sending_proactive(&self) -> bool {
        self.proactive.available_permits() == 0
    }

    fn try_take(sem: &Arc<Semaphore>, kind: GateKind) -> Result<GatePermit, GateBusy> {
        sem.clone()
            .try_acquire_owned()
            .map(|permit| GatePermit {
                kind,
                _permit: permit,
            })
            .map_err(|_| GateBusy(kind))
    }
}

/// Returned when the requested flag is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateBusy(pub GateKind);

impl fmt::Display for GateBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} already in progress", self.0)
    }
}

impl std::error::Error for GateBusy {}
