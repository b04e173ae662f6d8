use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{Result, VaultError};

/// The two operation classes that contend for the persisted state document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Backup,
    Restore,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Backup => write!(f, "backup"),
            OperationKind::Restore => write!(f, "restore"),
        }
    }
}

/// In-flight guard over the shared state resource.
///
/// At most one backup *or* restore may run at a time; overlapping
/// invocations are rejected with [`VaultError::Busy`] rather than queued,
/// so a scheduler tick that fires mid-operation degrades to a logged skip.
pub struct InflightGuard {
    current: Mutex<Option<OperationKind>>,
}

impl InflightGuard {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Claim the state resource for `kind`, or fail with `Busy` naming the
    /// operation currently holding it.
    pub fn try_begin(self: &Arc<Self>, kind: OperationKind) -> Result<InflightPermit> {
        let mut current = self.current.lock().unwrap();
        if let Some(active) = *current {
            return Err(VaultError::Busy(active));
        }
        *current = Some(kind);
        Ok(InflightPermit {
            guard: Arc::clone(self),
        })
    }

    pub fn current(&self) -> Option<OperationKind> {
        *self.current.lock().unwrap()
    }
}

impl Default for InflightGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the guard on drop, including on error paths.
pub struct InflightPermit {
    guard: Arc<InflightGuard>,
}

impl Drop for InflightPermit {
    fn drop(&mut self) {
        *self.guard.current.lock().unwrap() = None;
    }
}
