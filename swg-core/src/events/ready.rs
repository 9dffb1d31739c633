//! One-shot readiness gate.
//!
//! Dispatch must not start before the host has finished configuring itself.
//! [`ready_gate`] returns a trigger owned by whoever finishes configuration
//! and a cloneable gate that any number of tasks can await. Once resolved,
//! every current and future waiter passes immediately.

use thiserror::Error;
use tokio::sync::watch;

/// The trigger was dropped before the gate was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("readiness gate closed before it was resolved")]
pub struct GateClosed;

/// Create a new unresolved gate and the trigger that resolves it.
pub fn ready_gate() -> (ReadyTrigger, ReadyGate) {
    let (tx, rx) = watch::channel(false);
    (ReadyTrigger { tx }, ReadyGate { rx })
}

/// Resolves the paired [`ReadyGate`].
#[derive(Debug)]
pub struct ReadyTrigger {
    tx: watch::Sender<bool>,
}

impl ReadyTrigger {
    /// Resolve the gate. Only the first call has an effect.
    pub fn resolve(&self) {
        self.tx.send_if_modified(|ready| {
            if *ready {
                return false;
            }
            *ready = true;
            true
        });
    }
}

/// Cloneable handle that waits for the paired [`ReadyTrigger`].
#[derive(Debug, Clone)]
pub struct ReadyGate {
    rx: watch::Receiver<bool>,
}

impl ReadyGate {
    /// A gate that is already resolved.
    pub fn resolved() -> Self {
        let (_, rx) = watch::channel(true);
        Self { rx }
    }

    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the gate is resolved.
    pub async fn wait(&self) -> Result<(), GateClosed> {
        let mut rx = self.rx.clone();
        if *rx.borrow_and_update() {
            return Ok(());
        }
        rx.wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| GateClosed)
    }
}
