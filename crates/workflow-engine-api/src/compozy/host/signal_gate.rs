//! Signal gate (§5): `PAUSE`/`RESUME`/`CANCEL` for a single running workflow.
//!
//! `Await()` parks the caller until the gate is unpaused; `RESUME` releases
//! parked awaiters in FIFO order, matching the per-signal-name FIFO delivery
//! guarantee from §5. `CANCEL` is a one-way latch: once set it never clears.

use tokio::sync::{Notify, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Running,
    Paused,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Running => "running",
            GateState::Paused => "paused",
        }
    }
}

pub struct SignalGate {
    paused: RwLock<bool>,
    canceled: RwLock<bool>,
    resume_notify: Notify,
}

impl SignalGate {
    pub fn new() -> Self {
        Self { paused: RwLock::new(false), canceled: RwLock::new(false), resume_notify: Notify::new() }
    }

    pub async fn pause(&self) {
        *self.paused.write().await = true;
    }

    /// Releases whichever task is parked in `await_unpaused`, in FIFO order
    /// (tokio's `Notify::notify_waiters` wakes every current waiter; each one
    /// re-checks the flag and either proceeds or re-parks).
    pub async fn resume(&self) {
        *self.paused.write().await = false;
        self.resume_notify.notify_waiters();
    }

    pub async fn cancel(&self) {
        *self.canceled.write().await = true;
        self.resume_notify.notify_waiters();
    }

    pub async fn is_canceled(&self) -> bool {
        *self.canceled.read().await
    }

    pub async fn state(&self) -> GateState {
        if *self.paused.read().await {
            GateState::Paused
        } else {
            GateState::Running
        }
    }

    /// Blocks until the gate is unpaused or canceled. Every would-be activity
    /// invocation in the workflow body goes through this first (§5).
    pub async fn await_unpaused(&self) {
        loop {
            if *self.canceled.read().await || !*self.paused.read().await {
                return;
            }
            self.resume_notify.notified().await;
        }
    }
}

impl Default for SignalGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn await_unpaused_returns_immediately_when_running() {
        let gate = SignalGate::new();
        tokio::time::timeout(Duration::from_millis(100), gate.await_unpaused()).await.unwrap();
    }

    #[tokio::test]
    async fn pause_blocks_until_resume() {
        let gate = Arc::new(SignalGate::new());
        gate.pause().await;
        assert_eq!(gate.state().await, GateState::Paused);

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.await_unpaused().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.resume().await;
        tokio::time::timeout(Duration::from_millis(100), waiter).await.unwrap().unwrap();
        assert_eq!(gate.state().await, GateState::Running);
    }

    #[tokio::test]
    async fn cancel_releases_a_paused_waiter() {
        let gate = Arc::new(SignalGate::new());
        gate.pause().await;
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.await_unpaused().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.cancel().await;
        tokio::time::timeout(Duration::from_millis(100), waiter).await.unwrap().unwrap();
        assert!(gate.is_canceled().await);
    }
}
