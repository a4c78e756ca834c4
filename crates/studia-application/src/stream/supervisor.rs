//! Turn timeout supervision.
//!
//! One timer per outstanding turn. The timer task waits on either the
//! timeout or its cancellation token; the fire callback receives the turn id
//! it was armed for so the owner can ignore firings for turns that already
//! moved on.

use std::time::Duration;

use studia_core::error::{Result, StudiaError};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct ArmedTimer {
    turn_id: u64,
    token: CancellationToken,
}

#[derive(Debug)]
pub struct TimeoutSupervisor {
    timeout: Duration,
    armed: Option<ArmedTimer>,
}

impl TimeoutSupervisor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            armed: None,
        }
    }

    /// Arms the timer for `turn_id`, replacing any previous timer.
    ///
    /// Requires a Tokio runtime.
    pub fn arm<F>(&mut self, turn_id: u64, on_fire: F) -> Result<()>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.disarm();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StudiaError::internal(format!("cannot arm turn timer: {}", e)))?;

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let timeout = self.timeout;
        runtime.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(timeout) => on_fire(turn_id),
            }
        });

        tracing::trace!(
            "[Supervisor] Armed {:?} timer for turn {}",
            timeout,
            turn_id
        );
        self.armed = Some(ArmedTimer { turn_id, token });
        Ok(())
    }

    /// Cancels the pending timer. Returns `false` if nothing was armed.
    pub fn disarm(&mut self) -> bool {
        match self.armed.take() {
            Some(timer) => {
                timer.token.cancel();
                tracing::trace!("[Supervisor] Disarmed timer for turn {}", timer.turn_id);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn armed_turn(&self) -> Option<u64> {
        self.armed.as_ref().map(|timer| timer.turn_id)
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn recorder() -> (Arc<AtomicU64>, impl FnOnce(u64) + Send + 'static) {
        let fired = Arc::new(AtomicU64::new(0));
        let sink = fired.clone();
        (fired, move |turn_id| sink.store(turn_id, Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_timeout() {
        let mut supervisor = TimeoutSupervisor::new(Duration::from_secs(10));
        let (fired, on_fire) = recorder();
        supervisor.arm(7, on_fire).unwrap();
        assert_eq!(supervisor.armed_turn(), Some(7));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_prevents_firing() {
        let mut supervisor = TimeoutSupervisor::new(Duration::from_secs(10));
        let (fired, on_fire) = recorder();
        supervisor.arm(1, on_fire).unwrap();

        assert!(supervisor.disarm());
        assert!(!supervisor.disarm());

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let mut supervisor = TimeoutSupervisor::new(Duration::from_secs(10));
        let (first, on_first) = recorder();
        let (second, on_second) = recorder();
        supervisor.arm(1, on_first).unwrap();
        supervisor.arm(2, on_second).unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_disarms() {
        let (fired, on_fire) = recorder();
        {
            let mut supervisor = TimeoutSupervisor::new(Duration::from_secs(1));
            supervisor.arm(3, on_fire).unwrap();
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arm_without_runtime_fails() {
        let mut supervisor = TimeoutSupervisor::new(Duration::from_secs(1));
        assert!(supervisor.arm(1, |_| {}).is_err());
        assert!(!supervisor.is_armed());
    }
}
