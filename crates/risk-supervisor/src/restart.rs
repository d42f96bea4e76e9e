//! Crash-restart wrapper.
//!
//! Each attempt runs as its own tokio task so a panic inside it surfaces as a `JoinError`
//! instead of taking the caller down. Failed attempts are restarted after a cooldown; a clean
//! exit ends supervision.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use hedger_core::{HedgingConfig, RestartBackoff};

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    pub cooldown: Duration,
    pub backoff: RestartBackoff,
    /// Upper bound for exponential back-off.
    pub max_cooldown: Duration,
    /// `None` restarts forever.
    pub max_restarts: Option<u32>,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::from_config(&HedgingConfig::default())
    }
}

impl RestartPolicy {
    #[must_use]
    pub fn from_config(config: &HedgingConfig) -> Self {
        Self {
            cooldown: Duration::from_secs(config.restart_cooldown_secs),
            backoff: config.restart_backoff,
            max_cooldown: Duration::from_secs(config.max_restart_cooldown_secs),
            max_restarts: config.max_restarts,
        }
    }

    /// Cooldown before restart number `attempt` (zero-based).
    #[must_use]
    pub fn cooldown_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            RestartBackoff::Fixed => self.cooldown,
            RestartBackoff::Exponential => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                self.cooldown.saturating_mul(factor).min(self.max_cooldown)
            }
        }
    }
}

/// How supervision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    /// The task returned `Ok(())`.
    Completed { restarts: u32 },
    /// `max_restarts` exhausted.
    GaveUp { restarts: u32 },
}

/// Run `factory()` as a task, restarting it after errors and panics per `policy`.
pub async fn supervise<F, Fut, E>(
    name: &str,
    policy: &RestartPolicy,
    clock: &dyn Clock,
    mut factory: F,
) -> TaskExit
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut restarts = 0u32;

    loop {
        let failure = match tokio::spawn(factory()).await {
            Ok(Ok(())) => {
                info!(task = name, restarts, "Task exited cleanly");
                return TaskExit::Completed { restarts };
            }
            Ok(Err(e)) => e.to_string(),
            Err(join) if join.is_panic() => format!("panicked: {}", panic_message(join.into_panic())),
            Err(join) => join.to_string(),
        };

        if policy.max_restarts.is_some_and(|max| restarts >= max) {
            error!(task = name, error = %failure, restarts, "Task failed, restart limit reached");
            return TaskExit::GaveUp { restarts };
        }

        let cooldown = policy.cooldown_for(restarts);
        restarts += 1;
        error!(
            task = name,
            error = %failure,
            cooldown_secs = cooldown.as_secs_f64(),
            restart = restarts,
            "Task crashed, restarting after cooldown"
        );
        clock.sleep(cooldown).await;
        warn!(task = name, restart = restarts, "Restarting task");
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_restarts: Option<u32>) -> RestartPolicy {
        RestartPolicy {
            cooldown: Duration::from_secs(5),
            backoff: RestartBackoff::Fixed,
            max_cooldown: Duration::from_secs(300),
            max_restarts,
        }
    }

    #[test]
    fn exponential_cooldown_is_capped() {
        let policy = RestartPolicy {
            backoff: RestartBackoff::Exponential,
            max_cooldown: Duration::from_secs(30),
            ..policy(None)
        };
        assert_eq!(policy.cooldown_for(0), Duration::from_secs(5));
        assert_eq!(policy.cooldown_for(1), Duration::from_secs(10));
        assert_eq!(policy.cooldown_for(2), Duration::from_secs(20));
        assert_eq!(policy.cooldown_for(3), Duration::from_secs(30));
        assert_eq!(policy.cooldown_for(40), Duration::from_secs(30));
    }

    #[test]
    fn defaults_restart_forever_after_five_seconds() {
        let policy = RestartPolicy::default();
        assert_eq!(policy.cooldown_for(7), Duration::from_secs(5));
        assert_eq!(policy.max_restarts, None);
    }

    #[tokio::test]
    async fn restarts_after_errors_until_success() {
        let clock = ManualClock::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let exit = supervise("test", &policy(None), &clock, || {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("terminal detached")
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(exit, TaskExit::Completed { restarts: 2 });
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[tokio::test]
    async fn restarts_after_panic() {
        let clock = ManualClock::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let exit = supervise("test", &policy(None), &clock, || {
            let attempts = attempts.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("boom");
                }
                Ok::<(), String>(())
            }
        })
        .await;

        assert_eq!(exit, TaskExit::Completed { restarts: 1 });
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_restarts() {
        let clock = ManualClock::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let exit = supervise("test", &policy(Some(3)), &clock, || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("still broken")
            }
        })
        .await;

        assert_eq!(exit, TaskExit::GaveUp { restarts: 3 });
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(clock.sleeps().len(), 3);
    }
}
