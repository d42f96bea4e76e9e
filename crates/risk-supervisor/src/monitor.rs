//! Process-wide equity monitor handle.
//!
//! Signal intake calls [`EquityMonitor::ensure_running`] after every order; only the first call
//! spawns a supervised control loop, the rest are no-ops while it is alive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use hedger_core::{AppConfig, BrokerGateway, HedgingConfig};

use crate::clock::Clock;
use crate::events::EventSink;
use crate::restart::{supervise, RestartPolicy, TaskExit};
use crate::supervisor::EquitySupervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    Idle,
    Polling,
    Hedging,
    ClosingAll,
}

/// Shared supervisor flags.
///
/// `alive` means a supervisor task exists; `running` means it currently has positions to watch.
#[derive(Debug)]
pub struct SupervisorState {
    running: AtomicBool,
    alive: AtomicBool,
    phase: watch::Sender<SupervisorPhase>,
}

impl Default for SupervisorState {
    fn default() -> Self {
        let (phase, _) = watch::channel(SupervisorPhase::Idle);
        Self {
            running: AtomicBool::new(false),
            alive: AtomicBool::new(false),
            phase,
        }
    }
}

impl SupervisorState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn phase(&self) -> SupervisorPhase {
        *self.phase.borrow()
    }

    /// Follow phase changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorPhase> {
        self.phase.subscribe()
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub(crate) fn set_phase(&self, phase: SupervisorPhase) {
        self.phase.send_replace(phase);
    }

    /// Claim the single supervisor slot. Returns false if a task already holds it.
    fn try_claim(&self) -> bool {
        self.alive
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.running.store(false, Ordering::Release);
        self.set_phase(SupervisorPhase::Idle);
        self.alive.store(false, Ordering::Release);
    }
}

struct MonitorInner {
    gateway: Arc<dyn BrokerGateway>,
    hedging: HedgingConfig,
    deviation: u32,
    clock: Arc<dyn Clock>,
    events: EventSink,
    state: Arc<SupervisorState>,
}

impl MonitorInner {
    fn build_supervisor(&self) -> EquitySupervisor {
        EquitySupervisor::new(
            Arc::clone(&self.gateway),
            self.hedging.clone(),
            self.deviation,
            Arc::clone(&self.clock),
            self.events.clone(),
            Arc::clone(&self.state),
        )
    }
}

/// Cheap-to-clone handle that owns the recipe for building supervisors.
#[derive(Clone)]
pub struct EquityMonitor {
    inner: Arc<MonitorInner>,
}

impl EquityMonitor {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn BrokerGateway>,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        events: EventSink,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                gateway,
                hedging: config.hedging.clone(),
                deviation: config.broker.deviation,
                clock,
                events,
                state: Arc::new(SupervisorState::new()),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> Arc<SupervisorState> {
        Arc::clone(&self.inner.state)
    }

    /// Spawn the supervised control loop unless one is already alive.
    ///
    /// Each restart builds a fresh [`EquitySupervisor`]; its ledger is re-derived from the hedge
    /// tags on live positions.
    pub fn ensure_running(&self) -> Option<JoinHandle<TaskExit>> {
        if !self.inner.state.try_claim() {
            debug!("Equity monitor already running");
            return None;
        }
        self.inner.state.set_running(true);
        info!("Starting equity monitor");

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move {
            let policy = RestartPolicy::from_config(&inner.hedging);
            let exit = supervise("equity-supervisor", &policy, inner.clock.as_ref(), || {
                inner.build_supervisor().run()
            })
            .await;
            inner.state.release();
            info!(?exit, "Equity monitor stopped");
            exit
        }))
    }
}
