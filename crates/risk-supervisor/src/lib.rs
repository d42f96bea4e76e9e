//! Position-risk supervisor.
//!
//! Watches every open position against the hedging policy:
//! - Opens an opposite "hedge" position when an original breaches the loss threshold
//! - Closes everything once floating profit reaches the profit threshold
//! - Rebuilds its view from broker state every cycle and after every restart
//!
//! All rules are deterministic; the broker is the source of truth for fills.

pub mod clock;
pub mod error;
pub mod events;
pub mod ledger;
pub mod monitor;
pub mod orders;
pub mod report;
pub mod restart;
pub mod supervisor;
pub mod thresholds;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{OrderError, SupervisorError};
pub use events::{EventSink, PositionRole, SupervisorEvent};
pub use ledger::{hedge_tag, parse_hedge_tag, HedgeLedger, SymbolCounts};
pub use monitor::{EquityMonitor, SupervisorPhase, SupervisorState};
pub use orders::{CloseSummary, OrderDesk};
pub use report::{symbol_pl_breakdown, SymbolPl};
pub use restart::{supervise, RestartPolicy, TaskExit};
pub use supervisor::{CycleOutcome, EquitySupervisor, EvaluationReport};
