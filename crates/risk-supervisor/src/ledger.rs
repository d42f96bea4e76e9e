//! Original → hedge bookkeeping.
//!
//! The ledger is owned by a single supervisor and mutated through `&mut`. Per-symbol counters are
//! rebuilt from the broker's position list every cycle; the mapping itself survives between
//! cycles and is re-derived from position tags after a restart.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use hedger_core::{Position, Ticket};

use crate::events::PositionRole;

const HEDGE_TAG_PREFIX: &str = "hedge:";

/// Consecutive reconciliations a recorded hedge must be missing from before it is released.
pub const RELEASE_AFTER_MISSED_POLLS: u32 = 2;

/// Comment attached to a hedge order so the mapping can be recovered from broker state.
#[must_use]
pub fn hedge_tag(original: Ticket) -> String {
    format!("{HEDGE_TAG_PREFIX}{original}")
}

/// The original ticket encoded in a hedge comment, if any.
#[must_use]
pub fn parse_hedge_tag(comment: &str) -> Option<Ticket> {
    comment
        .trim()
        .strip_prefix(HEDGE_TAG_PREFIX)?
        .parse()
        .ok()
        .filter(|ticket| *ticket > 0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolCounts {
    pub originals: u32,
    pub hedges: u32,
}

#[derive(Debug, Clone, Copy)]
struct HedgeEntry {
    hedge: Ticket,
    recorded_at: DateTime<Utc>,
    /// Reconciliations in a row the hedge was absent from the position list.
    missed: u32,
}

/// What [`HedgeLedger::reconcile`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `(original, hedge)` pairs adopted from position tags.
    pub adopted: Vec<(Ticket, Ticket)>,
    /// Hedges whose original is gone.
    pub orphaned: Vec<Ticket>,
    /// Originals whose hedge vanished from the broker.
    pub pruned: Vec<Ticket>,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adopted.is_empty() && self.orphaned.is_empty() && self.pruned.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct HedgeLedger {
    hedge_of: HashMap<Ticket, HedgeEntry>,
    original_of: HashMap<Ticket, Ticket>,
    orphans: BTreeSet<Ticket>,
    counts: BTreeMap<String, SymbolCounts>,
}

impl HedgeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hedge` as the offset for `original`.
    ///
    /// Refused (and logged) when the original already has a hedge, when the original is itself a
    /// hedge, or when `hedge` is already known. Returns whether the entry was recorded.
    pub fn record_hedge(&mut self, original: Ticket, hedge: Ticket, recorded_at: DateTime<Utc>) -> bool {
        if let Some(existing) = self.hedge_of.get(&original) {
            warn!(original, hedge, existing = existing.hedge, "Position already hedged, ignoring");
            return false;
        }
        if original == hedge || self.is_hedge(original) {
            warn!(original, hedge, "Refusing to hedge a hedge");
            return false;
        }
        if self.is_hedge(hedge) || self.hedge_of.contains_key(&hedge) {
            warn!(original, hedge, "Hedge ticket already tracked");
            return false;
        }

        self.hedge_of.insert(
            original,
            HedgeEntry {
                hedge,
                recorded_at,
                missed: 0,
            },
        );
        self.original_of.insert(hedge, original);
        debug!(original, hedge, "Hedge recorded");
        true
    }

    /// Forget the hedge of a closed original. The hedge stays classified as an orphan.
    pub fn remove_hedge(&mut self, original: Ticket) -> Option<Ticket> {
        let entry = self.hedge_of.remove(&original)?;
        self.original_of.remove(&entry.hedge);
        self.orphans.insert(entry.hedge);
        info!(original, hedge = entry.hedge, "Original closed, hedge orphaned");
        Some(entry.hedge)
    }

    /// Forget a closed hedge. Its original (if still open) becomes eligible for a new hedge.
    pub fn release_hedge(&mut self, hedge: Ticket) -> bool {
        if self.orphans.remove(&hedge) {
            return true;
        }
        match self.original_of.remove(&hedge) {
            Some(original) => {
                self.hedge_of.remove(&original);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_hedge(&self, ticket: Ticket) -> bool {
        self.original_of.contains_key(&ticket) || self.orphans.contains(&ticket)
    }

    #[must_use]
    pub fn is_orphan(&self, ticket: Ticket) -> bool {
        self.orphans.contains(&ticket)
    }

    #[must_use]
    pub fn hedge_for(&self, original: Ticket) -> Option<Ticket> {
        self.hedge_of.get(&original).map(|e| e.hedge)
    }

    #[must_use]
    pub fn original_for(&self, hedge: Ticket) -> Option<Ticket> {
        self.original_of.get(&hedge).copied()
    }

    /// Number of recorded original → hedge pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hedge_of.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hedge_of.is_empty() && self.orphans.is_empty()
    }

    #[must_use]
    pub fn role_of(&self, ticket: Ticket) -> PositionRole {
        if let Some(original) = self.original_for(ticket) {
            PositionRole::Hedge { original }
        } else if self.is_orphan(ticket) {
            PositionRole::OrphanedHedge
        } else {
            PositionRole::Original {
                hedge: self.hedge_for(ticket),
            }
        }
    }

    /// Reset the per-symbol counters and recount them from `positions`.
    pub fn rebuild_counts(&mut self, positions: &[Position]) {
        self.counts.clear();
        for position in positions.iter().filter(|p| p.has_valid_ticket()) {
            let counts = self.counts.entry(position.symbol.clone()).or_default();
            if self.original_of.contains_key(&position.ticket) || self.orphans.contains(&position.ticket) {
                counts.hedges += 1;
            } else {
                counts.originals += 1;
            }
        }
    }

    #[must_use]
    pub fn counts(&self, symbol: &str) -> SymbolCounts {
        self.counts.get(symbol).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn original_count(&self, symbol: &str) -> u32 {
        self.counts(symbol).originals
    }

    #[must_use]
    pub fn hedge_count(&self, symbol: &str) -> u32 {
        self.counts(symbol).hedges
    }

    /// Whether another hedge may be opened on `symbol`.
    #[must_use]
    pub fn has_capacity(&self, symbol: &str) -> bool {
        let counts = self.counts(symbol);
        counts.hedges < counts.originals
    }

    pub(crate) fn note_hedge_opened(&mut self, symbol: &str) {
        self.counts.entry(symbol.to_string()).or_default().hedges += 1;
    }

    /// Keep the counters and mapping consistent after the hedger closed `position` itself.
    pub(crate) fn note_closed(&mut self, position: &Position) {
        let was_hedge = self.is_hedge(position.ticket);
        if let Some(counts) = self.counts.get_mut(&position.symbol) {
            if was_hedge {
                counts.hedges = counts.hedges.saturating_sub(1);
            } else {
                counts.originals = counts.originals.saturating_sub(1);
            }
        }
        if was_hedge {
            self.release_hedge(position.ticket);
        } else {
            self.remove_hedge(position.ticket);
        }
    }

    /// Bring the mapping in line with what the broker reports.
    ///
    /// - Tagged hedges the ledger does not know are adopted (or orphaned if their original is
    ///   gone).
    /// - Entries whose original closed turn their hedge into an orphan.
    /// - Entries whose hedge disappeared are dropped only after it was missing from
    ///   [`RELEASE_AFTER_MISSED_POLLS`] consecutive position lists and `grace` has passed since
    ///   recording, so a fill that is slow to show up is never taken for a closed hedge.
    /// - Orphans no longer open are dropped.
    pub fn reconcile(&mut self, positions: &[Position], now: DateTime<Utc>, grace: Duration) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let open: HashSet<Ticket> = positions
            .iter()
            .filter(|p| p.has_valid_ticket())
            .map(|p| p.ticket)
            .collect();

        for position in positions.iter().filter(|p| p.has_valid_ticket()) {
            let Some(original) = parse_hedge_tag(&position.comment) else {
                continue;
            };
            if self.is_hedge(position.ticket) {
                continue;
            }
            if open.contains(&original) && self.hedge_for(original).is_none() {
                if self.record_hedge(original, position.ticket, now) {
                    report.adopted.push((original, position.ticket));
                }
            } else {
                // Tagged for a closed original, or a second hedge for the same one.
                self.orphans.insert(position.ticket);
                report.orphaned.push(position.ticket);
            }
        }

        let grace = chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());
        let mut originals: Vec<Ticket> = self.hedge_of.keys().copied().collect();
        originals.sort_unstable();
        for original in originals {
            let Some(entry) = self.hedge_of.get_mut(&original) else {
                continue;
            };
            let hedge = entry.hedge;
            let hedge_open = open.contains(&hedge);
            entry.missed = if hedge_open { 0 } else { entry.missed.saturating_add(1) };
            let (missed, recorded_at) = (entry.missed, entry.recorded_at);

            if !open.contains(&original) {
                if hedge_open {
                    self.remove_hedge(original);
                    report.orphaned.push(hedge);
                } else {
                    self.hedge_of.remove(&original);
                    self.original_of.remove(&hedge);
                }
            } else if missed >= RELEASE_AFTER_MISSED_POLLS && now - recorded_at >= grace {
                info!(original, hedge, missed, "Hedge no longer open, releasing");
                self.release_hedge(hedge);
                report.pruned.push(original);
            } else if !hedge_open {
                debug!(original, hedge, missed, "Recorded hedge not visible yet");
            }
        }

        self.orphans.retain(|ticket| open.contains(ticket));
        report
    }

    /// No ticket is both an original and a hedge in the mapping.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.hedge_of.iter().all(|(original, entry)| {
            !self.original_of.contains_key(original)
                && !self.hedge_of.contains_key(&entry.hedge)
                && self.original_of.get(&entry.hedge) == Some(original)
        }) && self.orphans.iter().all(|t| !self.hedge_of.contains_key(t))
    }
}
