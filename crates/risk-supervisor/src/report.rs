//! Per-symbol profit breakdown of originals versus hedges.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use hedger_core::Position;

use crate::ledger::HedgeLedger;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SymbolPl {
    pub originals: Decimal,
    pub hedges: Decimal,
}

impl SymbolPl {
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.originals + self.hedges
    }
}

/// Sum floating profit per symbol, split by how the ledger classifies each position.
#[must_use]
pub fn symbol_pl_breakdown(positions: &[Position], ledger: &HedgeLedger) -> BTreeMap<String, SymbolPl> {
    let mut breakdown: BTreeMap<String, SymbolPl> = BTreeMap::new();
    for position in positions.iter().filter(|p| p.has_valid_ticket()) {
        let entry = breakdown.entry(position.symbol.clone()).or_default();
        if ledger.is_hedge(position.ticket) {
            entry.hedges += position.profit;
        } else {
            entry.originals += position.profit;
        }
    }
    breakdown
}
