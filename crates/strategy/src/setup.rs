//! Trade setup produced by the evaluator.

use model::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which pattern produced the setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupKind {
    GapContinuation,
}

/// A fully-specified candidate trade. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    pub size_shares: u32,
    /// Dollars at risk if the initial stop fires: size × stop distance.
    pub risk_dollars: Decimal,
    /// Per-share distance between entry and initial stop.
    pub stop_distance_dollars: Decimal,
    /// Weighted signal score that admitted the setup.
    pub signal_strength: u32,
    pub setup_kind: SetupKind,
}

impl Setup {
    /// Estimated notional value of the entry.
    pub fn notional(&self) -> Decimal {
        self.entry_price * Decimal::from(self.size_shares)
    }
}
