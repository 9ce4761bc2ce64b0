//! # Configuration Types
//!
//! Tunable business constants, loaded once at startup and read-only after.

use serde::{Deserialize, Serialize};

use crate::types::LocationKind;

/// Running-Out thresholds per location kind.
///
/// A stock row whose quantity drops below its location's threshold is
/// flagged `RunningOut`; at or above it, `InStock`. Warehouses hold bulk
/// stock, so their floor sits higher than a shop shelf's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockThresholds {
    /// Threshold for retail shops.
    pub shop: i64,
    /// Threshold for warehouses.
    pub warehouse: i64,
}

impl StockThresholds {
    /// Returns the threshold for a location kind.
    #[inline]
    pub fn for_kind(&self, kind: LocationKind) -> i64 {
        match kind {
            LocationKind::Shop => self.shop,
            LocationKind::Warehouse => self.warehouse,
        }
    }
}

impl Default for StockThresholds {
    fn default() -> Self {
        StockThresholds {
            shop: 20,
            warehouse: 40,
        }
    }
}
