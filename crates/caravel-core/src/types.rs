//! # Domain Types
//!
//! Core domain types used throughout Caravel.
//!
//! ## Type Hierarchy
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                 │
//! │                                                                      │
//! │  Catalog          Inventory            Movement                     │
//! │  ┌────────────┐   ┌────────────────┐   ┌──────────────┐             │
//! │  │ Item       │   │ Location       │   │ Transfer     │             │
//! │  │ PriceChange│   │ LocationStock  │   │ StockReceipt │             │
//! │  └────────────┘   │ StockStatus    │   └──────────────┘             │
//! │                   └────────────────┘                                │
//! │  Sales                     Ledger                                   │
//! │  ┌──────────────────┐      ┌──────────────────────┐                 │
//! │  │ CartLine         │      │ Account              │                 │
//! │  │ Sale             │      │ BalanceLogEntry      │                 │
//! │  │ Debtor           │      │ AccountMovement      │                 │
//! │  │ CheckoutContext  │      │ ExpenseRecord        │                 │
//! │  └──────────────────┘      │ DailyCount           │                 │
//! │                            │ CountDifference      │                 │
//! │                            └──────────────────────┘                 │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity has a UUID v4 `id` used for relations; business identity
//! (item name, account name, debtor phone) is enforced with UNIQUE columns.
//! sqlx derives are gated behind the `sqlx` cargo feature so this crate
//! stays I/O-free for consumers that only need the types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Locations
// =============================================================================

/// Whether a location is a retail point or a wholesale holding point.
///
/// The Running-Out threshold differs by kind (see `StockThresholds`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Shop,
    Warehouse,
}

/// A shop or warehouse that holds stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: String,
    pub name: String,
    pub kind: LocationKind,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Catalog
// =============================================================================

/// A catalog item: canonical identity plus the single source of price data.
///
/// Locations reference catalog entries rather than duplicating prices, so a
/// cost revaluation propagates to every location's stock value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    pub id: String,
    /// Unique business identity.
    pub name: String,
    /// Current unit cost in cents (moving average, see `money`).
    pub cost_cents: i64,
    /// Current selling price in cents.
    pub selling_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Returns the cost price as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_cents)
    }
}

/// One row of the append-only price history, written on every catalog edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PriceChange {
    pub id: String,
    pub item_id: String,
    pub old_cost_cents: i64,
    pub new_cost_cents: i64,
    pub old_selling_cents: i64,
    pub new_selling_cents: i64,
    pub changed_at: DateTime<Utc>,
}

// =============================================================================
// Location Inventory
// =============================================================================

/// Derived stock level indicator, recomputed on every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    RunningOut,
    InStock,
}

impl StockStatus {
    /// Classifies a quantity against the Running-Out threshold.
    #[inline]
    pub fn for_quantity(quantity: i64, threshold: i64) -> Self {
        if quantity < threshold {
            StockStatus::RunningOut
        } else {
            StockStatus::InStock
        }
    }
}

/// Per-(location, item) quantity and valuation.
///
/// `value_cents` is denormalized as quantity × item cost and recomputed on
/// every mutation, including remote revaluations triggered by receipts at
/// other locations. Rows are created lazily on first receipt and removed
/// only by explicit administrative action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LocationStock {
    pub id: String,
    pub location_id: String,
    pub item_id: String,
    /// Invariant: never negative.
    pub quantity: i64,
    pub value_cents: i64,
    pub status: StockStatus,
    pub updated_at: DateTime<Utc>,
}

impl LocationStock {
    /// Returns the stock valuation as Money.
    #[inline]
    pub fn value(&self) -> Money {
        Money::from_cents(self.value_cents)
    }
}

/// Stock-received log entry (backs the stock-received CSV export).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockReceipt {
    pub id: String,
    pub location_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub received_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Transfer lifecycle: SENT → RECEIVED, terminal. No partial receipt,
/// re-send or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Sent,
    Received,
}

/// A movement of a fixed quantity of one item between two locations.
///
/// Created when stock leaves the source; mutated exactly once, when the
/// destination claims it. Never deleted: this is the audit trail of
/// physical movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transfer {
    pub id: String,
    pub item_id: String,
    pub quantity: i64,
    pub source_location_id: String,
    pub dest_location_id: String,
    pub sent_at: DateTime<Utc>,
    pub received: bool,
    pub received_at: Option<DateTime<Utc>>,
}

impl Transfer {
    /// Returns the state-machine position of this transfer.
    #[inline]
    pub fn status(&self) -> TransferStatus {
        if self.received {
            TransferStatus::Received
        } else {
            TransferStatus::Sent
        }
    }
}

// =============================================================================
// Sales
// =============================================================================

/// How a sale was settled. Each method maps to exactly one ledger account
/// via the account registry (accounts.payment_method), resolved as a typed
/// lookup instead of matching account names by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Bank,
    MobileMoney,
}

/// A provisional sale line, pending checkout.
///
/// Price fields are snapshots taken when the line was added; the line's
/// value is quantity × (selling − discount). `sale_id` stays `None` until
/// checkout assigns the line to a sale, after which it is immutable.
/// Inventory is NOT deducted while a line is unassigned: abandoning a cart
/// must not lose stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartLine {
    pub id: String,
    pub shop_id: String,
    pub item_id: String,
    pub quantity: i64,
    /// Per-unit discount in cents.
    pub discount_cents: i64,
    /// Unit cost at time of adding (frozen).
    pub cost_cents: i64,
    /// Unit selling price at time of adding (frozen).
    pub selling_cents: i64,
    /// quantity × (selling − discount), frozen with the snapshots.
    pub value_cents: i64,
    pub sale_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    /// Returns the line value as Money.
    #[inline]
    pub fn value(&self) -> Money {
        Money::from_cents(self.value_cents)
    }

    /// Line cost basis (quantity × frozen unit cost), used by profit
    /// reporting.
    #[inline]
    pub fn cost_basis(&self) -> Money {
        Money::from_cents(self.cost_cents * self.quantity)
    }
}

/// An immutable sale record created at checkout.
///
/// The cart lines carrying this sale's id are its permanent line-item
/// list. Never mutated after creation except to attach a debtor on the
/// credit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub shop_id: String,
    /// Aggregate discount applied on top of per-line discounts.
    pub discount_cents: i64,
    pub payment_method: PaymentMethod,
    /// Σ line values − aggregate discount.
    pub sales_value_cents: i64,
    /// Amount actually collected (equals sales value except on credit).
    pub amount_paid_cents: i64,
    pub credit_sale: bool,
    pub debtor_id: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A counterparty owing the business for goods sold on credit.
///
/// Identified by unique phone number; credit checkouts upsert against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Debtor {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
    pub phone: String,
    /// Running amount paid across all credit sales and payments.
    pub paid_cents: i64,
    /// Running outstanding balance.
    pub unpaid_cents: i64,
    pub currency: String,
}

/// Short-lived context carried from a credit checkout to debtor
/// registration.
///
/// Replaces the source system's ambient pending-checkout state: the first
/// step computes and returns this, the second consumes it. Nothing is
/// committed until the second step's transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutContext {
    pub shop_id: String,
    pub payment_method: PaymentMethod,
    pub discount_cents: i64,
    /// Σ unassigned line values − aggregate discount, at context creation.
    pub sales_value_cents: i64,
}

// =============================================================================
// Ledger
// =============================================================================

/// A monetary account.
///
/// `balance_cents` is a cached latest value; the append-only balance log is
/// the source of truth and the two must always agree. `payment_method`
/// marks the account that settles that method's sales (at most one account
/// per method).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    pub id: String,
    pub name: String,
    pub balance_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    pub foreign_currency: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Returns the cached balance as Money.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// Append-only record of an account's balance after each change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BalanceLogEntry {
    pub id: String,
    pub account_id: String,
    pub balance_cents: i64,
    pub logged_at: DateTime<Utc>,
}

/// Audit record of an inter-account fund transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AccountMovement {
    pub id: String,
    pub from_account_id: String,
    pub to_account_id: String,
    /// Amount deducted from the source.
    pub amount_cents: i64,
    /// Amount credited to the destination after any rate conversion.
    pub credited_cents: i64,
    /// Conversion factor applied, in micro-units (1_000_000 = 1.0).
    pub rate_micros: i64,
    pub moved_at: DateTime<Utc>,
}

/// Whether an outbound account charge is an expense or a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ExpenseKind {
    Expense,
    Payment,
}

/// An expense or payment charged against an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ExpenseRecord {
    pub id: String,
    pub account_id: String,
    pub amount_cents: i64,
    pub description: String,
    pub kind: ExpenseKind,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// A shopkeeper-submitted physical count for one stock row.
///
/// `base_count` captures the recorded quantity at submission time;
/// reconciliation re-marks it to the submitted count once harmonized so
/// repeated runs within the day are no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DailyCount {
    pub id: String,
    pub location_stock_id: String,
    pub submitted_count: i64,
    pub base_count: i64,
    pub count_date: NaiveDate,
    pub counted_at: DateTime<Utc>,
}

/// Permanent audit trail of shrinkage/surplus: the signed delta adopted
/// when a physical count disagreed with the recorded quantity. One row per
/// stock row per day, incremented if reconciliation fires again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CountDifference {
    pub id: String,
    pub location_stock_id: String,
    pub quantity: i64,
    pub diff_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
