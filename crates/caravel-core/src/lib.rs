//! # caravel-core: Pure Business Logic for Caravel
//!
//! This crate is the heart of Caravel, the inventory and ledger core of a
//! multi-location retail operations system. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      Caravel Architecture                            │
//! │                                                                      │
//! │  ┌────────────────────────────────────────────────────────────────┐ │
//! │  │         Excluded collaborators (views, forms, auth)            │ │
//! │  └───────────────────────────────┬────────────────────────────────┘ │
//! │                                  │                                   │
//! │  ┌───────────────────────────────▼────────────────────────────────┐ │
//! │  │                  caravel-db (persistence)                      │ │
//! │  │    repositories, transactions, migrations, CSV exports         │ │
//! │  └───────────────────────────────┬────────────────────────────────┘ │
//! │                                  │                                   │
//! │  ┌───────────────────────────────▼────────────────────────────────┐ │
//! │  │               ★ caravel-core (THIS CRATE) ★                    │ │
//! │  │                                                                │ │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌────────────┐          │ │
//! │  │   │  types  │ │  money  │ │  cart   │ │ validation │          │ │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └────────────┘          │ │
//! │  │                                                                │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │ │
//! │  └────────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Item, LocationStock, Transfer, Sale, ...)
//! - [`money`] - Integer-cents money, exchange rates, average-cost math
//! - [`cart`] - Pure cart pricing
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`config`] - Business constants (Running-Out thresholds)
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic, no side effects
//! 2. **No I/O**: database and network access are FORBIDDEN here
//! 3. **Integer Money**: all monetary values are cents (i64), never floats
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod config;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::StockThresholds;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{weighted_average_cost, ExchangeRate, Money};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity accepted for a single cart line or stock movement.
///
/// Guards against fat-finger entries (typing 100000 instead of 100).
pub const MAX_LINE_QUANTITY: i64 = 100_000;
