//! # caravel-db: Database Layer for Caravel
//!
//! SQLite persistence for the Caravel inventory and ledger core, built on
//! sqlx with embedded migrations.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Caravel Data Flow                             │
//! │                                                                      │
//! │  Collaborator (views / forms / exports)                              │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  ┌────────────────────────────────────────────────────────────────┐ │
//! │  │                    caravel-db (THIS CRATE)                     │ │
//! │  │                                                                │ │
//! │  │  ┌──────────┐  ┌──────────────────────────┐  ┌─────────────┐  │ │
//! │  │  │ Database │  │ Repositories             │  │ Migrations  │  │ │
//! │  │  │ (pool)   │◄─│ catalog stock transfer   │  │ (embedded)  │  │ │
//! │  │  │          │  │ sale ledger count        │  │             │  │ │
//! │  │  └──────────┘  └──────────────────────────┘  └─────────────┘  │ │
//! │  └────────────────────────────────────────────────────────────────┘ │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  SQLite (WAL mode, foreign keys on)                                  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transaction Discipline
//!
//! Every multi-step sequence - deduct-then-transfer, checkout-then-credit,
//! reconcile-then-adjust - executes as a single transaction. Partial
//! application (stock deducted but no transfer record, say) is a
//! correctness bug, not an acceptable race, so repositories expose
//! `pub(crate)` helpers that run on an open transaction connection and the
//! protocols stitch them together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caravel_db::{Database, DbConfig};
//! use caravel_core::{Money, PaymentMethod};
//!
//! let db = Database::new(DbConfig::new("./caravel.db")).await?;
//!
//! let item = db.catalog()
//!     .create_item("Rice", Money::from_cents(300), Money::from_cents(500))
//!     .await?;
//! db.stock().receive(&warehouse_id, &item.id, 100, Money::from_cents(300)).await?;
//! db.transfers().dispatch(&warehouse_id, &shop_id, &item.id, 50).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod export;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use export::ExportRepository;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::count::CountRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::location::LocationRepository;
pub use repository::sale::SaleRepository;
pub use repository::stock::StockRepository;
pub use repository::transfer::TransferRepository;
