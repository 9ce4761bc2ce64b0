//! # Stock Movement Repository
//!
//! Two-phase transfer of quantity between locations.
//!
//! ## State Machine
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                                                                      │
//! │   dispatch(source, dest, item, qty)                                  │
//! │        │                                                             │
//! │        ├── deduct at source  ──── fails → whole operation aborts     │
//! │        │                                                             │
//! │        ▼                                                             │
//! │   Transfer { SENT }  ──── receive ───►  Transfer { RECEIVED }        │
//! │                                              │         (terminal)    │
//! │                                              ▼                       │
//! │                                  destination stock row               │
//! │                                  created/incremented at the          │
//! │                                  item's current cost                 │
//! │                                                                      │
//! │   No partial receive, no re-send, no cancellation.                   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantity is conserved across the two phases: on-hand totals plus
//! unreceived transfer quantity never change through a dispatch/receive
//! pair.
//!
//! Completion is id-addressed (`receive_transfer`). The content-matching
//! lookup of the legacy system survives as [`TransferRepository::receive_matching`]:
//! best-effort against the sent ledger, warning instead of failing when
//! nothing matches.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use caravel_core::validation::validate_quantity;
use caravel_core::{CoreError, Money, StockThresholds, Transfer};

use crate::error::{DbError, DbResult};
use crate::repository::stock;

/// Repository for stock movement operations.
#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
    thresholds: StockThresholds,
}

impl TransferRepository {
    /// Creates a new TransferRepository.
    pub fn new(pool: SqlitePool, thresholds: StockThresholds) -> Self {
        TransferRepository { pool, thresholds }
    }

    /// Sends stock from one location toward another.
    ///
    /// Deducts at the source first; if that fails the whole operation
    /// fails and no transfer record exists. Covers both warehouse→shop
    /// dispatch and shop→shop relay.
    ///
    /// ## Errors
    /// - `CoreError::InvalidTransfer` on self-transfer
    /// - `CoreError::InsufficientStock` when the source cannot cover it
    pub async fn dispatch(
        &self,
        source_location_id: &str,
        dest_location_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<Transfer> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        if source_location_id == dest_location_id {
            return Err(CoreError::InvalidTransfer {
                reason: "source and destination are the same location".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        stock::deduct_on(&mut tx, &self.thresholds, source_location_id, item_id, quantity).await?;

        let transfer = Transfer {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            quantity,
            source_location_id: source_location_id.to_string(),
            dest_location_id: dest_location_id.to_string(),
            sent_at: Utc::now(),
            received: false,
            received_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, item_id, quantity, source_location_id, dest_location_id,
                sent_at, received, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.item_id)
        .bind(transfer.quantity)
        .bind(&transfer.source_location_id)
        .bind(&transfer.dest_location_id)
        .bind(transfer.sent_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            transfer_id = %transfer.id,
            item_id = %item_id,
            quantity,
            source = %source_location_id,
            dest = %dest_location_id,
            "Transfer dispatched"
        );

        Ok(transfer)
    }

    /// Completes a transfer by id: flips it to RECEIVED and applies the
    /// receipt at the destination, at the item's current cost price.
    ///
    /// ## Errors
    /// - `DbError::NotFound` for an unknown id
    /// - `CoreError::InvalidTransfer` when the transfer was already received
    pub async fn receive_transfer(&self, transfer_id: &str) -> DbResult<Transfer> {
        let mut tx = self.pool.begin().await?;

        let transfer = fetch_on(&mut tx, transfer_id).await?;
        if transfer.received {
            return Err(CoreError::InvalidTransfer {
                reason: format!("transfer {} was already received", transfer_id),
            }
            .into());
        }

        let received = complete_on(&mut tx, &self.thresholds, transfer).await?;

        tx.commit().await?;
        Ok(received)
    }

    /// Legacy content-matching completion: resolves the OLDEST unreceived
    /// transfer matching (destination, item, quantity) and completes it.
    ///
    /// Two in-flight transfers sharing item and quantity are
    /// indistinguishable here; prefer [`Self::receive_transfer`]. When
    /// nothing matches the receive workflow is not aborted: a warning is
    /// logged and `Ok(None)` returned.
    pub async fn receive_matching(
        &self,
        dest_location_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<Option<Transfer>> {
        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, item_id, quantity, source_location_id, dest_location_id,
                   sent_at, received, received_at
            FROM transfers
            WHERE dest_location_id = ?1 AND item_id = ?2 AND quantity = ?3 AND received = 0
            ORDER BY sent_at
            LIMIT 1
            "#,
        )
        .bind(dest_location_id)
        .bind(item_id)
        .bind(quantity)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(transfer) = candidate else {
            let soft_fail = CoreError::NoMatchingTransfer {
                item: item_id.to_string(),
                quantity,
                destination: dest_location_id.to_string(),
            };
            warn!(error = %soft_fail, "Receive did not match any sent transfer");
            return Ok(None);
        };

        let received = complete_on(&mut tx, &self.thresholds, transfer).await?;

        tx.commit().await?;
        Ok(Some(received))
    }

    /// Gets a transfer by id.
    pub async fn get(&self, transfer_id: &str) -> DbResult<Option<Transfer>> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, item_id, quantity, source_location_id, dest_location_id,
                   sent_at, received, received_at
            FROM transfers
            WHERE id = ?1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(transfer)
    }

    /// Transfer history touching a location (as source or destination),
    /// newest first.
    pub async fn transfers_for_location(&self, location_id: &str) -> DbResult<Vec<Transfer>> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, item_id, quantity, source_location_id, dest_location_id,
                   sent_at, received, received_at
            FROM transfers
            WHERE source_location_id = ?1 OR dest_location_id = ?1
            ORDER BY sent_at DESC
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }

    /// Unreceived transfers bound for a destination, oldest first.
    pub async fn unreceived_for(&self, dest_location_id: &str) -> DbResult<Vec<Transfer>> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, item_id, quantity, source_location_id, dest_location_id,
                   sent_at, received, received_at
            FROM transfers
            WHERE dest_location_id = ?1 AND received = 0
            ORDER BY sent_at
            "#,
        )
        .bind(dest_location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }
}

// =============================================================================
// Transaction-Composable Helpers
// =============================================================================

/// Fetches a transfer inside an open transaction.
async fn fetch_on(conn: &mut SqliteConnection, transfer_id: &str) -> DbResult<Transfer> {
    sqlx::query_as::<_, Transfer>(
        r#"
        SELECT id, item_id, quantity, source_location_id, dest_location_id,
               sent_at, received, received_at
        FROM transfers
        WHERE id = ?1
        "#,
    )
    .bind(transfer_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("Transfer", transfer_id))
}

/// Flips a SENT transfer to RECEIVED and applies the destination receipt,
/// all on the caller's transaction.
async fn complete_on(
    conn: &mut SqliteConnection,
    thresholds: &StockThresholds,
    transfer: Transfer,
) -> DbResult<Transfer> {
    let now = Utc::now();

    // Guarded flip: rows_affected = 0 means another receive won the race.
    let result = sqlx::query(
        "UPDATE transfers SET received = 1, received_at = ?2 WHERE id = ?1 AND received = 0",
    )
    .bind(&transfer.id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::InvalidTransfer {
            reason: format!("transfer {} was already received", transfer.id),
        }
        .into());
    }

    // Destination receives at the item's CURRENT cost: feeding the average
    // back into itself leaves the item's cost untouched.
    let item = stock::item_on(conn, &transfer.item_id).await?;
    stock::receive_on(
        conn,
        thresholds,
        &transfer.dest_location_id,
        &transfer.item_id,
        transfer.quantity,
        Money::from_cents(item.cost_cents),
    )
    .await?;

    info!(
        transfer_id = %transfer.id,
        item = %item.name,
        quantity = transfer.quantity,
        dest = %transfer.dest_location_id,
        "Transfer received"
    );

    Ok(Transfer {
        received: true,
        received_at: Some(now),
        ..transfer
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
