//! # Daily Count & Reconciliation Repository
//!
//! Shopkeeper-submitted physical counts reconciled against recorded
//! quantities.
//!
//! ## Reconciliation Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  submit_daily_counts({stock: submitted, ...})                        │
//! │       │                                                              │
//! │       └── DailyCount rows capture submitted AND the recorded         │
//! │           quantity at that moment (base_count)                       │
//! │       ▼                                                              │
//! │  reconcile(shop, item)       (today's count)                         │
//! │       │                                                              │
//! │       ├── base == submitted ──► no-op                                │
//! │       │                                                              │
//! │       └── delta = submitted − base                                   │
//! │            ├── CountDifference upserted for (stock, today)           │
//! │            ├── stock quantity set to the SUBMITTED count             │
//! │            │   (the physical count is adopted as truth)              │
//! │            └── base_count re-marked = submitted                      │
//! │                → a second run the same day finds delta 0             │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the only place the quantity-conservation invariant is broken
//! intentionally: the difference rows are the permanent audit trail of
//! shrinkage and surplus.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use caravel_core::{
    CountDifference, DailyCount, LocationStock, StockStatus, StockThresholds,
};

use crate::error::{DbError, DbResult};
use crate::repository::{location, stock};

/// Repository for daily-count operations.
#[derive(Debug, Clone)]
pub struct CountRepository {
    pool: SqlitePool,
    thresholds: StockThresholds,
}

impl CountRepository {
    /// Creates a new CountRepository.
    pub fn new(pool: SqlitePool, thresholds: StockThresholds) -> Self {
        CountRepository { pool, thresholds }
    }

    /// Records a batch of physical counts, one per stock row, capturing
    /// the recorded quantity at submission time as each row's base count.
    pub async fn submit_daily_counts(
        &self,
        entries: &[(String, i64)],
    ) -> DbResult<Vec<DailyCount>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let today = now.date_naive();

        let mut counts = Vec::with_capacity(entries.len());
        for (stock_id, submitted) in entries {
            let stock_row = stock::fetch_stock_on(&mut tx, stock_id).await?;

            let count = DailyCount {
                id: Uuid::new_v4().to_string(),
                location_stock_id: stock_row.id,
                submitted_count: *submitted,
                base_count: stock_row.quantity,
                count_date: today,
                counted_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO daily_counts (
                    id, location_stock_id, submitted_count, base_count, count_date, counted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&count.id)
            .bind(&count.location_stock_id)
            .bind(count.submitted_count)
            .bind(count.base_count)
            .bind(count.count_date)
            .bind(count.counted_at)
            .execute(&mut *tx)
            .await?;

            counts.push(count);
        }

        tx.commit().await?;

        info!(entries = counts.len(), "Daily counts submitted");

        Ok(counts)
    }

    /// Reconciles today's count for an item at a shop.
    ///
    /// Returns `Ok(None)` when there is nothing to do: no count was
    /// submitted today, or it already agrees with the recorded quantity
    /// (including after an earlier reconciliation run the same day).
    pub async fn reconcile(
        &self,
        shop_id: &str,
        item_id: &str,
    ) -> DbResult<Option<CountDifference>> {
        let mut tx = self.pool.begin().await?;

        let stock_row = sqlx::query_as::<_, LocationStock>(
            r#"
            SELECT id, location_id, item_id, quantity, value_cents, status, updated_at
            FROM location_stocks
            WHERE location_id = ?1 AND item_id = ?2
            "#,
        )
        .bind(shop_id)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("LocationStock", item_id))?;

        let today = Utc::now().date_naive();

        let count = sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT id, location_stock_id, submitted_count, base_count, count_date, counted_at
            FROM daily_counts
            WHERE location_stock_id = ?1 AND count_date = ?2
            ORDER BY counted_at DESC
            LIMIT 1
            "#,
        )
        .bind(&stock_row.id)
        .bind(today)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(count) = count else {
            return Ok(None);
        };

        let delta = count.submitted_count - count.base_count;
        if delta == 0 {
            return Ok(None);
        }

        // One difference row per stock row per day; a second discrepancy
        // the same day accumulates into it.
        sqlx::query(
            r#"
            INSERT INTO count_differences (id, location_stock_id, quantity, diff_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (location_stock_id, diff_date)
            DO UPDATE SET quantity = quantity + excluded.quantity
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&stock_row.id)
        .bind(delta)
        .bind(today)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        // The physical count becomes the recorded truth.
        let item = stock::item_on(&mut tx, item_id).await?;
        let shop = location::get_on(&mut tx, shop_id).await?;
        let threshold = self.thresholds.for_kind(shop.kind);

        sqlx::query(
            r#"
            UPDATE location_stocks
            SET quantity = ?2, value_cents = ?2 * ?3, status = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&stock_row.id)
        .bind(count.submitted_count)
        .bind(item.cost_cents)
        .bind(StockStatus::for_quantity(count.submitted_count, threshold))
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        // Re-mark the count as harmonized so a repeat run is a no-op.
        sqlx::query("UPDATE daily_counts SET base_count = ?2 WHERE id = ?1")
            .bind(&count.id)
            .bind(count.submitted_count)
            .execute(&mut *tx)
            .await?;

        let difference = fetch_difference_on(&mut tx, &stock_row.id, today).await?;

        tx.commit().await?;

        info!(
            shop = %shop.name,
            item = %item.name,
            delta,
            adopted = count.submitted_count,
            "Count reconciled"
        );

        Ok(Some(difference))
    }

    /// Count differences recorded for a location, newest first.
    pub async fn differences_for_location(
        &self,
        location_id: &str,
    ) -> DbResult<Vec<CountDifference>> {
        let differences = sqlx::query_as::<_, CountDifference>(
            r#"
            SELECT cd.id, cd.location_stock_id, cd.quantity, cd.diff_date, cd.created_at
            FROM count_differences cd
            JOIN location_stocks ls ON ls.id = cd.location_stock_id
            WHERE ls.location_id = ?1
            ORDER BY cd.diff_date DESC
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(differences)
    }

    /// Counts submitted on a given date.
    pub async fn counts_for_date(
        &self,
        date: chrono::NaiveDate,
    ) -> DbResult<Vec<DailyCount>> {
        let counts = sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT id, location_stock_id, submitted_count, base_count, count_date, counted_at
            FROM daily_counts
            WHERE count_date = ?1
            ORDER BY counted_at
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

/// Fetches the day's difference row for a stock row.
async fn fetch_difference_on(
    conn: &mut SqliteConnection,
    stock_id: &str,
    date: chrono::NaiveDate,
) -> DbResult<CountDifference> {
    sqlx::query_as::<_, CountDifference>(
        r#"
        SELECT id, location_stock_id, quantity, diff_date, created_at
        FROM count_differences
        WHERE location_stock_id = ?1 AND diff_date = ?2
        "#,
    )
    .bind(stock_id)
    .bind(date)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("CountDifference", stock_id))
}

// =============================================================================
// Unit Tests
// =============================================================================
