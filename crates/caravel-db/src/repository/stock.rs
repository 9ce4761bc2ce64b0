//! # Location Inventory Repository
//!
//! Per-location quantity and valuation of each catalog item.
//!
//! ## Receive Flow (the one place average-cost accounting happens)
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  receive(location, item, qty, unit_cost)                             │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  old_total = Σ quantity at ALL locations                             │
//! │            + Σ quantity of unreceived transfers   (stock in transit) │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  new_cost = (old_cost×old_total + unit_cost×qty) / (old_total+qty)   │
//! │       │                                                              │
//! │       ├── items.cost_cents updated                                   │
//! │       ├── stock row upserted (quantity += qty)                       │
//! │       ├── EVERY location's value revalued at new_cost                │
//! │       ├── status recomputed against the location's threshold         │
//! │       └── stock_receipts log row appended                            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `deduct` never lets a quantity go negative: the check and the decrement
//! run inside the same write transaction, so concurrent checkouts against
//! one shop cannot both pass on a stale read.
//!
//! The `*_on` helpers take an open transaction connection so the transfer
//! and sale protocols can compose stock mutations into their own atomic
//! sequences.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use caravel_core::validation::validate_quantity;
use caravel_core::{
    weighted_average_cost, CoreError, Item, LocationStock, Money, StockReceipt, StockStatus,
    StockThresholds,
};

use crate::error::{DbError, DbResult};
use crate::repository::location;

/// Repository for location inventory operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
    thresholds: StockThresholds,
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool, thresholds: StockThresholds) -> Self {
        StockRepository { pool, thresholds }
    }

    /// Receives a batch of stock at a location (stock-in from a supplier,
    /// or the destination half of a transfer).
    ///
    /// Applies the quantity-weighted moving-average cost across everything
    /// held anywhere plus stock in transit, creates the stock row lazily if
    /// this is the first receipt at the location, and logs the receipt.
    pub async fn receive(
        &self,
        location_id: &str,
        item_id: &str,
        quantity: i64,
        unit_cost: Money,
    ) -> DbResult<LocationStock> {
        let mut tx = self.pool.begin().await?;
        let stock = receive_on(
            &mut tx,
            &self.thresholds,
            location_id,
            item_id,
            quantity,
            unit_cost,
        )
        .await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Deducts stock from a location.
    ///
    /// ## Errors
    /// `CoreError::InsufficientStock` when the location holds less than
    /// requested; the row is left untouched.
    pub async fn deduct(
        &self,
        location_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> DbResult<LocationStock> {
        let mut tx = self.pool.begin().await?;
        let stock = deduct_on(&mut tx, &self.thresholds, location_id, item_id, quantity).await?;
        tx.commit().await?;
        Ok(stock)
    }

    /// Gets the stock row for a (location, item) pair.
    pub async fn stock_at(
        &self,
        location_id: &str,
        item_id: &str,
    ) -> DbResult<Option<LocationStock>> {
        let stock = sqlx::query_as::<_, LocationStock>(
            r#"
            SELECT id, location_id, item_id, quantity, value_cents, status, updated_at
            FROM location_stocks
            WHERE location_id = ?1 AND item_id = ?2
            "#,
        )
        .bind(location_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    /// Per-location stock list with item names, value and status - the
    /// query feeding the location stock views.
    pub async fn list_for_location(&self, location_id: &str) -> DbResult<Vec<StockLine>> {
        let lines = sqlx::query_as::<_, StockLine>(
            r#"
            SELECT ls.id AS stock_id, i.name AS item_name, ls.quantity,
                   ls.value_cents, ls.status
            FROM location_stocks ls
            JOIN items i ON i.id = ls.item_id
            WHERE ls.location_id = ?1
            ORDER BY i.name
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Explicit administrative removal of a stock row.
    ///
    /// Independent of the quantity reaching zero; a row survives at zero
    /// until an administrator removes it.
    pub async fn remove_stock_row(&self, stock_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM location_stocks WHERE id = ?1")
            .bind(stock_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("LocationStock", stock_id));
        }

        debug!(stock_id = %stock_id, "Stock row removed");
        Ok(())
    }

    /// Total on-hand quantity of an item across all locations.
    pub async fn total_on_hand(&self, item_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM location_stocks WHERE item_id = ?1",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Total quantity of an item sitting in unreceived transfers.
    pub async fn total_in_transit(&self, item_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM transfers WHERE item_id = ?1 AND received = 0",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// The stock-received log, newest first (feeds the CSV export).
    pub async fn receipts_log(&self) -> DbResult<Vec<StockReceipt>> {
        let receipts = sqlx::query_as::<_, StockReceipt>(
            r#"
            SELECT id, location_id, item_id, quantity, unit_cost_cents, received_at
            FROM stock_receipts
            ORDER BY received_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }
}

/// One row of a per-location stock view.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockLine {
    pub stock_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub value_cents: i64,
    pub status: StockStatus,
}

// =============================================================================
// Transaction-Composable Helpers
// =============================================================================

/// Fetches an item inside an open transaction.
pub(crate) async fn item_on(conn: &mut SqliteConnection, item_id: &str) -> DbResult<Item> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, name, cost_cents, selling_cents, created_at, updated_at
        FROM items
        WHERE id = ?1
        "#,
    )
    .bind(item_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("Item", item_id))
}

/// Applies a stock receipt inside an open transaction. See the module docs
/// for the full flow.
pub(crate) async fn receive_on(
    conn: &mut SqliteConnection,
    thresholds: &StockThresholds,
    location_id: &str,
    item_id: &str,
    quantity: i64,
    unit_cost: Money,
) -> DbResult<LocationStock> {
    validate_quantity(quantity).map_err(CoreError::from)?;

    let location = location::get_on(conn, location_id).await?;
    let item = item_on(conn, item_id).await?;

    // Everything held anywhere, plus outstanding unreceived transfers:
    // stock in transit still carries the old cost and must weigh into the
    // average.
    let on_hand: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM location_stocks WHERE item_id = ?1",
    )
    .bind(item_id)
    .fetch_one(&mut *conn)
    .await?;

    let in_transit: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(quantity), 0) FROM transfers WHERE item_id = ?1 AND received = 0",
    )
    .bind(item_id)
    .fetch_one(&mut *conn)
    .await?;

    let new_cost = weighted_average_cost(item.cost(), on_hand + in_transit, unit_cost, quantity);
    let now = Utc::now();

    if new_cost != item.cost() {
        sqlx::query("UPDATE items SET cost_cents = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(item_id)
            .bind(new_cost.cents())
            .bind(now)
            .execute(&mut *conn)
            .await?;
    }

    // Lazy row creation on first receipt at this location.
    let existing = sqlx::query_as::<_, LocationStock>(
        r#"
        SELECT id, location_id, item_id, quantity, value_cents, status, updated_at
        FROM location_stocks
        WHERE location_id = ?1 AND item_id = ?2
        "#,
    )
    .bind(location_id)
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?;

    let threshold = thresholds.for_kind(location.kind);

    let (stock_id, new_quantity) = match existing {
        Some(row) => {
            let new_quantity = row.quantity + quantity;
            sqlx::query("UPDATE location_stocks SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&row.id)
                .bind(new_quantity)
                .bind(now)
                .execute(&mut *conn)
                .await?;
            (row.id, new_quantity)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO location_stocks (
                    id, location_id, item_id, quantity, value_cents, status, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&id)
            .bind(location_id)
            .bind(item_id)
            .bind(quantity)
            .bind(new_cost.multiply_quantity(quantity).cents())
            .bind(StockStatus::for_quantity(quantity, threshold))
            .bind(now)
            .execute(&mut *conn)
            .await?;
            (id, quantity)
        }
    };

    // The new average revalues the item's stock at EVERY location.
    sqlx::query(
        "UPDATE location_stocks SET value_cents = quantity * ?2, updated_at = ?3 WHERE item_id = ?1",
    )
    .bind(item_id)
    .bind(new_cost.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE location_stocks SET status = ?2 WHERE id = ?1")
        .bind(&stock_id)
        .bind(StockStatus::for_quantity(new_quantity, threshold))
        .execute(&mut *conn)
        .await?;

    let receipt_id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO stock_receipts (id, location_id, item_id, quantity, unit_cost_cents, received_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&receipt_id)
    .bind(location_id)
    .bind(item_id)
    .bind(quantity)
    .bind(unit_cost.cents())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(
        location = %location.name,
        item = %item.name,
        quantity,
        new_cost = %new_cost,
        "Stock received"
    );

    fetch_stock_on(conn, &stock_id).await
}

/// Deducts stock inside an open transaction.
pub(crate) async fn deduct_on(
    conn: &mut SqliteConnection,
    thresholds: &StockThresholds,
    location_id: &str,
    item_id: &str,
    quantity: i64,
) -> DbResult<LocationStock> {
    validate_quantity(quantity).map_err(CoreError::from)?;

    let location = location::get_on(conn, location_id).await?;
    let item = item_on(conn, item_id).await?;

    let existing = sqlx::query_as::<_, LocationStock>(
        r#"
        SELECT id, location_id, item_id, quantity, value_cents, status, updated_at
        FROM location_stocks
        WHERE location_id = ?1 AND item_id = ?2
        "#,
    )
    .bind(location_id)
    .bind(item_id)
    .fetch_optional(&mut *conn)
    .await?;

    let available = existing.as_ref().map(|s| s.quantity).unwrap_or(0);
    if available < quantity {
        return Err(CoreError::InsufficientStock {
            item: item.name,
            available,
            requested: quantity,
        }
        .into());
    }

    // Checked above, so unwrap-free: a row with enough quantity exists.
    let row = existing.ok_or_else(|| DbError::not_found("LocationStock", item_id))?;

    let new_quantity = row.quantity - quantity;
    let threshold = thresholds.for_kind(location.kind);
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE location_stocks
        SET quantity = ?2, value_cents = ?2 * ?3, status = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(&row.id)
    .bind(new_quantity)
    .bind(item.cost_cents)
    .bind(StockStatus::for_quantity(new_quantity, threshold))
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(
        location = %location.name,
        item = %item.name,
        quantity,
        remaining = new_quantity,
        "Stock deducted"
    );

    fetch_stock_on(conn, &row.id).await
}

/// Fetches a stock row by id inside an open transaction.
pub(crate) async fn fetch_stock_on(
    conn: &mut SqliteConnection,
    stock_id: &str,
) -> DbResult<LocationStock> {
    sqlx::query_as::<_, LocationStock>(
        r#"
        SELECT id, location_id, item_id, quantity, value_cents, status, updated_at
        FROM location_stocks
        WHERE id = ?1
        "#,
    )
    .bind(stock_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("LocationStock", stock_id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caravel_core::LocationKind;

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let warehouse = db
            .locations()
            .create("Depot", LocationKind::Warehouse)
            .await
            .unwrap();
        let item = db
            .catalog()
            .create_item("Rice", Money::from_cents(300), Money::from_cents(500))
            .await
            .unwrap();
        (db, warehouse.id, item.id)
    }

    #[tokio::test]
    async fn test_receive_creates_row_lazily() {
        let (db, warehouse_id, item_id) = setup().await;

        assert!(db.stock().stock_at(&warehouse_id, &item_id).await.unwrap().is_none());

        let stock = db
            .stock()
            .receive(&warehouse_id, &item_id, 100, Money::from_cents(300))
            .await
            .unwrap();

        assert_eq!(stock.quantity, 100);
        assert_eq!(stock.value_cents, 30_000);
        assert_eq!(stock.status, StockStatus::InStock);

        let receipts = db.stock().receipts_log().await.unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].quantity, 100);
    }

    #[tokio::test]
    async fn test_receive_recomputes_weighted_average_cost() {
        let (db, warehouse_id, item_id) = setup().await;

        db.stock()
            .receive(&warehouse_id, &item_id, 100, Money::from_cents(300))
            .await
            .unwrap();

        // 50 more at 4.50: (300×100 + 450×50) / 150 = 350
        let stock = db
            .stock()
            .receive(&warehouse_id, &item_id, 50, Money::from_cents(450))
            .await
            .unwrap();

        let item = db.catalog().get_item(&item_id).await.unwrap().unwrap();
        assert_eq!(item.cost_cents, 350);

        // On-hand value follows the new average: 150 × 3.50
        assert_eq!(stock.quantity, 150);
        assert_eq!(stock.value_cents, 52_500);
    }

    #[tokio::test]
    async fn test_receive_counts_stock_in_transit_in_the_average() {
        let (db, warehouse_id, item_id) = setup().await;
        let shop = db.locations().create("Shop", LocationKind::Shop).await.unwrap();

        db.stock()
            .receive(&warehouse_id, &item_id, 100, Money::from_cents(300))
            .await
            .unwrap();

        // 40 units leave the warehouse but are not yet received: they must
        // still weigh into the average at the old cost.
        db.transfers()
            .dispatch(&warehouse_id, &shop.id, &item_id, 40)
            .await
            .unwrap();
        assert_eq!(db.stock().total_on_hand(&item_id).await.unwrap(), 60);
        assert_eq!(db.stock().total_in_transit(&item_id).await.unwrap(), 40);

        // Receive 100 at 4.00: old_total = 60 + 40 = 100,
        // (300×100 + 400×100) / 200 = 350.
        db.stock()
            .receive(&warehouse_id, &item_id, 100, Money::from_cents(400))
            .await
            .unwrap();

        let item = db.catalog().get_item(&item_id).await.unwrap().unwrap();
        assert_eq!(item.cost_cents, 350);
    }

    #[tokio::test]
    async fn test_deduct_insufficient_stock_leaves_state_unchanged() {
        let (db, warehouse_id, item_id) = setup().await;

        db.stock()
            .receive(&warehouse_id, &item_id, 10, Money::from_cents(300))
            .await
            .unwrap();

        let err = db
            .stock()
            .deduct(&warehouse_id, &item_id, 11)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 10,
                requested: 11,
                ..
            })
        ));

        let stock = db.stock().stock_at(&warehouse_id, &item_id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 10);
    }

    #[tokio::test]
    async fn test_deduct_from_missing_row_reports_zero_available() {
        let (db, warehouse_id, item_id) = setup().await;

        let err = db.stock().deduct(&warehouse_id, &item_id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_status_flips_at_threshold() {
        let (db, warehouse_id, item_id) = setup().await;

        // Warehouse threshold defaults to 40.
        let stock = db
            .stock()
            .receive(&warehouse_id, &item_id, 45, Money::from_cents(300))
            .await
            .unwrap();
        assert_eq!(stock.status, StockStatus::InStock);

        let stock = db.stock().deduct(&warehouse_id, &item_id, 10).await.unwrap();
        assert_eq!(stock.quantity, 35);
        assert_eq!(stock.status, StockStatus::RunningOut);
    }

    #[tokio::test]
    async fn test_zero_quantity_row_survives_until_removed() {
        let (db, warehouse_id, item_id) = setup().await;

        db.stock()
            .receive(&warehouse_id, &item_id, 5, Money::from_cents(300))
            .await
            .unwrap();
        db.stock().deduct(&warehouse_id, &item_id, 5).await.unwrap();

        let stock = db.stock().stock_at(&warehouse_id, &item_id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 0);

        db.stock().remove_stock_row(&stock.id).await.unwrap();
        assert!(db.stock().stock_at(&warehouse_id, &item_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stock_line_view_includes_item_names() {
        let (db, warehouse_id, item_id) = setup().await;

        db.stock()
            .receive(&warehouse_id, &item_id, 50, Money::from_cents(300))
            .await
            .unwrap();

        let lines = db.stock().list_for_location(&warehouse_id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item_name, "Rice");
        assert_eq!(lines[0].quantity, 50);
        assert_eq!(lines[0].value_cents, 15_000);
    }
}
