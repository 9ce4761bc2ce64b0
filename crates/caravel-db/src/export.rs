//! # Tabular Exports
//!
//! CSV exports of the three operational logs:
//!
//! | Export                | Columns                                                        |
//! |-----------------------|----------------------------------------------------------------|
//! | stock-received log    | date, item, quantity                                           |
//! | sales log             | date, item, quantity, discount, value                          |
//! | monthly profit report | month, shop, total_sales, total_cost, total_discount, total_profit |
//!
//! Column semantics are the contract; monetary columns are rendered in
//! major units (e.g. `16.00`). Spreadsheet glue around these strings is a
//! collaborator concern, not this crate's.

use csv::Writer;
use sqlx::SqlitePool;
use tracing::debug;

use caravel_core::Money;

use crate::error::{DbError, DbResult};

/// Repository producing the tabular exports.
#[derive(Debug, Clone)]
pub struct ExportRepository {
    pool: SqlitePool,
}

/// One row of the stock-received export.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockReceivedRow {
    pub date: String,
    pub item: String,
    pub quantity: i64,
}

/// One row of the sales-log export.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesLogRow {
    pub date: String,
    pub item: String,
    pub quantity: i64,
    pub discount_cents: i64,
    pub value_cents: i64,
}

/// One row of the monthly profit-by-shop export.
///
/// `total_cost` sums each line's frozen cost snapshot × quantity;
/// `total_profit` = total_sales − total_cost.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyProfitRow {
    pub month: String,
    pub shop: String,
    pub total_sales_cents: i64,
    pub total_cost_cents: i64,
    pub total_discount_cents: i64,
    pub total_profit_cents: i64,
}

impl ExportRepository {
    /// Creates a new ExportRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExportRepository { pool }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Stock-received log rows, oldest first.
    pub async fn stock_received_rows(&self) -> DbResult<Vec<StockReceivedRow>> {
        let rows = sqlx::query_as::<_, StockReceivedRow>(
            r#"
            SELECT date(sr.received_at) AS date, i.name AS item, sr.quantity
            FROM stock_receipts sr
            JOIN items i ON i.id = sr.item_id
            ORDER BY sr.received_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Sales log rows (one per sold line), oldest first.
    pub async fn sales_log_rows(&self) -> DbResult<Vec<SalesLogRow>> {
        let rows = sqlx::query_as::<_, SalesLogRow>(
            r#"
            SELECT date(s.created_at) AS date, i.name AS item, cl.quantity,
                   cl.discount_cents, cl.value_cents
            FROM cart_lines cl
            JOIN sales s ON s.id = cl.sale_id
            JOIN items i ON i.id = cl.item_id
            ORDER BY s.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Monthly profit per shop: total sales, cost basis, discounts
    /// (aggregate + per-line) and profit.
    pub async fn monthly_profit_rows(&self) -> DbResult<Vec<MonthlyProfitRow>> {
        let rows = sqlx::query_as::<_, MonthlyProfitRow>(
            r#"
            SELECT sa.month, sa.shop,
                   sa.total_sales_cents,
                   li.total_cost_cents,
                   sa.aggregate_discount_cents + li.line_discount_cents AS total_discount_cents,
                   sa.total_sales_cents - li.total_cost_cents AS total_profit_cents
            FROM (
                SELECT strftime('%Y-%m', s.created_at) AS month, s.shop_id,
                       l.name AS shop,
                       SUM(s.sales_value_cents) AS total_sales_cents,
                       SUM(s.discount_cents) AS aggregate_discount_cents
                FROM sales s
                JOIN locations l ON l.id = s.shop_id
                GROUP BY month, s.shop_id
            ) sa
            JOIN (
                SELECT strftime('%Y-%m', s.created_at) AS month, s.shop_id,
                       SUM(cl.cost_cents * cl.quantity) AS total_cost_cents,
                       SUM(cl.discount_cents * cl.quantity) AS line_discount_cents
                FROM cart_lines cl
                JOIN sales s ON s.id = cl.sale_id
                GROUP BY month, s.shop_id
            ) li ON li.month = sa.month AND li.shop_id = sa.shop_id
            ORDER BY sa.month, sa.shop
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // CSV Rendering
    // =========================================================================

    /// Renders the stock-received log as CSV.
    pub async fn stock_received_csv(&self) -> DbResult<String> {
        let rows = self.stock_received_rows().await?;

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(["date", "item", "quantity"])?;
        for row in &rows {
            let quantity = row.quantity.to_string();
            writer.write_record([row.date.as_str(), row.item.as_str(), quantity.as_str()])?;
        }

        debug!(rows = rows.len(), "Stock-received export rendered");
        into_csv_string(writer)
    }

    /// Renders the sales log as CSV.
    pub async fn sales_log_csv(&self) -> DbResult<String> {
        let rows = self.sales_log_rows().await?;

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record(["date", "item", "quantity", "discount", "value"])?;
        for row in &rows {
            let quantity = row.quantity.to_string();
            let discount = Money::from_cents(row.discount_cents).to_string();
            let value = Money::from_cents(row.value_cents).to_string();
            writer.write_record([
                row.date.as_str(),
                row.item.as_str(),
                quantity.as_str(),
                discount.as_str(),
                value.as_str(),
            ])?;
        }

        debug!(rows = rows.len(), "Sales-log export rendered");
        into_csv_string(writer)
    }

    /// Renders the monthly profit-by-shop report as CSV.
    pub async fn monthly_profit_csv(&self) -> DbResult<String> {
        let rows = self.monthly_profit_rows().await?;

        let mut writer = Writer::from_writer(Vec::new());
        writer.write_record([
            "month",
            "shop",
            "total_sales",
            "total_cost",
            "total_discount",
            "total_profit",
        ])?;
        for row in &rows {
            let sales = Money::from_cents(row.total_sales_cents).to_string();
            let cost = Money::from_cents(row.total_cost_cents).to_string();
            let discount = Money::from_cents(row.total_discount_cents).to_string();
            let profit = Money::from_cents(row.total_profit_cents).to_string();
            writer.write_record([
                row.month.as_str(),
                row.shop.as_str(),
                sales.as_str(),
                cost.as_str(),
                discount.as_str(),
                profit.as_str(),
            ])?;
        }

        debug!(rows = rows.len(), "Monthly-profit export rendered");
        into_csv_string(writer)
    }
}

fn into_csv_string(writer: Writer<Vec<u8>>) -> DbResult<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| DbError::ExportFailed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DbError::ExportFailed(e.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caravel_core::{LocationKind, PaymentMethod};

    /// Seeds a shop that received 10 Oil and sold 4 with a 1.00 per-unit
    /// discount.
    async fn setup_with_sale() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let shop = db.locations().create("S1", LocationKind::Shop).await.unwrap();
        let item = db
            .catalog()
            .create_item("Oil", Money::from_cents(300), Money::from_cents(500))
            .await
            .unwrap();
        db.stock()
            .receive(&shop.id, &item.id, 10, Money::from_cents(300))
            .await
            .unwrap();
        db.ledger()
            .create_account("cash", Some(PaymentMethod::Cash), false, Money::zero())
            .await
            .unwrap();
        db.sales()
            .add_to_cart(&shop.id, &item.id, 4, Money::from_cents(100))
            .await
            .unwrap();
        db.sales()
            .checkout(&shop.id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_stock_received_export() {
        let db = setup_with_sale().await;

        let csv = db.exports().stock_received_csv().await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("date,item,quantity"));

        let row = lines.next().unwrap();
        assert!(row.ends_with(",Oil,10"), "unexpected row: {row}");
        assert!(lines.next().is_none());
    }

    #[tokio::test]
    async fn test_sales_log_export() {
        let db = setup_with_sale().await;

        let csv = db.exports().sales_log_csv().await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("date,item,quantity,discount,value"));

        let row = lines.next().unwrap();
        // 4 × (5.00 − 1.00) = 16.00
        assert!(row.ends_with(",Oil,4,1.00,16.00"), "unexpected row: {row}");
    }

    #[tokio::test]
    async fn test_monthly_profit_export() {
        let db = setup_with_sale().await;

        let rows = db.exports().monthly_profit_rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].shop, "S1");
        // sales 16.00, cost 4 × 3.00 = 12.00, profit 4.00,
        // discounts: 0 aggregate + 4 × 1.00 per line.
        assert_eq!(rows[0].total_sales_cents, 1600);
        assert_eq!(rows[0].total_cost_cents, 1200);
        assert_eq!(rows[0].total_discount_cents, 400);
        assert_eq!(rows[0].total_profit_cents, 400);

        let csv = db.exports().monthly_profit_csv().await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("month,shop,total_sales,total_cost,total_discount,total_profit")
        );
        let row = lines.next().unwrap();
        assert!(row.ends_with(",S1,16.00,12.00,4.00,4.00"), "unexpected row: {row}");
    }
}
