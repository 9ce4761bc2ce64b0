//! # Catalog Repository
//!
//! Canonical item identity: one row per item name, the single source of
//! cost and selling price. Every location references catalog entries
//! rather than duplicating price data, so a price edit here revalues
//! on-hand stock everywhere.
//!
//! ## Price Edit Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  update_item(id, new_cost, new_selling)                              │
//! │       │                                                              │
//! │       ├── price_changes row appended  (audit history)                │
//! │       ├── items row updated                                          │
//! │       └── every location_stocks row of the item revalued             │
//! │           value = quantity × new_cost                                │
//! │                                                                      │
//! │  Cost basis changes retroactively for on-hand stock: this models     │
//! │  revaluation, not re-purchase.                                       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use caravel_core::validation::validate_name;
use caravel_core::{CoreError, Item, Money, PriceChange};

use crate::error::{DbError, DbResult};

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Creates a catalog item.
    ///
    /// ## Errors
    /// `CoreError::DuplicateItem` when an item with this name exists.
    pub async fn create_item(
        &self,
        name: &str,
        cost_price: Money,
        selling_price: Money,
    ) -> DbResult<Item> {
        validate_name("item name", name).map_err(CoreError::from)?;
        let name = name.trim();

        if self.get_by_name(name).await?.is_some() {
            return Err(CoreError::DuplicateItem {
                name: name.to_string(),
            }
            .into());
        }

        if selling_price < cost_price {
            warn!(
                item = %name,
                selling = %selling_price,
                cost = %cost_price,
                "Selling price below cost price"
            );
        }

        let now = Utc::now();
        let item = Item {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            cost_cents: cost_price.cents(),
            selling_cents: selling_price.cents(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %item.id, name = %item.name, "Creating catalog item");

        sqlx::query(
            r#"
            INSERT INTO items (id, name, cost_cents, selling_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.cost_cents)
        .bind(item.selling_cents)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Updates an item's prices.
    ///
    /// Appends a price-history entry and revalues the item's stock at every
    /// location, all in one transaction. Warns (non-fatally) when the new
    /// selling price is below the new cost price.
    pub async fn update_item(
        &self,
        id: &str,
        new_cost_price: Money,
        new_selling_price: Money,
    ) -> DbResult<Item> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, cost_cents, selling_cents, created_at, updated_at
            FROM items
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Item", id))?;

        if new_selling_price < new_cost_price {
            warn!(
                item = %item.name,
                selling = %new_selling_price,
                cost = %new_cost_price,
                "Selling price below cost price"
            );
        }

        let now = Utc::now();
        let change = PriceChange {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            old_cost_cents: item.cost_cents,
            new_cost_cents: new_cost_price.cents(),
            old_selling_cents: item.selling_cents,
            new_selling_cents: new_selling_price.cents(),
            changed_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO price_changes (
                id, item_id, old_cost_cents, new_cost_cents,
                old_selling_cents, new_selling_cents, changed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&change.id)
        .bind(&change.item_id)
        .bind(change.old_cost_cents)
        .bind(change.new_cost_cents)
        .bind(change.old_selling_cents)
        .bind(change.new_selling_cents)
        .bind(change.changed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE items SET cost_cents = ?2, selling_cents = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&item.id)
        .bind(new_cost_price.cents())
        .bind(new_selling_price.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Cost basis changed: revalue on-hand stock at every location.
        sqlx::query(
            r#"
            UPDATE location_stocks
            SET value_cents = quantity * ?2, updated_at = ?3
            WHERE item_id = ?1
            "#,
        )
        .bind(&item.id)
        .bind(new_cost_price.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(id = %item.id, name = %item.name, "Item prices updated");

        Ok(Item {
            cost_cents: new_cost_price.cents(),
            selling_cents: new_selling_price.cents(),
            updated_at: now,
            ..item
        })
    }

    /// Gets an item by its ID.
    pub async fn get_item(&self, id: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, cost_cents, selling_cents, created_at, updated_at
            FROM items
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Gets an item by its unique name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, cost_cents, selling_cents, created_at, updated_at
            FROM items
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Case-insensitive substring search over item names (autocomplete).
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Item>> {
        let query = query.trim();

        if query.is_empty() {
            return self.list(limit).await;
        }

        let pattern = format!("%{}%", query);

        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, cost_cents, selling_cents, created_at, updated_at
            FROM items
            WHERE name LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists items sorted by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, cost_cents, selling_cents, created_at, updated_at
            FROM items
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Returns the price history for an item, newest first.
    pub async fn price_history(&self, item_id: &str) -> DbResult<Vec<PriceChange>> {
        let changes = sqlx::query_as::<_, PriceChange>(
            r#"
            SELECT id, item_id, old_cost_cents, new_cost_cents,
                   old_selling_cents, new_selling_cents, changed_at
            FROM price_changes
            WHERE item_id = ?1
            ORDER BY changed_at DESC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(changes)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caravel_core::LocationKind;

    #[tokio::test]
    async fn test_create_item_and_duplicate_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let item = catalog
            .create_item("Rice", Money::from_cents(300), Money::from_cents(500))
            .await
            .unwrap();
        assert_eq!(item.cost_cents, 300);
        assert_eq!(item.selling_cents, 500);

        let err = catalog
            .create_item("Rice", Money::from_cents(310), Money::from_cents(520))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::DuplicateItem { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_item_writes_history_and_revalues_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        let warehouse = db
            .locations()
            .create("Depot", LocationKind::Warehouse)
            .await
            .unwrap();
        let item = catalog
            .create_item("Oil", Money::from_cents(300), Money::from_cents(500))
            .await
            .unwrap();

        db.stock()
            .receive(&warehouse.id, &item.id, 10, Money::from_cents(300))
            .await
            .unwrap();

        let updated = catalog
            .update_item(&item.id, Money::from_cents(400), Money::from_cents(600))
            .await
            .unwrap();
        assert_eq!(updated.cost_cents, 400);

        let history = catalog.price_history(&item.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_cost_cents, 300);
        assert_eq!(history[0].new_cost_cents, 400);

        // On-hand stock revalued retroactively: 10 × 4.00
        let stock = db
            .stock()
            .stock_at(&warehouse.id, &item.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stock.value_cents, 4000);
    }

    #[tokio::test]
    async fn test_search_is_substring_match() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let catalog = db.catalog();

        catalog
            .create_item("Basmati Rice", Money::from_cents(300), Money::from_cents(500))
            .await
            .unwrap();
        catalog
            .create_item("Sunflower Oil", Money::from_cents(200), Money::from_cents(350))
            .await
            .unwrap();

        let hits = catalog.search("Rice", 20).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Basmati Rice");

        // Empty query falls back to a plain listing
        assert_eq!(catalog.search("", 20).await.unwrap().len(), 2);
    }
}
