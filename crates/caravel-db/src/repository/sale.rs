//! # Sale & Credit Repository
//!
//! Cart accumulation, checkout, credit sales and debtor payments.
//!
//! ## Checkout Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  add_to_cart ──► CartLine { sale_id: NULL }    (stock NOT deducted)  │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  cash path:    checkout(shop, method, discount)                      │
//! │  credit path:  begin_credit_checkout ──► CheckoutContext             │
//! │                          │                                           │
//! │                          ▼                                           │
//! │                register_debtor(ctx, name, phone, amount_paid)        │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  ONE TRANSACTION:                                                    │
//! │    1. Sale row created                                               │
//! │    2. payment-method account credited + balance log appended         │
//! │    3. every pending line's sale_id assigned                          │
//! │    4. each line's quantity deducted from shop stock                  │
//! │                                                                      │
//! │  Any failure (e.g. stock ran out under a line) rolls the whole       │
//! │  checkout back: the cart keeps its lines, stock keeps its counts.    │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The credit path hands an explicit [`CheckoutContext`] from the first
//! step to the second instead of stashing pending-checkout state in
//! ambient session storage. A credit sale still credits the payment-method
//! account by the amount actually paid while the debtor carries the
//! remainder.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use caravel_core::cart::{self, CartTotals};
use caravel_core::validation::{validate_discount, validate_name, validate_phone, validate_quantity};
use caravel_core::{
    CartLine, CheckoutContext, CoreError, Debtor, Money, PaymentMethod, Sale, StockThresholds,
};

use crate::error::{DbError, DbResult};
use crate::repository::{ledger, stock};

/// Repository for sale and credit operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    thresholds: StockThresholds,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool, thresholds: StockThresholds) -> Self {
        SaleRepository { pool, thresholds }
    }

    // =========================================================================
    // Cart Phase
    // =========================================================================

    /// Adds a provisional line to a shop's cart.
    ///
    /// Requires the shop to hold at least the requested quantity, but does
    /// NOT deduct it: deduction is deferred to checkout so an abandoned
    /// cart cannot corrupt stock. Prices are snapshotted into the line.
    ///
    /// ## Errors
    /// `CoreError::InsufficientStock` - non-fatal to the cart session;
    /// previously added lines are untouched.
    pub async fn add_to_cart(
        &self,
        shop_id: &str,
        item_id: &str,
        quantity: i64,
        discount: Money,
    ) -> DbResult<CartLine> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let item = self
            .fetch_item(item_id)
            .await?
            .ok_or_else(|| DbError::not_found("Item", item_id))?;

        validate_discount(discount, item.selling_price()).map_err(CoreError::from)?;

        let available = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT quantity FROM location_stocks WHERE location_id = ?1 AND item_id = ?2",
        )
        .bind(shop_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .flatten()
        .unwrap_or(0);

        if available < quantity {
            return Err(CoreError::InsufficientStock {
                item: item.name,
                available,
                requested: quantity,
            }
            .into());
        }

        let value = cart::line_value(quantity, item.selling_price(), discount);
        let line = CartLine {
            id: Uuid::new_v4().to_string(),
            shop_id: shop_id.to_string(),
            item_id: item_id.to_string(),
            quantity,
            discount_cents: discount.cents(),
            cost_cents: item.cost_cents,
            selling_cents: item.selling_cents,
            value_cents: value.cents(),
            sale_id: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cart_lines (
                id, shop_id, item_id, quantity, discount_cents,
                cost_cents, selling_cents, value_cents, sale_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&line.shop_id)
        .bind(&line.item_id)
        .bind(line.quantity)
        .bind(line.discount_cents)
        .bind(line.cost_cents)
        .bind(line.selling_cents)
        .bind(line.value_cents)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;

        debug!(shop = %shop_id, item = %line.item_id, quantity, "Cart line added");

        Ok(line)
    }

    /// Edits an unassigned cart line's quantity and discount, recomputing
    /// its value from the frozen price snapshots.
    pub async fn update_cart_line(
        &self,
        line_id: &str,
        quantity: i64,
        discount: Money,
    ) -> DbResult<CartLine> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let line = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, shop_id, item_id, quantity, discount_cents, cost_cents,
                   selling_cents, value_cents, sale_id, created_at
            FROM cart_lines
            WHERE id = ?1 AND sale_id IS NULL
            "#,
        )
        .bind(line_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Cart line (unassigned)", line_id))?;

        let selling = Money::from_cents(line.selling_cents);
        validate_discount(discount, selling).map_err(CoreError::from)?;

        let value = cart::line_value(quantity, selling, discount);

        sqlx::query(
            r#"
            UPDATE cart_lines
            SET quantity = ?2, discount_cents = ?3, value_cents = ?4
            WHERE id = ?1 AND sale_id IS NULL
            "#,
        )
        .bind(line_id)
        .bind(quantity)
        .bind(discount.cents())
        .bind(value.cents())
        .execute(&self.pool)
        .await?;

        Ok(CartLine {
            quantity,
            discount_cents: discount.cents(),
            value_cents: value.cents(),
            ..line
        })
    }

    /// Removes an unassigned cart line. Lines already assigned to a sale
    /// are immutable and cannot be removed.
    pub async fn remove_cart_line(&self, line_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE id = ?1 AND sale_id IS NULL")
            .bind(line_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart line (unassigned)", line_id));
        }

        Ok(())
    }

    /// The pending (unassigned) cart lines for a shop, oldest first.
    pub async fn cart_for_shop(&self, shop_id: &str) -> DbResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, shop_id, item_id, quantity, discount_cents, cost_cents,
                   selling_cents, value_cents, sale_id, created_at
            FROM cart_lines
            WHERE shop_id = ?1 AND sale_id IS NULL
            ORDER BY created_at
            "#,
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Totals over a shop's pending cart.
    pub async fn cart_totals(&self, shop_id: &str) -> DbResult<CartTotals> {
        let lines = self.cart_for_shop(shop_id).await?;
        Ok(CartTotals::of(&lines))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Checks out a shop's pending cart as a settled (non-credit) sale.
    ///
    /// Runs the entire protocol in one transaction: sale creation, account
    /// crediting with its balance-log row, line assignment and stock
    /// deduction either all happen or none do.
    ///
    /// ## Errors
    /// - `CoreError::EmptyCart` when no unassigned lines exist
    /// - `CoreError::InsufficientStock` when shop stock no longer covers a
    ///   line; the cart survives for the shopkeeper to amend
    pub async fn checkout(
        &self,
        shop_id: &str,
        payment_method: PaymentMethod,
        aggregate_discount: Money,
    ) -> DbResult<Sale> {
        let mut tx = self.pool.begin().await?;

        let lines = pending_lines_on(&mut tx, shop_id).await?;
        if lines.is_empty() {
            return Err(CoreError::EmptyCart {
                shop: shop_id.to_string(),
            }
            .into());
        }

        let sales_value = cart::sales_value(&lines, aggregate_discount);

        let sale = finalize_checkout_on(
            &mut tx,
            &self.thresholds,
            CheckoutTerms {
                shop_id,
                payment_method,
                aggregate_discount,
                sales_value,
                amount_paid: sales_value,
                debtor_id: None,
            },
            &lines,
        )
        .await?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            shop = %shop_id,
            value = %sales_value,
            lines = lines.len(),
            "Sale checked out"
        );

        Ok(sale)
    }

    /// First step of a credit checkout: computes the sales value and hands
    /// back an explicit context for debtor registration. Nothing is
    /// committed yet.
    pub async fn begin_credit_checkout(
        &self,
        shop_id: &str,
        payment_method: PaymentMethod,
        aggregate_discount: Money,
    ) -> DbResult<CheckoutContext> {
        let lines = self.cart_for_shop(shop_id).await?;
        if lines.is_empty() {
            return Err(CoreError::EmptyCart {
                shop: shop_id.to_string(),
            }
            .into());
        }

        Ok(CheckoutContext {
            shop_id: shop_id.to_string(),
            payment_method,
            discount_cents: aggregate_discount.cents(),
            sales_value_cents: cart::sales_value(&lines, aggregate_discount).cents(),
        })
    }

    /// Second step of a credit checkout: upserts the debtor by phone and
    /// completes the sale with the debtor attached.
    ///
    /// The debtor's running totals grow by the amount paid now and the
    /// remainder owed; the payment-method account is credited by the
    /// amount actually paid. The sales value is recomputed inside the
    /// transaction in case the cart changed after the context was taken.
    pub async fn register_debtor(
        &self,
        ctx: &CheckoutContext,
        name: &str,
        company: Option<&str>,
        phone: &str,
        amount_paid: Money,
        currency: &str,
    ) -> DbResult<(Sale, Debtor)> {
        validate_name("debtor name", name).map_err(CoreError::from)?;
        validate_phone(phone).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let lines = pending_lines_on(&mut tx, &ctx.shop_id).await?;
        if lines.is_empty() {
            return Err(CoreError::EmptyCart {
                shop: ctx.shop_id.clone(),
            }
            .into());
        }

        let aggregate_discount = Money::from_cents(ctx.discount_cents);
        let sales_value = cart::sales_value(&lines, aggregate_discount);

        if amount_paid.is_negative() || amount_paid > sales_value {
            return Err(CoreError::Overpayment {
                debtor: name.to_string(),
                unpaid: sales_value.cents(),
                offered: amount_paid.cents(),
            }
            .into());
        }

        let owed = sales_value - amount_paid;

        // Upsert by phone: a returning debtor accumulates, a new one is
        // seeded with this sale's amounts.
        let existing = sqlx::query_as::<_, Debtor>(
            r#"
            SELECT id, name, company, phone, paid_cents, unpaid_cents, currency
            FROM debtors
            WHERE phone = ?1
            "#,
        )
        .bind(phone.trim())
        .fetch_optional(&mut *tx)
        .await?;

        let debtor = match existing {
            Some(debtor) => {
                let paid = debtor.paid_cents + amount_paid.cents();
                let unpaid = debtor.unpaid_cents + owed.cents();
                sqlx::query("UPDATE debtors SET paid_cents = ?2, unpaid_cents = ?3 WHERE id = ?1")
                    .bind(&debtor.id)
                    .bind(paid)
                    .bind(unpaid)
                    .execute(&mut *tx)
                    .await?;
                Debtor {
                    paid_cents: paid,
                    unpaid_cents: unpaid,
                    ..debtor
                }
            }
            None => {
                let debtor = Debtor {
                    id: Uuid::new_v4().to_string(),
                    name: name.trim().to_string(),
                    company: company.map(|c| c.trim().to_string()),
                    phone: phone.trim().to_string(),
                    paid_cents: amount_paid.cents(),
                    unpaid_cents: owed.cents(),
                    currency: currency.to_string(),
                };
                sqlx::query(
                    r#"
                    INSERT INTO debtors (id, name, company, phone, paid_cents, unpaid_cents, currency)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(&debtor.id)
                .bind(&debtor.name)
                .bind(&debtor.company)
                .bind(&debtor.phone)
                .bind(debtor.paid_cents)
                .bind(debtor.unpaid_cents)
                .bind(&debtor.currency)
                .execute(&mut *tx)
                .await?;
                debtor
            }
        };

        let sale = finalize_checkout_on(
            &mut tx,
            &self.thresholds,
            CheckoutTerms {
                shop_id: &ctx.shop_id,
                payment_method: ctx.payment_method,
                aggregate_discount,
                sales_value,
                amount_paid,
                debtor_id: Some(debtor.id.clone()),
            },
            &lines,
        )
        .await?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            debtor = %debtor.name,
            owed = %owed,
            "Credit sale registered"
        );

        Ok((sale, debtor))
    }

    /// Records a payment from a debtor into a deposit account.
    ///
    /// ## Errors
    /// `CoreError::Overpayment` when the amount exceeds the outstanding
    /// balance; nothing changes.
    pub async fn pay_debtor(
        &self,
        debtor_id: &str,
        amount: Money,
        deposit_account_id: &str,
    ) -> DbResult<Debtor> {
        let mut tx = self.pool.begin().await?;

        let debtor = sqlx::query_as::<_, Debtor>(
            r#"
            SELECT id, name, company, phone, paid_cents, unpaid_cents, currency
            FROM debtors
            WHERE id = ?1
            "#,
        )
        .bind(debtor_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Debtor", debtor_id))?;

        if amount.cents() > debtor.unpaid_cents {
            return Err(CoreError::Overpayment {
                debtor: debtor.name,
                unpaid: debtor.unpaid_cents,
                offered: amount.cents(),
            }
            .into());
        }

        let paid = debtor.paid_cents + amount.cents();
        let unpaid = debtor.unpaid_cents - amount.cents();

        sqlx::query("UPDATE debtors SET paid_cents = ?2, unpaid_cents = ?3 WHERE id = ?1")
            .bind(&debtor.id)
            .bind(paid)
            .bind(unpaid)
            .execute(&mut *tx)
            .await?;

        ledger::credit_account_on(&mut tx, deposit_account_id, amount).await?;

        tx.commit().await?;

        info!(debtor = %debtor_id, amount = %amount, "Debtor payment recorded");

        Ok(Debtor {
            paid_cents: paid,
            unpaid_cents: unpaid,
            ..debtor
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets a sale with its permanent line-item list.
    pub async fn get_sale(&self, sale_id: &str) -> DbResult<Option<(Sale, Vec<CartLine>)>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, shop_id, discount_cents, payment_method, sales_value_cents,
                   amount_paid_cents, credit_sale, debtor_id, reference, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(sale_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(sale) = sale else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT id, shop_id, item_id, quantity, discount_cents, cost_cents,
                   selling_cents, value_cents, sale_id, created_at
            FROM cart_lines
            WHERE sale_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((sale, lines)))
    }

    /// A shop's sale history, newest first (views group these by date).
    pub async fn sales_for_shop(&self, shop_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, shop_id, discount_cents, payment_method, sales_value_cents,
                   amount_paid_cents, credit_sale, debtor_id, reference, created_at
            FROM sales
            WHERE shop_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(shop_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Gets a debtor by id.
    pub async fn get_debtor(&self, debtor_id: &str) -> DbResult<Option<Debtor>> {
        let debtor = sqlx::query_as::<_, Debtor>(
            r#"
            SELECT id, name, company, phone, paid_cents, unpaid_cents, currency
            FROM debtors
            WHERE id = ?1
            "#,
        )
        .bind(debtor_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(debtor)
    }

    /// Looks up a debtor by phone number.
    pub async fn debtor_by_phone(&self, phone: &str) -> DbResult<Option<Debtor>> {
        let debtor = sqlx::query_as::<_, Debtor>(
            r#"
            SELECT id, name, company, phone, paid_cents, unpaid_cents, currency
            FROM debtors
            WHERE phone = ?1
            "#,
        )
        .bind(phone.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(debtor)
    }

    /// Lists all debtors by name.
    pub async fn list_debtors(&self) -> DbResult<Vec<Debtor>> {
        let debtors = sqlx::query_as::<_, Debtor>(
            r#"
            SELECT id, name, company, phone, paid_cents, unpaid_cents, currency
            FROM debtors
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(debtors)
    }

    async fn fetch_item(&self, item_id: &str) -> DbResult<Option<caravel_core::Item>> {
        let item = sqlx::query_as::<_, caravel_core::Item>(
            r#"
            SELECT id, name, cost_cents, selling_cents, created_at, updated_at
            FROM items
            WHERE id = ?1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }
}

// =============================================================================
// Transaction-Composable Helpers
// =============================================================================

/// Everything a checkout finalization needs, cash or credit.
struct CheckoutTerms<'a> {
    shop_id: &'a str,
    payment_method: PaymentMethod,
    aggregate_discount: Money,
    sales_value: Money,
    amount_paid: Money,
    debtor_id: Option<String>,
}

/// Pending lines for a shop on the caller's transaction.
async fn pending_lines_on(
    conn: &mut SqliteConnection,
    shop_id: &str,
) -> DbResult<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT id, shop_id, item_id, quantity, discount_cents, cost_cents,
               selling_cents, value_cents, sale_id, created_at
        FROM cart_lines
        WHERE shop_id = ?1 AND sale_id IS NULL
        ORDER BY created_at
        "#,
    )
    .bind(shop_id)
    .fetch_all(conn)
    .await?;

    Ok(lines)
}

/// Creates the sale, credits the settlement account, assigns the lines
/// and deducts the stock - the committed tail of both checkout paths.
async fn finalize_checkout_on(
    conn: &mut SqliteConnection,
    thresholds: &StockThresholds,
    terms: CheckoutTerms<'_>,
    lines: &[CartLine],
) -> DbResult<Sale> {
    let sale = Sale {
        id: Uuid::new_v4().to_string(),
        shop_id: terms.shop_id.to_string(),
        discount_cents: terms.aggregate_discount.cents(),
        payment_method: terms.payment_method,
        sales_value_cents: terms.sales_value.cents(),
        amount_paid_cents: terms.amount_paid.cents(),
        credit_sale: terms.debtor_id.is_some(),
        debtor_id: terms.debtor_id,
        reference: None,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, shop_id, discount_cents, payment_method, sales_value_cents,
            amount_paid_cents, credit_sale, debtor_id, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.shop_id)
    .bind(sale.discount_cents)
    .bind(sale.payment_method)
    .bind(sale.sales_value_cents)
    .bind(sale.amount_paid_cents)
    .bind(sale.credit_sale)
    .bind(&sale.debtor_id)
    .bind(&sale.reference)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    // Settle collected money into the method's registered account.
    if terms.amount_paid.cents() > 0 {
        let account = ledger::account_for_method_on(conn, terms.payment_method).await?;
        ledger::credit_account_on(conn, &account.id, terms.amount_paid).await?;
    }

    // The pending lines become this sale's permanent line-item list.
    sqlx::query("UPDATE cart_lines SET sale_id = ?2 WHERE shop_id = ?1 AND sale_id IS NULL")
        .bind(terms.shop_id)
        .bind(&sale.id)
        .execute(&mut *conn)
        .await?;

    // Deduction was deferred to this moment; a shortfall aborts the
    // whole checkout via the enclosing transaction.
    for line in lines {
        stock::deduct_on(conn, thresholds, terms.shop_id, &line.item_id, line.quantity).await?;
    }

    Ok(sale)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caravel_core::LocationKind;

    /// Shop with 10 units of Oil (cost 3.00, selling 5.00) and a cash
    /// account registered for PaymentMethod::Cash.
    async fn setup() -> (Database, String, String, String) {
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
        let cash = db
            .ledger()
            .create_account("cash", Some(PaymentMethod::Cash), false, Money::zero())
            .await
            .unwrap();
        (db, shop.id, item.id, cash.id)
    }

    /// 4 Oil at 5.00 with 1.00 off each = 16.00; cash
    /// checkout credits the cash account and leaves 6 on the shelf.
    #[tokio::test]
    async fn test_cash_checkout_scenario() {
        let (db, shop_id, item_id, cash_id) = setup().await;
        let sales = db.sales();

        let line = sales
            .add_to_cart(&shop_id, &item_id, 4, Money::from_cents(100))
            .await
            .unwrap();
        assert_eq!(line.value_cents, 1600);

        // Adding to cart must not touch the shelf.
        let stock = db.stock().stock_at(&shop_id, &item_id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 10);

        let sale = sales
            .checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();
        assert_eq!(sale.sales_value_cents, 1600);
        assert_eq!(sale.amount_paid_cents, 1600);
        assert!(!sale.credit_sale);

        let cash = db.ledger().get_account(&cash_id).await.unwrap().unwrap();
        assert_eq!(cash.balance_cents, 1600);
        // Opening log row + the checkout credit.
        assert_eq!(db.ledger().balance_history(&cash_id).await.unwrap().len(), 2);

        let stock = db.stock().stock_at(&shop_id, &item_id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 6);

        // The cart is spent and the lines now belong to the sale.
        assert!(sales.cart_for_shop(&shop_id).await.unwrap().is_empty());
        let (_, lines) = sales.get_sale(&sale.id).await.unwrap().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].sale_id.as_deref(), Some(sale.id.as_str()));
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_rejected() {
        let (db, shop_id, _, _) = setup().await;

        let err = db
            .sales()
            .checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart { .. })));
    }

    #[tokio::test]
    async fn test_add_to_cart_insufficient_keeps_prior_lines() {
        let (db, shop_id, item_id, _) = setup().await;
        let sales = db.sales();

        sales
            .add_to_cart(&shop_id, &item_id, 3, Money::zero())
            .await
            .unwrap();

        let err = sales
            .add_to_cart(&shop_id, &item_id, 11, Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        // Non-fatal to the session: the first line survives.
        assert_eq!(sales.cart_for_shop(&shop_id).await.unwrap().len(), 1);
    }

    /// Two lines individually fit the shelf but not together: the second
    /// deduct fails and the whole checkout rolls back.
    #[tokio::test]
    async fn test_checkout_rolls_back_atomically() {
        let (db, shop_id, item_id, cash_id) = setup().await;
        let sales = db.sales();

        sales.add_to_cart(&shop_id, &item_id, 6, Money::zero()).await.unwrap();
        sales.add_to_cart(&shop_id, &item_id, 6, Money::zero()).await.unwrap();

        let err = sales
            .checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        // No partial application: stock, cart, account and sales are all
        // as they were.
        let stock = db.stock().stock_at(&shop_id, &item_id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 10);
        assert_eq!(sales.cart_for_shop(&shop_id).await.unwrap().len(), 2);
        assert_eq!(
            db.ledger().get_account(&cash_id).await.unwrap().unwrap().balance_cents,
            0
        );
        assert!(sales.sales_for_shop(&shop_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cart_edit_and_removal_only_while_unassigned() {
        let (db, shop_id, item_id, _) = setup().await;
        let sales = db.sales();

        let line = sales
            .add_to_cart(&shop_id, &item_id, 2, Money::zero())
            .await
            .unwrap();

        let edited = sales
            .update_cart_line(&line.id, 5, Money::from_cents(50))
            .await
            .unwrap();
        assert_eq!(edited.value_cents, 5 * (500 - 50));

        let sale = sales
            .checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();

        // Assigned lines are immutable.
        let err = sales.update_cart_line(&line.id, 1, Money::zero()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        let err = sales.remove_cart_line(&line.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let (_, lines) = sales.get_sale(&sale.id).await.unwrap().unwrap();
        assert_eq!(lines[0].quantity, 5);
    }

    /// A credit sale of 100.00 with 40.00 paid and an unseen
    /// phone creates a debtor with paid=40.00, unpaid=60.00.
    #[tokio::test]
    async fn test_credit_checkout_creates_debtor() {
        let (db, shop_id, _item_id, cash_id) = setup().await;
        let sales = db.sales();

        // A 100.00 cart: 4 × 25.00 via a pricier dedicated item.
        let pricey = db
            .catalog()
            .create_item("Ghee", Money::from_cents(1500), Money::from_cents(2500))
            .await
            .unwrap();
        db.stock()
            .receive(&shop_id, &pricey.id, 10, Money::from_cents(1500))
            .await
            .unwrap();
        sales
            .add_to_cart(&shop_id, &pricey.id, 4, Money::zero())
            .await
            .unwrap();

        let ctx = sales
            .begin_credit_checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();
        assert_eq!(ctx.sales_value_cents, 10_000);

        let (sale, debtor) = sales
            .register_debtor(&ctx, "Asha", Some("Asha Traders"), "555-1", Money::from_cents(4000), "USD")
            .await
            .unwrap();

        assert!(sale.credit_sale);
        assert_eq!(sale.debtor_id.as_deref(), Some(debtor.id.as_str()));
        assert_eq!(sale.sales_value_cents, 10_000);
        assert_eq!(sale.amount_paid_cents, 4000);

        assert_eq!(debtor.paid_cents, 4000);
        assert_eq!(debtor.unpaid_cents, 6000);

        // The method account collects what was actually paid.
        assert_eq!(
            db.ledger().get_account(&cash_id).await.unwrap().unwrap().balance_cents,
            4000
        );

        // Stock deducted exactly as the cash path.
        let stock = db.stock().stock_at(&shop_id, &pricey.id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 6);
    }

    #[tokio::test]
    async fn test_repeat_credit_sale_accumulates_on_same_phone() {
        let (db, shop_id, item_id, _) = setup().await;
        let sales = db.sales();

        sales.add_to_cart(&shop_id, &item_id, 2, Money::zero()).await.unwrap();
        let ctx = sales
            .begin_credit_checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();
        let (_, first) = sales
            .register_debtor(&ctx, "Asha", None, "555-1", Money::from_cents(400), "USD")
            .await
            .unwrap();
        assert_eq!(first.paid_cents, 400);
        assert_eq!(first.unpaid_cents, 600);

        sales.add_to_cart(&shop_id, &item_id, 1, Money::zero()).await.unwrap();
        let ctx = sales
            .begin_credit_checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();
        let (_, second) = sales
            .register_debtor(&ctx, "Asha", None, "555-1", Money::zero(), "USD")
            .await
            .unwrap();

        // Same phone, same debtor row: 400 paid, 600 + 500 owed.
        assert_eq!(second.id, first.id);
        assert_eq!(second.paid_cents, 400);
        assert_eq!(second.unpaid_cents, 1100);
        assert_eq!(db.sales().list_debtors().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pay_debtor_and_overpayment_guard() {
        let (db, shop_id, item_id, cash_id) = setup().await;
        let sales = db.sales();

        sales.add_to_cart(&shop_id, &item_id, 2, Money::zero()).await.unwrap();
        let ctx = sales
            .begin_credit_checkout(&shop_id, PaymentMethod::Cash, Money::zero())
            .await
            .unwrap();
        let (_, debtor) = sales
            .register_debtor(&ctx, "Asha", None, "555-1", Money::zero(), "USD")
            .await
            .unwrap();
        assert_eq!(debtor.unpaid_cents, 1000);

        let err = sales
            .pay_debtor(&debtor.id, Money::from_cents(1200), &cash_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Overpayment { .. })));

        let paid = sales
            .pay_debtor(&debtor.id, Money::from_cents(600), &cash_id)
            .await
            .unwrap();
        assert_eq!(paid.unpaid_cents, 400);
        assert_eq!(paid.paid_cents, 600);

        let cash = db.ledger().get_account(&cash_id).await.unwrap().unwrap();
        assert_eq!(cash.balance_cents, 600);
    }

    #[tokio::test]
    async fn test_abandoned_cart_leaves_stock_untouched() {
        let (db, shop_id, item_id, _) = setup().await;
        let sales = db.sales();

        let line = sales
            .add_to_cart(&shop_id, &item_id, 5, Money::zero())
            .await
            .unwrap();
        sales.remove_cart_line(&line.id).await.unwrap();

        let stock = db.stock().stock_at(&shop_id, &item_id).await.unwrap().unwrap();
        assert_eq!(stock.quantity, 10);
        assert!(sales.cart_for_shop(&shop_id).await.unwrap().is_empty());
    }
}
