//! # Account Ledger Repository
//!
//! Monetary accounts with an append-only balance log.
//!
//! ## Balance Log Discipline
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  Every balance-changing operation:                                   │
//! │                                                                      │
//! │    UPDATE accounts SET balance_cents = <new>                         │
//! │    INSERT INTO balance_log (account, <new>, now)                     │
//! │                                                                      │
//! │  ... in the SAME transaction. The log is the source of truth for     │
//! │  history; the account row is a cached "latest" that must always      │
//! │  equal the newest log entry.                                         │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each payment method settles to exactly one account, tagged via
//! `accounts.payment_method`: a typed registry lookup resolved when the
//! account is registered, not a name match repeated on every sale.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use caravel_core::validation::{validate_name, validate_positive_amount};
use caravel_core::{
    Account, AccountMovement, BalanceLogEntry, CoreError, ExchangeRate, ExpenseKind,
    ExpenseRecord, Money, PaymentMethod,
};

use crate::error::{DbError, DbResult};

/// Repository for account ledger operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Registers an account, seeding the balance log with the opening
    /// balance.
    ///
    /// `payment_method` tags this account as the settlement target for
    /// that method; at most one account may carry each tag (UNIQUE).
    pub async fn create_account(
        &self,
        name: &str,
        payment_method: Option<PaymentMethod>,
        foreign_currency: bool,
        opening_balance: Money,
    ) -> DbResult<Account> {
        validate_name("account name", name).map_err(CoreError::from)?;

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            balance_cents: opening_balance.cents(),
            payment_method,
            foreign_currency,
            created_at: now,
        };

        debug!(id = %account.id, name = %account.name, "Registering account");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, name, balance_cents, payment_method, foreign_currency, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(account.balance_cents)
        .bind(account.payment_method)
        .bind(account.foreign_currency)
        .bind(account.created_at)
        .execute(&mut *tx)
        .await?;

        append_log_on(&mut tx, &account.id, account.balance_cents).await?;

        tx.commit().await?;

        Ok(account)
    }

    /// Gets an account by id.
    pub async fn get_account(&self, id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, balance_cents, payment_method, foreign_currency, created_at
            FROM accounts
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Gets an account by its unique name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, balance_cents, payment_method, foreign_currency, created_at
            FROM accounts
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Resolves the settlement account for a payment method.
    pub async fn account_for_method(&self, method: PaymentMethod) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, balance_cents, payment_method, foreign_currency, created_at
            FROM accounts
            WHERE payment_method = ?1
            "#,
        )
        .bind(method)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Lists all accounts by name.
    pub async fn list_accounts(&self) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, balance_cents, payment_method, foreign_currency, created_at
            FROM accounts
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Moves funds between two accounts.
    ///
    /// The rate converts the credited amount only when exactly one side is
    /// flagged foreign-currency; otherwise the amount moves 1:1. Writes
    /// balance-log rows for both sides and an audit movement record, all
    /// in one transaction.
    ///
    /// ## Errors
    /// `CoreError::InsufficientFunds` when the source balance does not
    /// cover the amount; both balances stay untouched and no log rows are
    /// written.
    pub async fn transfer_funds(
        &self,
        from_account_id: &str,
        to_account_id: &str,
        amount: Money,
        rate: ExchangeRate,
    ) -> DbResult<AccountMovement> {
        validate_positive_amount("amount", amount).map_err(CoreError::from)?;

        if from_account_id == to_account_id {
            return Err(CoreError::InvalidTransfer {
                reason: "source and destination are the same account".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let from = fetch_account_on(&mut tx, from_account_id).await?;
        let to = fetch_account_on(&mut tx, to_account_id).await?;

        if from.balance_cents < amount.cents() {
            return Err(CoreError::InsufficientFunds {
                account: from.name,
                balance: from.balance_cents,
                requested: amount.cents(),
            }
            .into());
        }

        let crosses_currency = from.foreign_currency != to.foreign_currency;
        let applied_rate = if crosses_currency {
            rate
        } else {
            ExchangeRate::identity()
        };
        let credited = amount.convert(applied_rate);

        set_balance_on(&mut tx, &from.id, from.balance_cents - amount.cents()).await?;
        set_balance_on(&mut tx, &to.id, to.balance_cents + credited.cents()).await?;

        let movement = AccountMovement {
            id: Uuid::new_v4().to_string(),
            from_account_id: from.id.clone(),
            to_account_id: to.id.clone(),
            amount_cents: amount.cents(),
            credited_cents: credited.cents(),
            rate_micros: applied_rate.micros(),
            moved_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO account_movements (
                id, from_account_id, to_account_id, amount_cents,
                credited_cents, rate_micros, moved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.from_account_id)
        .bind(&movement.to_account_id)
        .bind(movement.amount_cents)
        .bind(movement.credited_cents)
        .bind(movement.rate_micros)
        .bind(movement.moved_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            from = %movement.from_account_id,
            to = %movement.to_account_id,
            amount = %amount,
            credited = %credited,
            "Funds transferred"
        );

        Ok(movement)
    }

    /// Records an expense against an account.
    pub async fn record_expense(
        &self,
        account_id: &str,
        amount: Money,
        description: &str,
    ) -> DbResult<ExpenseRecord> {
        self.record_charge(account_id, amount, description, ExpenseKind::Expense)
            .await
    }

    /// Records an outbound payment against an account.
    pub async fn record_payment(
        &self,
        account_id: &str,
        amount: Money,
        description: &str,
    ) -> DbResult<ExpenseRecord> {
        self.record_charge(account_id, amount, description, ExpenseKind::Payment)
            .await
    }

    async fn record_charge(
        &self,
        account_id: &str,
        amount: Money,
        description: &str,
        kind: ExpenseKind,
    ) -> DbResult<ExpenseRecord> {
        validate_positive_amount("amount", amount).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let account = fetch_account_on(&mut tx, account_id).await?;
        if account.balance_cents < amount.cents() {
            return Err(CoreError::InsufficientFunds {
                account: account.name,
                balance: account.balance_cents,
                requested: amount.cents(),
            }
            .into());
        }

        set_balance_on(&mut tx, &account.id, account.balance_cents - amount.cents()).await?;

        let record = ExpenseRecord {
            id: Uuid::new_v4().to_string(),
            account_id: account.id.clone(),
            amount_cents: amount.cents(),
            description: description.to_string(),
            kind,
            recorded_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO expenses (id, account_id, amount_cents, description, kind, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.id)
        .bind(&record.account_id)
        .bind(record.amount_cents)
        .bind(&record.description)
        .bind(record.kind)
        .bind(record.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(account = %account.name, amount = %amount, ?kind, "Charge recorded");

        Ok(record)
    }

    /// Edits an existing expense.
    ///
    /// Undoes the prior effect first (refunding the old amount), then
    /// applies the new one: two balance steps, each logged, not a diff.
    pub async fn update_expense(
        &self,
        expense_id: &str,
        new_amount: Money,
        new_description: &str,
    ) -> DbResult<ExpenseRecord> {
        validate_positive_amount("amount", new_amount).map_err(CoreError::from)?;

        let mut tx = self.pool.begin().await?;

        let expense = sqlx::query_as::<_, ExpenseRecord>(
            r#"
            SELECT id, account_id, amount_cents, description, kind, recorded_at
            FROM expenses
            WHERE id = ?1
            "#,
        )
        .bind(expense_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Expense", expense_id))?;

        let account = fetch_account_on(&mut tx, &expense.account_id).await?;

        // Step 1: refund the old amount.
        let refunded = account.balance_cents + expense.amount_cents;
        set_balance_on(&mut tx, &account.id, refunded).await?;

        // Step 2: apply the new amount against the refunded balance.
        if refunded < new_amount.cents() {
            return Err(CoreError::InsufficientFunds {
                account: account.name,
                balance: refunded,
                requested: new_amount.cents(),
            }
            .into());
        }
        set_balance_on(&mut tx, &account.id, refunded - new_amount.cents()).await?;

        sqlx::query("UPDATE expenses SET amount_cents = ?2, description = ?3 WHERE id = ?1")
            .bind(&expense.id)
            .bind(new_amount.cents())
            .bind(new_description)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ExpenseRecord {
            amount_cents: new_amount.cents(),
            description: new_description.to_string(),
            ..expense
        })
    }

    /// An account's balance history, oldest first.
    pub async fn balance_history(&self, account_id: &str) -> DbResult<Vec<BalanceLogEntry>> {
        let entries = sqlx::query_as::<_, BalanceLogEntry>(
            r#"
            SELECT id, account_id, balance_cents, logged_at
            FROM balance_log
            WHERE account_id = ?1
            ORDER BY logged_at, id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// All fund-transfer audit records, newest first.
    pub async fn movements(&self) -> DbResult<Vec<AccountMovement>> {
        let movements = sqlx::query_as::<_, AccountMovement>(
            r#"
            SELECT id, from_account_id, to_account_id, amount_cents,
                   credited_cents, rate_micros, moved_at
            FROM account_movements
            ORDER BY moved_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

// =============================================================================
// Transaction-Composable Helpers
// =============================================================================

/// Fetches an account inside an open transaction.
pub(crate) async fn fetch_account_on(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> DbResult<Account> {
    sqlx::query_as::<_, Account>(
        r#"
        SELECT id, name, balance_cents, payment_method, foreign_currency, created_at
        FROM accounts
        WHERE id = ?1
        "#,
    )
    .bind(account_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("Account", account_id))
}

/// Resolves the settlement account for a payment method inside an open
/// transaction.
pub(crate) async fn account_for_method_on(
    conn: &mut SqliteConnection,
    method: PaymentMethod,
) -> DbResult<Account> {
    sqlx::query_as::<_, Account>(
        r#"
        SELECT id, name, balance_cents, payment_method, foreign_currency, created_at
        FROM accounts
        WHERE payment_method = ?1
        "#,
    )
    .bind(method)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| DbError::not_found("Account for payment method", format!("{:?}", method)))
}

/// Credits an account inside an open transaction, logging the new balance.
pub(crate) async fn credit_account_on(
    conn: &mut SqliteConnection,
    account_id: &str,
    amount: Money,
) -> DbResult<i64> {
    let account = fetch_account_on(conn, account_id).await?;
    let new_balance = account.balance_cents + amount.cents();
    set_balance_on(conn, account_id, new_balance).await?;
    Ok(new_balance)
}

/// Sets an account balance and appends the matching log row.
async fn set_balance_on(
    conn: &mut SqliteConnection,
    account_id: &str,
    new_balance_cents: i64,
) -> DbResult<()> {
    let result = sqlx::query("UPDATE accounts SET balance_cents = ?2 WHERE id = ?1")
        .bind(account_id)
        .bind(new_balance_cents)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Account", account_id));
    }

    append_log_on(conn, account_id, new_balance_cents).await
}

/// Appends a balance-log row.
async fn append_log_on(
    conn: &mut SqliteConnection,
    account_id: &str,
    balance_cents: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO balance_log (id, account_id, balance_cents, logged_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(account_id)
    .bind(balance_cents)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
