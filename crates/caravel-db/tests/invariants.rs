//! Cross-repository invariant tests.
//!
//! Each test drives a longer operation sequence than the per-repository
//! unit tests and then checks the system-wide invariants: quantity
//! conservation, no negative stock, and ledger/balance-log agreement.

use caravel_core::{CoreError, ExchangeRate, LocationKind, Money, PaymentMethod};
use caravel_db::{Database, DbConfig, DbError};

/// Opt-in query/protocol logging for debugging: RUST_LOG=debug cargo test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Tiny deterministic PRNG (xorshift64*) so the randomized sequences are
/// reproducible without pulling in a dependency.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

async fn conserved_total(db: &Database, item_id: &str) -> i64 {
    db.stock().total_on_hand(item_id).await.unwrap()
        + db.stock().total_in_transit(item_id).await.unwrap()
}

/// Quantity conservation holds across an arbitrary interleaving of
/// dispatches and receives between three locations.
#[tokio::test]
async fn quantity_conserved_across_random_transfer_sequences() {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let warehouse = db
        .locations()
        .create("W", LocationKind::Warehouse)
        .await
        .unwrap();
    let shop_a = db.locations().create("A", LocationKind::Shop).await.unwrap();
    let shop_b = db.locations().create("B", LocationKind::Shop).await.unwrap();
    let item = db
        .catalog()
        .create_item("Rice", Money::from_cents(300), Money::from_cents(500))
        .await
        .unwrap();

    db.stock()
        .receive(&warehouse.id, &item.id, 500, Money::from_cents(300))
        .await
        .unwrap();

    let locations = [&warehouse.id, &shop_a.id, &shop_b.id];
    let mut rng = Rng::new(0xC0FFEE);
    let mut pending: Vec<String> = Vec::new();

    for _ in 0..60 {
        if rng.below(2) == 0 && !pending.is_empty() {
            let transfer_id = pending.swap_remove(rng.below(pending.len() as u64) as usize);
            db.transfers().receive_transfer(&transfer_id).await.unwrap();
        } else {
            let source = locations[rng.below(3) as usize];
            let dest = locations[rng.below(3) as usize];
            let quantity = 1 + rng.below(20) as i64;

            match db.transfers().dispatch(source, dest, &item.id, quantity).await {
                Ok(transfer) => pending.push(transfer.id),
                // Self-transfers and shortfalls are legitimate rejections;
                // they must leave the totals untouched.
                Err(DbError::Domain(CoreError::InvalidTransfer { .. }))
                | Err(DbError::Domain(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(conserved_total(&db, &item.id).await, 500);
    }

    // Drain the in-flight tail; the total still holds.
    for transfer_id in pending {
        db.transfers().receive_transfer(&transfer_id).await.unwrap();
    }
    assert_eq!(conserved_total(&db, &item.id).await, 500);
    assert_eq!(db.stock().total_in_transit(&item.id).await.unwrap(), 0);
}

/// Randomized deduct sequences bounded by prior receives never drive a
/// quantity negative: the shortfall errors instead.
#[tokio::test]
async fn no_negative_stock_under_random_deducts() {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let shop = db.locations().create("S", LocationKind::Shop).await.unwrap();
    let item = db
        .catalog()
        .create_item("Oil", Money::from_cents(200), Money::from_cents(350))
        .await
        .unwrap();

    let mut rng = Rng::new(42);
    let mut expected: i64 = 0;

    for _ in 0..100 {
        if rng.below(3) == 0 {
            let quantity = 1 + rng.below(15) as i64;
            db.stock()
                .receive(&shop.id, &item.id, quantity, Money::from_cents(200))
                .await
                .unwrap();
            expected += quantity;
        } else {
            let quantity = 1 + rng.below(25) as i64;
            match db.stock().deduct(&shop.id, &item.id, quantity).await {
                Ok(stock) => {
                    expected -= quantity;
                    assert!(stock.quantity >= 0);
                }
                Err(DbError::Domain(CoreError::InsufficientStock {
                    available, requested, ..
                })) => {
                    assert_eq!(available, expected);
                    assert!(requested > available);
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let on_hand = db.stock().total_on_hand(&item.id).await.unwrap();
        assert_eq!(on_hand, expected);
        assert!(on_hand >= 0);
    }
}

/// After an arbitrary mix of checkouts, fund transfers, expenses, edits
/// and debtor payments, every account's cached balance equals its latest
/// balance-log entry.
#[tokio::test]
async fn ledger_balance_always_matches_latest_log_entry() {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let shop = db.locations().create("S", LocationKind::Shop).await.unwrap();
    let item = db
        .catalog()
        .create_item("Tea", Money::from_cents(100), Money::from_cents(250))
        .await
        .unwrap();
    db.stock()
        .receive(&shop.id, &item.id, 200, Money::from_cents(100))
        .await
        .unwrap();

    let cash = db
        .ledger()
        .create_account("cash", Some(PaymentMethod::Cash), false, Money::from_cents(10_000))
        .await
        .unwrap();
    let bank = db
        .ledger()
        .create_account("bank", Some(PaymentMethod::Bank), false, Money::from_cents(50_000))
        .await
        .unwrap();

    // A cash sale, a banked sale, a fund transfer, an expense and its
    // correction, and a credit sale paid down afterwards.
    db.sales()
        .add_to_cart(&shop.id, &item.id, 10, Money::zero())
        .await
        .unwrap();
    db.sales()
        .checkout(&shop.id, PaymentMethod::Cash, Money::zero())
        .await
        .unwrap();

    db.sales()
        .add_to_cart(&shop.id, &item.id, 4, Money::from_cents(50))
        .await
        .unwrap();
    db.sales()
        .checkout(&shop.id, PaymentMethod::Bank, Money::from_cents(100))
        .await
        .unwrap();

    db.ledger()
        .transfer_funds(&bank.id, &cash.id, Money::from_cents(5000), ExchangeRate::identity())
        .await
        .unwrap();

    let expense = db
        .ledger()
        .record_expense(&cash.id, Money::from_cents(1200), "packaging")
        .await
        .unwrap();
    db.ledger()
        .update_expense(&expense.id, Money::from_cents(900), "packaging (corrected)")
        .await
        .unwrap();

    db.sales()
        .add_to_cart(&shop.id, &item.id, 8, Money::zero())
        .await
        .unwrap();
    let ctx = db
        .sales()
        .begin_credit_checkout(&shop.id, PaymentMethod::Cash, Money::zero())
        .await
        .unwrap();
    let (_, debtor) = db
        .sales()
        .register_debtor(&ctx, "Rivera", None, "555-9", Money::from_cents(500), "USD")
        .await
        .unwrap();
    db.sales()
        .pay_debtor(&debtor.id, Money::from_cents(700), &bank.id)
        .await
        .unwrap();

    for account in db.ledger().list_accounts().await.unwrap() {
        let history = db.ledger().balance_history(&account.id).await.unwrap();
        let latest = history.last().expect("every account has an opening log row");
        assert_eq!(
            account.balance_cents, latest.balance_cents,
            "cached balance for {} diverged from its log",
            account.name
        );
    }

    // Spot-check the actual cash trail: 10000 + 2500 (cash sale)
    // + 5000 (transfer in) − 900 (corrected expense) + 500 (credit deposit).
    let cash = db.ledger().get_account(&cash.id).await.unwrap().unwrap();
    assert_eq!(cash.balance_cents, 17_100);
}
