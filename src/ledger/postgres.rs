//! Postgres ledger backed by an sqlx pool.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::ledger::store::SubscriptionLedger;
use crate::ledger::types::{LedgerResult, SubscriptionRecord, UpsertOutcome, WalletAddress};

const SELECT_COLUMNS: &str = "SELECT id, wallet_address, tx_hash, payment_amount, \
     subscription_date, is_active, expires_at FROM wallet_subscriptions";

const UPSERT: &str = "INSERT INTO wallet_subscriptions \
     (wallet_address, tx_hash, payment_amount, subscription_date, is_active) \
     VALUES ($1, $2, $3, now(), TRUE) \
     ON CONFLICT (wallet_address) DO UPDATE SET \
         tx_hash = EXCLUDED.tx_hash, \
         payment_amount = EXCLUDED.payment_amount, \
         subscription_date = now(), \
         is_active = TRUE \
     WHERE wallet_subscriptions.is_active = FALSE \
     RETURNING id, wallet_address, tx_hash, payment_amount, \
         subscription_date, is_active, expires_at";

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Open a pool against `config.url`.
    pub async fn connect(config: &DatabaseConfig) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        tracing::info!(max_connections = config.max_connections, "Connected to Postgres");
        Ok(Self { pool })
    }

    /// Apply the bundled schema migrations.
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Ledger schema up to date");
        Ok(())
    }
}

#[async_trait]
impl SubscriptionLedger for PgLedger {
    async fn find(&self, wallet: &WalletAddress) -> LedgerResult<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            "{SELECT_COLUMNS} WHERE wallet_address = $1"
        ))
        .bind(wallet.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn upsert(
        &self,
        wallet: &WalletAddress,
        tx_hash: &str,
        payment_amount: &str,
    ) -> LedgerResult<UpsertOutcome> {
        // Dropping `tx` on any early return rolls back and releases the connection.
        let mut tx = self.pool.begin().await?;

        let active = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            "{SELECT_COLUMNS} WHERE wallet_address = $1 AND is_active"
        ))
        .bind(wallet.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(record) = active {
            tx.commit().await?;
            return Ok(UpsertOutcome::AlreadyActive(record));
        }

        let written = sqlx::query_as::<_, SubscriptionRecord>(UPSERT)
            .bind(wallet.as_str())
            .bind(tx_hash)
            .bind(payment_amount)
            .fetch_optional(&mut *tx)
            .await?;

        let outcome = match written {
            Some(record) => UpsertOutcome::Written(record),
            None => {
                // A concurrent writer activated the row between our read and insert.
                let record = sqlx::query_as::<_, SubscriptionRecord>(&format!(
                    "{SELECT_COLUMNS} WHERE wallet_address = $1"
                ))
                .bind(wallet.as_str())
                .fetch_one(&mut *tx)
                .await?;
                UpsertOutcome::AlreadyActive(record)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn find_by_tx_hash(&self, tx_hash: &str) -> LedgerResult<Option<SubscriptionRecord>> {
        let record = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            "{SELECT_COLUMNS} WHERE tx_hash = $1 LIMIT 1"
        ))
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn count_active(&self) -> LedgerResult<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM wallet_subscriptions WHERE is_active",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn ping(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
