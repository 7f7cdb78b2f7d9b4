//! Payout Database Layer
//!
//! PostgreSQL-backed store. Row locks are `SELECT ... FOR UPDATE` inside a
//! `sqlx::Transaction`; dropping the transaction rolls it back and releases them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use super::error::PayoutError;
use super::state::PayoutStatus;
use super::store::{PayoutStore, PayoutTx};
use super::types::{Currency, Payout, PayoutField, PayoutFilter, PayoutId};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS payouts (
    id                  UUID PRIMARY KEY,
    amount              NUMERIC(18, 2) NOT NULL CHECK (amount > 0),
    currency            VARCHAR(3) NOT NULL,
    recipient_name      VARCHAR(255) NOT NULL,
    recipient_account   VARCHAR(34) NOT NULL,
    recipient_bank_code VARCHAR(11),
    status              VARCHAR(20) NOT NULL,
    description         TEXT,
    failure_reason      TEXT,
    processed_at        TIMESTAMPTZ,
    created_at          TIMESTAMPTZ NOT NULL,
    updated_at          TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_STATUS_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS payouts_status_idx ON payouts (status)";

const SELECT_COLUMNS: &str = r#"
SELECT id, amount, currency, recipient_name, recipient_account, recipient_bank_code,
       status, description, failure_reason, processed_at, created_at, updated_at
FROM payouts
"#;

/// Payout database operations
#[derive(Clone)]
pub struct PgPayoutStore {
    pool: PgPool,
}

impl PgPayoutStore {
    /// Create a new PgPayoutStore with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the `payouts` table exists
    pub async fn connect(url: &str) -> Result<Self, PayoutError> {
        let pool = PgPool::connect(url).await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `payouts` table and its status index if missing
    pub async fn ensure_schema(&self) -> Result<(), PayoutError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        sqlx::query(CREATE_STATUS_INDEX_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PayoutStore for PgPayoutStore {
    async fn get(&self, id: PayoutId) -> Result<Option<Payout>, PayoutError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_payout).transpose()
    }

    async fn list(&self, filter: &PayoutFilter) -> Result<Vec<Payout>, PayoutError> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        query.push(" WHERE TRUE");
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(currency) = filter.currency {
            query.push(" AND currency = ").push_bind(currency.as_str());
        }
        if let Some(min) = filter.min_amount {
            query.push(" AND amount >= ").push_bind(min);
        }
        if let Some(max) = filter.max_amount {
            query.push(" AND amount <= ").push_bind(max);
        }
        query.push(" ORDER BY created_at DESC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_payout).collect()
    }

    async fn begin(&self) -> Result<Box<dyn PayoutTx>, PayoutError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgPayoutTx { tx }))
    }
}

/// Transaction over [`PgPayoutStore`]
pub struct PgPayoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PayoutTx for PgPayoutTx {
    async fn get_for_update(&mut self, id: PayoutId) -> Result<Option<Payout>, PayoutError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(row_to_payout).transpose()
    }

    async fn create(&mut self, payout: &Payout) -> Result<(), PayoutError> {
        sqlx::query(
            r#"
            INSERT INTO payouts
                (id, amount, currency, recipient_name, recipient_account, recipient_bank_code,
                 status, description, failure_reason, processed_at, created_at, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(payout.id.as_uuid())
        .bind(payout.amount)
        .bind(payout.currency.as_str())
        .bind(&payout.recipient_name)
        .bind(&payout.recipient_account)
        .bind(&payout.recipient_bank_code)
        .bind(payout.status.as_str())
        .bind(&payout.description)
        .bind(&payout.failure_reason)
        .bind(payout.processed_at)
        .bind(payout.created_at)
        .bind(payout.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn save(&mut self, payout: &Payout, fields: &[PayoutField]) -> Result<(), PayoutError> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE payouts SET updated_at = ");
        query.push_bind(payout.updated_at);

        for field in fields {
            query.push(", ").push(field.column()).push(" = ");
            match field {
                PayoutField::Amount => query.push_bind(payout.amount),
                PayoutField::Currency => query.push_bind(payout.currency.as_str()),
                PayoutField::RecipientName => query.push_bind(payout.recipient_name.clone()),
                PayoutField::RecipientAccount => {
                    query.push_bind(payout.recipient_account.clone())
                }
                PayoutField::RecipientBankCode => {
                    query.push_bind(payout.recipient_bank_code.clone())
                }
                PayoutField::Description => query.push_bind(payout.description.clone()),
                PayoutField::Status => query.push_bind(payout.status.as_str()),
                PayoutField::FailureReason => query.push_bind(payout.failure_reason.clone()),
                PayoutField::ProcessedAt => query.push_bind(payout.processed_at),
            };
        }

        query.push(" WHERE id = ").push_bind(payout.id.as_uuid());

        let result = query.build().execute(&mut *self.tx).await?;
        if result.rows_affected() == 0 {
            return Err(PayoutError::NotFound(payout.id));
        }
        Ok(())
    }

    async fn delete(&mut self, id: PayoutId) -> Result<(), PayoutError> {
        sqlx::query("DELETE FROM payouts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), PayoutError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PayoutError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Convert database row to Payout
fn row_to_payout(row: &PgRow) -> Result<Payout, PayoutError> {
    let id: Uuid = row.try_get("id")?;
    let amount: Decimal = row.try_get("amount")?;

    let currency_str: String = row.try_get("currency")?;
    let currency: Currency = currency_str.parse().map_err(PayoutError::Database)?;

    let status_str: String = row.try_get("status")?;
    let status: PayoutStatus = status_str.parse().map_err(PayoutError::Database)?;

    let processed_at: Option<DateTime<Utc>> = row.try_get("processed_at")?;

    Ok(Payout {
        id: PayoutId::from_uuid(id),
        amount,
        currency,
        recipient_name: row.try_get("recipient_name")?,
        recipient_account: row.try_get("recipient_account")?,
        recipient_bank_code: row.try_get("recipient_bank_code")?,
        status,
        description: row.try_get("description")?,
        failure_reason: row.try_get("failure_reason")?,
        processed_at,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
