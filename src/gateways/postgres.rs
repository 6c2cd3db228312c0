use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::models::{InsertReceipt, NewOrder, Order};

use super::{OrderStore, StoreError};

// ============================================================================
// Postgres Order Store
// ============================================================================
//
// Expects:
//
//   CREATE TABLE orders (
//       id            BIGSERIAL PRIMARY KEY,
//       customer_name TEXT        NOT NULL,
//       product_name  TEXT        NOT NULL,
//       quantity      INTEGER     NOT NULL,
//       status        TEXT        NOT NULL,
//       created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
//   );
//
// ============================================================================

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    customer_name: String,
    product_name: String,
    quantity: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            customer_name: row.customer_name,
            product_name: row.product_name,
            quantity: row.quantity,
            status: row.status,
            created_at: Some(row.created_at),
        }
    }
}

#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool that opens connections on first use, so the service can
    /// start while the database is still unreachable.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(config.connect_options());

        Self::new(pool)
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &NewOrder) -> Result<InsertReceipt, StoreError> {
        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO orders (customer_name, product_name, quantity, status) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, created_at",
        )
        .bind(&order.customer_name)
        .bind(&order.product_name)
        .bind(order.quantity)
        .bind(&order.status)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(order_id = id, "Inserted order row");

        Ok(InsertReceipt { id, created_at })
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Order, StoreError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, customer_name, product_name, quantity, status, created_at \
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::from).ok_or(StoreError::NotFound(id))
    }
}
