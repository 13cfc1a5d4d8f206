use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{to_i32, to_u32, PgStore};
use crate::domain::aggregates::{Order, OrderItem, OrderParts};
use crate::domain::value_objects::Currency;
use crate::store::{OrderStore, StoreError};

const COLUMNS: &str = "id, user_id, total_price, currency, payment_intent_id, is_paid, paid_at, \
                       is_delivered, delivered_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    total_price: Decimal,
    currency: String,
    payment_intent_id: String,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    product_id: Uuid,
    name: String,
    quantity: i32,
    image: String,
    price: Decimal,
}

impl PgStore {
    async fn hydrate_order(&self, row: OrderRow) -> Result<Order, StoreError> {
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT product_id, name, quantity, image, price FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|i| {
            Ok(OrderItem {
                product_id: i.product_id,
                name: i.name,
                quantity: to_u32(i.quantity, "quantity")?,
                image: i.image,
                price: i.price,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;
        let currency = Currency::new(row.currency)
            .map_err(|e| StoreError::Corrupt(format!("order {}: {e}", row.id)))?;
        Ok(Order::from_parts(OrderParts {
            id: row.id,
            user_id: row.user_id,
            items,
            total_price: row.total_price,
            currency,
            payment_intent_id: row.payment_intent_id,
            is_paid: row.is_paid,
            paid_at: row.paid_at,
            is_delivered: row.is_delivered,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn hydrate_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate_order(row).await?);
        }
        Ok(orders)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "INSERT INTO orders ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(order.id())
        .bind(order.user_id())
        .bind(order.total_price())
        .bind(order.currency().as_str())
        .bind(order.payment_intent_id())
        .bind(order.is_paid())
        .bind(order.paid_at())
        .bind(order.is_delivered())
        .bind(order.delivered_at())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            super::conflict_on_unique(e, || {
                format!("an order already exists for payment intent {}", order.payment_intent_id())
            })
        })?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, name, quantity, image, price)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(order.id())
            .bind(position as i32)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(to_i32(item.quantity, "quantity")?)
            .bind(&item.image)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_payment_intent(&self, payment_intent_id: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders WHERE payment_intent_id = $1"))
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_orders(rows).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"))
            .fetch_all(&self.pool)
            .await?;
        self.hydrate_orders(rows).await
    }

    /// Only the mutable delivery fields are written; item snapshots never change.
    async fn update(&self, order: &Order) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET is_delivered = $2, delivered_at = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(order.id())
        .bind(order.is_delivered())
        .bind(order.delivered_at())
        .bind(order.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
