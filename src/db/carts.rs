use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{to_i32, to_u32, PgStore};
use crate::domain::aggregates::{Cart, CartItem};
use crate::store::{CartStore, StoreError};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Uuid,
    total: Decimal,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    product_id: Uuid,
    quantity: i32,
}

impl PgStore {
    async fn hydrate_cart(&self, row: CartRow) -> Result<Cart, StoreError> {
        let items = sqlx::query_as::<_, CartItemRow>(
            "SELECT product_id, quantity FROM cart_items WHERE cart_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|i| Ok(CartItem { product_id: i.product_id, quantity: to_u32(i.quantity, "quantity")? }))
        .collect::<Result<Vec<_>, StoreError>>()?;
        Ok(Cart::from_parts(row.id, row.user_id, items, row.total, row.version, row.created_at, row.updated_at))
    }

    async fn fetch_cart(&self, column: &str, value: Uuid) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT id, user_id, total, version, created_at, updated_at FROM carts WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_cart(row).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn find(&self, id: Uuid) -> Result<Option<Cart>, StoreError> {
        self.fetch_cart("id", id).await
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        self.fetch_cart("user_id", user_id).await
    }

    async fn save(&self, cart: &Cart) -> Result<Cart, StoreError> {
        let next_version = cart.version() + 1;
        let mut tx = self.pool.begin().await?;

        if cart.version() == 0 {
            sqlx::query(
                "INSERT INTO carts (id, user_id, total, version, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(cart.id())
            .bind(cart.user_id())
            .bind(cart.total())
            .bind(next_version)
            .bind(cart.created_at())
            .bind(cart.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(|e| super::conflict_on_unique(e, || format!("user {} already has a cart", cart.user_id())))?;
        } else {
            let result = sqlx::query(
                "UPDATE carts SET total = $3, version = $4, updated_at = $5
                 WHERE id = $1 AND version = $2",
            )
            .bind(cart.id())
            .bind(cart.version())
            .bind(cart.total())
            .bind(next_version)
            .bind(cart.updated_at())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!("cart {} was modified concurrently", cart.id())));
            }
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart.id()).execute(&mut *tx).await?;
        }

        for (position, item) in cart.items().iter().enumerate() {
            sqlx::query("INSERT INTO cart_items (cart_id, product_id, quantity, position) VALUES ($1, $2, $3, $4)")
                .bind(cart.id())
                .bind(item.product_id)
                .bind(to_i32(item.quantity, "quantity")?)
                .bind(position as i32)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(cart.clone().saved_as(next_version))
    }
}
