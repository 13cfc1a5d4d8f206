use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{to_i32, to_u32, PgStore};
use crate::domain::aggregates::Product;
use crate::store::{ProductStore, StoreError};

const COLUMNS: &str =
    "id, name, description, price, count_in_stock, category, brand, image, user_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    count_in_stock: i32,
    category: String,
    brand: String,
    image: String,
    user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            count_in_stock: to_u32(row.count_in_stock, "count_in_stock")?,
            category: row.category,
            brand: row.brand,
            image: row.image,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, StoreError> {
    rows.into_iter().map(Product::try_from).collect()
}

#[async_trait]
impl ProductStore for PgStore {
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await?;
        into_products(rows)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {COLUMNS} FROM products WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        into_products(rows)
    }

    async fn insert(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO products (id, name, description, price, count_in_stock, category, brand, image, user_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(to_i32(product.count_in_stock, "count_in_stock")?)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(&product.image)
        .bind(product.user_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| super::conflict_on_unique(e, || format!("product {} already exists", product.id)))?;
        Ok(())
    }

    async fn update(&self, product: &Product) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4, count_in_stock = $5,
                category = $6, brand = $7, image = $8, updated_at = $9
             WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(to_i32(product.count_in_stock, "count_in_stock")?)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(&product.image)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn decrement_stock(&self, id: Uuid, quantity: u32) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE products SET count_in_stock = count_in_stock - $2, updated_at = NOW()
             WHERE id = $1 AND count_in_stock >= $2",
        )
        .bind(id)
        .bind(to_i32(quantity, "quantity")?)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
