//! Catalog service.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{NewProduct, Product, ProductError, ProductUpdate};
use crate::store::{ProductStore, StoreError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Invalid(#[from] ProductError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct CatalogService {
    products: Arc<dyn ProductStore>,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductStore>) -> Self {
        Self { products }
    }

    pub async fn list(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, CatalogError> {
        self.products.find(id).await?.ok_or(CatalogError::NotFound(id))
    }

    pub async fn create(&self, input: NewProduct, owner: Uuid) -> Result<Product, CatalogError> {
        let product = Product::create(input, Some(owner))?;
        self.products.insert(&product).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "product created");
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, update: ProductUpdate) -> Result<Product, CatalogError> {
        let mut product = self.get(id).await?;
        product.apply(update)?;
        if !self.products.update(&product).await? {
            return Err(CatalogError::NotFound(id));
        }
        tracing::info!(product_id = %id, stock = product.count_in_stock, "product updated");
        Ok(product)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), CatalogError> {
        if !self.products.delete(id).await? {
            return Err(CatalogError::NotFound(id));
        }
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }
}
