//! # Catalog Routes
//!
//! Reads are public; writes require an administrator.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::aggregates::{NewProduct, Product, ProductUpdate};
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product).put(update_product).delete(delete_product))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub count_in_stock: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub image: String,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            count_in_stock: req.count_in_stock,
            category: req.category,
            brand: req.brand,
            image: req.image,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub count_in_stock: Option<u32>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image: Option<String>,
}

impl From<UpdateProductRequest> for ProductUpdate {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            price: req.price,
            count_in_stock: req.count_in_stock,
            category: req.category,
            brand: req.brand,
            image: req.image,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.catalog.list().await?))
}

async fn get_product(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.catalog.get(extract_path(path)?).await?))
}

async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let req = extract_validated_json(body)?;
    let product = state.catalog.create(req.into(), admin.id()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<Product>, AppError> {
    let id = extract_path(path)?;
    let req = extract_validated_json(body)?;
    Ok(Json(state.catalog.update(id, req.into()).await?))
}

async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.catalog.delete(extract_path(path)?).await?;
    Ok(Json(DeleteResponse { success: true, message: "Product removed".into() }))
}
