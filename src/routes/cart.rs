//! # Cart Routes
//!
//! - `GET    /api/cart`            current cart, or the empty shape
//! - `POST   /api/cart`            add a product (quantities sum)
//! - `PUT    /api/cart`            set a line item's quantity
//! - `DELETE /api/cart/:productId` remove a line item

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::extractors::{extract_path, extract_validated_json};
use crate::services::CartView;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_item).put(update_item))
        .route("/:product_id", delete(remove_item))
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: u32,
}

async fn get_cart(State(state): State<AppState>, user: AuthUser) -> Result<Json<CartView>, AppError> {
    Ok(Json(state.carts.get(user.id()).await?))
}

async fn add_item(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartView>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.carts.add_item(user.id(), req.product_id, req.quantity).await?))
}

async fn update_item(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<CartView>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.carts.update_item(user.id(), req.product_id, req.quantity).await?))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CartView>, AppError> {
    Ok(Json(state.carts.remove_item(user.id(), extract_path(path)?).await?))
}
