//! # Order Routes
//!
//! - `GET /api/orders/myorders` the caller's orders, newest first
//! - `GET /api/orders`          every order (admin)
//! - `GET /api/orders/:id`      one order, owner or admin only
//! - `PUT /api/orders/:id`      set the delivery flag (admin)

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path};
use crate::services::OrderView;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all))
        .route("/myorders", get(list_mine))
        .route("/:id", get(get_order).put(update_delivery))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryUpdate {
    pub is_delivered: bool,
}

async fn list_mine(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<OrderView>>, AppError> {
    Ok(Json(state.orders.list_for_user(user.id()).await?))
}

async fn list_all(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<OrderView>>, AppError> {
    Ok(Json(state.orders.list_all().await?))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<OrderView>, AppError> {
    Ok(Json(state.orders.get(&user.user, extract_path(path)?).await?))
}

async fn update_delivery(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<DeliveryUpdate>, JsonRejection>,
) -> Result<Json<OrderView>, AppError> {
    let id = extract_path(path)?;
    let req = extract_json(body)?;
    let order = state.orders.set_delivered(id, req.is_delivered).await?;
    tracing::info!(order_id = %id, admin_id = %admin.id(), delivered = req.is_delivered, "order delivery updated");
    Ok(Json(order))
}
