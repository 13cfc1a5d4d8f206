//! # Account Routes
//!
//! - `POST /api/auth/register`, `/login`, `/login-admin` issue a bearer token
//! - `POST /api/auth/logout` revokes the caller's session
//! - `GET|PUT /api/auth/profile`
//! - `GET /api/auth/users`, `DELETE /api/auth/users/:id`, `PUT /api/auth/users/:id/role` (admin)

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::domain::aggregates::User;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_path, extract_validated_json};
use crate::services::{AuthSession, ProfileUpdate, Registration};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/login-admin", post(login_admin))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/users", get(list_users))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/role", put(set_role))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email is not valid"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email is not valid"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileRequest {
    pub name: Option<String>,
    #[validate(email(message = "email is not valid"))]
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub is_admin: bool,
}

async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthSession>), AppError> {
    let req = extract_validated_json(body)?;
    let session = state
        .accounts
        .register(Registration { name: req.name, email: req.email, password: req.password })
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthSession>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.accounts.login(&req.email, &req.password).await?))
}

async fn login_admin(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthSession>, AppError> {
    let req = extract_validated_json(body)?;
    Ok(Json(state.accounts.login_admin(&req.email, &req.password).await?))
}

async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<StatusCode, AppError> {
    state.accounts.logout(user.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(State(state): State<AppState>, user: AuthUser) -> Result<Json<User>, AppError> {
    Ok(Json(state.accounts.profile(user.id()).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let req = extract_validated_json(body)?;
    let update = ProfileUpdate { name: req.name, email: req.email, avatar: req.avatar, password: req.password };
    Ok(Json(state.accounts.update_profile(user.id(), update).await?))
}

async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.accounts.list_users().await?))
}

async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = extract_path(path)?;
    state.accounts.delete_user(admin.id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_role(
    State(state): State<AppState>,
    _admin: AdminUser,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<Json<User>, AppError> {
    let id = extract_path(path)?;
    let req = extract_json(body)?;
    Ok(Json(state.accounts.set_admin(id, req.is_admin).await?))
}
