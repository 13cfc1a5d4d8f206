//! Request extraction helpers.
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and pass it through
//! [`extract_validated_json`], so malformed bodies and failed `validator`
//! rules both come back as 400 `INVALID_INPUT` in the standard error shape.
//! Path parameters go through [`extract_path`] the same way.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use validator::Validate;

use crate::error::AppError;

pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result.map(|Json(v)| v).map_err(|err| AppError::InvalidInput(err.body_text()))
}

pub fn extract_validated_json<T: Validate>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate()?;
    Ok(value)
}

pub fn extract_path<T>(result: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    result.map(|Path(v)| v).map_err(|err| AppError::InvalidInput(err.body_text()))
}
