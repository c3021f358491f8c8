/*
 * Responsibility
 * - Example protected resource that needs a specific role
 * - The role check is made here, by the resource, not by the filter
 */
use axum::Json;
use serde_json::{Value, json};

use crate::api::extractors::CurrentPrincipal;
use crate::error::AppError;

pub const ADMIN_ROLE: &str = "ROLE_ADMIN";

pub async fn status(
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Value>, AppError> {
    principal.require_role(ADMIN_ROLE)?;

    Ok(Json(json!({
        "status": "ok",
        "subject": principal.subject(),
    })))
}
