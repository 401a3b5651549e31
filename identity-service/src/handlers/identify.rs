use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::{IdentifyRequest, IdentifyResponse};
use crate::startup::AppState;

/// Resolve the submitted email/phone pair to its consolidated contact.
pub async fn identify(
    State(state): State<AppState>,
    Json(payload): Json<IdentifyRequest>,
) -> Result<Json<IdentifyResponse>, AppError> {
    let (email, phone_number) = payload.into_parts();
    let contact = state.resolver.resolve(email, phone_number).await?;
    Ok(Json(IdentifyResponse { contact }))
}
