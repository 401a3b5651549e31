//! Read-only listings of payment transactions and invoices.
//!
//! Failures are reported with a listing-specific message rather than the
//! generic `AppError` body, matching what dashboard clients already parse.
//! Malformed query strings get the usual `AppError` 400.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;

use crate::dtos::{ListParams, ListResponse};
use crate::services::ListQuery;
use crate::startup::AppState;

pub async fn list_transactions(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let query = match params {
        Ok(Query(params)) => ListQuery::from(params),
        Err(rejection) => return invalid_params(rejection),
    };
    match state.records.list_transactions(&query).await {
        Ok((records, total)) => Json(ListResponse { records, total }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list transactions");
            listing_failed("Failed to retrieve transactions")
        }
    }
}

pub async fn list_invoices(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let query = match params {
        Ok(Query(params)) => ListQuery::from(params),
        Err(rejection) => return invalid_params(rejection),
    };
    match state.records.list_invoices(&query).await {
        Ok((records, total)) => Json(ListResponse { records, total }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list invoices");
            listing_failed("Failed to retrieve invoices")
        }
    }
}

fn invalid_params(rejection: QueryRejection) -> Response {
    tracing::warn!(error = %rejection, "Rejected listing query");
    AppError::BadRequest(anyhow::anyhow!(rejection.body_text())).into_response()
}

fn listing_failed(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}
