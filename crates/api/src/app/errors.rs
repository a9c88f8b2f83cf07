//! Consistent JSON error responses, mirroring the teacher's
//! `dispatch_error_to_response`/`json_error` shape.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use ledgerflow_auth::AuthzError;
use ledgerflow_events::{EventStoreError, RegistryError};
use ledgerflow_intents::IntentStoreError;
use ledgerflow_projections::{SnapshotError, SubscriptionError};

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> axum::response::Response {
    (status, Json(json!({"error": code, "message": message.into()}))).into_response()
}

pub fn authz_error_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::UnknownIntentType(_) => json_error(StatusCode::FORBIDDEN, "unknown_intent_type", err.to_string()),
        AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

pub fn intent_store_error_response(err: IntentStoreError) -> axum::response::Response {
    match err {
        IntentStoreError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "intent_not_found", err.to_string()),
        IntentStoreError::NotPendingApproval(..) => {
            json_error(StatusCode::BAD_REQUEST, "not_pending_approval", err.to_string())
        }
        IntentStoreError::SelfApproval { .. } => {
            json_error(StatusCode::FORBIDDEN, "segregation_of_duties", err.to_string())
        }
        IntentStoreError::Storage(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string())
        }
    }
}

pub fn event_store_error_response(err: EventStoreError) -> axum::response::Response {
    match err {
        EventStoreError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_failed", err.to_string()),
        EventStoreError::Concurrency { expected, actual, .. } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "concurrency_conflict",
                "message": err.to_string(),
                "expected_version": expected,
                "actual_version": actual,
            })),
        )
            .into_response(),
        EventStoreError::Storage(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string())
        }
    }
}

pub fn subscription_error_response(err: SubscriptionError) -> axum::response::Response {
    match err {
        SubscriptionError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, "subscription_not_found", err.to_string()),
        SubscriptionError::NoOpTransition(_) => json_error(StatusCode::BAD_REQUEST, "no_op_transition", err.to_string()),
        SubscriptionError::Storage(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string())
        }
    }
}

pub fn registry_error_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::InvalidSchema { .. } => json_error(StatusCode::BAD_REQUEST, "invalid_schema", err.to_string()),
        RegistryError::ValidationFailed { .. } => json_error(StatusCode::BAD_REQUEST, "validation_failed", err.to_string()),
    }
}

pub fn snapshot_error_response(err: SnapshotError) -> axum::response::Response {
    match err {
        SnapshotError::UnknownProjectionType(_) => {
            json_error(StatusCode::NOT_FOUND, "unknown_projection_type", err.to_string())
        }
        SnapshotError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "snapshot_not_found", err.to_string()),
        SnapshotError::Storage(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", err.to_string()),
    }
}
