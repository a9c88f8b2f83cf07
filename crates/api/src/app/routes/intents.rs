//! `/intents` — submission, lookup, and the approve/reject/execute
//! deferred-approval lifecycle (§4.8, §4.9, §6).

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;

use ledgerflow_core::IntentId;
use ledgerflow_intents::{Intent, IntentStatus};

use crate::app::dto::{event_to_json, intent_to_json, ApproveRejectRequest, SubmitIntentRequest};
use crate::app::errors::{authz_error_response, intent_store_error_response, json_error};
use crate::app::services::AppState;
use crate::authz::authorize_intent;
use crate::context::{PrincipalContext, TenantContext};

fn parse_intent_id(raw: &str) -> Result<IntentId, Response> {
    IntentId::from_str(raw).map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_intent_id", e.to_string()))
}

pub async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    principal: Option<Extension<PrincipalContext>>,
    Json(mut body): Json<SubmitIntentRequest>,
) -> Response {
    let actor = match principal.as_ref().map(|Extension(p)| p.identity().to_actor()) {
        Some(actor) => actor,
        None => match body.actor.take() {
            Some(request_actor) => request_actor.into_actor(),
            None => return json_error(StatusCode::BAD_REQUEST, "missing_actor", "no authenticated identity and no actor in request body"),
        },
    };

    if let Some(Extension(principal)) = &principal {
        if let Err(e) = authorize_intent(&state.capabilities, principal, &body.intent_type) {
            return authz_error_response(e);
        }
    }

    let mut intent = Intent::new_request(
        body.intent_type.clone(),
        actor,
        tenant.tenant_id(),
        tenant.legal_entity(),
        body.data,
    );
    intent.idempotency_key = body.idempotency_key;
    intent.correlation_id = body.correlation_id;
    intent.occurred_at = body.occurred_at;
    intent.effective_date = body.effective_date;

    match state.pipeline.execute(&intent) {
        Ok(ledgerflow_intents::IntentResult::Success { event_id, event }) => (
            StatusCode::CREATED,
            Json(json!({
                "intent_id": intent.id,
                "event_id": event_id,
                "event": event.as_ref().map(event_to_json),
            })),
        )
            .into_response(),
        Ok(ledgerflow_intents::IntentResult::Failed { error, traces }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": error, "traces": traces})),
        )
            .into_response(),
        Ok(ledgerflow_intents::IntentResult::PendingApproval { required_approver_role, traces: _ }) => {
            let mut pending = intent.clone();
            pending.status = IntentStatus::PendingApproval;
            pending.required_approver_role = Some(required_approver_role.clone());

            if let Err(e) = state.intents.create(pending.clone()) {
                return intent_store_error_response(e);
            }

            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "intent_id": pending.id,
                    "status": "pending_approval",
                    "required_approver_role": required_approver_role,
                })),
            )
                .into_response()
        }
        Err(e) => json_error(StatusCode::BAD_REQUEST, "unknown_intent_type", e.intent_type),
    }
}

pub async fn get_by_id(Extension(state): Extension<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match parse_intent_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.intents.get_by_id(id) {
        Some(intent) => Json(intent_to_json(&intent)).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "intent_not_found", format!("intent {id} not found")),
    }
}

pub async fn approve(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRejectRequest>,
) -> Response {
    let id = match parse_intent_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let approver = principal.identity();
    match state.intents.approve(id, approver.id, &approver.name, body.reason) {
        Ok(intent) => Json(json!({
            "intent_id": intent.id,
            "status": intent.status,
            "approved_by_id": approver.id,
        }))
        .into_response(),
        Err(e) => intent_store_error_response(e),
    }
}

pub async fn reject(
    Extension(state): Extension<Arc<AppState>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRejectRequest>,
) -> Response {
    let id = match parse_intent_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let rejector = principal.identity();
    match state.intents.reject(id, rejector.id, &rejector.name, body.reason) {
        Ok(intent) => Json(json!({
            "intent_id": intent.id,
            "status": intent.status,
            "rejected_by_id": rejector.id,
        }))
        .into_response(),
        Err(e) => intent_store_error_response(e),
    }
}

/// Re-dispatches a previously-approved intent through its handler.
/// `support::evaluate` short-circuits rule evaluation for intents already
/// `Approved`, so this does not re-route for approval.
pub async fn execute(Extension(state): Extension<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match parse_intent_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let intent = match state.intents.get_by_id(id) {
        Some(intent) => intent,
        None => return json_error(StatusCode::NOT_FOUND, "intent_not_found", format!("intent {id} not found")),
    };

    if intent.status != IntentStatus::Approved {
        return json_error(
            StatusCode::BAD_REQUEST,
            "not_approved",
            format!("intent {id} is not approved (status: {:?})", intent.status),
        );
    }

    match state.pipeline.execute(&intent) {
        Ok(ledgerflow_intents::IntentResult::Success { event_id, .. }) => {
            if let Err(e) = state.intents.mark_executed(id, event_id) {
                return intent_store_error_response(e);
            }
            Json(json!({"intent_id": id, "status": "executed"})).into_response()
        }
        Ok(ledgerflow_intents::IntentResult::Failed { error, .. }) => {
            let _ = state.intents.mark_failed(id, &error);
            json_error(StatusCode::BAD_REQUEST, "execution_failed", error)
        }
        Ok(ledgerflow_intents::IntentResult::PendingApproval { .. }) => json_error(
            StatusCode::BAD_REQUEST,
            "unexpected_pending_approval",
            "an approved intent was routed back for approval",
        ),
        Err(e) => json_error(StatusCode::BAD_REQUEST, "unknown_intent_type", e.intent_type),
    }
}
