use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::roles::{self, RoleGate};
use crate::models::{Payment, Role};
use crate::repository::payments::{self, PaymentFilter};
use crate::schemas::{
    clamp_limit_in_range, validate_input, CreatePaymentInput, PaymentPath, PaymentsQuery,
    ReviewPaymentInput,
};
use crate::services::billing;
use crate::services::gateway::{self, WebhookOutcome};
use crate::state::{db_pool, AppState};

const MANAGE_ROLES: &[Role] = &[Role::Admin, Role::Manager];

const SIGNATURE_HEADER: &str = "x-paystack-signature";

pub fn router(state: &AppState) -> Router<AppState> {
    let manage = Router::new()
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/{payment_id}", get(get_payment))
        .route("/payments/{payment_id}/review", post(review_payment))
        .route_layer(axum::middleware::from_fn_with_state(
            RoleGate::new(state, MANAGE_ROLES),
            roles::authorize,
        ));

    // Webhook delivery authenticates with its signature, not a session.
    let webhook = Router::new().route("/webhooks/gateway", post(gateway_webhook));

    manage.merge(webhook)
}

async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentsQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    let pool = db_pool(&state)?;
    let filter = PaymentFilter {
        tenant_id: query.tenant_id,
        status: query.status,
        verification_status: query.verification_status,
    };
    let limit = clamp_limit_in_range(query.limit, 1, 1000);
    Ok(Json(payments::list(pool, &filter, limit).await?))
}

async fn get_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
) -> AppResult<Json<Payment>> {
    let pool = db_pool(&state)?;
    Ok(Json(payments::get(pool, path.payment_id).await?))
}

async fn create_payment(
    State(state): State<AppState>,
    Json(input): Json<CreatePaymentInput>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    validate_input(&input)?;
    let pool = db_pool(&state)?;
    let payment = billing::create_payment(pool, &input).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn review_payment(
    State(state): State<AppState>,
    Path(path): Path<PaymentPath>,
    Json(input): Json<ReviewPaymentInput>,
) -> AppResult<Json<Payment>> {
    let pool = db_pool(&state)?;
    Ok(Json(
        billing::review_payment(pool, path.payment_id, input.approved).await?,
    ))
}

/// Payment gateway callback. The signature is an HMAC-SHA512 hex digest of
/// the raw body, so the body must be read as bytes before any JSON parsing.
async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let secret = state.config.gateway_webhook_secret.as_deref().ok_or_else(|| {
        AppError::Dependency(
            "Gateway webhook secret is not configured. Set GATEWAY_WEBHOOK_SECRET.".to_string(),
        )
    })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature.".to_string()))?;

    if !gateway::verify_webhook_signature(&body, signature, secret) {
        return Err(AppError::Unauthorized(
            "Invalid webhook signature.".to_string(),
        ));
    }

    let pool = db_pool(&state)?;
    let outcome = gateway::apply_webhook(pool, &body).await?;
    let body = match outcome {
        WebhookOutcome::Applied(payment) => {
            json!({ "status": "applied", "payment_id": payment.id })
        }
        WebhookOutcome::AlreadyApplied => json!({ "status": "already_applied" }),
        WebhookOutcome::Ignored => json!({ "status": "ignored" }),
    };
    Ok(Json(body))
}
