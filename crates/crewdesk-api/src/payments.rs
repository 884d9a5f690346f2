use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crewdesk_types::api::{AzulPaymentRequest, CheckoutSessionRequest, CheckoutSessionResponse};
use crewdesk_types::models::Tier;

use crate::auth::AppState;

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

/// Build the signed redirect payload for the Azul hosted payment page.
/// Any failure is terminal for the request; nothing is retried.
pub async fn create_azul_payment(
    State(state): State<AppState>,
    Json(req): Json<AzulPaymentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let payload = state
        .azul
        .build_form(&req.order_id, &req.amount, &req.itbis)
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(payload))
}

/// Create a hosted checkout session for the authenticated caller.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(claims): Extension<crewdesk_types::api::Claims>,
    Json(req): Json<CheckoutSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let session = state
        .stripe
        .create_checkout_session(&req.price_id, &claims.sub.to_string())
        .await
        .map_err(|e| bad_request(e.to_string()))?;

    Ok(Json(CheckoutSessionResponse { session }))
}

/// Billing webhook consumer. The signature is verified against the raw body
/// before anything in the payload is trusted; a bad signature changes no
/// state. Delivery is at-least-once, so the checkout branch is idempotent on
/// the provider subscription id.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, Json<Value>)> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| bad_request("missing stripe-signature header"))?;

    let valid = state
        .stripe
        .verify_webhook_signature(&body, signature)
        .map_err(|e| bad_request(e.to_string()))?;
    if !valid {
        return Err(bad_request("signature verification failed"));
    }

    let event: Value =
        serde_json::from_slice(&body).map_err(|_| bad_request("invalid JSON payload"))?;
    let kind = event["type"].as_str().unwrap_or_default().to_string();
    let object = &event["data"]["object"];

    match kind.as_str() {
        "checkout.session.completed" => {
            let Some(user_id) = object["metadata"]["user_id"].as_str() else {
                // Not an error: acknowledge so the provider stops retrying.
                warn!("checkout.session.completed without metadata.user_id, ignoring");
                return Ok(Json(json!({ "received": true })));
            };

            // The subscription id is the idempotency key; a session without
            // one falls back to the session id.
            let provider_sub = object["subscription"]
                .as_str()
                .or_else(|| object["id"].as_str())
                .unwrap_or_default()
                .to_string();
            if provider_sub.is_empty() {
                warn!("checkout.session.completed without subscription or session id, ignoring");
                return Ok(Json(json!({ "received": true })));
            }

            let customer = object["customer"].as_str().map(str::to_string);
            let user_id = user_id.to_string();

            let db = state.db.clone();
            let uid = user_id.clone();
            let inserted = tokio::task::spawn_blocking(move || {
                let inserted = db.insert_subscription(
                    &Uuid::new_v4().to_string(),
                    &uid,
                    customer.as_deref(),
                    &provider_sub,
                )?;
                if inserted {
                    db.set_profile_tier(&uid, Tier::Pro.as_str())?;
                }
                Ok::<_, anyhow::Error>(inserted)
            })
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                bad_request("internal error")
            })?
            .map_err(|e| {
                error!("checkout processing failed: {}", e);
                bad_request("internal error")
            })?;

            if inserted {
                info!("user {} upgraded to pro", user_id);
            } else {
                info!("duplicate checkout event for user {}, already processed", user_id);
            }
        }

        "customer.subscription.deleted" => {
            let Some(provider_sub) = object["id"].as_str().map(str::to_string) else {
                warn!("subscription.deleted without id, ignoring");
                return Ok(Json(json!({ "received": true })));
            };

            let db = state.db.clone();
            let downgraded = tokio::task::spawn_blocking(move || {
                match db.cancel_subscription(&provider_sub)? {
                    Some(user_id) => {
                        db.set_profile_tier(&user_id, Tier::Free.as_str())?;
                        Ok::<_, anyhow::Error>(Some(user_id))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                bad_request("internal error")
            })?
            .map_err(|e| {
                error!("cancellation processing failed: {}", e);
                bad_request("internal error")
            })?;

            match downgraded {
                Some(user_id) => info!("user {} downgraded to free", user_id),
                None => warn!("cancellation for unknown subscription, ignoring"),
            }
        }

        other => {
            info!("ignoring webhook event type '{}'", other);
        }
    }

    Ok(Json(json!({ "received": true })))
}
