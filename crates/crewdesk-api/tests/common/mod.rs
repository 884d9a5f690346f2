use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crewdesk_api::auth::{self, AppState, AppStateInner};
use crewdesk_api::middleware::require_auth;
use crewdesk_api::{channels, messages, payments};
use crewdesk_db::Database;
use crewdesk_gateway::dispatcher::Dispatcher;
use crewdesk_payments::azul::AzulConfig;
use crewdesk_payments::stripe::{StripeClient, StripeConfig};

pub const WEBHOOK_SECRET: &str = "whsec_test123secret456";

pub fn test_state() -> AppState {
    let db = Arc::new(Database::open_in_memory().expect("in-memory db"));
    Arc::new(AppStateInner {
        db,
        jwt_secret: "test-jwt-secret".into(),
        dispatcher: Dispatcher::new(),
        azul: AzulConfig {
            merchant_id: "3900000000".into(),
            merchant_name: "Crewdesk".into(),
            merchant_type: "Ecommerce".into(),
            currency_code: "$".into(),
            approved_url: "https://crewdesk.test/payments/approved".into(),
            declined_url: "https://crewdesk.test/payments/declined".into(),
            cancel_url: "https://crewdesk.test/payments/cancel".into(),
            auth_key: "test-auth-key".into(),
            form_url: "https://pruebas.azul.com.do/PaymentPage/".into(),
        },
        stripe: StripeClient::new(StripeConfig {
            secret_key: "sk_test_xxx".into(),
            webhook_secret: WEBHOOK_SECRET.into(),
            success_url: "https://crewdesk.test/billing/success".into(),
            cancel_url: "https://crewdesk.test/billing/cancel".into(),
        }),
    })
}

/// The routes under test, wired the way crewdesk-server wires them.
pub fn app(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/payments/azul", post(payments::create_azul_payment))
        .route("/payments/stripe-webhook", post(payments::stripe_webhook))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/channels", get(channels::list_channels))
        .route("/channels", post(channels::create_channel))
        .route("/channels/{channel_id}/messages", get(messages::get_messages))
        .route("/channels/{channel_id}/messages", post(messages::send_message))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    public.merge(protected)
}

/// Seed a profile directly and mint a bearer token for it.
pub fn seed_user(state: &AppState, name: &str, email: &str) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    state
        .db
        .create_profile(&user_id.to_string(), name, email, "unused-hash")
        .expect("seed profile");
    let token =
        auth::create_token(&state.jwt_secret, user_id, name, email).expect("mint token");
    (user_id, token)
}

pub fn stripe_signature(payload: &[u8], secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
