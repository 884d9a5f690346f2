use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, Tier};

// -- JWT Claims --

/// JWT claims shared across crewdesk-api (REST middleware) and
/// crewdesk-gateway (WebSocket authentication). Canonical definition lives
/// here to eliminate duplication. `email` rides along so handlers can derive
/// the tenant domain without a profile lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub tier: Tier,
    pub token: String,
}

// -- Channels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChannelRequest {
    pub name: String,
    /// Optional explicit domain. When present it must equal the domain
    /// derived from the caller's email, otherwise the insert is rejected.
    pub domain: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// -- Projects --

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// -- Payments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzulPaymentRequest {
    /// Merchant order number, e.g. "TEST001".
    pub order_id: String,
    /// Minor-unit amount string with no separators, e.g. "2900" for 29.00.
    pub amount: String,
    /// Minor-unit tax (ITBIS) string, e.g. "000".
    pub itbis: String,
}

#[derive(Debug, Serialize)]
pub struct AzulPaymentResponse {
    pub form_url: String,
    /// Form field name/value pairs in submission order. The receiving
    /// payment page recomputes AuthHash over these exact values.
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutSessionRequest {
    pub price_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutSessionResponse {
    pub session: CheckoutSession,
}

/// Hosted checkout session descriptor returned by the billing provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}
