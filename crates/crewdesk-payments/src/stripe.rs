use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crewdesk_types::api::CheckoutSession;

use crate::PaymentError;

type HmacSha256 = Hmac<Sha256>;

/// Reject webhook timestamps older than this (replay protection).
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl StripeConfig {
    pub fn from_env() -> Result<Self, PaymentError> {
        let var = |name: &'static str| {
            std::env::var(name).map_err(|_| PaymentError::MissingField(name))
        };
        Ok(Self {
            secret_key: var("STRIPE_SECRET_KEY")?,
            webhook_secret: var("STRIPE_WEBHOOK_SECRET")?,
            success_url: var("STRIPE_SUCCESS_URL")?,
            cancel_url: var("STRIPE_CANCEL_URL")?,
        })
    }
}

pub struct StripeClient {
    config: StripeConfig,
    http: reqwest::Client,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>`) against the
    /// raw request body. Returns Ok(false) for a wrong signature or a stale
    /// timestamp; Err only for a header we cannot parse at all.
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<bool, PaymentError> {
        let mut timestamp: Option<&str> = None;
        let mut signature: Option<&str> = None;

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => timestamp = Some(v),
                Some(("v1", v)) => signature = Some(v),
                _ => {} // Unknown schemes (v0 etc.) are ignored
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            PaymentError::MalformedSignature("missing t= component".into())
        })?;
        let signature = signature.ok_or_else(|| {
            PaymentError::MalformedSignature("missing v1= component".into())
        })?;

        let ts: i64 = timestamp.parse().map_err(|_| {
            PaymentError::MalformedSignature(format!("bad timestamp: {timestamp}"))
        })?;
        let age = chrono::Utc::now().timestamp() - ts;
        if age.abs() > SIGNATURE_TOLERANCE_SECS {
            debug!("webhook timestamp outside tolerance ({age}s)");
            return Ok(false);
        }

        let expected = match hex::decode(signature) {
            Ok(bytes) => bytes,
            // Non-hex signature can never match
            Err(_) => return Ok(false),
        };

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|e| PaymentError::Provider(format!("HMAC init: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        // verify_slice is constant-time
        Ok(mac.verify_slice(&expected).is_ok())
    }

    /// Create a hosted checkout session in subscription mode. The caller's
    /// user id travels in session metadata and comes back to us in the
    /// checkout.session.completed webhook.
    pub async fn create_checkout_session(
        &self,
        price_id: &str,
        user_id: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        if price_id.trim().is_empty() {
            return Err(PaymentError::MissingField("price_id"));
        }

        let params = [
            ("mode", "subscription"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", &self.config.success_url),
            ("cancel_url", &self.config.cancel_url),
            ("metadata[user_id]", user_id),
        ];

        let resp = self
            .http
            .post("https://api.stripe.com/v1/checkout/sessions")
            .bearer_auth(&self.config.secret_key)
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(body));
        }

        let session: CheckoutSession = resp.json().await?;
        Ok(session)
    }
}
