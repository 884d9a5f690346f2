use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use crewdesk_db::Database;
use crewdesk_gateway::dispatcher::Dispatcher;
use crewdesk_payments::azul::AzulConfig;
use crewdesk_payments::stripe::StripeClient;
use crewdesk_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
use crewdesk_types::models::{email_domain, Tier};

pub type AppState = Arc<AppStateInner>;

/// Everything handlers need, constructed once at the application root and
/// passed down. No process-wide globals.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub azul: AzulConfig,
    pub stripe: StripeClient,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.name.trim().is_empty() || req.name.len() > 64 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if email_domain(&req.email).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user_id = Uuid::new_v4();

    // Argon2id and the uniqueness check are blocking work; keep them off the
    // async runtime.
    let db = state.db.clone();
    let name = req.name.clone();
    let email = req.email.clone();
    let password = req.password.clone();
    tokio::task::spawn_blocking(move || {
        if db
            .get_profile_by_email(&email)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .is_some()
        {
            return Err(StatusCode::CONFLICT);
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .to_string();

        db.create_profile(&user_id.to_string(), &name, &email, &password_hash)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let token = create_token(&state.jwt_secret, user_id, &req.name, &req.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Password verification is blocking CPU work; run it off the runtime.
    let db = state.db.clone();
    let email = req.email.clone();
    let password = req.password;
    let profile = tokio::task::spawn_blocking(move || {
        let profile = db
            .get_profile_by_email(&email)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let parsed_hash = PasswordHash::new(&profile.password)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok::<_, StatusCode>(profile)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    let user_id: Uuid = profile
        .id
        .parse()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let tier = match profile.tier.as_str() {
        "pro" => Tier::Pro,
        _ => Tier::Free,
    };

    let token = create_token(&state.jwt_secret, user_id, &profile.name, &profile.email)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        user_id,
        name: profile.name,
        tier,
        token,
    }))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    name: &str,
    email: &str,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        email: email.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
