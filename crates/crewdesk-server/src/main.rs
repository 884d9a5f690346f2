use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crewdesk_api::auth::{self, AppState, AppStateInner};
use crewdesk_api::middleware::require_auth;
use crewdesk_api::{channels, messages, payments, projects};
use crewdesk_gateway::connection;
use crewdesk_gateway::dispatcher::Dispatcher;
use crewdesk_payments::azul::AzulConfig;
use crewdesk_payments::stripe::{StripeClient, StripeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewdesk=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("CREWDESK_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("CREWDESK_DB_PATH").unwrap_or_else(|_| "crewdesk.db".into());
    let host = std::env::var("CREWDESK_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CREWDESK_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let azul = AzulConfig::from_env().map_err(|e| anyhow::anyhow!("Azul config: {e}"))?;
    let stripe_config =
        StripeConfig::from_env().map_err(|e| anyhow::anyhow!("Stripe config: {e}"))?;

    // Init database
    let db = Arc::new(crewdesk_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        dispatcher: dispatcher.clone(),
        azul,
        stripe: StripeClient::new(stripe_config),
    });

    let app = router(app_state, dispatcher, db, jwt_secret);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Crewdesk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(
    app_state: AppState,
    dispatcher: Dispatcher,
    db: Arc<crewdesk_db::Database>,
    jwt_secret: String,
) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/payments/azul", post(payments::create_azul_payment))
        .route("/payments/stripe-webhook", post(payments::stripe_webhook))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/channels", get(channels::list_channels))
        .route("/channels", post(channels::create_channel))
        .route("/channels/{channel_id}/messages", get(messages::get_messages))
        .route("/channels/{channel_id}/messages", post(messages::send_message))
        .route("/projects", get(projects::list_projects))
        .route(
            "/payments/checkout-session",
            post(payments::create_checkout_session),
        )
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(GatewayState {
            dispatcher,
            db,
            jwt_secret,
        });

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone)]
struct GatewayState {
    dispatcher: Dispatcher,
    db: Arc<crewdesk_db::Database>,
    jwt_secret: String,
}

async fn ws_upgrade(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.db, state.jwt_secret)
    })
}
