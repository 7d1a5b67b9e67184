use std::net::SocketAddr;

use axum::Router;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod extract;
mod middleware;
mod responder;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warmline API",
        version = "0.1.0",
        description = "Anonymous letter exchange for mental-health support: letters in, \
                       moderation in the middle, human or AI replies out."
    ),
    paths(
        routes::health::health_check,
        routes::auth::register,
        routes::auth::login,
        routes::auth::verify,
        routes::auth::logout,
        routes::letters::submit,
        routes::letters::get_letter,
        routes::letters::unprocessed_queue,
        routes::letters::flagged_queue,
        routes::letters::respond,
        routes::letters::mark_processed,
        routes::admin::delete_letter,
        routes::admin::list_users,
        routes::admin::update_role,
        routes::admin::delete_user,
        routes::chat::chat,
        routes::chat::moderate,
    ),
    components(schemas(
        HealthResponse,
        warmline_core::error::ApiError,
        warmline_core::roles::Role,
        warmline_core::moderation::CrisisResources,
        warmline_core::letters::ReplyMethod,
        warmline_core::letters::LetterSource,
        warmline_core::letters::ResponseKind,
        warmline_core::letters::ResponseStyle,
        warmline_core::letters::SubmitLetterRequest,
        warmline_core::letters::SubmitLetterResponse,
        warmline_core::letters::LetterView,
        warmline_core::letters::ResponseView,
        warmline_core::letters::PublicLetterResponse,
        warmline_core::letters::QueueLetter,
        warmline_core::letters::QueueResponse,
        warmline_core::letters::RespondRequest,
        warmline_core::letters::RespondResponse,
        routes::auth::RegisterRequest,
        routes::auth::RegisterResponse,
        routes::auth::LoginRequest,
        routes::auth::LoginResponse,
        routes::auth::LogoutResponse,
        routes::auth::UserView,
        routes::letters::MarkProcessedResponse,
        routes::admin::DeleteLetterResponse,
        routes::admin::UsersResponse,
        routes::admin::UpdateRoleRequest,
        routes::admin::DeleteUserResponse,
        routes::chat::ChatRequest,
        routes::chat::ChatResponse,
        routes::chat::ModerateRequest,
        routes::chat::ModerateResponse,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: bool,
    /// Whether an AI completion provider is configured. The platform runs
    /// fine without one; letters then wait for human responders.
    pub ai_provider: bool,
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warmline_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Database connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let jwt_secret =
        std::env::var("WARMLINE_JWT_SECRET").expect("WARMLINE_JWT_SECRET must be set");

    let app_state = state::AppState {
        db: pool,
        responder: responder::Responder::from_env(),
        jwt_secret,
    };

    // Probe the completion provider off the startup path
    if app_state.responder.is_configured() {
        let responder = app_state.responder.clone();
        tokio::spawn(async move {
            if responder.test_connection().await {
                tracing::info!("AI completion provider reachable");
            } else {
                tracing::warn!(
                    "AI completion provider configured but not answering; replies will fall back"
                );
            }
        });
    }

    // HTTPS enforcement (only when WARMLINE_REQUIRE_HTTPS=true)
    let require_https = std::env::var("WARMLINE_REQUIRE_HTTPS")
        .map(|v| v == "true")
        .unwrap_or(false);

    // CORS
    let cors_layer = middleware::cors::build_cors_layer();

    // Router with per-endpoint rate limiting on the public surfaces
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::auth::register_router().layer(middleware::rate_limit::register_layer()))
        .merge(routes::auth::login_router().layer(middleware::rate_limit::login_layer()))
        .merge(routes::auth::session_router())
        .merge(routes::letters::submit_router().layer(middleware::rate_limit::submit_layer()))
        .merge(routes::letters::public_router().layer(middleware::rate_limit::lookup_layer()))
        .merge(routes::letters::volunteer_router())
        .merge(routes::admin::router())
        .merge(routes::chat::router().layer(middleware::rate_limit::chat_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .option_layer(
                    require_https
                        .then(|| axum::middleware::from_fn(middleware::https::require_https)),
                )
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Warmline API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
