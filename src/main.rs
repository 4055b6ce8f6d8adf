//! Rental Realtime server binary.
//!
//! Loads configuration, wires repositories and the realtime gateway, and
//! serves REST, WebSocket and health routes on one listener.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rental_realtime::adapters::auth::JwtSessionValidator;
use rental_realtime::adapters::http::{app_router, AppServices};
use rental_realtime::adapters::memory::{
    InMemoryConversationRepository, InMemoryNotificationRepository,
};
use rental_realtime::adapters::postgres::{
    self, PostgresConversationRepository, PostgresNotificationRepository,
};
use rental_realtime::adapters::websocket::RealtimeGateway;
use rental_realtime::application::{BookingNotifier, ConversationStore};
use rental_realtime::config::{AppConfig, ServerConfig};
use rental_realtime::ports::{ConversationRepository, NotificationRepository, SessionValidator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!(
        environment = ?config.server.environment,
        "Rental Realtime v{}",
        env!("CARGO_PKG_VERSION")
    );

    let (conversations, notifications) = repositories(&config).await?;

    let store = Arc::new(
        ConversationStore::new(conversations).with_page_limits(
            config.realtime.default_page_size,
            config.realtime.max_page_size,
        ),
    );
    let gateway = Arc::new(
        RealtimeGateway::new(store.clone()).with_outbound_buffer(config.realtime.outbound_buffer),
    );
    let notifier = Arc::new(BookingNotifier::new(notifications, gateway.clone()));
    let validator: Arc<dyn SessionValidator> = Arc::new(JwtSessionValidator::new(
        &config.auth.jwt_secret,
        config.auth.issuer.as_deref(),
    ));

    let app = app_router(AppServices {
        store,
        notifier,
        gateway,
        validator,
        require_token: config.auth.require_token,
        internal_token: config.auth.internal_token.clone().map(Arc::new),
    })
    .layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )))
    .layer(cors_layer(&config.server))
    .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn repositories(
    config: &AppConfig,
) -> Result<
    (Arc<dyn ConversationRepository>, Arc<dyn NotificationRepository>),
    Box<dyn std::error::Error>,
> {
    if !config.database.is_configured() {
        warn!("No database URL configured, using in-memory repositories");
        return Ok((
            Arc::new(InMemoryConversationRepository::new()),
            Arc::new(InMemoryNotificationRepository::new()),
        ));
    }

    let pool = postgres::connect(&config.database).await?;
    if config.database.run_migrations {
        postgres::run_migrations(&pool).await?;
        info!("Database migrations applied");
    }

    Ok((
        Arc::new(PostgresConversationRepository::new(pool.clone())),
        Arc::new(PostgresNotificationRepository::new(pool)),
    ))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_headers(Any)
            .allow_methods(Any)
    }
}
