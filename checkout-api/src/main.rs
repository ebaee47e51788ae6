use std::sync::Arc;
use std::net::SocketAddr;
use anyhow::Context;
use checkout_api::{app, AppState};
use checkout_order::{CheckoutService, Reconciler, ReturnUrls, SessionBuilder};
use checkout_store::{ConfigSettingsStore, DbClient, RedisClient, StoreOrderRepository, StripeClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checkout_api=debug,checkout_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = checkout_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting checkout API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let orders = Arc::new(StoreOrderRepository::new(db.pool.clone()));

    // Redis
    let redis = RedisClient::new(&config.redis.url, config.redis.pending_reference_ttl_seconds)
        .await
        .context("Failed to connect to Redis")?;
    let pending = Arc::new(redis);

    // Payment provider
    let settings = Arc::new(ConfigSettingsStore::from_config(&config.gateway));
    let provider = Arc::new(
        StripeClient::new(
            settings.clone(),
            config.gateway.api_base_url.clone(),
            config.gateway.webhook_tolerance_seconds,
        )
        .context("Failed to build Stripe client")?,
    );

    let reconciler = Arc::new(Reconciler::new(provider.clone(), orders.clone()));
    let checkout = Arc::new(CheckoutService::new(
        provider.clone(),
        pending,
        reconciler.clone(),
        SessionBuilder::new(config.gateway.capture_method),
        ReturnUrls::new(&config.checkout.success_url, &config.checkout.cancel_url),
    ));

    let app_state = AppState {
        orders,
        settings,
        provider,
        reconciler,
        checkout,
        session_cookie: config.checkout.session_cookie.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
