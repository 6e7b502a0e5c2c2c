use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use storefront_api::clock::SystemClock;
use storefront_api::config::AppConfig;
use storefront_api::gateway::xendit::{InvoiceDocumentClient, XenditInvoiceClient};
use storefront_api::gateway::{DocumentRenderer, PaymentGateway};
use storefront_api::{app_router, build_services, db, events, AppState};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config);

    let connection = db::establish_connection(&config)
        .await
        .context("failed to connect to the database")?;
    let connection = Arc::new(connection);

    let (event_sender, event_receiver) = events::channel(EVENT_BUFFER);
    tokio::spawn(events::run_event_logger(event_receiver));

    let gateway: Arc<dyn PaymentGateway> = Arc::new(XenditInvoiceClient::new(&config.payment)?);
    let documents: Option<Arc<dyn DocumentRenderer>> = match &config.documents {
        Some(documents_config) => Some(Arc::new(InvoiceDocumentClient::new(documents_config)?)),
        None => None,
    };

    let config = Arc::new(config);
    let services = build_services(
        connection.clone(),
        &config,
        gateway,
        documents,
        Arc::new(SystemClock),
        event_sender.clone(),
    );

    let state = AppState {
        db: connection,
        config: config.clone(),
        services,
        events: event_sender,
    };

    let app = app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(%addr, environment = %config.environment, "storefront-api listening");

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
