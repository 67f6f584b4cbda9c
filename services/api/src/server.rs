use crate::cli::ServeArgs;
use crate::infra::{AppState, LogEventPublisher};
use crate::routes::with_portal_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_portal::config::AppConfig;
use loan_portal::error::AppError;
use loan_portal::telemetry;
use loan_portal::workflows::reloan::{FileDraftStore, HttpLendingBackend, ReloanService};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(FileDraftStore::new(config.storage.data_dir.clone()));
    let backend = Arc::new(HttpLendingBackend::new(&config.backend));
    let events = Arc::new(LogEventPublisher);
    let portal_service = Arc::new(ReloanService::new(
        store,
        backend,
        events,
        config.consent.clone(),
    ));

    let app = with_portal_routes(portal_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "borrower reloan portal ready");

    axum::serve(listener, app).await?;
    Ok(())
}
