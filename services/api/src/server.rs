use crate::cli::ServeArgs;
use crate::infra::{open_store, AppState};
use crate::routes::with_operational_routes;
use crate::worker::MaintenanceWorker;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use skill_portal::auth::TokenAuthority;
use skill_portal::config::AppConfig;
use skill_portal::error::AppError;
use skill_portal::http::PortalState;
use skill_portal::notifications::{LogMailer, NotificationDispatcher};
use skill_portal::telemetry;
use skill_portal::workflows::SkillPortal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(open_store(&config.storage)?);
    let portal = Arc::new(SkillPortal::new(store.clone(), config.workflow.clone()));
    let tokens = Arc::new(TokenAuthority::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.token_ttl(),
    ));

    let mailer = Arc::new(LogMailer::new(config.mail.from.clone()));
    let dispatcher = NotificationDispatcher::new(store, mailer, config.outbox.retry_policy());
    let worker = MaintenanceWorker::new(portal.clone(), dispatcher, config.outbox.poll_interval());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let app = with_operational_routes(PortalState::new(portal, tokens))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "skill portal ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    let _ = shutdown_tx.send(true);
    if let Err(err) = worker_handle.await {
        warn!(error = %err, "maintenance worker did not stop cleanly");
    }
    info!("skill portal stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c; shutting down");
    }
}
