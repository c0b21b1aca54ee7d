use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use skill_portal::http::{portal_router, PortalState};
use skill_portal::store::PortalStore;

pub(crate) fn with_operational_routes<S>(state: PortalState<S>) -> Router
where
    S: PortalStore + 'static,
{
    portal_router(state)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use skill_portal::auth::TokenAuthority;
    use skill_portal::store::InMemoryStore;
    use skill_portal::workflows::{SkillPortal, WorkflowSettings};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(ready: bool) -> (Router, Arc<AtomicBool>) {
        let portal = Arc::new(SkillPortal::new(
            Arc::new(InMemoryStore::new()),
            WorkflowSettings::default(),
        ));
        let tokens = Arc::new(TokenAuthority::new(b"routes-test", Duration::hours(1)));
        let readiness = Arc::new(AtomicBool::new(ready));
        let state = AppState {
            readiness: readiness.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let router =
            with_operational_routes(PortalState::new(portal, tokens)).layer(Extension(state));
        (router, readiness)
    }

    async fn get_status(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("route executes")
            .status()
    }

    #[tokio::test]
    async fn health_does_not_need_a_token() {
        let (router, _) = app(true);
        assert_eq!(get_status(router, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let (router, readiness) = app(false);
        assert_eq!(
            get_status(router.clone(), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        readiness.store(true, Ordering::Release);
        assert_eq!(get_status(router, "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn api_routes_still_require_a_token() {
        let (router, _) = app(true);
        assert_eq!(
            get_status(router.clone(), "/api/auth/me").await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get_status(router, "/metrics").await, StatusCode::OK);
    }
}
