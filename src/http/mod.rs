//! HTTP/WebSocket surface (§6): serves the paginated query API, the
//! server-push event stream, and the static dashboard bundle. Grounded in
//! `ferrex-server`'s `routes`/`infra::app_state` split: a cloneable
//! `AppState` handed to every handler via axum's `State` extractor, CORS and
//! tracing layered on with `tower_http`.

pub mod error;
mod routes;
mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::broadcast::Broadcaster;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub broadcaster: Arc<Broadcaster>,
}

/// Builds the full router: API routes, the WebSocket upgrade, and a static
/// file fallback for the dashboard's single-page bundle, if present.
pub fn router(state: AppState, ws_origins: &[String], static_dir: Option<&str>) -> Router {
    let cors = if ws_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = ws_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    let mut app = Router::new()
        .route("/api/containers", get(routes::list_containers))
        .route("/api/containers/:name/events", get(routes::list_container_events))
        .route("/api/events", get(routes::list_all_events))
        .route("/api/alerts", get(routes::list_all_alerts))
        .route("/api/events/stream", get(ws::stream_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    if let Some(dir) = static_dir {
        // unmatched paths fall through to index.html so client-side routes
        // in the single-page dashboard resolve on a hard reload/deep link.
        let index = ServeFile::new(format!("{dir}/index.html"));
        app = app.fallback_service(ServeDir::new(dir).not_found_service(index));
    }

    app
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(Store::open_in_memory().unwrap()),
            broadcaster: Arc::new(Broadcaster::new()),
        }
    }

    #[tokio::test]
    async fn list_containers_returns_empty_array_when_store_is_empty() {
        let app = router(test_state(), &[], None);
        let response = app
            .oneshot(Request::builder().uri("/api/containers").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_container_events_paginates_newly_added_events() {
        let state = test_state();
        let pk = state
            .store
            .upsert_container(crate::types::Container {
                name: "web".to_string(),
                present: true,
                ..Default::default()
            })
            .unwrap();
        state
            .store
            .add_event(crate::types::Event {
                container_pk: pk,
                container: "web".to_string(),
                kind: "started".to_string(),
                timestamp: chrono::Utc::now(),
                ..Default::default()
            })
            .unwrap();

        let app = router(state, &[], None);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/containers/web/events?limit=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
