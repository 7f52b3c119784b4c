//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;
use openapi::ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, API docs, and the HTTP
/// middleware stack.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler));

    // Swagger UI serves the JSON document itself.
    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url(openapi::OPENAPI_PATH, ApiDoc::openapi()),
    );
    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        openapi::OPENAPI_PATH,
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
    use crate::config::HubConfig;

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let Ok(response) = app.oneshot(request).await else {
            panic!("router failed");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body read failed");
        };
        let Ok(json) = serde_json::from_slice(&bytes) else {
            panic!("body is not JSON");
        };
        (status, json)
    }

    fn publish_request(body: &str) -> Request<Body> {
        let Ok(request) = Request::post("/api/v1/events")
            .header("content-type", "application/json")
            .header(USER_ID_HEADER, "svc")
            .header(USER_ROLE_HEADER, "system")
            .body(Body::from(body.to_string()))
        else {
            panic!("request build failed");
        };
        request
    }

    #[tokio::test]
    async fn publish_is_accepted_and_listed_in_history() {
        let state = AppState::new(HubConfig::default());
        let app = build_app(state.clone());

        let (status, outcome) = call(
            app.clone(),
            publish_request(r#"{"type":"deploy","data":"v2","target_groups":["ops"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(outcome.get("persisted").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(state.history.len().await, 1);

        let Ok(request) = Request::get("/api/v1/history/roles/system").body(Body::empty()) else {
            panic!("request build failed");
        };
        let (status, history) = call(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.get("count").and_then(|v| v.as_u64()), Some(1));
    }

    #[tokio::test]
    async fn invalid_publish_is_rejected_before_dispatch() {
        let state = AppState::new(HubConfig::default());
        let (status, body) = call(
            build_app(state.clone()),
            publish_request(r#"{"type":"deploy"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.pointer("/error/code").and_then(|v| v.as_u64()),
            Some(1001)
        );
        assert!(state.history.is_empty().await);
    }

    #[tokio::test]
    async fn history_limit_is_clamped() {
        let config = HubConfig {
            history_max_limit: 2,
            ..HubConfig::default()
        };
        let state = AppState::new(config);
        for n in 0..4 {
            let body = format!(r#"{{"type":"e{n}","data":"x"}}"#);
            let _ = call(build_app(state.clone()), publish_request(&body)).await;
        }
        let Ok(request) = Request::get("/api/v1/history?limit=100").body(Body::empty()) else {
            panic!("request build failed");
        };
        let (_, history) = call(build_app(state), request).await;
        assert_eq!(history.get("count").and_then(|v| v.as_u64()), Some(2));
    }

    #[tokio::test]
    async fn group_history_without_groups_is_empty() {
        let state = AppState::new(HubConfig::default());
        let _ = call(
            build_app(state.clone()),
            publish_request(r#"{"type":"deploy","data":"v2","target_groups":["ops"]}"#),
        )
        .await;

        for uri in ["/api/v1/history/groups", "/api/v1/history/groups?groups=,%20"] {
            let Ok(request) = Request::get(uri).body(Body::empty()) else {
                panic!("request build failed");
            };
            let (status, history) = call(build_app(state.clone()), request).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(history.get("count").and_then(|v| v.as_u64()), Some(0), "{uri}");
        }
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let Ok(request) = Request::get(openapi::OPENAPI_PATH).body(Body::empty()) else {
            panic!("request build failed");
        };
        let (status, doc) = call(build_app(AppState::new(HubConfig::default())), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc.pointer("/paths/~1api~1v1~1events").is_some());
    }
}
