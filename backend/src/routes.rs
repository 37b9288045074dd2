use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::Config, docs::ApiDoc, gateway::ws, handlers, middleware, state::AppState};

/// Builds the full application router: driver API, public read API, admin API,
/// the observer WebSocket and the docs.
pub fn build_router(state: AppState) -> Router {
    let driver_routes = Router::new()
        .route("/api/driver/login", post(handlers::driver::login))
        .route("/api/driver/location", post(handlers::driver::update_location))
        .route(
            "/api/driver/validate-session",
            post(handlers::driver::validate_session),
        )
        .route("/api/driver/logout", post(handlers::driver::logout))
        .route("/api/driver/status", post(handlers::driver::update_status));

    let public_routes = Router::new()
        .route("/api/buses/live", get(handlers::buses::live_buses))
        .route(
            "/api/buses/{bus_id}/history",
            get(handlers::buses::bus_history),
        )
        .route(
            "/api/drivers/{driver_id}/presence",
            get(handlers::driver::presence),
        )
        .route("/health", get(handlers::health::health))
        .route("/ws", get(ws::ws_handler));

    let admin_routes = Router::new()
        .route("/api/admin/sessions", get(handlers::admin::list_sessions))
        .route(
            "/api/admin/session-stats",
            get(handlers::admin::session_stats),
        )
        .route(
            "/api/admin/session/{session_id}",
            delete(handlers::admin::force_end_session),
        )
        .route(
            "/api/admin/drivers/{driver_id}/assignment",
            put(handlers::admin::assign_vehicle),
        )
        .route(
            "/api/admin/audit-logs",
            get(handlers::admin::list_audit_logs),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_admin,
        ));

    let cors = cors_layer(&state.config);
    let audit_log = state.audit_log.clone();

    Router::new()
        .merge(driver_routes)
        .merge(public_routes)
        .merge(admin_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(
                    middleware::logging::log_error_responses,
                ))
                .layer(cors)
                .layer(Extension(audit_log)),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(24 * 60 * 60));

    if config.cors_allow_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
