use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod rules;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

// A JSON API never serves active content; lock the CSP down accordingly.
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to the web app origin in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest(
            "/api/v1/placement",
            placement_routes()
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .nest(
            "/api/v1/courses",
            progress_routes()
                .layer(cors)
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn placement_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/", post(handlers::placement::start_placement))
        .route(
            "/{attempt_id}/answers",
            post(handlers::placement::submit_answer),
        )
}

fn progress_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route(
        "/{course_id}/progress",
        get(handlers::progress::course_progress),
    )
}
