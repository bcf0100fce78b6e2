use crate::{
    api::{
        access_logs, auth, deliveries, guest_codes, health, notifications, residents, users,
        visits, ws,
    },
    auth::JwtManager,
    config::Config,
    errors::{AppError, Result},
    observability::{HealthChecker, MetricsRecorder},
    realtime::{EventChannel, RoomHub},
    services::Services,
    store::Store,
};
use axum::{
    extract::{FromRef, MatchedPath, Request},
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub jwt: Arc<JwtManager>,
    pub hub: RoomHub,
    pub health_checker: Arc<HealthChecker>,
    pub services: Services,
}

impl AppState {
    /// Wire every component. `events` is what services publish to; it must
    /// include `hub` for WebSocket clients to see anything.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        hub: RoomHub,
        events: Arc<dyn EventChannel>,
        redis_manager: Option<ConnectionManager>,
    ) -> Result<Self> {
        let jwt = Arc::new(JwtManager::new(&config.auth)?);
        let health_checker = Arc::new(HealthChecker::new(store.clone(), redis_manager));
        let services = Services::new(store.clone(), events, jwt.clone(), &config);

        Ok(Self {
            config: Arc::new(config),
            store,
            jwt,
            hub,
            health_checker,
            services,
        })
    }
}

pub fn create_router(state: AppState) -> Result<Router> {
    let cors = cors_layer(&state.config.server.frontend_origin)?;

    Ok(Router::new()
        // Health endpoints
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/metrics", get(health::metrics))
        .route("/ws", get(ws::upgrade))
        .nest("/api", api_routes())
        // Add middleware
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list).post(users::create))
        .route("/users/profile", put(users::update_profile))
        .route(
            "/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/residents", get(residents::list).post(residents::create))
        .route("/guest-codes", get(guest_codes::list).post(guest_codes::issue))
        .route("/guest-codes/verify", post(guest_codes::verify))
        .route("/guest-codes/:id/revoke", put(guest_codes::revoke))
        .route("/guest-visits", get(visits::list).post(visits::create))
        .route("/guest-visits/active", get(visits::active))
        .route("/guest-visits/:id", get(visits::get))
        .route("/guest-visits/:id/checkin", put(visits::check_in))
        .route("/guest-visits/:id/checkout", put(visits::check_out))
        .route("/guest-visits/:id/cancel", put(visits::cancel))
        .route("/deliveries", get(deliveries::list).post(deliveries::authorize))
        .route("/deliveries/pending", get(deliveries::pending))
        .route("/deliveries/:id/status", put(deliveries::set_status))
        .route("/access-logs", get(access_logs::query).post(access_logs::record))
        .route("/access-logs/statistics", get(access_logs::statistics))
        .route(
            "/notifications",
            get(notifications::list).post(notifications::send),
        )
        .route("/notifications/mark-all-read", put(notifications::mark_all_read))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/:id/read", put(notifications::mark_read))
        .route("/notifications/:id", axum::routing::delete(notifications::delete))
}

fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let allow_origin = if origin == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = HeaderValue::from_str(origin).map_err(|e| {
            AppError::Configuration(format!("Invalid frontend origin {}: {}", origin, e))
        })?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Count and time every request by route template, not raw path.
async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    MetricsRecorder::record_http_request(&method, &path, response.status().as_u16());
    MetricsRecorder::record_http_duration(&method, &path, start.elapsed().as_secs_f64());
    response
}
