//! Router construction for the runs API.

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_mw,
    routing::{get, post, MethodRouter},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

/// Both prefixes are served; `/runs/...` mirrors `/run/...`
const LOOKUP_PREFIXES: [&str; 2] = ["/run", "/runs"];

const PUBLIC_ROUTES: [&str; 5] = ["/", "/health", "/sitemap", "/login", "/refresh"];
const PROTECTED_ROUTES: [&str; 1] = ["/adduser"];

/// Build the full axum router with all routes and middleware
pub fn app(state: AppState) -> Router {
    // Routes that require JWT authentication
    let protected = Router::new()
        .route("/adduser", post(handlers::auth::add_user))
        .route_layer(axum_mw::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut router = Router::new()
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .route("/sitemap", get(handlers::public::sitemap))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", get(handlers::auth::refresh))
        .merge(protected);

    for (path, method_router) in lookup_routes() {
        router = router.route(&path, method_router);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.security)),
        )
        .with_state(state)
}

/// Every path pattern the router serves, in registration order
pub fn route_patterns() -> Vec<String> {
    PUBLIC_ROUTES
        .iter()
        .chain(PROTECTED_ROUTES.iter())
        .map(|p| p.to_string())
        .chain(lookup_routes().into_iter().map(|(path, _)| path))
        .collect()
}

fn lookup_routes() -> Vec<(String, MethodRouter<AppState>)> {
    let mut routes = Vec::new();
    for prefix in LOOKUP_PREFIXES {
        let kinds: [(&str, MethodRouter<AppState>); 3] = [
            ("objectid/:object_id", get(handlers::runs::by_object_id)),
            ("runnumber/:number", get(handlers::runs::by_run_number)),
            ("timestamp/:timestamp", get(handlers::runs::by_timestamp)),
        ];
        for (segment, method_router) in kinds {
            let path = format!("{}/{}/:field", prefix, segment);
            routes.push((format!("{}/", path), method_router.clone()));
            routes.push((path, method_router));
        }
    }
    routes
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
