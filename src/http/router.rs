use crate::auth::{require_admin, require_auth};
use crate::http::handlers::{donations, health, ledger, piggies, uploads, users};
use crate::AppState;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

const CORS_MAX_AGE: Duration = Duration::from_secs(50);

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_headers([ORIGIN, AUTHORIZATION, CONTENT_TYPE])
        .max_age(CORS_MAX_AGE);

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/public/users/piggy", get(piggies::list_piggies))
        .route("/public/users/piggy/:piggy_id", get(piggies::get_piggy))
        .route("/public/users/forgot-password", post(users::forgot_password));

    let admin = Router::new()
        .route("/ledger/status", get(ledger::status))
        .route_layer(middleware::from_fn(require_admin));

    let authenticated = Router::new()
        .route("/users", get(users::list_users).post(users::signup))
        .route("/users/invite", post(users::invite))
        .route("/users/verification-code", post(users::verification_code))
        .route(
            "/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:user_id/disable", put(users::disable_user))
        .route("/users/:user_id/enable", put(users::enable_user))
        .route("/users/:user_id/onboarding", post(users::onboard_user))
        .route(
            "/piggy",
            get(piggies::list_piggies).post(piggies::create_piggy),
        )
        .route(
            "/piggy/:piggy_id",
            get(piggies::get_piggy)
                .put(piggies::update_piggy)
                .delete(piggies::delete_piggy),
        )
        .route(
            "/donation",
            get(donations::list_donations).post(donations::create_donation),
        )
        .route(
            "/donation/:donation_id",
            get(donations::get_donation)
                .put(donations::update_donation)
                .delete(donations::delete_donation),
        )
        .route("/uploads", post(uploads::upload))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    public
        .merge(authenticated)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
