pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use service::booking::BookingApi;
pub use service::session::{Navigator, RoleReconciliation, SessionController, SessionState};

use crate::error::app_error::AppError;
use crate::gateway::IdentityGateway;
use crate::gateway::http::HttpIdentityGateway;
use crate::middleware::RequestLogger;
use crate::middleware::rate_limit::RateLimiter;
use crate::repository::ProfileRepository;
use crate::repository::rest::RestProfileRepository;
use crate::routes as app_routes;
use crate::service::directory::AccountDirectory;
use crate::service::pending::{FilePendingRoleStore, PendingRoleStore};
use rocket::fairing::AdHoc;
use rocket::fs::FileServer;
use rocket::{Build, Rocket, catchers, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::get_openapi_route;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level for fine-grained control:
    //   RUST_LOG=debug                        - everything at debug
    //   RUST_LOG=staygate=debug               - this crate at debug
    //   RUST_LOG=info,staygate::guard=trace   - global info, guard at trace
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // try_init so repeated builds in one process (tests) stay quiet
    if json_format {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

fn ensure_rocket_secret_key() {
    let profile = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());

    // Private session cookies need a stable key outside debug
    if profile != "debug" && std::env::var("ROCKET_SECRET_KEY").is_err() {
        panic!(
            "ROCKET_SECRET_KEY is required for profile '{}'. Generate one with: openssl rand -base64 32",
            profile
        );
    }
}

fn build_cors(cors_config: &config::CorsConfig) -> CorsOptions {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        panic!(
            "Invalid CORS configuration: Cannot use wildcard origins (*) with credentials enabled. \
            Either set specific origins or disable credentials."
        );
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Delete, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Authorization", "Accept"]),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    }
}

fn get_swagger_config(openapi_url: &str) -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: openapi_url.to_string(),
        ..Default::default()
    }
}

fn stage_rate_limiter(rate_limit_config: config::RateLimitConfig) -> AdHoc {
    AdHoc::on_ignite("Rate Limiter", move |rocket| {
        let limiter = Arc::new(RateLimiter::new(rate_limit_config.clone()));
        limiter.clone().spawn_cleanup_task();

        Box::pin(async move { rocket.manage(limiter) })
    })
}

/// Assembles the edge server over the given gateway and profile store.
/// Tests inject mocks here; `assemble_rocket` wires the real clients.
pub fn build_rocket(config: Config, gateway: Arc<dyn IdentityGateway>, profiles: Arc<dyn ProfileRepository>) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);
    ensure_rocket_secret_key();

    let cors = build_cors(&config.cors).to_cors().expect("Failed to create CORS fairing");
    let directory = AccountDirectory::new(profiles.clone(), gateway.clone());

    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()));

    let mut rocket = rocket::custom(figment)
        .attach(stage_rate_limiter(config.rate_limit.clone()))
        .attach(cors)
        .attach(RequestLogger)
        .manage(gateway)
        .manage(profiles)
        .manage(directory);

    let (lookup_routes, lookup_openapi) = app_routes::auth::api_routes();
    rocket = rocket
        .mount("/auth", lookup_routes)
        .mount("/auth", app_routes::auth::callback_routes())
        .mount("/health", app_routes::health::routes())
        .mount("/", app_routes::pages::page_routes());

    if config.api.enable_swagger {
        let settings = rocket_okapi::settings::OpenApiSettings::default();
        rocket = rocket
            .mount("/auth", vec![get_openapi_route(lookup_openapi, &settings)])
            .mount("/auth/docs", make_swagger_ui(&get_swagger_config("/auth/openapi.json")));
    }

    if let Some(assets_dir) = &config.server.assets_dir {
        rocket = rocket.mount("/static", FileServer::from(assets_dir.clone()));
    }

    rocket = rocket.register(
        "/",
        catchers![
            app_routes::error::not_found,
            app_routes::error::unauthorized,
            app_routes::error::unprocessable_entity,
            app_routes::error::too_many_requests
        ],
    );

    rocket.manage(config)
}

/// Production wiring: HTTP identity gateway and REST profile repository
/// from the configuration.
pub fn assemble_rocket(config: Config) -> Result<Rocket<Build>, AppError> {
    let gateway: Arc<dyn IdentityGateway> = Arc::new(HttpIdentityGateway::new(config.gateway.clone())?);
    let profiles: Arc<dyn ProfileRepository> = Arc::new(RestProfileRepository::new(&config.gateway)?);

    Ok(build_rocket(config, gateway, profiles))
}

/// Client-side wiring: a session controller over the same gateway and
/// profile configuration, for hosts embedding the library instead of
/// running the edge server.
pub fn assemble_controller(config: &Config, navigator: Arc<dyn Navigator>) -> Result<SessionController, AppError> {
    let gateway: Arc<dyn IdentityGateway> = Arc::new(HttpIdentityGateway::new(config.gateway.clone())?);
    let profiles: Arc<dyn ProfileRepository> = Arc::new(RestProfileRepository::new(&config.gateway)?);
    let pending: Arc<dyn PendingRoleStore> =
        Arc::new(FilePendingRoleStore::new(config.pending_roles.marker_path.clone()));

    Ok(SessionController::new(gateway, profiles, pending, navigator))
}
