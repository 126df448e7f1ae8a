use log::{error, info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{self, Filter};

use rusty_presence::auth::{
    AuthPipeline, AuthenticatedUser, JwtTokenVerifier, LocalProvider, LoginThrottle, ProviderCatalog,
    TokenVerifier,
};
use rusty_presence::config::ServerConfig;
use rusty_presence::constants::WS_PATH;
use rusty_presence::core::RoomRegistry;
use rusty_presence::handlers::{handle_login, upgrade_presence_socket};
use rusty_presence::security_logger::SecurityLogger;

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, providers={:?}, throttling={}",
        config.host, config.port, config.auth_providers, config.login_throttling
    );

    let security_logger = Arc::new(SecurityLogger::new());
    security_logger.clone().start_cleanup_task();

    // Local accounts
    let local = Arc::new(LocalProvider::new());
    for (username, password) in &config.local_accounts {
        let user = AuthenticatedUser::new(username.to_lowercase(), username.clone());
        if let Err(e) = local.add_user(user, password).await {
            error!("Failed to seed local account {}: {}", username, e);
            std::process::exit(1);
        }
    }
    info!("Seeded {} local accounts", local.user_count().await);

    let catalog = ProviderCatalog::new().register(local);
    let providers = match catalog.enabled(&config.auth_providers) {
        Ok(providers) => providers,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let throttle = Arc::new(LoginThrottle::new(config.throttle_config()));
    throttle
        .clone()
        .start_cleanup_task(config.room_cleanup_interval, config.throttle_record_ttl);
    let pipeline = Arc::new(
        AuthPipeline::new(providers, throttle)
            .with_throttling(config.login_throttling)
            .with_security_logger(security_logger.clone()),
    );
    let tokens = Arc::new(JwtTokenVerifier::new(&config.jwt_secret));
    let verifier: Arc<dyn TokenVerifier> = tokens.clone();

    let registry = Arc::new(RoomRegistry::new());
    registry.clone().start_cleanup_task(config.room_cleanup_interval);

    // GET /ws/<room_id>
    let ws_route = warp::path(WS_PATH)
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::header::headers_cloned())
        .and(with_state(verifier))
        .and(with_state(registry))
        .and(with_state(security_logger))
        .and_then(upgrade_presence_socket);

    // POST /login
    let login_route = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(4 * 1024))
        .and(warp::body::json())
        .and(with_state(pipeline))
        .and(with_state(tokens))
        .and_then(handle_login);

    // Create health check route
    let health_route = warp::path("health").map(|| "OK");

    let routes = ws_route.or(login_route).or(health_route);

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting presence server on {}", addr);
    warp::serve(routes).run(addr).await;
}

// Helper function to include shared state in request
fn with_state<T>(state: Arc<T>) -> impl Filter<Extract = (Arc<T>,), Error = Infallible> + Clone
where
    T: ?Sized + Send + Sync + 'static,
{
    warp::any().map(move || state.clone())
}
