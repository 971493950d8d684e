use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub gateway: GatewayConfig,
    pub booking: BookingConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub api: ApiConfig,
    pub pending_roles: PendingRoleConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
    /// Static asset directory served under /static. Disabled when unset.
    pub assets_dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

/// Identity gateway connection. The publishable key rides along on every
/// call; the service key is only used for the privileged admin surface
/// (account status, password RPC, role writes).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewayConfig {
    pub url: String,
    pub publishable_key: String,
    pub service_key: String,
    /// Where the gateway sends browsers after OAuth and magic-link flows.
    pub redirect_url: String,
    pub access_cookie: String,
    pub refresh_cookie: String,
    /// Name of the gateway function that reports account status.
    pub status_function: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BookingConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub lookup_limit: u32,
    pub auth_limit: u32,
    pub window_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub require_client_ip: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PendingRoleConfig {
    /// Marker file recording a role chosen before an OAuth redirect.
    pub marker_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
            assets_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            publishable_key: String::new(),
            service_key: String::new(),
            redirect_url: "http://localhost:8000/auth/callback".to_string(),
            access_cookie: "sg_access".to_string(),
            refresh_cookie: "sg_refresh".to_string(),
            status_function: "account-status".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api".to_string(),
            timeout_seconds: 15,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            lookup_limit: 30,
            auth_limit: 10,
            window_seconds: 60,
            cleanup_interval_seconds: 300,
            require_client_ip: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { enable_swagger: true }
    }
}

impl Default for PendingRoleConfig {
    fn default() -> Self {
        Self {
            marker_path: ".pending-role".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            gateway: GatewayConfig::default(),
            booking: BookingConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            api: ApiConfig::default(),
            pending_roles: PendingRoleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Staygate.toml (base configuration file)
    /// 2. Environment variables (prefixed with STAYGATE_)
    /// 3. GATEWAY_URL / GATEWAY_SERVICE_KEY / BOOKING_API_URL shortcuts
    pub fn load() -> Result<Self, figment::Error> {
        let figment = Figment::new()
            // Start with defaults
            .merge(Toml::string(&toml::to_string(&Config::default()).unwrap()).nested())
            // Layer on Staygate.toml if it exists
            .merge(Toml::file("Staygate.toml").nested())
            // Layer on environment variables (e.g., STAYGATE_GATEWAY_URL)
            .merge(Env::prefixed("STAYGATE_").split("_"))
            // Deployment shortcuts matching the hosting platform's variable names
            .merge(Env::raw().only(&["GATEWAY_URL"]).map(|_| "gateway.url".into()))
            .merge(Env::raw().only(&["GATEWAY_SERVICE_KEY"]).map(|_| "gateway.service_key".into()))
            .merge(Env::raw().only(&["BOOKING_API_URL"]).map(|_| "booking.url".into()));

        figment.extract()
    }
}
