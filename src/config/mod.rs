use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

/// Config file read when no explicit path is given and the file exists
pub const DEFAULT_CONFIG_FILE: &str = "config/api_server_config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// PostgreSQL URL of the run store. Unset means the in-memory store.
    pub url: Option<String>,
    pub collection: String,
    /// JSON array of run documents loaded into the in-memory store
    pub fixture_path: Option<PathBuf>,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    pub query_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// PostgreSQL URL of the user store. Unset means the in-memory store.
    pub user_db_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_lifespan_secs: i64,
    pub refresh_token_lifespan_secs: i64,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// bcrypt work factor for stored passwords
    pub password_hash_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    /// Preset for `APP_ENV`, then the config file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let mut config = Self::preset(environment);

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let file = match path {
            Some(p) => Some(p),
            None if default_path.exists() => Some(default_path),
            None => None,
        };
        if let Some(file) = file {
            let raw = std::fs::read_to_string(file).map_err(|source| ConfigError::Read {
                path: file.to_path_buf(),
                source,
            })?;
            config = config.merge_json(serde_json::from_str(&raw)?)?;
        }

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn preset(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    /// Layer a (possibly partial) JSON document over this config. Files in the
    /// older `runsDB` / `user_auth` layout are translated first; any other
    /// unknown key is an error.
    pub fn merge_json(self, overlay: Value) -> Result<Self, ConfigError> {
        let mut base = serde_json::to_value(&self)?;
        merge_values(&mut base, translate_legacy(overlay)?);
        Ok(serde_json::from_value(base)?)
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(v) = var("RUNSDB_API_PORT").or_else(|| var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Some(v) = var("RUNSDB_API_HOST") {
            self.server.host = v;
        }

        // Store overrides
        if let Some(v) = var("RUNSDB_URL") {
            self.store.url = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = var("RUNSDB_COLLECTION") {
            self.store.collection = v;
        }
        if let Some(v) = var("RUNSDB_FIXTURE") {
            self.store.fixture_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("RUNSDB_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Some(v) = var("RUNSDB_CONNECTION_TIMEOUT_SECS") {
            self.store.connection_timeout_secs = v.parse().unwrap_or(self.store.connection_timeout_secs);
        }
        if let Some(v) = var("RUNSDB_QUERY_TIMEOUT_MS") {
            self.store.query_timeout_ms = v.parse().unwrap_or(self.store.query_timeout_ms);
        }

        // Auth overrides
        if let Some(v) = var("USERDB_URL") {
            self.auth.user_db_url = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = var("JWT_SECRET_KEY") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = var("JWT_ACCESS_LIFESPAN_SECS") {
            self.auth.access_token_lifespan_secs = v.parse().unwrap_or(self.auth.access_token_lifespan_secs);
        }
        if let Some(v) = var("JWT_REFRESH_LIFESPAN_SECS") {
            self.auth.refresh_token_lifespan_secs = v.parse().unwrap_or(self.auth.refresh_token_lifespan_secs);
        }
        if let Some(v) = var("RUNSDB_ADMIN_USER") {
            self.auth.admin_username = Some(v);
        }
        if let Some(v) = var("RUNSDB_ADMIN_PASSWORD") {
            self.auth.admin_password = Some(v);
        }
        if let Some(v) = var("PASSWORD_HASH_COST") {
            self.auth.password_hash_cost = v.parse().unwrap_or(self.auth.password_hash_cost);
        }

        // Security overrides
        if let Some(v) = var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("JWT secret is not configured (JWT_SECRET_KEY)".into()));
        }
        if self.auth.access_token_lifespan_secs <= 0 || self.auth.refresh_token_lifespan_secs <= 0 {
            return Err(ConfigError::Invalid("token lifespans must be positive".into()));
        }
        if self.auth.refresh_token_lifespan_secs < self.auth.access_token_lifespan_secs {
            return Err(ConfigError::Invalid(
                "refresh lifespan must not be shorter than access lifespan".into(),
            ));
        }
        if self.store.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("store query timeout must be positive".into()));
        }
        if !(4..=31).contains(&self.auth.password_hash_cost) {
            return Err(ConfigError::Invalid("password hash cost must be between 4 and 31".into()));
        }
        if let Some(raw) = &self.store.url {
            let scheme = url::Url::parse(raw).map(|u| u.scheme().to_string()).unwrap_or_default();
            if scheme != "postgres" && scheme != "postgresql" {
                return Err(ConfigError::Invalid(format!(
                    "run store URL must be a postgres:// URL, got scheme '{}'",
                    scheme
                )));
            }
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
            store: StoreConfig {
                url: None,
                collection: "runs".to_string(),
                fixture_path: None,
                max_connections: 5,
                connection_timeout_secs: 30,
                query_timeout_ms: 10_000,
            },
            auth: AuthConfig {
                user_db_url: None,
                jwt_secret: "development-secret".to_string(),
                access_token_lifespan_secs: 24 * 3600,
                refresh_token_lifespan_secs: 30 * 24 * 3600,
                admin_username: None,
                admin_password: None,
                password_hash_cost: 4,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            store: StoreConfig {
                url: None,
                collection: "runs".to_string(),
                fixture_path: None,
                max_connections: 10,
                connection_timeout_secs: 10,
                query_timeout_ms: 5_000,
            },
            auth: AuthConfig {
                user_db_url: None,
                jwt_secret: String::new(),
                access_token_lifespan_secs: 3600,
                refresh_token_lifespan_secs: 7 * 24 * 3600,
                admin_username: None,
                admin_password: None,
                password_hash_cost: 10,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            store: StoreConfig {
                url: None,
                collection: "runs".to_string(),
                fixture_path: None,
                max_connections: 20,
                connection_timeout_secs: 5,
                query_timeout_ms: 2_000,
            },
            auth: AuthConfig {
                user_db_url: None,
                jwt_secret: String::new(),
                access_token_lifespan_secs: 900,
                refresh_token_lifespan_secs: 24 * 3600,
                admin_username: None,
                admin_password: None,
                password_hash_cost: bcrypt::DEFAULT_COST,
            },
            security: SecurityConfig {
                enable_cors: false,
                cors_origins: Vec::new(),
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Map the `runsDB` and `user_auth` sections of older config files onto
/// `store` and `auth`. Keys given in the current layout take precedence.
fn translate_legacy(overlay: Value) -> Result<Value, ConfigError> {
    let mut map = match overlay {
        Value::Object(map) => map,
        other => return Ok(other),
    };

    if let Some(runs_db) = map.remove("runsDB") {
        for (key, value) in as_section("runsDB", runs_db)? {
            match key.as_str() {
                "default_url" => set_default(&mut map, "store", "url", value),
                "collection" => set_default(&mut map, "store", "collection", value),
                other => warn!("Ignoring unsupported config key runsDB.{}", other),
            }
        }
    }

    if let Some(user_auth) = map.remove("user_auth") {
        for (key, value) in as_section("user_auth", user_auth)? {
            match key.as_str() {
                "database" => {
                    for (key, value) in as_section("user_auth.database", value)? {
                        match key.as_str() {
                            "default_url" => set_default(&mut map, "auth", "user_db_url", value),
                            other => warn!("Ignoring unsupported config key user_auth.database.{}", other),
                        }
                    }
                }
                "jwt" => {
                    for (key, value) in as_section("user_auth.jwt", value)? {
                        let target = match key.as_str() {
                            "default_secret" => {
                                set_default(&mut map, "auth", "jwt_secret", value);
                                continue;
                            }
                            "access_token_lifespan" => "access_token_lifespan_secs",
                            "refresh_token_lifespan" => "refresh_token_lifespan_secs",
                            other => {
                                warn!("Ignoring unsupported config key user_auth.jwt.{}", other);
                                continue;
                            }
                        };
                        let secs = lifespan_secs(&value)?;
                        set_default(&mut map, "auth", target, Value::from(secs));
                    }
                }
                other => warn!("Ignoring unsupported config key user_auth.{}", other),
            }
        }
    }

    Ok(Value::Object(map))
}

fn as_section(name: &str, value: Value) -> Result<Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigError::Invalid(format!("'{}' must be an object", name))),
    }
}

fn set_default(map: &mut Map<String, Value>, section: &str, key: &str, value: Value) {
    let section = map
        .entry(section)
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(section) = section {
        section.entry(key).or_insert(value);
    }
}

/// Lifespan as plain seconds or as a duration map such as `{"hours": 24}`
fn lifespan_secs(value: &Value) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::Invalid(format!("invalid token lifespan: {}", value));

    match value {
        Value::Number(n) => n.as_i64().ok_or_else(invalid),
        Value::Object(parts) => parts.iter().try_fold(0i64, |total, (unit, amount)| {
            let scale = match unit.as_str() {
                "weeks" => 7 * 24 * 3600,
                "days" => 24 * 3600,
                "hours" => 3600,
                "minutes" => 60,
                "seconds" => 1,
                _ => return Err(invalid()),
            };
            let amount = amount.as_i64().ok_or_else(invalid)?;
            Ok(total + amount * scale)
        }),
        _ => Err(invalid()),
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_values(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}
