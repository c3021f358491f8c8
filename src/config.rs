/*
 * Responsibility
 * - Load settings from environment variables (.env supported), once at startup
 * - Validate them: missing or unparseable values abort startup
 * - AuthPolicyConfig is immutable afterwards and shared read-only
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

use axum::http::HeaderName;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// HS256 keys shorter than the hash output weaken the signature.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<String>) -> Self {
        match value
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process-wide authentication settings.
#[derive(Clone)]
pub struct AuthPolicyConfig {
    pub enabled: bool,
    /// Pattern selecting the paths governed by the authentication filter.
    pub base_path: String,
    pub permit_all_paths: Vec<String>,
    pub token_ttl_seconds: u64,
    pub refresh_window_seconds: u64,
    pub signing_secret: Vec<u8>,
    pub header_name: HeaderName,
    /// Scheme prefix in front of the token, e.g. `Bearer `. May be empty.
    pub header_prefix: String,
    pub login_path: String,
    pub refresh_path: String,
    pub me_path: String,
    pub role_lookup_timeout: Duration,
}

impl fmt::Debug for AuthPolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("AuthPolicyConfig")
            .field("enabled", &self.enabled)
            .field("base_path", &self.base_path)
            .field("permit_all_paths", &self.permit_all_paths)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("refresh_window_seconds", &self.refresh_window_seconds)
            .field("header_name", &self.header_name)
            .field("header_prefix", &self.header_prefix)
            .field("login_path", &self.login_path)
            .field("refresh_path", &self.refresh_path)
            .field("me_path", &self.me_path)
            .field("role_lookup_timeout", &self.role_lookup_timeout)
            .finish()
    }
}

impl AuthPolicyConfig {
    pub const DEFAULT_LOGIN_PATH: &'static str = "/api/auth/login";
    pub const DEFAULT_REFRESH_PATH: &'static str = "/api/auth/refresh";
    pub const DEFAULT_ME_PATH: &'static str = "/api/auth/me";

    /// Defaults with the given signing secret.
    pub fn new(signing_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            enabled: true,
            base_path: "/**".to_string(),
            permit_all_paths: default_permit_all(
                Self::DEFAULT_LOGIN_PATH,
                Self::DEFAULT_REFRESH_PATH,
            ),
            token_ttl_seconds: 3600,
            refresh_window_seconds: 86_400,
            signing_secret: signing_secret.into(),
            header_name: axum::http::header::AUTHORIZATION,
            header_prefix: "Bearer ".to_string(),
            login_path: Self::DEFAULT_LOGIN_PATH.to_string(),
            refresh_path: Self::DEFAULT_REFRESH_PATH.to_string(),
            me_path: Self::DEFAULT_ME_PATH.to_string(),
            role_lookup_timeout: Duration::from_millis(2000),
        }
    }

    fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let signing_secret = parse_secret(
            lookup("AUTH_SIGNING_SECRET").ok_or(ConfigError::Missing("AUTH_SIGNING_SECRET"))?,
        )?;
        let mut auth = Self::new(signing_secret);

        auth.enabled = parse_or(lookup, "AUTH_ENABLED", auth.enabled, parse_bool)?;
        if let Some(base_path) = lookup("AUTH_BASE_PATH") {
            auth.base_path = base_path.trim().to_string();
        }

        auth.token_ttl_seconds = parse_or(lookup, "AUTH_TOKEN_TTL_SECONDS", 3600, positive)?;
        auth.refresh_window_seconds =
            parse_or(lookup, "AUTH_REFRESH_WINDOW_SECONDS", 86_400, positive)?;

        auth.header_name = parse_or(lookup, "AUTH_HEADER_NAME", auth.header_name, |s| {
            HeaderName::from_str(s.trim()).ok()
        })?;
        if let Some(prefix) = lookup("AUTH_HEADER_PREFIX") {
            auth.header_prefix = prefix;
        }

        auth.login_path = parse_or(lookup, "AUTH_LOGIN_PATH", auth.login_path, route_path)?;
        auth.refresh_path = parse_or(lookup, "AUTH_REFRESH_PATH", auth.refresh_path, route_path)?;
        auth.me_path = parse_or(lookup, "AUTH_ME_PATH", auth.me_path, route_path)?;
        check_endpoint_paths(&auth)?;

        auth.permit_all_paths = match lookup("AUTH_PERMIT_ALL_PATHS") {
            Some(list) => split_list(&list),
            None => default_permit_all(&auth.login_path, &auth.refresh_path),
        };

        let timeout_ms = parse_or(lookup, "AUTH_ROLE_LOOKUP_TIMEOUT_MS", 2000, positive)?;
        auth.role_lookup_timeout = Duration::from_millis(timeout_ms);

        Ok(auth)
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub auth: AuthPolicyConfig,
    /// Reference user store entries (`name:<argon2 PHC>:ROLE_A|ROLE_B;...`).
    pub users: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&lookup, "PORT", 3000, |s| s.trim().parse().ok())?;

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let cors_allowed_origins = split_list(&lookup("CORS_ALLOWED_ORIGINS").unwrap_or_default());

        let auth = AuthPolicyConfig::from_lookup(&lookup)?;

        let users = lookup("AUTH_USERS").unwrap_or_default();

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            auth,
            users,
        })
    }
}

/// Endpoint paths must not collide with each other or with fixed routes.
fn check_endpoint_paths(auth: &AuthPolicyConfig) -> Result<(), ConfigError> {
    const FIXED: [&str; 2] = ["/health", "/api/admin/status"];

    let endpoints = [
        ("AUTH_LOGIN_PATH", &auth.login_path),
        ("AUTH_REFRESH_PATH", &auth.refresh_path),
        ("AUTH_ME_PATH", &auth.me_path),
    ];

    for (i, (key, path)) in endpoints.iter().enumerate() {
        let clashes_fixed = FIXED.contains(&path.as_str());
        let clashes_other = endpoints[..i].iter().any(|(_, other)| other == path);
        if clashes_fixed || clashes_other {
            return Err(ConfigError::Invalid(key));
        }
    }

    Ok(())
}

fn default_permit_all(login_path: &str, refresh_path: &str) -> Vec<String> {
    vec![
        "/health".to_string(),
        login_path.to_string(),
        refresh_path.to_string(),
    ]
}

/// Absent key -> default, present but unparseable -> `ConfigError::Invalid`.
fn parse_or<F, T, P>(lookup: &F, key: &'static str, default: T, parse: P) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: FnOnce(&str) -> Option<T>,
{
    match lookup(key) {
        Some(raw) => parse(&raw).ok_or(ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn positive(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|v| *v > 0)
}

fn route_path(s: &str) -> Option<String> {
    let s = s.trim();
    (s.starts_with('/') && !s.contains('*')).then(|| s.to_string())
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Raw string secret, or `base64:<standard base64>` for binary secrets.
fn parse_secret(raw: String) -> Result<Vec<u8>, ConfigError> {
    let bytes = match raw.strip_prefix("base64:") {
        Some(encoded) => STANDARD
            .decode(encoded.trim())
            .map_err(|_| ConfigError::Invalid("AUTH_SIGNING_SECRET"))?,
        None => raw.into_bytes(),
    };

    if bytes.len() < MIN_SECRET_BYTES {
        return Err(ConfigError::Invalid("AUTH_SIGNING_SECRET"));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("AUTH_SIGNING_SECRET", SECRET)]).unwrap();

        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.app_env, AppEnv::Development);

        let auth = &config.auth;
        assert!(auth.enabled);
        assert_eq!(auth.base_path, "/**");
        assert_eq!(auth.token_ttl_seconds, 3600);
        assert_eq!(auth.refresh_window_seconds, 86_400);
        assert_eq!(auth.header_name, axum::http::header::AUTHORIZATION);
        assert_eq!(auth.header_prefix, "Bearer ");
        assert_eq!(
            auth.permit_all_paths,
            vec!["/health", "/api/auth/login", "/api/auth/refresh"]
        );
        assert_eq!(auth.signing_secret, SECRET.as_bytes());
    }

    #[test]
    fn missing_secret_is_fatal() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing("AUTH_SIGNING_SECRET")
        );
    }

    #[test]
    fn short_or_undecodable_secret_is_fatal() {
        assert_eq!(
            load(&[("AUTH_SIGNING_SECRET", "short")]).unwrap_err(),
            ConfigError::Invalid("AUTH_SIGNING_SECRET")
        );
        assert_eq!(
            load(&[("AUTH_SIGNING_SECRET", "base64:***")]).unwrap_err(),
            ConfigError::Invalid("AUTH_SIGNING_SECRET")
        );
    }

    #[test]
    fn base64_secret_is_decoded() {
        let encoded = format!("base64:{}", STANDARD.encode([7u8; 48]));
        let config = load(&[("AUTH_SIGNING_SECRET", &encoded)]).unwrap();
        assert_eq!(config.auth.signing_secret, vec![7u8; 48]);
    }

    #[test]
    fn unparseable_values_are_fatal() {
        let cases = [
            ("AUTH_TOKEN_TTL_SECONDS", "soon", "AUTH_TOKEN_TTL_SECONDS"),
            ("AUTH_TOKEN_TTL_SECONDS", "0", "AUTH_TOKEN_TTL_SECONDS"),
            ("AUTH_ENABLED", "maybe", "AUTH_ENABLED"),
            ("AUTH_HEADER_NAME", "bad header", "AUTH_HEADER_NAME"),
            ("AUTH_LOGIN_PATH", "login", "AUTH_LOGIN_PATH"),
            ("PORT", "http", "PORT"),
        ];

        for (key, value, expected) in cases {
            assert_eq!(
                load(&[("AUTH_SIGNING_SECRET", SECRET), (key, value)]).unwrap_err(),
                ConfigError::Invalid(expected),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("AUTH_SIGNING_SECRET", SECRET),
            ("APP_ENV", "prod"),
            ("AUTH_ENABLED", "false"),
            ("AUTH_BASE_PATH", "/api/**"),
            ("AUTH_PERMIT_ALL_PATHS", "/api/auth/*, /api/docs/**"),
            ("AUTH_TOKEN_TTL_SECONDS", "60"),
            ("AUTH_REFRESH_WINDOW_SECONDS", "600"),
            ("AUTH_HEADER_NAME", "X-Auth-Token"),
            ("AUTH_HEADER_PREFIX", ""),
            ("AUTH_ROLE_LOOKUP_TIMEOUT_MS", "250"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ])
        .unwrap();

        assert!(config.app_env.is_production());
        assert_eq!(config.cors_allowed_origins.len(), 2);

        let auth = &config.auth;
        assert!(!auth.enabled);
        assert_eq!(auth.base_path, "/api/**");
        assert_eq!(auth.permit_all_paths, vec!["/api/auth/*", "/api/docs/**"]);
        assert_eq!(auth.token_ttl_seconds, 60);
        assert_eq!(auth.refresh_window_seconds, 600);
        assert_eq!(auth.header_name.as_str(), "x-auth-token");
        assert_eq!(auth.header_prefix, "");
        assert_eq!(auth.role_lookup_timeout, Duration::from_millis(250));
    }

    #[test]
    fn default_permit_all_follows_custom_endpoint_paths() {
        let config = load(&[
            ("AUTH_SIGNING_SECRET", SECRET),
            ("AUTH_LOGIN_PATH", "/session/new"),
            ("AUTH_REFRESH_PATH", "/session/renew"),
        ])
        .unwrap();

        assert_eq!(
            config.auth.permit_all_paths,
            vec!["/health", "/session/new", "/session/renew"]
        );
    }

    #[test]
    fn colliding_endpoint_paths_are_fatal() {
        assert_eq!(
            load(&[
                ("AUTH_SIGNING_SECRET", SECRET),
                ("AUTH_REFRESH_PATH", "/api/auth/login"),
            ])
            .unwrap_err(),
            ConfigError::Invalid("AUTH_REFRESH_PATH")
        );
        assert_eq!(
            load(&[("AUTH_SIGNING_SECRET", SECRET), ("AUTH_ME_PATH", "/health")]).unwrap_err(),
            ConfigError::Invalid("AUTH_ME_PATH")
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        let config = load(&[("AUTH_SIGNING_SECRET", SECRET)]).unwrap();
        assert!(!format!("{config:?}").contains(SECRET));
    }
}
