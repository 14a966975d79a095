use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    /// Public origin used to build `short_url` values, without trailing slash
    pub base_url: String,
    pub allowed_origins: Vec<String>,
    pub auth: AuthConfig,
    pub short_code: ShortCodeConfig,
    pub cache: CacheConfig,
    pub analytics: AnalyticsConfig,
    pub redirect_status: RedirectMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Oauth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    pub dev_identity: DevIdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub issuer_url: String,
    pub audience: String,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default = "OAuthConfig::default_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
}

/// Identity handed to every request when authentication is disabled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevIdentityConfig {
    pub tenant_id: String,
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortCodeStrategy {
    Words,
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortCodeConfig {
    pub strategy: ShortCodeStrategy,
    /// Length of codes produced by the random strategy
    pub length: usize,
    /// Upper bound for caller-supplied custom codes
    pub max_length: usize,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Zero disables the short-code lookup cache
    pub max_entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickRecordingMode {
    /// Record the click inside the redirect request
    Inline,
    /// Queue the click for a background writer
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket peer address only
    None,
    /// Honour `Forwarded` / `X-Forwarded-For`
    Standard,
    /// Honour `CF-Connecting-IP`
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub click_recording: ClickRecordingMode,
    pub queue_size: usize,
    pub recent_limit: i64,
    pub ip_anonymization: bool,
    pub trusted_proxy_mode: TrustedProxyMode,
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectMode {
    #[serde(rename = "301")]
    MovedPermanently,
    #[default]
    #[serde(rename = "302")]
    Found,
    #[serde(rename = "307")]
    Temporary,
    #[serde(rename = "308")]
    Permanent,
}

impl RedirectMode {
    pub fn status_code(self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            RedirectMode::MovedPermanently => StatusCode::MOVED_PERMANENTLY,
            RedirectMode::Found => StatusCode::FOUND,
            RedirectMode::Temporary => StatusCode::TEMPORARY_REDIRECT,
            RedirectMode::Permanent => StatusCode::PERMANENT_REDIRECT,
        }
    }
}

impl FromStr for RedirectMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "301" | "moved" => Ok(RedirectMode::MovedPermanently),
            "302" | "found" => Ok(RedirectMode::Found),
            "307" | "temporary" => Ok(RedirectMode::Temporary),
            "308" | "permanent" => Ok(RedirectMode::Permanent),
            other => anyhow::bail!("unsupported redirect status '{other}' (use 301, 302, 307 or 308)"),
        }
    }
}

impl OAuthConfig {
    const fn default_cache_ttl_secs() -> u64 {
        300
    }

    /// Issuer, audience and key endpoint for a Microsoft Entra ID tenant
    pub fn entra(tenant_id: &str, client_id: &str) -> Self {
        Self {
            issuer_url: format!("https://login.microsoftonline.com/{tenant_id}/v2.0"),
            audience: client_id.to_string(),
            jwks_url: Some(format!(
                "https://login.microsoftonline.com/{tenant_id}/discovery/v2.0/keys"
            )),
            jwks_cache_ttl_secs: Self::default_cache_ttl_secs(),
        }
    }
}

impl Default for DevIdentityConfig {
    fn default() -> Self {
        Self {
            tenant_id: "test-tenant-id".to_string(),
            user_id: "test-user-id".to_string(),
            display_name: "Test User".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: DatabaseConfig {
                url: "sqlite://./wren.db".to_string(),
                max_connections: 5,
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            base_url: "http://localhost:8000".to_string(),
            allowed_origins: vec!["http://localhost:3000".to_string()],
            auth: AuthConfig {
                mode: AuthMode::None,
                oauth: None,
                dev_identity: DevIdentityConfig::default(),
            },
            short_code: ShortCodeConfig {
                strategy: ShortCodeStrategy::Words,
                length: 8,
                max_length: 50,
                max_attempts: 10,
            },
            cache: CacheConfig {
                max_entries: 10_000,
                ttl_secs: 300,
            },
            analytics: AnalyticsConfig {
                click_recording: ClickRecordingMode::Inline,
                queue_size: 10_000,
                recent_limit: 100,
                ip_anonymization: false,
                trusted_proxy_mode: TrustedProxyMode::None,
                trusted_proxies: vec![],
                num_trusted_proxies: None,
            },
            redirect_status: RedirectMode::Found,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_auth_mode(value: &str) -> AuthMode {
    match value.trim().to_lowercase().as_str() {
        "none" => AuthMode::None,
        "oauth" | "oidc" | "entra" => AuthMode::Oauth,
        other => {
            tracing::warn!(
                "Unknown AUTH_MODE '{other}', falling back to 'none'. Supported values: none, oauth"
            );
            AuthMode::None
        }
    }
}

fn parse_strategy(value: &str) -> ShortCodeStrategy {
    match value.trim().to_lowercase().as_str() {
        "random" => ShortCodeStrategy::Random,
        "words" | "word" => ShortCodeStrategy::Words,
        other => {
            tracing::warn!("Unknown SHORT_CODE_STRATEGY '{other}', falling back to 'words'");
            ShortCodeStrategy::Words
        }
    }
}

fn parse_click_recording(value: &str) -> ClickRecordingMode {
    match value.trim().to_lowercase().as_str() {
        "background" | "async" => ClickRecordingMode::Background,
        "inline" | "sync" => ClickRecordingMode::Inline,
        other => {
            tracing::warn!("Unknown CLICK_RECORDING '{other}', falling back to 'inline'");
            ClickRecordingMode::Inline
        }
    }
}

fn parse_proxy_mode(value: &str) -> TrustedProxyMode {
    match value.trim().to_lowercase().as_str() {
        "standard" => TrustedProxyMode::Standard,
        "cloudflare" => TrustedProxyMode::Cloudflare,
        "none" => TrustedProxyMode::None,
        other => {
            tracing::warn!("Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'");
            TrustedProxyMode::None
        }
    }
}

fn parse_cidrs(value: &str) -> anyhow::Result<Vec<IpNet>> {
    split_list(value)
        .into_iter()
        .map(|entry| {
            // Bare addresses are accepted as single-host networks
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<std::net::IpAddr>().map(IpNet::from))
                .with_context(|| format!("invalid TRUSTED_PROXIES entry '{entry}'"))
        })
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let database_url = env_or("DATABASE_URL", &defaults.database.url);
        let max_connections =
            env_parse("DATABASE_MAX_CONNECTIONS", defaults.database.max_connections)?;

        let host = env_or("HOST", &defaults.server.host);
        let port = env_parse("PORT", defaults.server.port)?;

        let base_url = env_or("BASE_URL", &defaults.base_url)
            .trim_end_matches('/')
            .to_string();
        let allowed_origins = split_list(&env_or("ALLOWED_ORIGINS", "http://localhost:3000"));

        let mut auth_mode = parse_auth_mode(&env_or("AUTH_MODE", "none"));
        if env_flag("DISABLE_AUTH") {
            auth_mode = AuthMode::None;
        }

        let oauth = if auth_mode == AuthMode::Oauth {
            Some(oauth_from_env()?)
        } else {
            None
        };

        let fallback_identity = DevIdentityConfig::default();
        let dev_identity = DevIdentityConfig {
            tenant_id: env_or("DEV_TENANT_ID", &fallback_identity.tenant_id),
            user_id: env_or("DEV_USER_ID", &fallback_identity.user_id),
            display_name: env_or("DEV_USER_NAME", &fallback_identity.display_name),
        };

        let short_code = ShortCodeConfig {
            strategy: parse_strategy(&env_or("SHORT_CODE_STRATEGY", "words")),
            length: env_parse("SHORT_CODE_LENGTH", defaults.short_code.length)?.max(4),
            max_length: env_parse("SHORT_CODE_MAX_LENGTH", defaults.short_code.max_length)?
                .max(1),
            max_attempts: env_parse("SHORT_CODE_MAX_ATTEMPTS", defaults.short_code.max_attempts)?
                .max(1),
        };

        let cache = CacheConfig {
            max_entries: env_parse("CACHE_MAX_ENTRIES", defaults.cache.max_entries)?,
            ttl_secs: env_parse("CACHE_TTL_SECS", defaults.cache.ttl_secs)?,
        };

        let analytics = AnalyticsConfig {
            click_recording: parse_click_recording(&env_or("CLICK_RECORDING", "inline")),
            queue_size: env_parse("CLICK_QUEUE_SIZE", defaults.analytics.queue_size)?.max(1),
            recent_limit: env_parse("ANALYTICS_RECENT_LIMIT", defaults.analytics.recent_limit)?
                .clamp(1, 1000),
            ip_anonymization: env_flag("IP_ANONYMIZATION"),
            trusted_proxy_mode: parse_proxy_mode(&env_or("TRUSTED_PROXY_MODE", "none")),
            trusted_proxies: parse_cidrs(&env_or("TRUSTED_PROXIES", ""))?,
            num_trusted_proxies: std::env::var("NUM_TRUSTED_PROXIES")
                .ok()
                .map(|v| v.trim().parse::<usize>())
                .transpose()
                .context("invalid NUM_TRUSTED_PROXIES")?,
        };

        let redirect_status = env_parse("REDIRECT_STATUS", defaults.redirect_status)?;

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            base_url,
            allowed_origins,
            auth: AuthConfig {
                mode: auth_mode,
                oauth,
                dev_identity,
            },
            short_code,
            cache,
            analytics,
            redirect_status,
        })
    }
}

fn oauth_from_env() -> anyhow::Result<OAuthConfig> {
    let issuer = std::env::var("OAUTH_ISSUER_URL").ok();
    let audience = std::env::var("OAUTH_AUDIENCE").ok();

    let mut oauth = match (issuer, audience) {
        (Some(issuer_url), Some(audience)) => OAuthConfig {
            issuer_url,
            audience,
            jwks_url: None,
            jwks_cache_ttl_secs: OAuthConfig::default_cache_ttl_secs(),
        },
        _ => {
            let tenant = std::env::var("AZURE_TENANT_ID").context(
                "OAUTH_ISSUER_URL and OAUTH_AUDIENCE (or AZURE_TENANT_ID and AZURE_CLIENT_ID) must be set when AUTH_MODE=oauth",
            )?;
            let client = std::env::var("AZURE_CLIENT_ID")
                .context("AZURE_CLIENT_ID must be set together with AZURE_TENANT_ID")?;
            OAuthConfig::entra(&tenant, &client)
        }
    };

    if let Ok(jwks_url) = std::env::var("OAUTH_JWKS_URL") {
        oauth.jwks_url = Some(jwks_url);
    }
    oauth.jwks_cache_ttl_secs =
        env_parse("OAUTH_JWKS_CACHE_SECS", OAuthConfig::default_cache_ttl_secs())?;

    Ok(oauth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_mode_parses_status_codes() {
        assert_eq!("302".parse::<RedirectMode>().unwrap(), RedirectMode::Found);
        assert_eq!(
            "308".parse::<RedirectMode>().unwrap(),
            RedirectMode::Permanent
        );
        assert_eq!(
            "Temporary".parse::<RedirectMode>().unwrap(),
            RedirectMode::Temporary
        );
        assert!("303".parse::<RedirectMode>().is_err());
        assert_eq!(
            RedirectMode::default().status_code(),
            axum::http::StatusCode::FOUND
        );
    }

    #[test]
    fn entra_oauth_config_uses_tenant_endpoints() {
        let oauth = OAuthConfig::entra("tid-123", "client-abc");
        assert_eq!(
            oauth.issuer_url,
            "https://login.microsoftonline.com/tid-123/v2.0"
        );
        assert_eq!(oauth.audience, "client-abc");
        assert_eq!(
            oauth.jwks_url.as_deref(),
            Some("https://login.microsoftonline.com/tid-123/discovery/v2.0/keys")
        );
    }

    #[test]
    fn trusted_proxy_list_accepts_cidrs_and_bare_addresses() {
        let nets = parse_cidrs("10.0.0.0/8, 192.168.1.7 ,,2001:db8::/32").unwrap();
        assert_eq!(nets.len(), 3);
        assert!(nets[1].contains(&"192.168.1.7".parse::<std::net::IpAddr>().unwrap()));
        assert!(parse_cidrs("not-an-ip").is_err());
    }

    #[test]
    fn unknown_modes_fall_back_to_safe_defaults() {
        assert_eq!(parse_auth_mode("kerberos"), AuthMode::None);
        assert_eq!(parse_auth_mode("OAUTH"), AuthMode::Oauth);
        assert_eq!(parse_strategy("random"), ShortCodeStrategy::Random);
        assert_eq!(parse_strategy("???"), ShortCodeStrategy::Words);
        assert_eq!(
            parse_click_recording("background"),
            ClickRecordingMode::Background
        );
        assert_eq!(parse_proxy_mode("cloudflare"), TrustedProxyMode::Cloudflare);
        assert!(parse_flag(" YES "));
        assert!(!parse_flag("off"));
    }
}
