use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{AuthError, Identity, IdentityVerifier};
use crate::config::OAuthConfig;

/// Audience of Microsoft Graph access tokens. Clients must send ID tokens.
pub const GRAPH_AUDIENCE: &str = "00000003-0000-0000-c000-000000000000";

const UNKNOWN_USER: &str = "Unknown User";

/// OpenID Connect ID-token verifier backed by the provider's JWKS endpoint
#[derive(Clone)]
pub struct OidcVerifier {
    issuer: String,
    audience: String,
    jwks_uri: String,
    client: Client,
    keys: Arc<RwLock<HashMap<String, Arc<DecodingKey>>>>,
    last_refresh: Arc<RwLock<Option<Instant>>>,
    cache_ttl: Duration,
}

impl OidcVerifier {
    pub async fn from_config(config: &OAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("wren-oidc-verifier/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client for token validation")?;

        let jwks_uri = resolve_jwks_uri(config, &client).await?;
        let verifier = Self {
            issuer: config.issuer_url.clone(),
            audience: config.audience.clone(),
            jwks_uri,
            client,
            keys: Arc::new(RwLock::new(HashMap::new())),
            last_refresh: Arc::new(RwLock::new(None)),
            cache_ttl: Duration::from_secs(config.jwks_cache_ttl_secs.max(60)),
        };

        // Prime the JWKS cache so the first request doesn't incur latency.
        verifier.refresh_keys().await?;

        Ok(verifier)
    }

    /// Verifier with a fixed key set that is never refreshed
    pub fn from_keys(
        issuer: &str,
        audience: &str,
        keys: HashMap<String, DecodingKey>,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client for token validation")?;

        Ok(Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            jwks_uri: String::new(),
            client,
            keys: Arc::new(RwLock::new(
                keys.into_iter().map(|(kid, key)| (kid, Arc::new(key))).collect(),
            )),
            last_refresh: Arc::new(RwLock::new(Some(Instant::now()))),
            cache_ttl: Duration::MAX,
        })
    }

    /// Verify signature, expiry, issuer and audience; return the claims
    pub async fn validate(&self, token: &str) -> Result<Value> {
        let header = decode_header(token).context("failed to parse token header")?;

        let kid = header
            .kid
            .ok_or_else(|| anyhow!("token header missing 'kid'"))?;

        let key = self.get_decoding_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        // Checked below so that array audiences get a clear message
        validation.validate_aud = false;

        let data = decode::<Value>(token, key.as_ref(), &validation)
            .context("token failed signature or claim validation")?;
        let claims = data.claims;

        if !audience_matches(claims.get("aud"), &self.audience) {
            bail!("token audience does not include expected value");
        }

        Ok(claims)
    }

    async fn get_decoding_key(&self, kid: &str) -> Result<Arc<DecodingKey>> {
        // Refreshes once when the kid is unknown, since providers rotate keys
        self.ensure_fresh_keys(Some(kid)).await?;

        let keys_guard = self.keys.read().await;
        keys_guard
            .get(kid)
            .cloned()
            .ok_or_else(|| anyhow!("no JWKS entry found for key id '{kid}'"))
    }

    async fn ensure_fresh_keys(&self, kid: Option<&str>) -> Result<()> {
        if self.jwks_uri.is_empty() {
            return Ok(());
        }

        let needs_refresh = {
            let last_guard = self.last_refresh.read().await;
            match *last_guard {
                Some(last) => last.elapsed() > self.cache_ttl,
                None => true,
            }
        };

        if needs_refresh {
            debug!("Refreshing JWKS cache due to expiration");
            self.refresh_keys().await?;
            return Ok(());
        }

        if let Some(k) = kid {
            let missing = {
                let keys_guard = self.keys.read().await;
                !keys_guard.contains_key(k)
            };
            if missing {
                debug!("Refreshing JWKS cache because key {k} was missing");
                self.refresh_keys().await?;
            }
        }

        Ok(())
    }

    async fn refresh_keys(&self) -> Result<()> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_uri)
            .send()
            .await
            .context("failed to request JWKS")?
            .error_for_status()
            .context("JWKS endpoint returned an error status")?
            .json()
            .await
            .context("failed to parse JWKS response")?;

        let mut new_keys: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            let Some(kid) = jwk.kid else {
                warn!("Skipping JWKS entry without 'kid'");
                continue;
            };

            match jwk.kty.as_str() {
                "RSA" => {
                    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                        warn!("Skipping RSA JWKS entry {kid} without modulus or exponent");
                        continue;
                    };
                    let key = DecodingKey::from_rsa_components(n, e)
                        .context("failed to build RSA decoding key from JWKS entry")?;
                    new_keys.insert(kid, Arc::new(key));
                }
                other => {
                    warn!("Skipping unsupported JWKS key type: {other}");
                }
            }
        }

        if new_keys.is_empty() {
            bail!("JWKS response did not contain any usable keys");
        }

        let mut keys_guard = self.keys.write().await;
        *keys_guard = new_keys;
        let mut last_guard = self.last_refresh.write().await;
        *last_guard = Some(Instant::now());

        Ok(())
    }
}

#[async_trait]
impl IdentityVerifier for OidcVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if unverified_audience_is_graph(token) {
            return Err(AuthError::InvalidToken(
                "Invalid token type: received a Microsoft Graph access token instead of an ID token"
                    .to_string(),
            ));
        }

        let claims = self.validate(token).await.map_err(|err| {
            warn!(error = %format!("{err:#}"), "token validation failed");
            AuthError::InvalidToken(describe_failure(&err))
        })?;

        identity_from_claims(&claims)
    }
}

fn describe_failure(err: &anyhow::Error) -> String {
    match err
        .downcast_ref::<jsonwebtoken::errors::Error>()
        .map(|e| e.kind())
    {
        Some(ErrorKind::ExpiredSignature) => "Token has expired. Please log in again.".to_string(),
        Some(ErrorKind::InvalidIssuer) => "Invalid token issuer".to_string(),
        Some(ErrorKind::InvalidSignature) => "Invalid token signature".to_string(),
        _ => format!("Authentication failed: {err}"),
    }
}

/// Peek at the unverified payload. Used only to produce a helpful message for
/// a common client mistake; the token is rejected either way.
fn unverified_audience_is_graph(token: &str) -> bool {
    let Some(payload) = token.split('.').nth(1) else {
        return false;
    };

    BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .is_some_and(|claims| audience_matches(claims.get("aud"), GRAPH_AUDIENCE))
}

fn string_claim<'a>(claims: &'a Value, name: &str) -> Option<&'a str> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Map Entra ID claims: tenant from `tid`, user from `oid` (or `sub`),
/// display name from `name` (or `preferred_username`).
pub fn identity_from_claims(claims: &Value) -> Result<Identity, AuthError> {
    let tenant_id = string_claim(claims, "tid")
        .ok_or_else(|| AuthError::InvalidToken("token missing 'tid' claim".to_string()))?;
    let user_id = string_claim(claims, "oid")
        .or_else(|| string_claim(claims, "sub"))
        .ok_or_else(|| AuthError::InvalidToken("token missing 'oid' claim".to_string()))?;
    let display_name = string_claim(claims, "name")
        .or_else(|| string_claim(claims, "preferred_username"))
        .unwrap_or(UNKNOWN_USER);

    Ok(Identity {
        tenant_id: tenant_id.to_string(),
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
    })
}

fn audience_matches(aud_claim: Option<&Value>, expected: &str) -> bool {
    match aud_claim {
        Some(Value::String(aud)) => aud == expected,
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_str)
            .any(|entry| entry == expected),
        _ => false,
    }
}

async fn resolve_jwks_uri(config: &OAuthConfig, client: &Client) -> Result<String> {
    if let Some(url) = &config.jwks_url {
        return Ok(url.clone());
    }

    let issuer = config.issuer_url.trim_end_matches('/');
    let discovery_url = format!("{issuer}/.well-known/openid-configuration");
    let metadata: OpenIdProviderMetadata = client
        .get(&discovery_url)
        .send()
        .await
        .context("failed to request OpenID provider metadata")?
        .error_for_status()
        .context("OpenID provider metadata endpoint returned an error status")?
        .json()
        .await
        .context("failed to parse OpenID provider metadata")?;

    metadata
        .jwks_uri
        .ok_or_else(|| anyhow!("OpenID provider metadata did not include 'jwks_uri'"))
}

#[derive(Debug, Deserialize)]
struct OpenIdProviderMetadata {
    jwks_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    #[serde(default)]
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}
