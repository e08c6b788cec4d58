//! WebID-OIDC trust verification.
//!
//! A presented token is trusted only after every step succeeds:
//!
//! 1. Read the token's claims without verifying, to find the WebID.
//! 2. Reject if there is no WebID claim.
//! 3. Discover the OIDC configuration at the WebID's origin
//!    (`/.well-known/openid-configuration`), cached per WebID.
//! 4. Fetch the WebID identity document and require it to mention the
//!    WebID itself.
//! 5. Fetch the key set and pick the key named by the token's `kid`.
//! 6. Verify the signature; only asymmetric algorithms are accepted.
//! 7. Require non-empty subject, WebID and issuer, and an unexpired
//!    token.
//!
//! Every network fetch is bounded by the configured timeout. A timeout
//! is a verification failure like any other.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::config::AuthConfig;
use crate::error::AuthError;

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
const IDENTITY_DOCUMENT_ACCEPT: &str = "text/turtle, application/ld+json;q=0.9, */*;q=0.8";

/// The subset of an OIDC discovery document the verifier relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OidcConfiguration {
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub authorization_endpoint: String,
    #[serde(default)]
    pub token_endpoint: String,
    #[serde(default)]
    pub jwks_uri: String,
}

impl OidcConfiguration {
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("issuer", &self.issuer),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("jwks_uri", &self.jwks_uri),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Canonical claim set of a verified WebID-OIDC token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebIdClaims {
    pub subject: String,
    pub web_id: String,
    pub issuer: String,
    pub issued_at: Option<i64>,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    webid: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

struct CachedConfiguration {
    config: OidcConfiguration,
    fetched_at: Instant,
}

/// Verifies WebID-OIDC tokens by discovering the issuer from the WebID
/// itself rather than trusting a fixed authority.
pub struct WebIdVerifier {
    http: reqwest::Client,
    cache: RwLock<HashMap<String, CachedConfiguration>>,
    cache_ttl: Duration,
}

impl WebIdVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.oidc_discovery_timeout_secs))
            .build()
            .map_err(|e| AuthError::TrustVerification(format!("http client: {e}")))?;
        Ok(Self {
            http,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::from_secs(config.oidc_cache_ttl_secs),
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Run the full verification protocol against `token`.
    pub async fn verify(&self, token: &str) -> Result<WebIdClaims, AuthError> {
        let unverified = decode_unverified(token)?;
        let web_id = unverified
            .webid
            .filter(|w| !w.is_empty())
            .ok_or_else(|| AuthError::TrustVerification("token has no webid claim".into()))?;

        let config = self.discover(&web_id).await?;
        self.check_identity_document(&web_id).await?;

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AuthError::TrustVerification(format!("invalid token header: {e}")))?;
        if !is_asymmetric(header.alg) {
            return Err(AuthError::TrustVerification(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::TrustVerification("token header has no kid".into()))?;
        let jwk = self.fetch_key(&config.jwks_uri, &kid).await?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthError::TrustVerification(format!("unusable key {kid}: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        let verified = jsonwebtoken::decode::<RawClaims>(token, &key, &validation)
            .map_err(|e| AuthError::TrustVerification(format!("signature check failed: {e}")))?
            .claims;

        let claims = WebIdClaims {
            subject: verified.sub.unwrap_or_default(),
            web_id: verified.webid.unwrap_or_default(),
            issuer: verified.iss.unwrap_or_default(),
            issued_at: verified.iat,
            expires_at: verified.exp.unwrap_or_default(),
        };
        if claims.subject.is_empty() || claims.web_id.is_empty() || claims.issuer.is_empty() {
            return Err(AuthError::TrustVerification(
                "verified token lacks subject, webid or issuer".into(),
            ));
        }
        if claims.expires_at <= Utc::now().timestamp() {
            return Err(AuthError::TrustVerification("token has expired".into()));
        }

        debug!(web_id = %claims.web_id, issuer = %claims.issuer, "WebID-OIDC token verified");
        Ok(claims)
    }

    /// Discover (or reuse a cached) OIDC configuration for `web_id`.
    pub async fn discover(&self, web_id: &str) -> Result<OidcConfiguration, AuthError> {
        if let Some(cached) = self.cache.read().await.get(web_id) {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                return Ok(cached.config.clone());
            }
        }

        let url = format!("{}{DISCOVERY_PATH}", issuer_origin(web_id)?);
        debug!(web_id, %url, "Discovering OIDC configuration");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::TrustVerification(format!("discovery request: {e}")))?;
        let response = ensure_success(response, "discovery").await?;
        let config: OidcConfiguration = response
            .json()
            .await
            .map_err(|e| AuthError::TrustVerification(format!("discovery document: {e}")))?;

        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(AuthError::TrustVerification(format!(
                "discovery document missing {}",
                missing.join(", ")
            )));
        }

        self.cache.write().await.insert(
            web_id.to_string(),
            CachedConfiguration {
                config: config.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(config)
    }

    /// Forget a cached configuration, forcing re-discovery.
    pub async fn evict(&self, web_id: &str) {
        self.cache.write().await.remove(web_id);
    }

    async fn check_identity_document(&self, web_id: &str) -> Result<(), AuthError> {
        let response = self
            .http
            .get(web_id)
            .header(reqwest::header::ACCEPT, IDENTITY_DOCUMENT_ACCEPT)
            .send()
            .await
            .map_err(|e| AuthError::TrustVerification(format!("identity document request: {e}")))?;
        let body = ensure_success(response, "identity document")
            .await?
            .text()
            .await
            .map_err(|e| AuthError::TrustVerification(format!("identity document body: {e}")))?;

        if !body.contains(web_id) {
            warn!(web_id, "Identity document does not reference its WebID");
            return Err(AuthError::TrustVerification(
                "identity document does not reference the WebID".into(),
            ));
        }
        Ok(())
    }

    async fn fetch_key(&self, jwks_uri: &str, kid: &str) -> Result<Jwk, AuthError> {
        let response = self
            .http
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::TrustVerification(format!("key set request: {e}")))?;
        let keys: JwkSet = ensure_success(response, "key set")
            .await?
            .json()
            .await
            .map_err(|e| AuthError::TrustVerification(format!("key set document: {e}")))?;

        keys.find(kid)
            .cloned()
            .ok_or_else(|| AuthError::TrustVerification(format!("no key with kid {kid}")))
    }
}

/// `scheme://authority` of a WebID URL.
pub fn issuer_origin(web_id: &str) -> Result<String, AuthError> {
    let url = Url::parse(web_id)
        .map_err(|e| AuthError::TrustVerification(format!("invalid WebID {web_id}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AuthError::TrustVerification(format!(
            "WebID {web_id} is not an http(s) URL"
        )));
    }
    Ok(url.origin().ascii_serialization())
}

fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}

/// Read a JWT's claims without checking its signature or any claim.
fn decode_unverified(token: &str) -> Result<RawClaims, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<RawClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::TrustVerification(format!("malformed token: {e}")))
}

async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(AuthError::TrustVerification(format!(
        "{operation} returned HTTP {}",
        response.status().as_u16()
    )))
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;

    #[test]
    fn origin_keeps_scheme_host_and_port() {
        assert_eq!(
            issuer_origin("https://alice.example/profile/card#me").unwrap(),
            "https://alice.example"
        );
        assert_eq!(
            issuer_origin("http://127.0.0.1:8443/profile/card#me").unwrap(),
            "http://127.0.0.1:8443"
        );
    }

    #[test]
    fn origin_rejects_non_http_webid() {
        assert!(issuer_origin("urn:uuid:1234").is_err());
        assert!(issuer_origin("not a url").is_err());
    }

    #[test]
    fn unverified_payload_is_readable() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"webid":"https://a.example/#me","sub":"a"}"#);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
        let token = format!("{header}.{payload}.sig");
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.webid.as_deref(), Some("https://a.example/#me"));
        assert_eq!(claims.sub.as_deref(), Some("a"));
        assert!(claims.exp.is_none());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(decode_unverified("onlyonesegment").is_err());
        assert!(decode_unverified("a.!!!.c").is_err());
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA"}"#);
        assert!(decode_unverified(&format!("{header}.bm90LWpzb24.sig")).is_err());
    }

    #[test]
    fn missing_discovery_fields_are_listed() {
        let config = OidcConfiguration {
            issuer: "https://a.example".into(),
            jwks_uri: "https://a.example/jwks".into(),
            ..Default::default()
        };
        assert_eq!(
            config.missing_fields(),
            vec!["authorization_endpoint", "token_endpoint"]
        );
    }

    #[test]
    fn only_asymmetric_algorithms_are_accepted() {
        assert!(is_asymmetric(Algorithm::EdDSA));
        assert!(is_asymmetric(Algorithm::RS256));
        assert!(!is_asymmetric(Algorithm::HS256));
    }
}
