//! OAuth2 authorization-code flow with PKCE against configured providers.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use podid_core::models::identity::ExternalProfile;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::AuthError;

/// Settings for one OAuth2 provider.
///
/// `id_field`, `email_field` and `name_field` name the keys of the
/// provider's userinfo document that carry the profile values.
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: Url,
    pub token_url: Url,
    pub userinfo_url: Url,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
    pub id_field: String,
    pub email_field: String,
    pub name_field: String,
}

impl OAuthProviderConfig {
    /// A provider using the OIDC standard claim names (`sub`, `email`,
    /// `name`) and the `openid email profile` scopes.
    pub fn new(
        name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        endpoints: (Url, Url, Url),
        redirect_uri: Url,
    ) -> Self {
        let (auth_url, token_url, userinfo_url) = endpoints;
        Self {
            name: name.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url,
            token_url,
            userinfo_url,
            redirect_uri,
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
            id_field: "sub".into(),
            email_field: "email".into(),
            name_field: "name".into(),
        }
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the userinfo keys for providers that do not follow OIDC
    /// naming (e.g. `id` / `email` / `login`).
    #[must_use]
    pub fn with_profile_fields(
        mut self,
        id_field: impl Into<String>,
        email_field: impl Into<String>,
        name_field: impl Into<String>,
    ) -> Self {
        self.id_field = id_field.into();
        self.email_field = email_field.into();
        self.name_field = name_field.into();
        self
    }
}

/// Authorization URL plus the values the caller must keep until the
/// provider redirects back.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Client for a single provider.
pub struct OAuthClient {
    config: OAuthProviderConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: OAuthProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &OAuthProviderConfig {
        &self.config
    }

    /// Build the provider authorization URL with a fresh CSRF state and
    /// PKCE S256 challenge.
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = random_urlsafe::<16>();
        let code_verifier = random_urlsafe::<48>();
        let code_challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()));

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier,
        }
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, AuthError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(self.config.token_url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;
        let response = ensure_success(response, "token exchange").await?;
        Ok(response.json::<TokenResponse>().await?)
    }

    /// Fetch the provider's userinfo document and map it to a profile.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<ExternalProfile, AuthError> {
        let response = self
            .http
            .get(self.config.userinfo_url.clone())
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = ensure_success(response, "userinfo request").await?;
        let document: Value = response.json().await?;
        self.profile_from(&document)
    }

    fn profile_from(&self, document: &Value) -> Result<ExternalProfile, AuthError> {
        let external_id = field_as_string(document, &self.config.id_field).ok_or_else(|| {
            AuthError::Provider {
                operation: "userinfo request",
                status: None,
                detail: format!("profile has no '{}' field", self.config.id_field),
            }
        })?;

        Ok(ExternalProfile {
            provider: self.config.name.clone(),
            external_id,
            email: field_as_string(document, &self.config.email_field).unwrap_or_default(),
            name: field_as_string(document, &self.config.name_field),
        })
    }
}

/// Configured providers, keyed by name.
#[derive(Default)]
pub struct OAuthProviders {
    clients: HashMap<String, OAuthClient>,
}

impl OAuthProviders {
    pub fn from_configs(configs: &[OAuthProviderConfig]) -> Self {
        let clients = configs
            .iter()
            .cloned()
            .map(|c| (c.name.clone(), OAuthClient::new(c)))
            .collect();
        Self { clients }
    }

    pub fn insert(&mut self, client: OAuthClient) {
        self.clients.insert(client.name().to_string(), client);
    }

    /// Look up a provider; an unknown name is an error.
    pub fn get(&self, name: &str) -> Result<&OAuthClient, AuthError> {
        self.clients
            .get(name)
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }
}

/// String or number fields become strings; GitHub ids are numeric.
fn field_as_string(document: &Value, key: &str) -> Option<String> {
    match document.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn random_urlsafe<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let detail = response.text().await.unwrap_or_default();
    Err(AuthError::Provider {
        operation,
        status: Some(status),
        detail,
    })
}
