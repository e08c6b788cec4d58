//! podid Auth — password, OAuth and WebID-OIDC authentication, signed
//! session tokens and the session lifecycle.

pub mod config;
pub mod error;
pub mod oauth;
pub mod password;
pub mod reset;
pub mod service;
pub mod session;
pub mod token;
pub mod webid;

pub use config::AuthConfig;
pub use error::AuthError;
pub use oauth::{OAuthClient, OAuthProviderConfig, OAuthProviders};
pub use password::PasswordPolicy;
pub use reset::PasswordResetService;
pub use service::{AuthOutcome, Authenticator, Credentials};
pub use session::{ResumedSession, SessionManager};
pub use token::{SessionClaims, TokenManager};
pub use webid::{WebIdClaims, WebIdVerifier};
