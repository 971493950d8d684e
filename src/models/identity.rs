use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use serde_json::Value;
use uuid::Uuid;

/// Authentication provider an account was created through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Email,
    Google,
    Facebook,
}

impl Provider {
    /// Maps the provider label the gateway reports in account metadata.
    /// Unrecognized labels are treated as email accounts.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("google") => Provider::Google,
            Some("facebook") => Provider::Facebook,
            _ => Provider::Email,
        }
    }

    pub fn is_email(self) -> bool {
        self == Provider::Email
    }
}

/// The OAuth providers the sign-in flow can redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn label(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

impl From<OAuthProvider> for Provider {
    fn from(provider: OAuthProvider) -> Self {
        match provider {
            OAuthProvider::Google => Provider::Google,
            OAuthProvider::Facebook => Provider::Facebook,
        }
    }
}

/// A verified identity as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    pub provider: Provider,
    /// False for passwordless accounts that have not set a password yet.
    pub has_password: bool,
    /// Raw user metadata the gateway stores alongside the account.
    pub attributes: Value,
}

/// An authenticated session. A session always carries the identity it
/// belongs to, so holding a `Session` implies holding an `Identity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl Session {
    /// Check if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Everything a client needs to start an OAuth redirect: the authorization
/// URL plus the state and code verifier to hold until the callback.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_label_mapping() {
        assert_eq!(Provider::from_label(Some("google")), Provider::Google);
        assert_eq!(Provider::from_label(Some("facebook")), Provider::Facebook);
        assert_eq!(Provider::from_label(Some("email")), Provider::Email);
        assert_eq!(Provider::from_label(None), Provider::Email);
        assert_eq!(Provider::from_label(Some("unknown")), Provider::Email);
    }

    #[test]
    fn oauth_provider_is_never_email() {
        assert!(!Provider::from(OAuthProvider::Google).is_email());
        assert!(!Provider::from(OAuthProvider::Facebook).is_email());
    }
}
