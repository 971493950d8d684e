use crate::models::profile::Role;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

/// Account status as reported by the gateway's admin surface.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountStatus {
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub has_password: bool,
}

/// Email address to look up, validated before any lookup runs.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct EmailLookup {
    #[validate(email)]
    pub email: String,
}

impl EmailLookup {
    pub fn new(email: impl Into<String>) -> Self {
        Self { email: email.into() }
    }
}

/// Response for the email existence lookup.
#[derive(Debug, Serialize, JsonSchema)]
pub struct EmailExistsResponse {
    pub exists: bool,
}

/// Role lookup result. `exists` distinguishes an absent account from an
/// account that has no role assigned yet.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct RoleLookup {
    pub exists: bool,
    pub role: Option<Role>,
}

/// Combined registration-status lookup: whether the address is registered,
/// whether it has confirmed the address, and whether it has a password.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct EmailStatus {
    pub exists: bool,
    pub verified: bool,
    pub has_password: bool,
}

impl EmailStatus {
    /// Status reported for an address with no account behind it.
    pub fn absent() -> Self {
        Self {
            exists: false,
            verified: false,
            has_password: false,
        }
    }
}
