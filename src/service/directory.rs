use crate::error::app_error::AppError;
use crate::gateway::IdentityGateway;
use crate::models::status::{EmailStatus, RoleLookup};
use crate::repository::ProfileRepository;
use std::sync::Arc;
use tracing::error;

/// Account lookups the sign-in and registration forms need before any
/// session exists: is this address registered, which role does it carry,
/// and can it already sign in with a password?
#[derive(Clone)]
pub struct AccountDirectory {
    profiles: Arc<dyn ProfileRepository>,
    gateway: Arc<dyn IdentityGateway>,
}

impl AccountDirectory {
    pub fn new(profiles: Arc<dyn ProfileRepository>, gateway: Arc<dyn IdentityGateway>) -> Self {
        Self { profiles, gateway }
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        let result = self.profiles.profile_id_by_email(email).await;
        if let Err(e) = &result {
            error!(error = %e, email, "email existence lookup failed");
        }
        Ok(result?.is_some())
    }

    pub async fn role_for_email(&self, email: &str) -> Result<RoleLookup, AppError> {
        let result = self.profiles.role_by_email(email).await;
        if let Err(e) = &result {
            error!(error = %e, email, "role lookup failed");
        }
        result
    }

    /// Combined registration status. The confirmation and password facts
    /// live on the gateway side, so a registered address costs a second,
    /// out-of-band status call.
    pub async fn email_status(&self, email: &str) -> Result<EmailStatus, AppError> {
        let id = match self.profiles.profile_id_by_email(email).await {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(EmailStatus::absent()),
            Err(e) => {
                error!(error = %e, email, "email status lookup failed");
                return Err(e);
            }
        };

        match self.gateway.account_status(&id).await {
            Ok(status) => Ok(EmailStatus {
                exists: true,
                verified: status.email_confirmed_at.is_some(),
                has_password: status.has_password,
            }),
            Err(e) => {
                error!(error = %e, email, "account status lookup failed");
                Err(e)
            }
        }
    }
}
