pub mod http;
pub mod pkce;

use crate::error::app_error::AppError;
use crate::models::identity::{AuthorizeRequest, Identity, OAuthProvider, Session};
use crate::models::profile::Role;
use crate::models::status::AccountStatus;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Lifecycle events the gateway reports to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// Replay of the state that existed when the subscription was opened.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

#[derive(Debug, Clone)]
pub struct AuthNotification {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

/// Stream of auth notifications for one subscriber.
///
/// The first notification on a fresh subscription is always an
/// `InitialSession` replay of whatever session the gateway already holds,
/// so that late subscribers start from a consistent picture. A consumer
/// that restores its own state before subscribing must discard exactly
/// that first delivery; `SessionController` does.
pub struct AuthSubscription {
    rx: mpsc::UnboundedReceiver<AuthNotification>,
}

impl AuthSubscription {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<AuthNotification>) -> Self {
        Self { rx }
    }

    /// Next notification, or None once the gateway is gone.
    pub async fn next(&mut self) -> Option<AuthNotification> {
        self.rx.recv().await
    }
}

/// Remote identity provider the whole crate authenticates against.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Session currently held by this client, refreshed when expired.
    async fn current_session(&self) -> Result<Option<Session>, AppError>;

    /// Builds the OAuth authorization redirect for the given provider and
    /// retains the PKCE verifier for the later code exchange.
    fn authorize_url(&self, provider: OAuthProvider) -> AuthorizeRequest;

    /// Sends a magic sign-in link carrying the display name and chosen role
    /// as account metadata. Creates the account if it does not exist.
    async fn send_email_link(&self, email: &str, full_name: &str, role: Role) -> Result<(), AppError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError>;

    /// Exchanges an OAuth callback code for a session.
    async fn exchange_code(&self, code: &str) -> Result<Session, AppError>;

    /// Validates an access token. Invalid or expired tokens are Ok(None),
    /// not an error; errors mean the gateway could not be asked.
    async fn identity_for(&self, access_token: &str) -> Result<Option<Identity>, AppError>;

    /// Merges the given document into the current user's attribute bag.
    async fn update_attributes(&self, attributes: Value) -> Result<(), AppError>;

    /// Sets the password and clears the no-password marker in one
    /// privileged call, so the two cannot drift apart.
    async fn set_password(&self, user_id: &Uuid, new_password: &str) -> Result<(), AppError>;

    async fn refresh_session(&self) -> Result<Option<Session>, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    /// Registration status for the account lookup surface.
    async fn account_status(&self, user_id: &Uuid) -> Result<AccountStatus, AppError>;

    fn subscribe(&self) -> AuthSubscription;
}
