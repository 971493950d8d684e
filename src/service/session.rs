use crate::error::app_error::AppError;
use crate::gateway::{AuthEvent, AuthNotification, IdentityGateway};
use crate::guard::APP_ROOT;
use crate::models::identity::{AuthorizeRequest, Identity, OAuthProvider, Session};
use crate::models::profile::{Role, UserProfile};
use crate::models::status::{EmailStatus, RoleLookup};
use crate::repository::ProfileRepository;
use crate::service::directory::AccountDirectory;
use crate::service::pending::PendingRoleStore;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zxcvbn::{Score, zxcvbn};

/// Where the controller sends the user after auth transitions.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Snapshot of everything auth-dependent chrome needs to render.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session: Option<Session>,
    pub profile: Option<UserProfile>,
    /// True from construction until the first initialization finishes.
    pub loading: bool,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            session: None,
            profile: None,
            loading: true,
        }
    }

    /// Identity of the signed-in user, if any. Structurally tied to the
    /// session: there is no way to hold one without the other.
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

/// Outcome of consuming a pending role selection during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleReconciliation {
    /// No selection was waiting; the marker is untouched.
    NoPendingSelection,
    /// The profile already carries a role; the selection was dropped.
    AlreadyAssigned,
    /// The selection was written to the identity and the profile row.
    Committed(Role),
    /// A lookup or write failed; the selection is consumed either way.
    Failed,
}

/// Owns the session/profile/loading picture and keeps it in step with the
/// identity gateway.
///
/// All collaborators are injected: the gateway, the profile repository, the
/// pending-role store and the navigator are trait objects, so hosts and
/// tests swap them freely. State flows out through a watch channel.
pub struct SessionController {
    gateway: Arc<dyn IdentityGateway>,
    profiles: Arc<dyn ProfileRepository>,
    pending_roles: Arc<dyn PendingRoleStore>,
    navigator: Arc<dyn Navigator>,
    directory: AccountDirectory,
    state: watch::Sender<SessionState>,
    replay_discarded: bool,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn IdentityGateway>,
        profiles: Arc<dyn ProfileRepository>,
        pending_roles: Arc<dyn PendingRoleStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let directory = AccountDirectory::new(profiles.clone(), gateway.clone());
        let (state, _) = watch::channel(SessionState::initial());

        Self {
            gateway,
            profiles,
            pending_roles,
            navigator,
            directory,
            state,
            replay_discarded: false,
        }
    }

    /// Watch handle for state snapshots and change notifications.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Restores the session picture on startup. Failures downgrade to an
    /// anonymous state instead of propagating; loading ends false on every
    /// path.
    pub async fn initialize(&self) {
        self.state.send_modify(|s| s.loading = true);

        match self.gateway.current_session().await {
            Ok(Some(session)) => {
                let identity = session.identity.clone();
                self.state.send_modify(|s| s.session = Some(session));

                // Only OAuth sign-ups can have a role selection waiting
                if !identity.provider.is_email() {
                    let outcome = self.reconcile_role(&identity.id).await;
                    debug!(user = %identity.id, outcome = ?outcome, "role reconciliation finished");
                }

                if let Err(e) = self.load_profile(&identity.id).await {
                    error!(error = %e, user = %identity.id, "profile unavailable after session restore");
                }
            }
            Ok(None) => {
                self.state.send_modify(|s| {
                    s.session = None;
                    s.profile = None;
                });
            }
            Err(e) => {
                error!(error = %e, "session restore failed");
                self.state.send_modify(|s| {
                    s.session = None;
                    s.profile = None;
                });
            }
        }

        self.state.send_modify(|s| s.loading = false);
    }

    /// Applies one gateway notification. The first delivery after
    /// subscribing is the gateway's replay of state this controller already
    /// restored itself, so it is discarded by position, whatever it says.
    pub async fn handle_notification(&mut self, notification: AuthNotification) {
        if !self.replay_discarded {
            self.replay_discarded = true;
            debug!(event = ?notification.event, "discarding replayed notification");
            return;
        }

        self.state.send_modify(|s| s.session = notification.session.clone());

        match notification.event {
            AuthEvent::SignedIn => {
                if let Some(session) = &notification.session {
                    let user_id = session.identity.id;
                    // Navigate only once the profile is actually in place
                    match self.load_profile(&user_id).await {
                        Ok(()) => self.navigator.navigate(APP_ROOT),
                        Err(e) => error!(error = %e, user = %user_id, "profile fetch failed after sign-in"),
                    }
                }
            }
            AuthEvent::SignedOut => {
                self.state.send_modify(|s| s.profile = None);
                self.navigator.navigate(APP_ROOT);
            }
            AuthEvent::InitialSession | AuthEvent::TokenRefreshed | AuthEvent::UserUpdated => {}
        }

        self.state.send_modify(|s| s.loading = false);
    }

    /// Drives the controller to completion: subscribe, restore, then apply
    /// notifications until the gateway goes away. Subscribing before
    /// initialization means nothing fired in between is lost; the
    /// subscription's replay is discarded in handle_notification.
    pub async fn run(mut self) {
        let mut subscription = self.gateway.subscribe();
        self.initialize().await;

        while let Some(notification) = subscription.next().await {
            self.handle_notification(notification).await;
        }
    }

    /// Starts an OAuth sign-in; the caller sends the browser to the URL.
    pub fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthorizeRequest {
        self.gateway.authorize_url(provider)
    }

    /// Records the role to apply to the account once the OAuth round-trip
    /// completes.
    pub fn remember_role_selection(&self, role: Role) -> Result<(), AppError> {
        self.pending_roles.save(role)
    }

    /// Sends a passwordless sign-in link carrying the profile fields a new
    /// account starts from.
    pub async fn sign_in_with_email(&self, email: &str, full_name: &str, role: Role) -> Result<(), AppError> {
        let result = self.gateway.send_email_link(email, full_name, role).await;
        if let Err(e) = &result {
            error!(error = %e, email, "passwordless sign-in failed");
        }
        result
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<(), AppError> {
        // State follows through the signed-in notification
        match self.gateway.sign_in_with_password(email, password).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(error = %e, email, "password sign-in failed");
                Err(e)
            }
        }
    }

    /// Sets a password on the signed-in account. The gateway RPC updates
    /// the credential and clears the no-password marker in one call.
    pub async fn update_password(&self, new_password: &str) -> Result<(), AppError> {
        let user_id = self.state.borrow().session.as_ref().map(|s| s.identity.id);
        let Some(user_id) = user_id else {
            return Err(AppError::Unauthorized);
        };

        ensure_password_strength(new_password)?;

        let result = self.gateway.set_password(&user_id, new_password).await;
        if let Err(e) = &result {
            error!(error = %e, user = %user_id, "password update failed");
        }
        result
    }

    /// Refreshes the session and reloads the profile behind it.
    pub async fn refresh_session(&self) -> Result<(), AppError> {
        match self.gateway.refresh_session().await {
            Ok(Some(session)) => {
                let user_id = session.identity.id;
                self.state.send_modify(|s| s.session = Some(session));
                self.load_profile(&user_id).await?;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                error!(error = %e, "session refresh failed");
                Err(e)
            }
        }
    }

    /// Signs out at the gateway. Local state clears when the signed-out
    /// notification comes back; a failed revocation leaves it untouched.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        let result = self.gateway.sign_out().await;
        if let Err(e) = &result {
            error!(error = %e, "sign-out failed");
        }
        result
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        self.directory.email_exists(email).await
    }

    pub async fn role_for_email(&self, email: &str) -> Result<RoleLookup, AppError> {
        self.directory.role_for_email(email).await
    }

    pub async fn email_status(&self, email: &str) -> Result<EmailStatus, AppError> {
        self.directory.email_status(email).await
    }

    /// Consumes a role selection made before an OAuth redirect. Runs once
    /// per initialization, for OAuth sessions only.
    async fn reconcile_role(&self, user_id: &Uuid) -> RoleReconciliation {
        let pending = match self.pending_roles.load() {
            Ok(Some(role)) => role,
            Ok(None) => return RoleReconciliation::NoPendingSelection,
            Err(e) => {
                error!(error = %e, "pending role selection unreadable");
                return RoleReconciliation::Failed;
            }
        };

        let outcome = self.commit_pending_role(user_id, pending).await;

        // The marker is one-shot: once found it is cleared no matter how
        // the write went.
        if let Err(e) = self.pending_roles.clear() {
            warn!(error = %e, "failed to clear role selection marker");
        }

        outcome
    }

    async fn commit_pending_role(&self, user_id: &Uuid, pending: Role) -> RoleReconciliation {
        match self.profiles.role_by_id(user_id).await {
            Ok(Some(existing)) => {
                debug!(user = %user_id, role = existing.as_str(), "role already assigned, dropping selection");
                RoleReconciliation::AlreadyAssigned
            }
            Ok(None) => {
                // Identity attributes first, then the profile row
                if let Err(e) = self.gateway.update_attributes(json!({ "role": pending.as_str() })).await {
                    error!(error = %e, user = %user_id, "role attribute update failed");
                    return RoleReconciliation::Failed;
                }
                if let Err(e) = self.profiles.set_role(user_id, pending).await {
                    error!(error = %e, user = %user_id, "profile role write failed");
                    return RoleReconciliation::Failed;
                }
                info!(user = %user_id, role = pending.as_str(), "role selection committed");
                RoleReconciliation::Committed(pending)
            }
            Err(e) => {
                error!(error = %e, user = %user_id, "role lookup failed during reconciliation");
                RoleReconciliation::Failed
            }
        }
    }

    /// Loads the profile row into state. An absent row is a null profile,
    /// not a failure; real failures null the profile and propagate.
    async fn load_profile(&self, user_id: &Uuid) -> Result<(), AppError> {
        match self.profiles.profile_by_id(user_id).await {
            Ok(profile) => {
                self.state.send_modify(|s| s.profile = profile);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, user = %user_id, "profile fetch failed");
                self.state.send_modify(|s| s.profile = None);
                Err(e)
            }
        }
    }
}

/// Minimum zxcvbn score for a new password.
const MIN_PASSWORD_SCORE: Score = Score::Three;

fn ensure_password_strength(password: &str) -> Result<(), AppError> {
    if password.len() < 6 {
        return Err(AppError::WeakPassword("must be at least 6 characters".to_string()));
    }
    if zxcvbn(password, &[]).score() < MIN_PASSWORD_SCORE {
        return Err(AppError::WeakPassword("choose a longer, less predictable password".to_string()));
    }
    Ok(())
}
