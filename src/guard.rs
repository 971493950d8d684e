use crate::models::identity::{Identity, Provider};
use crate::models::profile::Role;
use crate::repository::ProfileRepository;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;
use uuid::Uuid;

/// Landing page after sign-in and sign-out.
pub const APP_ROOT: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const PROFILE_PATH: &str = "/profile";
pub const OWNER_HOME: &str = "/owner";

/// Paths the guard never touches, by prefix. The auth pages must stay
/// reachable for anonymous visitors and for accounts the guard would
/// otherwise bounce, or sign-in loops forever.
const EXEMPT_PREFIXES: [&str; 6] = [
    "/login",
    "/register",
    "/profile",
    "/auth/callback",
    "/auth/auth-code-error",
    "/reset-password",
];

static ASSET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/static/|^/favicon\.ico$|\.(?:svg|png|jpg|jpeg|gif|webp|ico)$")
        .expect("asset pattern compiles")
});

/// True when the guard should evaluate this path at all. Static assets are
/// filtered by shape, before any identity work.
pub fn intercepts(path: &str) -> bool {
    !ASSET_PATTERN.is_match(path)
}

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// What the guard knows about the caller once the gateway has validated the
/// token. Pure data so decisions stay testable without a running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: Uuid,
    pub email: Option<String>,
    pub provider: Provider,
    pub has_password: bool,
}

impl From<&Identity> for CallerIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            provider: identity.provider,
            has_password: identity.has_password,
        }
    }
}

impl CallerIdentity {
    /// Email-provider accounts that never finished password setup are sent
    /// to the profile page to complete it.
    fn needs_password_setup(&self) -> bool {
        self.provider.is_email() && !self.has_password
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    PassThrough,
    Redirect(&'static str),
}

/// Applies the route-guard decision table to one request path.
///
/// Order matters: exemptions before identity, password setup before role
/// placement. A failed role lookup logs and passes the request through, so
/// a flaky profile store degrades navigation instead of locking everyone
/// out.
pub async fn decide(path: &str, caller: Option<&CallerIdentity>, roles: &dyn ProfileRepository) -> GuardDecision {
    if is_exempt(path) {
        return GuardDecision::PassThrough;
    }

    let Some(caller) = caller else {
        if path.starts_with(OWNER_HOME) {
            return GuardDecision::Redirect(LOGIN_PATH);
        }
        return GuardDecision::PassThrough;
    };

    if caller.needs_password_setup() {
        return GuardDecision::Redirect(PROFILE_PATH);
    }

    let role = match roles.role_by_id(&caller.id).await {
        Ok(role) => role,
        Err(e) => {
            warn!(error = %e, user = %caller.id, path, "role lookup failed, letting the request through");
            return GuardDecision::PassThrough;
        }
    };

    match role {
        Some(Role::Owner) if path == APP_ROOT => GuardDecision::Redirect(OWNER_HOME),
        Some(Role::Owner) => GuardDecision::PassThrough,
        _ if path.starts_with(OWNER_HOME) => GuardDecision::Redirect(APP_ROOT),
        _ => GuardDecision::PassThrough,
    }
}
