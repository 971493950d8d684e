use crate::config::Config;
use crate::error::app_error::AppError;
use crate::gateway::{AuthEvent, AuthNotification, AuthSubscription, IdentityGateway};
use crate::models::identity::{AuthorizeRequest, Identity, OAuthProvider, Provider, Session};
use crate::models::profile::{Role, UserProfile};
use crate::models::status::{AccountStatus, RoleLookup};
use crate::repository::ProfileRepository;
use crate::service::pending::PendingRoleStore;
use crate::service::session::Navigator;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocket::local::asynchronous::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn sample_profile(role: Option<Role>) -> UserProfile {
    let id = Uuid::new_v4();
    UserProfile {
        id,
        name: "Alex Example".to_string(),
        email: format!("user-{id}@example.com"),
        role,
        profile_picture: None,
        phone: None,
        address: None,
        created_at: Some(Utc::now()),
        updated_at: None,
    }
}

pub fn sample_identity(id: Uuid, provider: Provider, has_password: bool) -> Identity {
    Identity {
        id,
        email: Some(format!("user-{id}@example.com")),
        provider,
        has_password,
        attributes: serde_json::json!({}),
    }
}

pub fn sample_session(identity: Identity) -> Session {
    Session {
        access_token: format!("access-{}", Uuid::new_v4()),
        refresh_token: format!("refresh-{}", Uuid::new_v4()),
        expires_at: Utc::now() + chrono::Duration::hours(1),
        identity,
    }
}

/// Scriptable gateway double. Every call is a plain table lookup; anything
/// not programmed fails, so tests state exactly what they rely on.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<GatewayState>,
}

#[derive(Default)]
struct GatewayState {
    current_session: Option<Session>,
    fail_session_fetch: bool,
    refresh_result: Option<Session>,
    exchange_result: Option<Session>,
    password_session: Option<Session>,
    tokens: HashMap<String, Identity>,
    statuses: HashMap<Uuid, AccountStatus>,
    email_links: Vec<(String, String, Role)>,
    attribute_writes: Vec<Value>,
    fail_attribute_updates: bool,
    password_sets: Vec<Uuid>,
    fail_sign_out: bool,
    subscribers: Vec<mpsc::UnboundedSender<AuthNotification>>,
}

impl MockGateway {
    pub fn set_current_session(&self, session: Option<Session>) {
        lock(&self.state).current_session = session;
    }

    pub fn fail_session_fetch(&self) {
        lock(&self.state).fail_session_fetch = true;
    }

    pub fn set_refresh_result(&self, session: Option<Session>) {
        lock(&self.state).refresh_result = session;
    }

    pub fn set_exchange_result(&self, session: Session) {
        lock(&self.state).exchange_result = Some(session);
    }

    pub fn set_password_sign_in(&self, session: Session) {
        lock(&self.state).password_session = Some(session);
    }

    pub fn insert_token(&self, token: &str, identity: Identity) {
        lock(&self.state).tokens.insert(token.to_string(), identity);
    }

    pub fn set_account_status(&self, id: Uuid, email_confirmed_at: Option<DateTime<Utc>>, has_password: bool) {
        lock(&self.state).statuses.insert(
            id,
            AccountStatus {
                email_confirmed_at,
                has_password,
            },
        );
    }

    pub fn fail_attribute_updates(&self) {
        lock(&self.state).fail_attribute_updates = true;
    }

    pub fn fail_sign_out(&self) {
        lock(&self.state).fail_sign_out = true;
    }

    pub fn email_links(&self) -> Vec<(String, String, Role)> {
        lock(&self.state).email_links.clone()
    }

    pub fn attribute_writes(&self) -> Vec<Value> {
        lock(&self.state).attribute_writes.clone()
    }

    pub fn password_sets(&self) -> Vec<Uuid> {
        lock(&self.state).password_sets.clone()
    }

    /// Pushes a notification to every live subscriber, like the real
    /// gateway does after an auth transition.
    pub fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let mut state = lock(&self.state);
        state.current_session = session.clone();
        state
            .subscribers
            .retain(|tx| tx.send(AuthNotification { event, session: session.clone() }).is_ok());
    }
}

#[async_trait]
impl IdentityGateway for MockGateway {
    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        let state = lock(&self.state);
        if state.fail_session_fetch {
            return Err(AppError::gateway("current session", None, "injected failure"));
        }
        Ok(state.current_session.clone())
    }

    fn authorize_url(&self, provider: OAuthProvider) -> AuthorizeRequest {
        AuthorizeRequest {
            url: format!("https://gateway.test/authorize?provider={}", provider.label()),
            state: "test-state".to_string(),
            code_verifier: "test-verifier".to_string(),
        }
    }

    async fn send_email_link(&self, email: &str, full_name: &str, role: Role) -> Result<(), AppError> {
        lock(&self.state).email_links.push((email.to_string(), full_name.to_string(), role));
        Ok(())
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Session, AppError> {
        match lock(&self.state).password_session.clone() {
            Some(session) => Ok(session),
            None => Err(AppError::InvalidCredentials),
        }
    }

    async fn exchange_code(&self, _code: &str) -> Result<Session, AppError> {
        match lock(&self.state).exchange_result.clone() {
            Some(session) => Ok(session),
            None => Err(AppError::gateway("exchange code", Some(400), "no exchange result programmed")),
        }
    }

    async fn identity_for(&self, access_token: &str) -> Result<Option<Identity>, AppError> {
        Ok(lock(&self.state).tokens.get(access_token).cloned())
    }

    async fn update_attributes(&self, attributes: Value) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        if state.fail_attribute_updates {
            return Err(AppError::gateway("update attributes", Some(500), "injected failure"));
        }
        state.attribute_writes.push(attributes);
        Ok(())
    }

    async fn set_password(&self, user_id: &Uuid, _new_password: &str) -> Result<(), AppError> {
        lock(&self.state).password_sets.push(*user_id);
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, AppError> {
        Ok(lock(&self.state).refresh_result.clone())
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        if lock(&self.state).fail_sign_out {
            return Err(AppError::gateway("sign out", Some(500), "injected failure"));
        }
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn account_status(&self, user_id: &Uuid) -> Result<AccountStatus, AppError> {
        match lock(&self.state).statuses.get(user_id).cloned() {
            Some(status) => Ok(status),
            None => Err(AppError::gateway("account status", Some(404), "no status programmed")),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        let replay = AuthNotification {
            event: AuthEvent::InitialSession,
            session: state.current_session.clone(),
        };
        let _ = tx.send(replay);
        state.subscribers.push(tx);
        AuthSubscription::new(rx)
    }
}

/// Profile repository double backed by a row list.
#[derive(Default)]
pub struct MockProfiles {
    state: Mutex<ProfilesState>,
}

#[derive(Default)]
struct ProfilesState {
    rows: Vec<UserProfile>,
    fail_email_lookups: bool,
    fail_profile_fetches: bool,
    fail_role_lookups: bool,
    role_writes: Vec<(Uuid, Role)>,
}

impl MockProfiles {
    pub fn insert(&self, profile: UserProfile) {
        lock(&self.state).rows.push(profile);
    }

    pub fn fail_email_lookups(&self) {
        lock(&self.state).fail_email_lookups = true;
    }

    pub fn fail_profile_fetches(&self) {
        lock(&self.state).fail_profile_fetches = true;
    }

    pub fn fail_role_lookups(&self) {
        lock(&self.state).fail_role_lookups = true;
    }

    pub fn role_writes(&self) -> Vec<(Uuid, Role)> {
        lock(&self.state).role_writes.clone()
    }
}

#[async_trait]
impl ProfileRepository for MockProfiles {
    async fn profile_by_id(&self, id: &Uuid) -> Result<Option<UserProfile>, AppError> {
        let state = lock(&self.state);
        if state.fail_profile_fetches {
            return Err(AppError::gateway("profile by id", None, "injected failure"));
        }
        Ok(state.rows.iter().find(|row| row.id == *id).cloned())
    }

    async fn profile_id_by_email(&self, email: &str) -> Result<Option<Uuid>, AppError> {
        let state = lock(&self.state);
        if state.fail_email_lookups {
            return Err(AppError::gateway("profile id by email", None, "injected failure"));
        }
        Ok(state.rows.iter().find(|row| row.email == email).map(|row| row.id))
    }

    async fn role_by_email(&self, email: &str) -> Result<RoleLookup, AppError> {
        let state = lock(&self.state);
        if state.fail_email_lookups {
            return Err(AppError::gateway("role by email", None, "injected failure"));
        }
        match state.rows.iter().find(|row| row.email == email) {
            Some(row) => Ok(RoleLookup {
                exists: true,
                role: row.role,
            }),
            None => Ok(RoleLookup {
                exists: false,
                role: None,
            }),
        }
    }

    async fn role_by_id(&self, id: &Uuid) -> Result<Option<Role>, AppError> {
        let state = lock(&self.state);
        if state.fail_role_lookups {
            return Err(AppError::gateway("role by id", None, "injected failure"));
        }
        Ok(state.rows.iter().find(|row| row.id == *id).and_then(|row| row.role))
    }

    async fn set_role(&self, id: &Uuid, role: Role) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        state.role_writes.push((*id, role));
        if let Some(row) = state.rows.iter_mut().find(|row| row.id == *id) {
            row.role = Some(role);
        }
        Ok(())
    }
}

/// In-memory pending-role store that counts clears.
#[derive(Default)]
pub struct MockPendingStore {
    state: Mutex<PendingState>,
}

#[derive(Default)]
struct PendingState {
    slot: Option<Role>,
    clear_count: usize,
    fail_loads: bool,
}

impl MockPendingStore {
    pub fn clear_count(&self) -> usize {
        lock(&self.state).clear_count
    }

    pub fn fail_loads(&self) {
        lock(&self.state).fail_loads = true;
    }
}

impl PendingRoleStore for MockPendingStore {
    fn load(&self) -> Result<Option<Role>, AppError> {
        let state = lock(&self.state);
        if state.fail_loads {
            return Err(AppError::pending_role_store("injected failure", std::io::Error::other("injected")));
        }
        Ok(state.slot)
    }

    fn save(&self, role: Role) -> Result<(), AppError> {
        lock(&self.state).slot = Some(role);
        Ok(())
    }

    fn clear(&self) -> Result<(), AppError> {
        let mut state = lock(&self.state);
        state.slot = None;
        state.clear_count += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn targets(&self) -> Vec<String> {
        lock(&self.targets).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        lock(&self.targets).push(target.to_string());
    }
}

pub struct TestFixtures {
    pub gateway: Arc<MockGateway>,
    pub profiles: Arc<MockProfiles>,
}

/// Full edge server over mocks, for route tests.
pub async fn client_with(gateway: MockGateway, profiles: MockProfiles) -> (Client, TestFixtures) {
    let gateway = Arc::new(gateway);
    let profiles = Arc::new(profiles);

    let rocket = crate::build_rocket(
        Config::default(),
        gateway.clone() as Arc<dyn IdentityGateway>,
        profiles.clone() as Arc<dyn ProfileRepository>,
    );
    let client = Client::tracked(rocket).await.expect("valid rocket instance");

    (client, TestFixtures { gateway, profiles })
}
