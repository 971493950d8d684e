use crate::config::GatewayConfig;
use crate::error::app_error::AppError;
use crate::gateway::{AuthEvent, AuthNotification, AuthSubscription, IdentityGateway, pkce};
use crate::models::identity::{AuthorizeRequest, Identity, OAuthProvider, Provider, Session};
use crate::models::profile::Role;
use crate::models::status::AccountStatus;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Client for the hosted identity gateway's REST surface.
///
/// Holds the session it last obtained and fans every lifecycle change out
/// to subscribers. The publishable key authenticates ordinary calls; the
/// service key is attached only to the admin surface (status lookups, the
/// password RPC).
pub struct HttpIdentityGateway {
    config: GatewayConfig,
    http: reqwest::Client,
    state: Mutex<ClientState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthNotification>>>,
}

#[derive(Default)]
struct ClientState {
    session: Option<Session>,
    pkce_verifier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    app_metadata: Value,
    #[serde(default)]
    user_metadata: Value,
}

impl WireUser {
    fn into_identity(self) -> Identity {
        let provider = Provider::from_label(self.app_metadata.get("provider").and_then(Value::as_str));
        let has_password = self.app_metadata.get("has_password").and_then(Value::as_bool).unwrap_or(false);
        Identity {
            id: self.id,
            email: self.email,
            provider,
            has_password,
            attributes: self.user_metadata,
        }
    }
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            expires_at: Utc::now() + chrono::Duration::seconds(self.expires_in),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            identity: self.user.into_identity(),
        }
    }
}

async fn ensure_success(operation: &'static str, response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(AppError::gateway(operation, Some(status.as_u16()), detail))
}

impl HttpIdentityGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_seconds)).build()?;

        Ok(Self {
            config,
            http,
            state: Mutex::new(ClientState::default()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn rpc_endpoint(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.config.url.trim_end_matches('/'), name)
    }

    fn function_endpoint(&self, name: &str) -> String {
        format!("{}/functions/v1/{}", self.config.url.trim_end_matches('/'), name)
    }

    fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<AuthNotification>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_session(&self, session: Session) {
        self.lock_state().session = Some(session);
    }

    fn emit(&self, event: AuthEvent, session: Option<Session>) {
        let notification = AuthNotification { event, session };
        // Drop subscribers whose receiving end is gone
        self.lock_subscribers().retain(|tx| tx.send(notification.clone()).is_ok());
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        let cached = self.lock_state().session.clone();
        match cached {
            Some(session) if !session.is_expired() => Ok(Some(session)),
            Some(_) => self.refresh_session().await,
            None => Ok(None),
        }
    }

    fn authorize_url(&self, provider: OAuthProvider) -> AuthorizeRequest {
        let verifier = pkce::code_verifier();
        let challenge = pkce::code_challenge(&verifier);
        let state = pkce::state_token();

        let url = format!(
            "{}?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=S256&state={}",
            self.auth_endpoint("authorize"),
            provider.label(),
            urlencoding::encode(&self.config.redirect_url),
            challenge,
            state,
        );

        // Kept for the code exchange after the provider redirects back
        self.lock_state().pkce_verifier = Some(verifier.clone());

        AuthorizeRequest {
            url,
            state,
            code_verifier: verifier,
        }
    }

    async fn send_email_link(&self, email: &str, full_name: &str, role: Role) -> Result<(), AppError> {
        let body = json!({
            "email": email,
            "create_user": true,
            "data": { "full_name": full_name, "role": role.as_str() },
        });

        let response = self
            .http
            .post(self.auth_endpoint("otp"))
            .query(&[("redirect_to", self.config.redirect_url.as_str())])
            .header("apikey", &self.config.publishable_key)
            .json(&body)
            .send()
            .await?;

        ensure_success("send email link", response).await?;
        Ok(())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let response = self
            .http
            .post(self.auth_endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.publishable_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST || response.status() == StatusCode::UNAUTHORIZED {
            return Err(AppError::InvalidCredentials);
        }

        let token: TokenResponse = ensure_success("password grant", response).await?.json().await?;
        let session = token.into_session();
        self.store_session(session.clone());
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn exchange_code(&self, code: &str) -> Result<Session, AppError> {
        let verifier = self.lock_state().pkce_verifier.take();

        let mut body = json!({ "auth_code": code });
        if let Some(verifier) = verifier {
            body["code_verifier"] = Value::String(verifier);
        }

        let response = self
            .http
            .post(self.auth_endpoint("token"))
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.config.publishable_key)
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = ensure_success("code exchange", response).await?.json().await?;
        let session = token.into_session();
        self.store_session(session.clone());
        self.emit(AuthEvent::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn identity_for(&self, access_token: &str) -> Result<Option<Identity>, AppError> {
        let response = self
            .http
            .get(self.auth_endpoint("user"))
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let user: WireUser = response.json().await?;
            return Ok(Some(user.into_identity()));
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            _ => {
                let detail = response.text().await.unwrap_or_default();
                Err(AppError::gateway("fetch user", Some(status.as_u16()), detail))
            }
        }
    }

    async fn update_attributes(&self, attributes: Value) -> Result<(), AppError> {
        let token = self.lock_state().session.as_ref().map(|s| s.access_token.clone());
        let token = token.ok_or(AppError::Unauthorized)?;

        let response = self
            .http
            .put(self.auth_endpoint("user"))
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(&token)
            .json(&json!({ "data": attributes }))
            .send()
            .await?;

        ensure_success("update attributes", response).await?;
        self.emit(AuthEvent::UserUpdated, self.lock_state().session.clone());
        Ok(())
    }

    async fn set_password(&self, user_id: &Uuid, new_password: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.rpc_endpoint("update_user_password_and_metadata"))
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(&self.config.service_key)
            .json(&json!({ "user_id": user_id, "new_password": new_password }))
            .send()
            .await?;

        ensure_success("password rpc", response).await?;
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, AppError> {
        let refresh_token = self.lock_state().session.as_ref().map(|s| s.refresh_token.clone());
        let Some(refresh_token) = refresh_token else {
            return Ok(None);
        };

        let response = self
            .http
            .post(self.auth_endpoint("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.config.publishable_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let token: TokenResponse = ensure_success("token refresh", response).await?.json().await?;
        let session = token.into_session();
        self.store_session(session.clone());
        self.emit(AuthEvent::TokenRefreshed, Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let token = self.lock_state().session.as_ref().map(|s| s.access_token.clone());
        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .http
            .post(self.auth_endpoint("logout"))
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(&token)
            .send()
            .await?;

        // Local state stays untouched when revocation fails
        ensure_success("logout", response).await?;
        self.lock_state().session = None;
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn account_status(&self, user_id: &Uuid) -> Result<AccountStatus, AppError> {
        let response = self
            .http
            .post(self.function_endpoint(&self.config.status_function))
            .header("apikey", &self.config.publishable_key)
            .bearer_auth(&self.config.service_key)
            .json(&json!({ "user_id": user_id }))
            .send()
            .await?;

        let status: AccountStatus = ensure_success("account status", response).await?.json().await?;
        Ok(status)
    }

    fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let current = self.lock_state().session.clone();
        // Replay current state so a late subscriber starts consistent
        let _ = tx.send(AuthNotification {
            event: AuthEvent::InitialSession,
            session: current,
        });
        self.lock_subscribers().push(tx);
        AuthSubscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> HttpIdentityGateway {
        HttpIdentityGateway::new(GatewayConfig::default()).expect("client")
    }

    #[test]
    fn authorize_url_carries_pkce_parameters() {
        let gateway = gateway();
        let request = gateway.authorize_url(OAuthProvider::Google);

        assert!(request.url.contains("provider=google"));
        assert!(request.url.contains("code_challenge_method=S256"));
        assert!(request.url.contains(&format!("state={}", request.state)));
        assert!(request.url.contains(&pkce::code_challenge(&request.code_verifier)));
        // The verifier is retained for the later exchange
        assert_eq!(gateway.lock_state().pkce_verifier.as_deref(), Some(request.code_verifier.as_str()));
    }

    #[test]
    fn authorize_url_facebook_label() {
        let request = gateway().authorize_url(OAuthProvider::Facebook);
        assert!(request.url.contains("provider=facebook"));
    }

    #[rocket::async_test]
    async fn subscribe_replays_current_state_first() {
        let gateway = gateway();
        let mut subscription = gateway.subscribe();

        let replay = subscription.next().await.expect("replay");
        assert_eq!(replay.event, AuthEvent::InitialSession);
        assert!(replay.session.is_none());

        gateway.emit(AuthEvent::SignedOut, None);
        let next = subscription.next().await.expect("event");
        assert_eq!(next.event, AuthEvent::SignedOut);
    }

    #[rocket::async_test]
    async fn emit_prunes_dropped_subscribers() {
        let gateway = gateway();
        let subscription = gateway.subscribe();
        drop(subscription);

        gateway.emit(AuthEvent::SignedOut, None);
        assert!(gateway.lock_subscribers().is_empty());
    }

    #[test]
    fn wire_user_maps_metadata() {
        let user: WireUser = serde_json::from_value(json!({
            "id": "8f9f3a2e-0c4f-4a10-9b3f-94a0b8b7f0aa",
            "email": "owner@example.com",
            "app_metadata": { "provider": "google", "has_password": false },
            "user_metadata": { "full_name": "Owner" },
        }))
        .expect("wire user");

        let identity = user.into_identity();
        assert_eq!(identity.provider, Provider::Google);
        assert!(!identity.has_password);
        assert_eq!(identity.attributes["full_name"], "Owner");
    }

    #[test]
    fn wire_user_defaults_without_metadata() {
        let user: WireUser = serde_json::from_value(json!({
            "id": "8f9f3a2e-0c4f-4a10-9b3f-94a0b8b7f0aa",
            "email": "plain@example.com",
        }))
        .expect("wire user");

        let identity = user.into_identity();
        assert_eq!(identity.provider, Provider::Email);
        assert!(!identity.has_password);
    }

    #[test]
    fn token_response_expiry_is_in_the_future() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": { "id": "8f9f3a2e-0c4f-4a10-9b3f-94a0b8b7f0aa" },
        }))
        .expect("token response");

        let session = token.into_session();
        assert!(!session.is_expired());
        assert_eq!(session.access_token, "at");
    }

    #[rocket::async_test]
    #[ignore = "requires a live identity gateway"]
    async fn live_password_grant_rejects_unknown_credentials() {
        // Requires the gateway stack at localhost:54321
        let gateway = HttpIdentityGateway::new(GatewayConfig::default()).expect("client");

        let result = gateway.sign_in_with_password("nobody@example.com", "wrong-password").await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }
}
