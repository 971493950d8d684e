use crate::config::Config;
use crate::error::app_error::AppError;
use crate::gateway::IdentityGateway;
use crate::middleware::rate_limit::{AuthRateLimit, LookupRateLimit};
use crate::models::status::{EmailExistsResponse, EmailLookup, EmailStatus, RoleLookup};
use crate::service::directory::AccountDirectory;
use rocket::http::{Cookie, CookieJar};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{State, get, routes};
use rocket_okapi::openapi;
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

/// Where the browser lands when an exchange cannot produce a session.
pub const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";

/// Confines the post-login redirect to a local path. Scheme-relative
/// (`//host`) and absolute URLs fall back to the app root.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => crate::guard::APP_ROOT,
    }
}

#[get("/callback?<code>&<next>")]
pub async fn callback(
    _rate_limit: AuthRateLimit,
    code: Option<&str>,
    next: Option<&str>,
    config: &State<Config>,
    gateway: &State<Arc<dyn IdentityGateway>>,
    cookies: &CookieJar<'_>,
) -> Redirect {
    let Some(code) = code else {
        return Redirect::to(AUTH_CODE_ERROR_PATH);
    };

    match gateway.exchange_code(code).await {
        Ok(session) => {
            cookies.add_private(
                Cookie::build((config.gateway.access_cookie.clone(), session.access_token.clone()))
                    .path("/")
                    .build(),
            );
            cookies.add_private(
                Cookie::build((config.gateway.refresh_cookie.clone(), session.refresh_token.clone()))
                    .path("/")
                    .build(),
            );
            info!(user = %session.identity.id, "authorization code exchanged");
            Redirect::to(safe_next(next).to_string())
        }
        Err(e) => {
            error!(error = %e, "authorization code exchange failed");
            Redirect::to(AUTH_CODE_ERROR_PATH)
        }
    }
}

/// Whether an account exists for the given email address
#[openapi(tag = "Account Lookup")]
#[get("/lookup/exists?<email>")]
pub async fn email_exists(
    _rate_limit: LookupRateLimit,
    email: &str,
    directory: &State<AccountDirectory>,
) -> Result<Json<EmailExistsResponse>, AppError> {
    let lookup = EmailLookup::new(email);
    lookup.validate()?;

    let exists = directory.email_exists(&lookup.email).await?;
    Ok(Json(EmailExistsResponse { exists }))
}

/// Role assigned to the account behind an email address, if any
#[openapi(tag = "Account Lookup")]
#[get("/lookup/role?<email>")]
pub async fn email_role(
    _rate_limit: LookupRateLimit,
    email: &str,
    directory: &State<AccountDirectory>,
) -> Result<Json<RoleLookup>, AppError> {
    let lookup = EmailLookup::new(email);
    lookup.validate()?;

    Ok(Json(directory.role_for_email(&lookup.email).await?))
}

/// Registration, verification and password status for an email address
#[openapi(tag = "Account Lookup")]
#[get("/lookup/status?<email>")]
pub async fn email_status(
    _rate_limit: LookupRateLimit,
    email: &str,
    directory: &State<AccountDirectory>,
) -> Result<Json<EmailStatus>, AppError> {
    let lookup = EmailLookup::new(email);
    lookup.validate()?;

    Ok(Json(directory.email_status(&lookup.email).await?))
}

pub fn api_routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![email_exists, email_role, email_status]
}

pub fn callback_routes() -> Vec<rocket::Route> {
    routes![callback]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::Role;
    use crate::test_utils::{MockGateway, MockProfiles, client_with, sample_identity, sample_profile, sample_session};
    use crate::models::identity::Provider;
    use rocket::http::Status;
    use uuid::Uuid;

    #[test]
    fn next_paths_are_confined_to_the_app() {
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("/owner")), "/owner");
        assert_eq!(safe_next(Some("/profile?tab=password")), "/profile?tab=password");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("")), "/");
    }

    #[rocket::async_test]
    async fn callback_without_code_lands_on_the_error_page() {
        let (client, _fixtures) = client_with(MockGateway::default(), MockProfiles::default()).await;

        let response = client.get("/auth/callback").dispatch().await;

        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some(AUTH_CODE_ERROR_PATH));
    }

    #[rocket::async_test]
    async fn callback_exchanges_code_and_sets_session_cookies() {
        let gateway = MockGateway::default();
        let session = sample_session(sample_identity(Uuid::new_v4(), Provider::Google, false));
        gateway.set_exchange_result(session);

        let (client, _fixtures) = client_with(gateway, MockProfiles::default()).await;
        let response = client.get("/auth/callback?code=abc&next=/owner").dispatch().await;

        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/owner"));

        let cookies: Vec<_> = response.cookies().iter().map(|c| c.name().to_string()).collect();
        assert!(cookies.contains(&"sg_access".to_string()));
        assert!(cookies.contains(&"sg_refresh".to_string()));
    }

    #[rocket::async_test]
    async fn callback_rejects_offsite_next_targets() {
        let gateway = MockGateway::default();
        let session = sample_session(sample_identity(Uuid::new_v4(), Provider::Google, false));
        gateway.set_exchange_result(session);

        let (client, _fixtures) = client_with(gateway, MockProfiles::default()).await;
        let response = client.get("/auth/callback?code=abc&next=//evil.example").dispatch().await;

        assert_eq!(response.headers().get_one("Location"), Some("/"));
    }

    #[rocket::async_test]
    async fn failed_exchange_lands_on_the_error_page() {
        // Exchange result left unprogrammed, the mock fails the call
        let (client, _fixtures) = client_with(MockGateway::default(), MockProfiles::default()).await;

        let response = client.get("/auth/callback?code=expired").dispatch().await;

        assert_eq!(response.headers().get_one("Location"), Some(AUTH_CODE_ERROR_PATH));
    }

    #[rocket::async_test]
    async fn exists_lookup_reports_known_addresses() {
        let profiles = MockProfiles::default();
        let profile = sample_profile(Some(Role::Traveler));
        let email = profile.email.clone();
        profiles.insert(profile);

        let (client, _fixtures) = client_with(MockGateway::default(), profiles).await;

        let response = client.get(format!("/auth/lookup/exists?email={email}")).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!(body["exists"], true);

        let response = client.get("/auth/lookup/exists?email=nobody@example.com").dispatch().await;
        let body: serde_json::Value = response.into_json().await.unwrap();
        assert_eq!(body["exists"], false);
    }

    #[rocket::async_test]
    async fn lookups_reject_malformed_addresses() {
        let (client, _fixtures) = client_with(MockGateway::default(), MockProfiles::default()).await;

        let response = client.get("/auth/lookup/exists?email=not-an-email").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client.get("/auth/lookup/role?email=not-an-email").dispatch().await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn role_lookup_distinguishes_absent_from_unassigned() {
        let profiles = MockProfiles::default();
        let assigned = sample_profile(Some(Role::Owner));
        let unassigned = sample_profile(None);
        let assigned_email = assigned.email.clone();
        let unassigned_email = unassigned.email.clone();
        profiles.insert(assigned);
        profiles.insert(unassigned);

        let (client, _fixtures) = client_with(MockGateway::default(), profiles).await;

        let body: serde_json::Value = client
            .get(format!("/auth/lookup/role?email={assigned_email}"))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(body["exists"], true);
        assert_eq!(body["role"], "owner");

        let body: serde_json::Value = client
            .get(format!("/auth/lookup/role?email={unassigned_email}"))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(body["exists"], true);
        assert_eq!(body["role"], serde_json::Value::Null);

        let body: serde_json::Value = client
            .get("/auth/lookup/role?email=nobody@example.com")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(body["exists"], false);
    }

    #[rocket::async_test]
    async fn status_lookup_combines_directory_and_gateway() {
        let gateway = MockGateway::default();
        let profiles = MockProfiles::default();
        let profile = sample_profile(Some(Role::Traveler));
        let email = profile.email.clone();
        gateway.set_account_status(profile.id, Some(chrono::Utc::now()), true);
        profiles.insert(profile);

        let (client, _fixtures) = client_with(gateway, profiles).await;

        let body: serde_json::Value = client
            .get(format!("/auth/lookup/status?email={email}"))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(body["exists"], true);
        assert_eq!(body["verified"], true);
        assert_eq!(body["has_password"], true);

        let body: serde_json::Value = client
            .get("/auth/lookup/status?email=nobody@example.com")
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(body["exists"], false);
        assert_eq!(body["verified"], false);
    }

    #[rocket::async_test]
    async fn repository_failure_surfaces_as_bad_gateway() {
        let profiles = MockProfiles::default();
        profiles.fail_email_lookups();

        let (client, _fixtures) = client_with(MockGateway::default(), profiles).await;

        let response = client.get("/auth/lookup/exists?email=user@example.com").dispatch().await;
        assert_eq!(response.status(), Status::BadGateway);
    }
}
