use crate::config::Config;
use crate::error::app_error::AppError;
use crate::gateway::IdentityGateway;
use crate::guard::CallerIdentity;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use std::sync::Arc;

pub(crate) fn parse_bearer_header(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Access token for the current request: the Authorization header wins,
/// then the private session cookie.
fn access_token(req: &Request<'_>, config: &Config) -> Option<String> {
    if let Some(header) = req.headers().get_one("Authorization")
        && let Some(token) = parse_bearer_header(header)
    {
        return Some(token.to_string());
    }
    req.cookies()
        .get_private(&config.gateway.access_cookie)
        .map(|cookie| cookie.value().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CallerIdentity {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let (Some(config), Some(gateway)) = (
            req.rocket().state::<Config>(),
            req.rocket().state::<Arc<dyn IdentityGateway>>(),
        ) else {
            return Outcome::Error((Status::InternalServerError, AppError::Unauthorized));
        };

        let Some(token) = access_token(req, config) else {
            return Outcome::Error((Status::Unauthorized, AppError::InvalidCredentials));
        };

        // The gateway is the source of truth for token validity
        match gateway.identity_for(&token).await {
            Ok(Some(identity)) => {
                let caller = CallerIdentity::from(&identity);
                req.local_cache(|| Some(caller.clone()));
                Outcome::Success(caller)
            }
            Ok(None) => Outcome::Error((Status::Unauthorized, AppError::InvalidCredentials)),
            Err(err) => Outcome::Error((Status::InternalServerError, err)),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for CallerIdentity {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        let security_scheme = SecurityScheme {
            description: Some("Gateway access token, sent as a bearer header or via the private session cookie set by /auth/callback.".to_string()),
            data: SecuritySchemeData::Http {
                scheme: "bearer".to_string(),
                bearer_format: Some("JWT".to_string()),
            },
            extensions: Object::default(),
        };

        let mut security_req = SecurityRequirement::new();
        security_req.insert("bearerAuth".to_string(), Vec::new());

        Ok(RequestHeaderInput::Security("bearerAuth".to_string(), security_scheme, security_req))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response};
        let mut responses = Responses::default();
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(Response {
                description: "Unauthorized - Authentication required".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}
