use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::auth::parse_bearer_header;
use crate::config::{Config, RateLimitConfig};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;

/// Email lookups are cheap probes and deserve a tighter budget than page
/// traffic; callback exchanges are the expensive gateway round-trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RateLimitBucket {
    Lookup,
    Auth,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RateLimitIdentity {
    Ip(String),
    Token(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RateLimitKey {
    identity: RateLimitIdentity,
    bucket: RateLimitBucket,
}

#[derive(Debug, Clone)]
struct Counter {
    window_start: Instant,
    count: u32,
}

#[derive(Debug)]
pub(crate) struct RateLimiter {
    config: RateLimitConfig,
    window: Duration,
    cleanup_interval: Duration,
    counters: Mutex<HashMap<RateLimitKey, Counter>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let window = Duration::from_secs(config.window_seconds.max(1));
        let cleanup_interval = Duration::from_secs(config.cleanup_interval_seconds.max(1));

        Self {
            config,
            window,
            cleanup_interval,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn spawn_cleanup_task(self: Arc<Self>) {
        let cleanup_interval = self.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let window = self.window;
                let mut counters = self.counters.lock().await;
                counters.retain(|_, counter| now.duration_since(counter.window_start) < window);
            }
        });
    }

    async fn check(&self, identities: &[RateLimitIdentity], bucket: RateLimitBucket) -> RateLimitDecision {
        if identities.is_empty() {
            return RateLimitDecision::Allow;
        }

        // NOTE: fixed-window counter; bursts can exceed the limit near window boundaries.
        let limit = self.limit_for_bucket(bucket);
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        let mut retry_after: Option<Duration> = None;

        for identity in identities {
            let key = RateLimitKey {
                identity: identity.clone(),
                bucket,
            };
            let counter = counters.entry(key).or_insert_with(|| Counter { window_start: now, count: 0 });

            if now.duration_since(counter.window_start) >= self.window {
                counter.window_start = now;
                counter.count = 0;
            }

            if counter.count >= limit {
                let elapsed = now.duration_since(counter.window_start);
                let remaining = self.window.saturating_sub(elapsed);
                retry_after = Some(retry_after.map_or(remaining, |current| current.max(remaining)));
            }
        }

        if let Some(retry_after) = retry_after {
            return RateLimitDecision::Limited { retry_after };
        }

        for identity in identities {
            let key = RateLimitKey {
                identity: identity.clone(),
                bucket,
            };
            if let Some(counter) = counters.get_mut(&key) {
                counter.count += 1;
            }
        }

        RateLimitDecision::Allow
    }

    fn limit_for_bucket(&self, bucket: RateLimitBucket) -> u32 {
        match bucket {
            RateLimitBucket::Lookup => self.config.lookup_limit,
            RateLimitBucket::Auth => self.config.auth_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateLimitDecision {
    Allow,
    Limited { retry_after: Duration },
}

/// Guard for the email lookup endpoints.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LookupRateLimit;

/// Guard for the OAuth callback exchange.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthRateLimit;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimitRetryAfter(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RateLimitError {
    TooManyRequests,
    MissingClientIp,
}

impl RateLimitError {
    fn status(self) -> Status {
        match self {
            RateLimitError::TooManyRequests => Status::TooManyRequests,
            RateLimitError::MissingClientIp => Status::BadRequest,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for LookupRateLimit {
    type Error = RateLimitError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match rate_limit_request(request, RateLimitBucket::Lookup).await {
            Outcome::Success(_) => Outcome::Success(LookupRateLimit),
            Outcome::Error(error) => Outcome::Error(error),
            Outcome::Forward(status) => Outcome::Forward(status),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthRateLimit {
    type Error = RateLimitError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match rate_limit_request(request, RateLimitBucket::Auth).await {
            Outcome::Success(_) => Outcome::Success(AuthRateLimit),
            Outcome::Error(error) => Outcome::Error(error),
            Outcome::Forward(status) => Outcome::Forward(status),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for LookupRateLimit {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        too_many_requests_response()
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthRateLimit {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        too_many_requests_response()
    }
}

async fn rate_limit_request(request: &Request<'_>, bucket: RateLimitBucket) -> Outcome<(), RateLimitError> {
    let limiter = match request.rocket().state::<Arc<RateLimiter>>() {
        Some(limiter) => limiter,
        None => return Outcome::Success(()),
    };

    let request_id = request
        .local_cache(|| None::<crate::middleware::RequestId>)
        .as_ref()
        .map(|r| r.0.as_str())
        .unwrap_or("unknown");

    let ip = request.client_ip().map(|addr| addr.to_string());
    if ip.is_none() {
        warn!(
            request_id = %request_id,
            method = %request.method(),
            uri = %request.uri(),
            "client ip unavailable for rate limiting"
        );
    }

    let mut identities = Vec::new();
    if let Some(ip) = ip {
        identities.push(RateLimitIdentity::Ip(ip));
    }
    if let Some(fingerprint) = token_fingerprint(request) {
        identities.push(RateLimitIdentity::Token(fingerprint));
    }

    if identities.is_empty() {
        if limiter.config.require_client_ip {
            return Outcome::Error((RateLimitError::MissingClientIp.status(), RateLimitError::MissingClientIp));
        }
        identities.push(RateLimitIdentity::Ip("missing-ip".to_string()));
    }

    match limiter.check(&identities, bucket).await {
        RateLimitDecision::Allow => Outcome::Success(()),
        RateLimitDecision::Limited { retry_after } => {
            let retry_after_secs = retry_after.as_secs().max(1);
            request.local_cache(|| Some(RateLimitRetryAfter(retry_after_secs)));
            warn!(
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                retry_after_secs = %retry_after_secs,
                "rate limit exceeded"
            );
            Outcome::Error((RateLimitError::TooManyRequests.status(), RateLimitError::TooManyRequests))
        }
    }
}

/// Short hash of the presented access token, so signed-in callers behind a
/// shared NAT do not pool into one ip budget. The raw token never lands in
/// the counter map.
fn token_fingerprint(request: &Request<'_>) -> Option<String> {
    let token = if let Some(header) = request.headers().get_one("Authorization") {
        parse_bearer_header(header)?.to_string()
    } else {
        let cookie_name = request.rocket().state::<Config>().map(|config| config.gateway.access_cookie.clone())?;
        request.cookies().get_private(&cookie_name)?.value().to_string()
    };
    Some(fingerprint(&token))
}

fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..8])
}

fn too_many_requests_response() -> rocket_okapi::Result<Responses> {
    let mut responses = Responses::default();
    responses.responses.insert(
        "429".to_string(),
        RefOr::Object(OpenApiResponse {
            description: "Too Many Requests".to_string(),
            ..Default::default()
        }),
    );
    Ok(responses)
}
