use crate::middleware::rate_limit::RateLimitRetryAfter;
use rocket::http::{Header, Status};
use rocket::response::Responder;
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, Response, catch};

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Error {
    pub message: String,
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<Error> {
    Json(Error {
        message: "Not found".to_string(),
    })
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> Json<Error> {
    Json(Error {
        message: "Authentication required".to_string(),
    })
}

#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> Json<Error> {
    Json(Error {
        message: "Malformed request".to_string(),
    })
}

pub struct TooManyRequests {
    retry_after: u64,
}

impl<'r> Responder<'r, 'static> for TooManyRequests {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let body = Json(Error {
            message: "Too many requests".to_string(),
        })
        .respond_to(req)?;

        Response::build_from(body)
            .status(Status::TooManyRequests)
            .header(Header::new("Retry-After", self.retry_after.to_string()))
            .ok()
    }
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequests {
    // The rate limiter leaves the remaining window in the request cache
    let retry_after = req
        .local_cache(|| None::<RateLimitRetryAfter>)
        .as_ref()
        .map(|r| r.0)
        .unwrap_or(60);

    TooManyRequests { retry_after }
}
