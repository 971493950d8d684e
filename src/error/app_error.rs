use rocket::http::Status;
use rocket::response::Responder;
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use std::io::Cursor;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Identity gateway error")]
    Gateway {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("Booking service error")]
    Backend {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
    #[error("Upstream request failed")]
    Http {
        message: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Password too weak: {0}")]
    WeakPassword(String),
    #[error("File exceeds {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),
    #[error("Internal server error")]
    PendingRoleStore {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),
    #[error("Internal server error")]
    ConfigurationError {
        message: String,
        #[source]
        source: figment::Error,
    },
}

impl AppError {
    pub fn gateway(operation: &'static str, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Gateway {
            operation,
            status,
            detail: detail.into(),
        }
    }

    pub fn backend(operation: &'static str, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::Backend {
            operation,
            status,
            detail: detail.into(),
        }
    }

    pub fn pending_role_store(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::PendingRoleStore {
            message: message.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Http {
            message: "HTTP request failed".to_string(),
            source: e,
        }
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::Gateway { .. } => Status::BadGateway,
            AppError::Backend { .. } => Status::BadGateway,
            AppError::Http { .. } => Status::BadGateway,
            AppError::Unauthorized => Status::Unauthorized,
            AppError::InvalidCredentials => Status::Forbidden,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::WeakPassword(_) => Status::BadRequest,
            AppError::FileTooLarge { .. } => Status::PayloadTooLarge,
            AppError::UnsupportedImageType(_) => Status::UnsupportedMediaType,
            AppError::PendingRoleStore { .. } => Status::InternalServerError,
            AppError::ValidationError(_) => Status::BadRequest,
            AppError::ConfigurationError { .. } => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        // Request context stashed by the logging fairing and the auth guard
        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.as_str())
            .unwrap_or("unknown");

        let caller = req
            .local_cache(|| None::<crate::guard::CallerIdentity>)
            .as_ref()
            .map(|c| c.id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        error!(
            error = ?self,
            request_id = %request_id,
            caller = %caller,
            method = %method,
            uri = %uri,
            "request failed"
        );

        let status = Status::from(&self);
        let body = self.to_string();

        Response::build().status(status).sized_body(body.len(), Cursor::new(body)).ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = Responses::default();
        responses.responses.insert(
            "400".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Bad Request".to_string(),
                ..Default::default()
            }),
        );
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Unauthorized".to_string(),
                ..Default::default()
            }),
        );
        responses.responses.insert(
            "404".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Not Found".to_string(),
                ..Default::default()
            }),
        );
        responses.responses.insert(
            "502".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Bad Gateway".to_string(),
                ..Default::default()
            }),
        );
        responses.responses.insert(
            "500".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "Internal Server Error".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}
