use crate::config::BookingConfig;
use crate::error::app_error::AppError;
use crate::models::booking::{
    ApiEnvelope, ApiMessage, PeakSeason, PeakSeasonRequest, PropertyDetail, PropertySearchParams,
    PropertySearchResponse, PropertySummary, RoomRequest, RoomSummary,
};
use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use validator::Validate;

/// Largest profile picture accepted before the request leaves the host.
pub const MAX_UPLOAD_BYTES: u64 = 1024 * 1024;

/// Image types the backend stores; everything else is rejected locally.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// Typed client for the booking backend. Owner endpoints take the caller's
/// access token; search and detail are public.
pub struct BookingApi {
    config: BookingConfig,
    http: reqwest::Client,
}

impl BookingApi {
    pub fn new(config: BookingConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Lists properties matching the public search filters.
    pub async fn search_properties(&self, params: &PropertySearchParams) -> Result<PropertySearchResponse, AppError> {
        let response = self
            .http
            .get(self.endpoint("/properties/search"))
            .query(&params.to_query())
            .send()
            .await?;
        read_body("search properties", response).await
    }

    /// Fetches one property with room availability for the requested stay.
    pub async fn property_detail(
        &self,
        property_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: u32,
    ) -> Result<PropertyDetail, AppError> {
        let response = self
            .http
            .get(self.endpoint("/properties/detail"))
            .query(&[
                ("property_id", property_id.to_string()),
                ("check_in", check_in.format("%Y-%m-%d").to_string()),
                ("check_out", check_out.format("%Y-%m-%d").to_string()),
                ("guests", guests.to_string()),
            ])
            .send()
            .await?;
        unwrap_envelope("property detail", response).await
    }

    /// All properties belonging to the caller, unpaginated.
    pub async fn my_properties(&self, access_token: &str) -> Result<Vec<PropertySummary>, AppError> {
        let response = self
            .http
            .get(self.endpoint("/properties/my-properties"))
            .query(&[("all", "true")])
            .bearer_auth(access_token)
            .send()
            .await?;
        unwrap_envelope("list properties", response).await
    }

    /// All rooms under one of the caller's properties, unpaginated.
    pub async fn my_rooms(&self, access_token: &str, property_id: i64) -> Result<Vec<RoomSummary>, AppError> {
        let response = self
            .http
            .get(self.endpoint("/properties/rooms/my-rooms"))
            .query(&[("property_id", property_id.to_string()), ("all", "true".to_string())])
            .bearer_auth(access_token)
            .send()
            .await?;
        unwrap_envelope("list rooms", response).await
    }

    pub async fn create_room(&self, access_token: &str, request: &RoomRequest) -> Result<(), AppError> {
        request.validate()?;
        let response = self
            .http
            .post(self.endpoint("/properties/rooms/create"))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;
        ensure_success("create room", response).await
    }

    pub async fn update_room(&self, access_token: &str, id: i64, request: &RoomRequest) -> Result<(), AppError> {
        request.validate()?;
        let response = self
            .http
            .put(self.endpoint(&format!("/properties/rooms/{id}")))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;
        ensure_success("update room", response).await
    }

    pub async fn delete_room(&self, access_token: &str, id: i64) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.endpoint(&format!("/properties/rooms/{id}")))
            .bearer_auth(access_token)
            .send()
            .await?;
        ensure_success("delete room", response).await
    }

    /// Peak seasons for a room overlapping the given month.
    pub async fn peak_seasons(&self, access_token: &str, room_id: i64, month: NaiveDate) -> Result<Vec<PeakSeason>, AppError> {
        let response = self
            .http
            .get(self.endpoint("/properties/rooms/peak-season"))
            .query(&[("room_id", room_id.to_string()), ("month", month.format("%Y-%m").to_string())])
            .bearer_auth(access_token)
            .send()
            .await?;
        unwrap_envelope("list peak seasons", response).await
    }

    pub async fn create_peak_season(&self, access_token: &str, request: &PeakSeasonRequest) -> Result<(), AppError> {
        request.validate()?;
        let response = self
            .http
            .post(self.endpoint("/properties/rooms/peak-season"))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;
        ensure_success("create peak season", response).await
    }

    pub async fn update_peak_season(&self, access_token: &str, id: i64, request: &PeakSeasonRequest) -> Result<(), AppError> {
        request.validate()?;
        let response = self
            .http
            .put(self.endpoint(&format!("/properties/rooms/peak-season/{id}")))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await?;
        ensure_success("update peak season", response).await
    }

    pub async fn delete_peak_season(&self, access_token: &str, id: i64) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.endpoint(&format!("/properties/rooms/peak-season/{id}")))
            .bearer_auth(access_token)
            .send()
            .await?;
        ensure_success("delete peak season", response).await
    }

    /// Uploads a profile picture. Size and content type are checked here so
    /// oversized files never reach the wire.
    pub async fn upload_profile_picture(
        &self,
        access_token: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), AppError> {
        validate_picture(content_type, bytes.len() as u64)?;

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);
        debug!(file_name, content_type, "uploading profile picture");

        let response = self
            .http
            .post(self.endpoint("/users/profile-picture"))
            .bearer_auth(access_token)
            .multipart(form)
            .send()
            .await?;
        ensure_success("upload profile picture", response).await
    }

    pub async fn delete_profile_picture(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(self.endpoint("/users/profile-picture"))
            .bearer_auth(access_token)
            .send()
            .await?;
        ensure_success("delete profile picture", response).await
    }
}

fn validate_picture(content_type: &str, size: u64) -> Result<(), AppError> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(AppError::UnsupportedImageType(content_type.to_string()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(AppError::FileTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Turns a failed response into an error carrying the body message.
/// Backend 404s and validation rejections stay client errors; anything
/// else is a bad gateway.
async fn failure(operation: &'static str, response: Response) -> AppError {
    let status = response.status();
    let message = response
        .json::<ApiMessage>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    classify(operation, status, message)
}

fn classify(operation: &'static str, status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::BadRequest(message),
        _ => AppError::backend(operation, Some(status.as_u16()), message),
    }
}

async fn ensure_success(operation: &'static str, response: Response) -> Result<(), AppError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(failure(operation, response).await)
    }
}

/// Decodes a raw success body, without the envelope.
async fn read_body<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(failure(operation, response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| AppError::backend(operation, Some(StatusCode::OK.as_u16()), format!("undecodable body: {e}")))
}

/// Decodes a success body and unwraps the `{success, message, data}` envelope.
async fn unwrap_envelope<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T, AppError> {
    let envelope: ApiEnvelope<T> = read_body(operation, response).await?;
    Ok(envelope.data)
}
