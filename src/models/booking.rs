use chrono::NaiveDate;
use rocket::serde::{Deserialize, Serialize};
use validator::Validate;

/// Response envelope the booking backend wraps every payload in.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

/// Bare message body the backend returns on failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPicture {
    pub id: i64,
    pub file_path: String,
    pub is_main: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableRoom {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub max_guests: Option<i32>,
}

/// Full property detail with availability for the requested stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetail {
    pub property_id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub category: String,
    pub city: PropertyCity,
    #[serde(default)]
    pub property_pictures: Vec<PropertyPicture>,
    #[serde(default)]
    pub available_rooms: Vec<AvailableRoom>,
}

/// Payload for creating a room under one of the caller's properties.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct RoomRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(min = 1.0))]
    pub price: f64,
    #[validate(range(min = 1))]
    pub max_guests: i32,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub property_id: i64,
}

/// How a peak season adjusts the nightly price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceAdjustment {
    Percentage,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakSeason {
    pub id: i64,
    pub room_id: i64,
    #[serde(rename = "type")]
    pub kind: PriceAdjustment,
    pub value: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Payload for creating or replacing a peak season on a room.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct PeakSeasonRequest {
    pub room_id: i64,
    #[serde(rename = "type")]
    pub kind: PriceAdjustment,
    #[validate(range(min = 1))]
    pub value: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Search filters for the public property listing. Every field is optional;
/// absent fields are omitted from the query string.
#[derive(Debug, Clone, Default)]
pub struct PropertySearchParams {
    pub city_id: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<u32>,
    pub page: Option<u32>,
    pub property_name: Option<String>,
    pub category_name: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl PropertySearchParams {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(city_id) = &self.city_id {
            query.push(("city_id", city_id.clone()));
        }
        if let Some(check_in) = self.check_in {
            query.push(("check_in", check_in.format("%Y-%m-%d").to_string()));
        }
        if let Some(check_out) = self.check_out {
            query.push(("check_out", check_out.format("%Y-%m-%d").to_string()));
        }
        if let Some(guests) = self.guests {
            query.push(("guests", guests.to_string()));
        }
        query.push(("page", self.page.unwrap_or(1).to_string()));
        if let Some(property_name) = &self.property_name {
            query.push(("property_name", property_name.clone()));
        }
        if let Some(category_name) = &self.category_name {
            query.push(("category_name", category_name.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            query.push(("sort_by", sort_by.clone()));
        }
        if let Some(sort_order) = &self.sort_order {
            query.push(("sort_order", sort_order.clone()));
        }
        query
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertySearchResponse {
    pub data: Vec<PropertySummary>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}
