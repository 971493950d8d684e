use crate::config::GatewayConfig;
use crate::error::app_error::AppError;
use crate::models::profile::{Role, UserProfile};
use crate::models::status::RoleLookup;
use crate::repository::ProfileRepository;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "id,name,email,role,profile_picture,phone,address,created_at,updated_at";

/// Profile repository over the gateway's row-filter REST dialect
/// (`users?id=eq.<uuid>&select=...`). Zero matching rows is an empty
/// array on the wire, which maps straight to the null-not-error contract.
///
/// Reads ride the publishable key; the role write uses the service key,
/// since the edge runs as a privileged deployment rather than on a user's
/// own token.
pub struct RestProfileRepository {
    http: reqwest::Client,
    base_url: String,
    publishable_key: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: Option<Role>,
}

impl RestProfileRepository {
    pub fn new(config: &GatewayConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_seconds)).build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            publishable_key: config.publishable_key.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/users", self.base_url)
    }

    async fn select<T>(&self, operation: &'static str, filter: (&str, String), columns: &str) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(self.table_url())
            .header("apikey", &self.publishable_key)
            .bearer_auth(&self.publishable_key)
            .query(&[filter, ("select", columns.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::gateway(operation, Some(status.as_u16()), detail));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProfileRepository for RestProfileRepository {
    async fn profile_by_id(&self, id: &Uuid) -> Result<Option<UserProfile>, AppError> {
        let rows: Vec<UserProfile> = self.select("profile by id", ("id", format!("eq.{}", id)), PROFILE_COLUMNS).await?;
        Ok(rows.into_iter().next())
    }

    async fn profile_id_by_email(&self, email: &str) -> Result<Option<Uuid>, AppError> {
        let rows: Vec<IdRow> = self.select("profile id by email", ("email", format!("eq.{}", email)), "id").await?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }

    async fn role_by_email(&self, email: &str) -> Result<RoleLookup, AppError> {
        let rows: Vec<RoleRow> = self.select("role by email", ("email", format!("eq.{}", email)), "role").await?;
        match rows.into_iter().next() {
            Some(row) => Ok(RoleLookup { exists: true, role: row.role }),
            None => Ok(RoleLookup { exists: false, role: None }),
        }
    }

    async fn role_by_id(&self, id: &Uuid) -> Result<Option<Role>, AppError> {
        let rows: Vec<RoleRow> = self.select("role by id", ("id", format!("eq.{}", id)), "role").await?;
        Ok(rows.into_iter().next().and_then(|row| row.role))
    }

    async fn set_role(&self, id: &Uuid, role: Role) -> Result<(), AppError> {
        let response = self
            .http
            .patch(self.table_url())
            .header("apikey", &self.publishable_key)
            .bearer_auth(&self.service_key)
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{}", id))])
            .json(&json!({ "role": role.as_str() }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::gateway("set role", Some(status.as_u16()), detail));
        }
        Ok(())
    }
}
