//! Mission store backed by a hosted Supabase-compatible project.
//!
//! Reads and writes go through the PostgREST surface at `/rest/v1`; insert
//! notifications come from the realtime socket (see [`super::realtime`]).

use std::sync::Arc;

use reqwest::StatusCode;
use tracing::debug;

use crate::backend::BackendClient;
use crate::error::{Error, Result};
use crate::mission::{Mission, NewMission};
use crate::store::{realtime, MissionStore, Subscription};

/// The network-backed mission store.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Arc<BackendClient>,
}

impl SupabaseStore {
    /// Create a store on top of a shared backend client.
    #[must_use]
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }

    /// The backend client this store uses.
    #[must_use]
    pub fn client(&self) -> &BackendClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl MissionStore for SupabaseStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn fetch_all(&self) -> Result<Vec<Mission>> {
        let url = self.client.table_url()?;
        let response = self
            .client
            .http()
            .get(url)
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .header("Accept-Profile", self.client.schema())
            .send()
            .await
            .map_err(|e| Error::connectivity("fetch", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::connectivity("fetch", describe(status, &body)));
        }

        let missions: Vec<Mission> = response
            .json()
            .await
            .map_err(|e| Error::connectivity("fetch", format!("unreadable response: {e}")))?;
        debug!(count = missions.len(), "fetched missions");
        Ok(missions)
    }

    async fn subscribe_inserts(&self) -> Result<Subscription> {
        realtime::subscribe(&self.client).await
    }

    async fn insert(&self, mission: NewMission) -> Result<()> {
        let url = self.client.table_url()?;
        let response = self
            .client
            .http()
            .post(url)
            .header("Content-Profile", self.client.schema())
            .header("Prefer", "return=minimal")
            .json(&[&mission])
            .send()
            .await
            .map_err(|e| Error::write(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::write(describe(status, &body)));
        }

        debug!(title = %mission.title, "mission inserted");
        Ok(())
    }
}

/// Summarize a failed response, preferring the PostgREST `message` field.
fn describe(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    if message.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_postgrest_error() {
        let body = r#"{"code":"23502","details":null,"hint":null,"message":"null value in column \"title\""}"#;
        let text = describe(StatusCode::BAD_REQUEST, body);
        assert_eq!(text, "HTTP 400 Bad Request: null value in column \"title\"");
    }

    #[test]
    fn test_describe_plain_body() {
        let text = describe(StatusCode::SERVICE_UNAVAILABLE, "  upstream down \n");
        assert_eq!(text, "HTTP 503 Service Unavailable: upstream down");
    }

    #[test]
    fn test_describe_empty_body() {
        assert_eq!(
            describe(StatusCode::UNAUTHORIZED, ""),
            "HTTP 401 Unauthorized"
        );
    }
}
