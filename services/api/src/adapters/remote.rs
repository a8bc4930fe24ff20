//! services/api/src/adapters/remote.rs
//!
//! This module contains the remote metadata adapter, the concrete
//! implementation of the `RemoteStore` port. It speaks a PostgREST-style
//! REST dialect: row filters as query parameters, bearer authentication
//! from an externally-issued access token, and `Prefer` headers to shape
//! write responses. Document content is never sent here.

use async_trait::async_trait;
use chrono::Utc;
use flashread_core::domain::{
    NewRemoteDocument, RemoteDocument, RemoteSession, RemoteStats,
};
use flashread_core::ports::{PortError, PortResult, RemoteStore};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;

use crate::config::RemoteConfig;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A remote metadata adapter over HTTP, scoped to one signed-in identity.
#[derive(Clone)]
pub struct RestRemoteStore {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl RestRemoteStore {
    /// Builds a client carrying the identity headers on every request.
    pub fn new(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&config.api_key) {
            headers.insert("apikey", value);
        }
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", config.access_token)) {
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn user_filter(&self) -> (String, String) {
        ("user_id".to_string(), format!("eq.{}", self.user_id))
    }
}

/// Maps a non-success response into a `PortError` with the remote's own
/// message attached.
async fn check(response: reqwest::Response) -> PortResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PortError::Unexpected(format!(
        "remote store returned {status}: {body}"
    )))
}

fn transport(e: reqwest::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// Write payload rows (the insert shape adds the owning identity)
//=========================================================================================

#[derive(Serialize)]
struct NewDocumentRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    doc: &'a NewRemoteDocument,
}

#[derive(Serialize)]
struct ProgressPatch {
    bookmark_index: u32,
    total_words: u32,
    last_read_at: chrono::DateTime<Utc>,
}

#[derive(Serialize)]
struct FingerprintPatch<'a> {
    fingerprint: &'a str,
}

#[derive(Serialize)]
struct StatsRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    stats: &'a RemoteStats,
}

#[derive(Serialize)]
struct SessionRow<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    session: &'a RemoteSession,
}

//=========================================================================================
// `RemoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteStore for RestRemoteStore {
    fn is_available(&self) -> bool {
        true
    }

    async fn list_documents(&self) -> PortResult<Vec<RemoteDocument>> {
        let response = self
            .client
            .get(self.table_url("documents"))
            .query(&[
                ("select".to_string(), "*".to_string()),
                ("order".to_string(), "last_read_at.desc".to_string()),
                self.user_filter(),
            ])
            .send()
            .await
            .map_err(transport)?;
        check(response).await?.json().await.map_err(transport)
    }

    async fn create_document(&self, doc: &NewRemoteDocument) -> PortResult<RemoteDocument> {
        let response = self
            .client
            .post(self.table_url("documents"))
            .header("Prefer", "return=representation")
            .json(&NewDocumentRow {
                user_id: &self.user_id,
                doc,
            })
            .send()
            .await
            .map_err(transport)?;
        let mut rows: Vec<RemoteDocument> =
            check(response).await?.json().await.map_err(transport)?;
        rows.pop()
            .ok_or_else(|| PortError::Unexpected("remote insert returned no row".to_string()))
    }

    async fn update_progress(
        &self,
        remote_id: &str,
        bookmark_index: u32,
        total_words: u32,
    ) -> PortResult<()> {
        let response = self
            .client
            .patch(self.table_url("documents"))
            .query(&[("id", format!("eq.{remote_id}"))])
            .json(&ProgressPatch {
                bookmark_index,
                total_words,
                last_read_at: Utc::now(),
            })
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn set_fingerprint(&self, remote_id: &str, fingerprint: &str) -> PortResult<()> {
        let response = self
            .client
            .patch(self.table_url("documents"))
            .query(&[("id", format!("eq.{remote_id}"))])
            .json(&FingerprintPatch { fingerprint })
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn delete_document(&self, remote_id: &str) -> PortResult<()> {
        let response = self
            .client
            .delete(self.table_url("documents"))
            .query(&[("id", format!("eq.{remote_id}"))])
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn fetch_stats(&self) -> PortResult<Option<RemoteStats>> {
        let response = self
            .client
            .get(self.table_url("user_stats"))
            .query(&[("select".to_string(), "*".to_string()), self.user_filter()])
            .send()
            .await
            .map_err(transport)?;
        let rows: Vec<RemoteStats> = check(response).await?.json().await.map_err(transport)?;
        Ok(rows.into_iter().next())
    }

    async fn push_stats(&self, stats: &RemoteStats) -> PortResult<()> {
        let response = self
            .client
            .post(self.table_url("user_stats"))
            .header("Prefer", "resolution=merge-duplicates")
            .json(&StatsRow {
                user_id: &self.user_id,
                stats,
            })
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }

    async fn push_session(&self, session: &RemoteSession) -> PortResult<()> {
        let response = self
            .client
            .post(self.table_url("reading_sessions"))
            .json(&SessionRow {
                user_id: &self.user_id,
                session,
            })
            .send()
            .await
            .map_err(transport)?;
        check(response).await.map(|_| ())
    }
}
