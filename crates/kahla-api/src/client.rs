//! HTTP client for the Kahla REST server.
//!
//! Authentication is cookie based: [`KahlaApi::login`] stores the session
//! cookie in the client's jar and every later call reuses it.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::errors::{ApiError, Result, code};
use crate::types::{FriendSummary, InitPusherResponse, MyFriendsBody, StatusEnvelope};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("kahla-notify/", env!("CARGO_PKG_VERSION"));

/// Kahla REST client bound to one server and one cookie session.
#[derive(Clone, Debug)]
pub struct KahlaApi {
    http: reqwest::Client,
    server_url: String,
}

impl KahlaApi {
    /// Create a client for `server_url` with an empty cookie jar.
    pub fn new(server_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self::with_client(http, server_url))
    }

    /// Wrap an existing HTTP client. It should have a cookie store enabled.
    pub fn with_client(http: reqwest::Client, server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self { http, server_url }
    }

    /// Base URL requests are sent to.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// `POST /Auth/AuthByPassword`.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        const TAG: &str = "login";
        let response = self
            .http
            .post(self.url("/Auth/AuthByPassword"))
            .form(&[("Email", email), ("Password", password)])
            .send()
            .await
            .map_err(|source| ApiError::Http { tag: TAG, source })?;
        let _: serde_json::Value = read_body(TAG, response).await?;
        debug!("login accepted");
        Ok(())
    }

    /// `GET /Auth/InitPusher`.
    #[instrument(skip_all)]
    pub async fn init_pusher(&self) -> Result<InitPusherResponse> {
        const TAG: &str = "init_pusher";
        let response = self
            .http
            .get(self.url("/Auth/InitPusher"))
            .send()
            .await
            .map_err(|source| ApiError::Http { tag: TAG, source })?;
        let body: InitPusherResponse = read_body(TAG, response).await?;
        debug!(channel_id = body.channel_id, "push channel assigned");
        Ok(body)
    }

    /// `GET /friendship/MyFriends?orderByName=false`.
    #[instrument(skip_all)]
    pub async fn my_friends(&self) -> Result<Vec<FriendSummary>> {
        const TAG: &str = "my_friends";
        let response = self
            .http
            .get(self.url("/friendship/MyFriends"))
            .query(&[("orderByName", "false")])
            .send()
            .await
            .map_err(|source| ApiError::Http { tag: TAG, source })?;
        let body: MyFriendsBody = read_body(TAG, response).await?;
        debug!(count = body.items.len(), "friend list loaded");
        Ok(body.items)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

/// Check status, then `code`, then decode the body as `T`.
async fn read_body<T: DeserializeOwned>(tag: &'static str, response: reqwest::Response) -> Result<T> {
    let status = response.status().as_u16();
    if status != 200 {
        return Err(ApiError::Status { tag, status });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|source| ApiError::Http { tag, source })?;
    parse_body(tag, &bytes)
}

fn parse_body<T: DeserializeOwned>(tag: &'static str, bytes: &[u8]) -> Result<T> {
    let envelope: StatusEnvelope =
        serde_json::from_slice(bytes).map_err(|source| ApiError::Json { tag, source })?;
    if envelope.code != code::SUCCESS {
        return Err(ApiError::Application {
            tag,
            code: envelope.code,
            message: envelope.message,
        });
    }
    serde_json::from_slice(bytes).map_err(|source| ApiError::Json { tag, source })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
