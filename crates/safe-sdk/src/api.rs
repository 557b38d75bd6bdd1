use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ghost::{GhostKeyService, GhostKeys, GhostRequest};
use crate::network::ApiHost;
use crate::submission::{PendingRequest, SubmissionRequest, SubmissionService};
use crate::utxo::{Utxo, UtxoQuery, UtxoSource};

/// Error object the API returns in place of `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<ApiError>,
}

#[derive(Serialize)]
struct GhostKeysBody<'a> {
    keys: &'a [GhostRequest],
    senders: &'a [String],
}

/// Why a call failed, before it is mapped to the endpoint's error kind.
struct CallFailure {
    reason: String,
    transient: bool,
}

impl CallFailure {
    fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            transient: false,
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// REST client for the ledger's safe API, implementing all three external
/// services.
#[derive(Debug, Clone)]
pub struct SafeApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl SafeApiClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
        })
    }

    pub fn for_host(host: ApiHost, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        Self::new(host.base_url(), access_token, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<T, CallFailure> {
        let request = match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request.send().await.map_err(|e| CallFailure {
            transient: e.is_timeout() || e.is_connect(),
            reason: e.to_string(),
        })?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| CallFailure {
            transient: true,
            reason: format!("reading response body: {e}"),
        })?;

        let envelope = serde_json::from_str::<Envelope<T>>(&body);
        if let Ok(Envelope {
            error: Some(err), ..
        }) = &envelope
        {
            return Err(CallFailure {
                reason: format!("API error {}: {}", err.code, err.description),
                transient: is_transient_status(status.as_u16())
                    || is_transient_status(err.status)
                    || matches!(err.code, 429 | 500..=599),
            });
        }
        if !status.is_success() {
            return Err(CallFailure {
                reason: format!("HTTP {status}: {}", truncate(&body, 200)),
                transient: is_transient_status(status.as_u16()),
            });
        }

        match envelope {
            Ok(Envelope { data: Some(data), .. }) => Ok(data),
            Ok(Envelope { data: None, .. }) => Err(CallFailure::permanent("response has no data")),
            Err(e) => Err(CallFailure::permanent(format!("malformed response: {e}"))),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[async_trait]
impl UtxoSource for SafeApiClient {
    async fn list_unspent(&self, query: &UtxoQuery) -> Result<Vec<Utxo>> {
        log::debug!(
            "listing unspent {} outputs for {} members (threshold {})",
            query.asset_id,
            query.members.len(),
            query.threshold
        );
        let request = self.http.get(self.url("/safe/outputs")).query(&[
            ("asset", query.asset_id.clone()),
            ("members", query.members_hash()),
            ("threshold", query.threshold.to_string()),
            ("state", "unspent".to_string()),
            ("limit", query.limit.to_string()),
        ]);
        self.call(request)
            .await
            .map_err(|f| Error::lookup(f.reason, f.transient))
    }
}

#[async_trait]
impl GhostKeyService for SafeApiClient {
    async fn fetch_ghost_keys(
        &self,
        requests: &[GhostRequest],
        senders: &[String],
    ) -> Result<Vec<GhostKeys>> {
        let body = GhostKeysBody {
            keys: requests,
            senders,
        };
        let request = self.http.post(self.url("/safe/keys")).json(&body);
        self.call(request)
            .await
            .map_err(|f| Error::ghost(f.reason, f.transient))
    }
}

#[async_trait]
impl SubmissionService for SafeApiClient {
    async fn create_transaction_requests(
        &self,
        requests: &[SubmissionRequest],
    ) -> Result<Vec<PendingRequest>> {
        let request = self
            .http
            .post(self.url("/safe/transaction/requests"))
            .json(requests);
        self.call(request)
            .await
            .map_err(|f| Error::submission(f.reason, f.transient))
    }
}
