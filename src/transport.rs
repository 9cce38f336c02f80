//! Ownership of the live HTTP transport.
//!
//! `TransportManager` is the sole owner of the (base URL, bearer token)
//! pair and of the `reqwest` client derived from it. Any change to either
//! input rebuilds the whole client instead of mutating it in place, so a
//! reader can never observe a half-updated URL/token pair. Requests capture
//! the transport snapshot they were dispatched with; a rebuild never
//! redirects them mid-flight.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::Result;
use crate::store::{SettingsStore, SERVER_URL_KEY};

/// Default per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Shorter timeout for the pre-save connectivity probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Accept self-signed server certificates. Defaults to `true` because
    /// most Depot deployments are self-hosted without a CA-signed chain; set
    /// to `false` when the server certificate should be validated normally.
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
        }
    }
}

/// Immutable snapshot of the transport at one point in time.
#[derive(Debug)]
pub struct Transport {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl Transport {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn http(&self) -> &Client {
        &self.http
    }
}

pub struct TransportManager {
    config: TransportConfig,
    store: Arc<SettingsStore>,
    current: RwLock<Arc<Transport>>,
}

impl TransportManager {
    /// Create the manager, seeding the base URL from the last-used value in
    /// the settings store. The process always starts without a token.
    pub fn new(config: TransportConfig, store: Arc<SettingsStore>) -> Result<Self> {
        let base_url: String = store.get(SERVER_URL_KEY).unwrap_or_default();
        let current = Arc::new(build_transport(&config, base_url, None)?);
        Ok(Self {
            config,
            store,
            current: RwLock::new(current),
        })
    }

    /// Swap the bearer token and rebuild the client against the same URL.
    pub fn set_token(&self, token: Option<String>) -> Result<()> {
        let mut current = self.current.write().unwrap();
        let rebuilt = build_transport(&self.config, current.base_url.clone(), token)?;
        debug!(
            authenticated = rebuilt.token.is_some(),
            "transport rebuilt after token change"
        );
        *current = Arc::new(rebuilt);
        Ok(())
    }

    /// Point the transport at a new base URL, keeping the current token, and
    /// persist the URL as the last-used value.
    pub fn update_base_url(&self, url: &str) -> Result<()> {
        let mut current = self.current.write().unwrap();
        let rebuilt = build_transport(&self.config, url.to_owned(), current.token.clone())?;
        if let Err(e) = self.store.set(SERVER_URL_KEY, &url) {
            warn!("failed to persist server URL: {e}");
        }
        debug!("transport rebuilt against {url:?}");
        *current = Arc::new(rebuilt);
        Ok(())
    }

    pub fn current_base_url(&self) -> String {
        self.current.read().unwrap().base_url.clone()
    }

    pub fn current_token(&self) -> Option<String> {
        self.current.read().unwrap().token.clone()
    }

    /// Snapshot the live transport. Callers hold the returned `Arc` for the
    /// duration of one request.
    pub fn current_transport(&self) -> Arc<Transport> {
        self.current.read().unwrap().clone()
    }

    /// Probe `{url}/health` with a short timeout and no credentials.
    ///
    /// Used by the UI to validate a candidate server before saving it as a
    /// profile, so the outcome is a plain boolean rather than an error.
    pub async fn test_connection(&self, url: &str) -> bool {
        let probe = match Client::builder()
            .timeout(PROBE_TIMEOUT)
            .danger_accept_invalid_certs(self.config.accept_invalid_certs)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("failed to build probe client: {e}");
                return false;
            }
        };

        let health = format!("{}/health", url.trim_end_matches('/'));
        match probe.get(&health).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("connection probe failed: {e}");
                false
            }
        }
    }
}

fn build_transport(
    config: &TransportConfig,
    base_url: String,
    token: Option<String>,
) -> Result<Transport> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = &token {
        // Attached only when a token exists, never as an empty string.
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("bearer token is not a valid header value, sending unauthenticated"),
        }
    }

    let http = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .default_headers(headers)
        .build()?;

    Ok(Transport {
        base_url,
        token,
        http,
    })
}
