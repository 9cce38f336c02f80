//! Typed request/response primitive over the current transport.
//!
//! Every feature call in the client funnels through [`RequestGateway`]: it
//! captures the transport snapshot, builds the URL, serializes the body,
//! dispatches, and classifies the outcome. No call here ever retries.

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, Result};
use crate::models::SetupStatus;
use crate::transport::TransportManager;

#[derive(Clone)]
pub struct RequestGateway {
    transport: Arc<TransportManager>,
}

impl RequestGateway {
    pub fn new(transport: Arc<TransportManager>) -> Self {
        Self { transport }
    }

    // ── URL helpers ───────────────────────────────────────────────────────

    /// Resolve `path` against the current base URL. `None` when no server is
    /// configured or the concatenation does not parse.
    pub fn build_url(&self, path: &str) -> Option<Url> {
        join_url(&self.transport.current_base_url(), path).ok()
    }

    /// Browser-openable URL for downloading one artifact. Path segments are
    /// percent-encoded, so artifact paths may contain spaces and `+`.
    pub fn build_download_url(&self, repo_key: &str, artifact_path: &str) -> Option<Url> {
        let base = self.transport.current_base_url();
        if base.is_empty() {
            return None;
        }
        let mut url = Url::parse(&base).ok()?;
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments.pop_if_empty();
            segments.extend(["api", "v1", "repositories", repo_key, "artifacts"]);
            segments.extend(artifact_path.split('/'));
        }
        Some(url)
    }

    // ── Request primitives ────────────────────────────────────────────────

    /// Dispatch a request and decode the JSON response body into `T`.
    pub async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let resp = self.dispatch(method, path, body).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Same contract as [`request`](Self::request), but the response body is
    /// discarded. For delete/action endpoints that answer with nothing.
    pub async fn request_void<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.dispatch(method, path, body).await.map(|_| ())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn post_void<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.request_void(Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request_void::<()>(Method::DELETE, path, None).await
    }

    /// Upload a file as `multipart/form-data`: one `file` part plus optional
    /// scalar text fields. Classification matches [`request`](Self::request).
    pub async fn upload_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        file_bytes: Vec<u8>,
        file_name: &str,
        extra_fields: &[(&str, &str)],
    ) -> Result<T> {
        let transport = self.transport.current_transport();
        let url = join_url(transport.base_url(), path)?;

        let mut form = Form::new().part("file", Part::bytes(file_bytes).file_name(file_name.to_owned()));
        for (name, value) in extra_fields {
            form = form.text(name.to_string(), value.to_string());
        }

        debug!("POST {url} (multipart)");
        let resp = transport.http().post(url).multipart(form).send().await?;
        let resp = classify(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// First-run probe: does the server still need its initial admin account?
    pub async fn fetch_setup_status(&self) -> Result<SetupStatus> {
        self.get("/setup_status").await
    }

    async fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let transport = self.transport.current_transport();
        let url = join_url(transport.base_url(), path)?;

        debug!("{method} {url}");
        let mut req = transport.http().request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        classify(resp).await
    }
}

fn join_url(base: &str, path: &str) -> Result<Url> {
    if base.is_empty() {
        return Err(ClientError::InvalidUrl);
    }
    Url::parse(&format!("{base}{path}")).map_err(|_| ClientError::InvalidUrl)
}

async fn classify(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!("request failed with {status}");
    Err(ClientError::Http {
        status: status.as_u16(),
        body,
    })
}
