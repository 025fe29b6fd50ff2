//! The live-transport contract and its reqwest implementation.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Per-request transport options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
  /// Send cookies/credentials with the request (descriptor's
  /// `uses_credentialed_transport`).
  pub include_credentials: bool,
}

/// One parsed upstream response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
  /// The parsed JSON body.
  pub body: Value,
  /// Parsed `X-Result-Total` header, when the upstream sent one.
  /// Drives the page fan-out for `all()` on non-bulk endpoints.
  pub result_total: Option<usize>,
}

impl ApiResponse {
  pub fn new(body: Value) -> Self {
    Self {
      body,
      result_total: None,
    }
  }
}

/// Minimal "fetch one URL / fetch many URLs" contract the resolution
/// engine depends on. Timeouts and retries belong to implementations,
/// never to the engine.
#[async_trait]
pub trait Requester: Send + Sync {
  async fn single(&self, url: &str, options: RequestOptions) -> Result<ApiResponse>;

  /// Fetch many URLs concurrently. The result is aligned with `urls`
  /// regardless of completion order.
  async fn many(&self, urls: &[String], options: RequestOptions) -> Result<Vec<ApiResponse>> {
    try_join_all(urls.iter().map(|url| self.single(url, options))).await
  }
}

/// Transport backed by shared reqwest clients: a plain one, and a
/// cookie-carrying one for credentialed endpoints.
#[derive(Clone)]
pub struct HttpRequester {
  client: reqwest::Client,
  credentialed: reqwest::Client,
}

impl HttpRequester {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| Error::Transport(format!("failed to build http client: {}", e)))?;
    let credentialed = reqwest::Client::builder()
      .cookie_store(true)
      .build()
      .map_err(|e| Error::Transport(format!("failed to build http client: {}", e)))?;

    Ok(Self {
      client,
      credentialed,
    })
  }

  fn client_for(&self, options: RequestOptions) -> &reqwest::Client {
    if options.include_credentials {
      &self.credentialed
    } else {
      &self.client
    }
  }
}

#[async_trait]
impl Requester for HttpRequester {
  async fn single(&self, url: &str, options: RequestOptions) -> Result<ApiResponse> {
    debug!(url, "requesting");

    let response = self
      .client_for(options)
      .get(url)
      .send()
      .await
      .map_err(|e| Error::Transport(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    let result_total = response
      .headers()
      .get("X-Result-Total")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.parse().ok());

    if !status.is_success() {
      // Error bodies are not guaranteed to be JSON
      let body = response.json::<Value>().await.unwrap_or(Value::Null);
      return Err(upstream_error(status.as_u16(), &body));
    }

    let body: Value = response
      .json()
      .await
      .map_err(|e| Error::Transport(format!("failed to read body from {}: {}", url, e)))?;

    Ok(ApiResponse { body, result_total })
  }
}

/// Build an upstream failure, enriching the message with the body's
/// human-readable error text when present. The status is kept verbatim.
fn upstream_error(status: u16, body: &Value) -> Error {
  let mut message = format!("status {}", status);

  let detail = body
    .get("text")
    .or_else(|| body.get("error"))
    .and_then(Value::as_str);
  if let Some(detail) = detail {
    message.push_str(&format!(" ( {} )", detail));
  }

  Error::Upstream { status, message }
}
