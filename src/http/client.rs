//! reqwest-backed transport.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::HttpError;
use super::request::{Request, query_pairs};
use crate::settings::{AUTH_TOKEN_HEADER, Headers};

/// User agent sent by the default client.
pub const USER_AGENT: &str = concat!("reqh/", env!("REQH_VERSION"));

/// A completed exchange with a success status.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    /// Decoded body: JSON when it parses, a string otherwise, `Null` when empty.
    pub data: Value,
}

impl Response {
    /// Deserializes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).context("Failed to parse JSON response")
    }
}

/// Performs the network exchange for an assembled [`Request`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Transport over a shared reqwest [`Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with the crate's user agent.
    pub fn with_defaults() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: Request) -> Result<Response> {
        let url = request.full_url();
        debug!("{} {}...", request.method, url);

        let mut builder = self
            .client
            .request(request.method.into(), &url)
            .headers(to_header_map(&request.headers)?);

        if let Some(params) = &request.params {
            builder = builder.query(&query_pairs(params));
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send {} request to {}", request.method, url))?;

        let status = response.status();
        let headers = from_header_map(response.headers());
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?;
        let data = decode_body(&body);

        debug!("{} {} -> {}", request.method, url, status.as_u16());

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                headers,
                data,
            }
            .into());
        }

        Ok(Response {
            status: status.as_u16(),
            headers,
            data,
        })
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap, HttpError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
        let mut header_value =
            HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name.clone()))?;
        if name.eq_ignore_ascii_case(AUTH_TOKEN_HEADER) {
            header_value.set_sensitive(true);
        }
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn from_header_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}

fn decode_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
