//! Request descriptions passed from the handler to a transport.

use serde_json::Value;
use std::fmt;

use crate::settings::Headers;

/// HTTP verbs the handler issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Per-call part of a request, built by each verb method.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    /// Resource path, e.g. `/casefiles/1`.
    pub url: String,
    /// Query parameters.
    pub params: Option<Value>,
    /// JSON body.
    pub data: Option<Value>,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            data: None,
        }
    }

    pub fn params(mut self, params: Option<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }
}

/// A fully assembled request: handler defaults plus per-call options.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub base_url: String,
    pub headers: Headers,
    pub method: Method,
    pub url: String,
    pub params: Option<Value>,
    pub data: Option<Value>,
}

impl Request {
    /// Merges the handler defaults with the per-call options.
    pub fn assemble(base_url: &str, headers: Headers, options: RequestOptions) -> Self {
        Self {
            base_url: base_url.to_string(),
            headers,
            method: options.method,
            url: options.url,
            params: options.params,
            data: options.data,
        }
    }

    /// The absolute URL this request targets, without query.
    pub fn full_url(&self) -> String {
        combine_url(&self.base_url, &self.url)
    }
}

/// Resolves `resource` against `base`.
///
/// Absolute resources (`scheme://...`) are returned unchanged.
pub fn combine_url(base: &str, resource: &str) -> String {
    if is_absolute_url(resource) || base.is_empty() {
        return resource.to_string();
    }
    if resource.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        resource.trim_start_matches('/')
    )
}

fn is_absolute_url(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => url.starts_with("//"),
    }
}

/// Flattens query params into name/value pairs.
///
/// Null values are dropped, arrays repeat as `name[]`, nested objects are
/// sent as JSON text. Anything other than an object yields no pairs.
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = params else {
        return Vec::new();
    };

    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let name = format!("{}[]", key);
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push((name.clone(), scalar_text(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_text(other))),
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
