//! Handler settings and their environment-based loading.

use anyhow::{Context, Result, bail};
use log::debug;
use std::collections::BTreeMap;
use std::env;

/// Header name carrying the API token on every request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

pub const URL_ENV: &str = "REQH_URL";
pub const TOKEN_ENV: &str = "REQH_TOKEN";
pub const HEADERS_ENV: &str = "REQH_HEADERS";

/// Header name to value, kept in name order.
pub type Headers = BTreeMap<String, String>;

/// Connection settings for a [`RequestHandler`](crate::handler::RequestHandler).
///
/// Values are stored verbatim. Neither the URL nor the token is validated;
/// a bad value shows up as a transport error on the first request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Base endpoint every resource is resolved against.
    pub url: String,
    /// Value sent in the `X-Auth-Token` header.
    pub token: String,
    /// Extra headers merged over the auth header. An entry named
    /// `X-Auth-Token` replaces the token header.
    pub headers: Headers,
}

impl Settings {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            headers: Headers::new(),
        }
    }

    /// Adds an instance-level header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Loads settings from `REQH_URL`, `REQH_TOKEN` and the optional
    /// `REQH_HEADERS` (`name:value` lines separated by newlines).
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(None, None, Vec::new())
    }

    /// Like [`Settings::from_env`], with explicit values taking precedence.
    ///
    /// `url` and `token` replace their variables when given. `headers` are
    /// applied after those in `REQH_HEADERS`, so they win on the same name.
    pub fn from_env_with(
        url: Option<String>,
        token: Option<String>,
        headers: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let url = match url {
            Some(url) => url,
            None => env::var(URL_ENV).with_context(|| format!("{} is not set", URL_ENV))?,
        };
        let token = match token {
            Some(token) => token,
            None => env::var(TOKEN_ENV).with_context(|| format!("{} is not set", TOKEN_ENV))?,
        };

        let mut settings = Settings::new(url, token);
        if let Ok(raw) = env::var(HEADERS_ENV) {
            // Header values may contain commas, never newlines.
            for item in raw.lines().filter(|s| !s.trim().is_empty()) {
                let (name, value) = parse_header(item)?;
                settings.headers.insert(name, value);
            }
        }
        settings.headers.extend(headers);

        debug!(
            "Loaded settings for {} with token {}",
            settings.url,
            mask_token(&settings.token)
        );

        Ok(settings)
    }
}

/// Parses a `name:value` header argument.
pub fn parse_header(s: &str) -> Result<(String, String)> {
    let Some((name, value)) = s.split_once(':') else {
        bail!("Invalid header '{}'. Expected 'name:value'.", s);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header '{}'. Header name is empty.", s);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Renders a token for logs without revealing it.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
