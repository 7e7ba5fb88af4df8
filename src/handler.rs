//! The request handler: base URL and token applied to every call.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::http::{Method, ReqwestTransport, Request, RequestOptions, Response, Transport};
use crate::settings::{AUTH_TOKEN_HEADER, Headers, Settings, mask_token};

/// Issues authenticated requests against a single base URL.
///
/// Every call builds one [`Request`] from the stored settings and the
/// per-call options and hands it to the transport. Errors from the
/// transport are returned unchanged; nothing is retried.
///
/// ```no_run
/// # async fn demo() -> anyhow::Result<()> {
/// use reqh::{RequestHandler, Settings};
/// use serde_json::json;
///
/// let handler = RequestHandler::new(Settings::new("https://api.example.com", "token"))?;
/// let casefiles = handler.get("/casefiles", json!({"page": 1})).await?;
/// handler.post("/casefiles", json!({"title": "New"})).await?;
/// handler.delete("/casefiles/1").await?;
/// # let _ = casefiles;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RequestHandler<T: Transport = ReqwestTransport> {
    settings: Settings,
    transport: T,
}

impl RequestHandler<ReqwestTransport> {
    /// Creates a handler sending through a default reqwest client.
    pub fn new(settings: Settings) -> Result<Self> {
        Ok(Self::with_transport(
            settings,
            ReqwestTransport::with_defaults()?,
        ))
    }
}

impl<T: Transport> RequestHandler<T> {
    pub fn with_transport(settings: Settings, transport: T) -> Self {
        debug!(
            "Request handler for {} (token {})",
            settings.url,
            mask_token(&settings.token)
        );
        Self {
            settings,
            transport,
        }
    }

    /// The auth header merged with the instance headers.
    ///
    /// Instance headers win, compared case-insensitively.
    pub fn auth_headers(&self) -> Headers {
        let mut headers = Headers::new();
        headers.insert(AUTH_TOKEN_HEADER.to_string(), self.settings.token.clone());

        for (name, value) in &self.settings.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        headers
    }

    /// GET `resource` with `params` as the query string.
    ///
    /// Pass `()` or `None` for no params.
    #[tracing::instrument(skip(self, params))]
    pub async fn get(&self, resource: &str, params: impl Serialize) -> Result<Response> {
        let params = to_value(params, "params")?;
        self.create_request(RequestOptions::new(Method::Get, resource).params(params))
            .await
    }

    /// POST `data` as JSON to `resource`.
    #[tracing::instrument(skip(self, data))]
    pub async fn post(&self, resource: &str, data: impl Serialize) -> Result<Response> {
        self.send_body(Method::Post, resource, data).await
    }

    /// PUT `data` as JSON to `resource`.
    #[tracing::instrument(skip(self, data))]
    pub async fn put(&self, resource: &str, data: impl Serialize) -> Result<Response> {
        self.send_body(Method::Put, resource, data).await
    }

    /// PATCH `data` as JSON to `resource`.
    #[tracing::instrument(skip(self, data))]
    pub async fn patch(&self, resource: &str, data: impl Serialize) -> Result<Response> {
        self.send_body(Method::Patch, resource, data).await
    }

    /// DELETE `resource`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, resource: &str) -> Result<Response> {
        self.create_request(RequestOptions::new(Method::Delete, resource))
            .await
    }

    async fn send_body(
        &self,
        method: Method,
        resource: &str,
        data: impl Serialize,
    ) -> Result<Response> {
        let data = to_value(data, "body")?;
        self.create_request(RequestOptions::new(method, resource).data(data))
            .await
    }

    async fn create_request(&self, options: RequestOptions) -> Result<Response> {
        let request = Request::assemble(&self.settings.url, self.auth_headers(), options);
        self.transport.send(request).await
    }
}

// `null` means "not given" so `()` and `None` both omit the field.
fn to_value(value: impl Serialize, what: &str) -> Result<Option<Value>> {
    let value =
        serde_json::to_value(value).with_context(|| format!("Failed to serialize request {}", what))?;
    Ok((!value.is_null()).then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpError, MockTransport};
    use mockito::Matcher;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn ok_response(data: Value) -> Response {
        Response {
            status: 200,
            headers: Headers::new(),
            data,
        }
    }

    fn settings() -> Settings {
        Settings::new("https://api.example.com", "secret")
    }

    #[test]
    fn test_auth_headers_contains_token() {
        let handler = RequestHandler::with_transport(settings(), MockTransport::new());
        let headers = handler.auth_headers();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[AUTH_TOKEN_HEADER], "secret");
    }

    #[test]
    fn test_auth_headers_instance_headers_merged() {
        let settings = settings().with_header("Accept", "application/json");
        let handler = RequestHandler::with_transport(settings, MockTransport::new());
        let headers = handler.auth_headers();

        assert_eq!(headers[AUTH_TOKEN_HEADER], "secret");
        assert_eq!(headers["Accept"], "application/json");
    }

    #[test]
    fn test_auth_headers_instance_override_wins() {
        let settings = settings().with_header("x-auth-token", "other");
        let handler = RequestHandler::with_transport(settings, MockTransport::new());
        let headers = handler.auth_headers();

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["x-auth-token"], "other");
        assert!(!headers.contains_key(AUTH_TOKEN_HEADER));
    }

    #[tokio::test]
    async fn test_get_assembles_request() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::Get
                    && req.base_url == "https://api.example.com"
                    && req.url == "/casefiles"
                    && req.params == Some(json!({"a": 1}))
                    && req.data.is_none()
                    && req.headers[AUTH_TOKEN_HEADER] == "secret"
            })
            .times(1)
            .returning(|_| Ok(ok_response(json!([]))));

        let handler = RequestHandler::with_transport(settings(), transport);
        let response = handler.get("/casefiles", json!({"a": 1})).await.unwrap();
        assert_eq!(response.data, json!([]));
    }

    #[tokio::test]
    async fn test_get_without_params() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| req.params.is_none())
            .times(2)
            .returning(|_| Ok(ok_response(Value::Null)));

        let handler = RequestHandler::with_transport(settings(), transport);
        handler.get("/casefiles", ()).await.unwrap();
        handler.get("/casefiles", None::<Value>).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_verbs_use_their_method_and_body() {
        for method in [Method::Post, Method::Put, Method::Patch] {
            let mut transport = MockTransport::new();
            transport
                .expect_send()
                .withf(move |req| {
                    req.method == method
                        && req.url == "/casefiles/1"
                        && req.params.is_none()
                        && req.data == Some(json!({"title": "x"}))
                })
                .times(1)
                .returning(|_| Ok(ok_response(Value::Null)));

            let handler = RequestHandler::with_transport(settings(), transport);
            let body = json!({"title": "x"});
            match method {
                Method::Post => handler.post("/casefiles/1", &body).await,
                Method::Put => handler.put("/casefiles/1", &body).await,
                Method::Patch => handler.patch("/casefiles/1", &body).await,
                _ => unreachable!(),
            }
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_delete_routes_through_request_builder() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|req| {
                req.method == Method::Delete
                    && req.url == "/casefiles/1"
                    && req.params.is_none()
                    && req.data.is_none()
                    && req.headers[AUTH_TOKEN_HEADER] == "secret"
            })
            .times(1)
            .returning(|_| Ok(ok_response(Value::Null)));

        let handler = RequestHandler::with_transport(settings(), transport);
        handler.delete("/casefiles/1").await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_returned_unchanged() {
        let mut transport = MockTransport::new();
        transport.expect_send().times(1).returning(|_| {
            Err(HttpError::Status {
                status: 503,
                headers: Headers::new(),
                data: Value::Null,
            }
            .into())
        });

        let handler = RequestHandler::with_transport(settings(), transport);
        let err = handler.delete("/casefiles/1").await.unwrap_err();

        assert_eq!(
            err.downcast_ref::<HttpError>().and_then(HttpError::status),
            Some(503)
        );
    }

    #[tokio::test]
    async fn test_serialize_failure_skips_transport() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();

        // Non-string map keys can't become JSON
        let mut body = BTreeMap::new();
        body.insert((1, 2), "x");

        let handler = RequestHandler::with_transport(settings(), transport);
        let err = handler.post("/casefiles", &body).await.unwrap_err();
        assert!(err.to_string().contains("Failed to serialize request body"));
    }

    #[tokio::test]
    async fn test_verbs_against_server() {
        let mut server = mockito::Server::new_async().await;

        let get = server
            .mock("GET", "/x")
            .match_query(Matcher::UrlEncoded("a".into(), "1".into()))
            .match_header("X-Auth-Token", "secret")
            .with_status(200)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;
        let post = server
            .mock("POST", "/x")
            .match_header("X-Auth-Token", "secret")
            .match_body(Matcher::Json(json!({"a": 1})))
            .with_status(201)
            .with_body(r#"{"id": 7}"#)
            .create_async()
            .await;
        let put = server
            .mock("PUT", "/x/7")
            .match_body(Matcher::Json(json!({"a": 2})))
            .with_status(200)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/x/7")
            .match_body(Matcher::Json(json!({"a": 3})))
            .with_status(200)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", "/x/7")
            .match_header("X-Auth-Token", "secret")
            .with_status(204)
            .create_async()
            .await;

        let handler = RequestHandler::new(Settings::new(server.url(), "secret")).unwrap();

        let response = handler.get("/x", json!({"a": 1})).await.unwrap();
        assert_eq!(response.data, json!({"ok": true}));

        let response = handler.post("/x", json!({"a": 1})).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.data, json!({"id": 7}));

        handler.put("/x/7", json!({"a": 2})).await.unwrap();
        handler.patch("/x/7", json!({"a": 3})).await.unwrap();

        let response = handler.delete("/x/7").await.unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.data, Value::Null);

        get.assert_async().await;
        post.assert_async().await;
        put.assert_async().await;
        patch.assert_async().await;
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_handler() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/items/\d+$".to_string()))
            .with_status(200)
            .with_body("{}")
            .expect(5)
            .create_async()
            .await;

        let handler = RequestHandler::new(Settings::new(server.url(), "secret")).unwrap();
        let resources: Vec<String> = (0..5).map(|i| format!("/items/{}", i)).collect();
        let results = futures_util::future::join_all(
            resources.iter().map(|resource| handler.get(resource, ())),
        )
        .await;

        mock.assert_async().await;
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
