pub mod auth;
pub mod posts;
pub mod types;
pub mod users;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("API error (status {status}): {detail}")]
    ApiError { status: u16, detail: String },
    #[error("request rejected by server")]
    Rejected,
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("not logged in")]
    NotAuthenticated,
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

// ---------------------------------------------------------------------------
// API client
// ---------------------------------------------------------------------------

pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    auth_base_url: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, ApiClientError> {
        Self::with_urls(
            &config.api_base_url,
            config.auth_base_url(),
            config.request_timeout(),
        )
    }

    pub fn with_urls(
        api_base_url: &str,
        auth_base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ApiClientError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: normalize_base(api_base_url)?,
            auth_base_url: normalize_base(auth_base_url)?,
        })
    }

    /// Build a full API URL from a path (e.g. "/api/post/12").
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Build a full URL on the auth server (e.g. "/auth/refresh").
    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}{path}", self.auth_base_url)
    }

    fn request(&self, method: Method, url: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Issue a GET, attaching a bearer token when one is given.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<T, ApiClientError> {
        let resp = self.request(Method::GET, url, token).send().await?;
        self.handle_response(resp).await
    }

    /// Issue an unauthenticated POST with a JSON body.
    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiClientError> {
        let resp = self
            .request(Method::POST, url, None)
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Issue a relationship/flag mutation (POST or DELETE) with bearer auth.
    ///
    /// Success is an empty 2xx body or a JSON `true`; a JSON `false` is a rejection.
    pub(crate) async fn send_mutation(
        &self,
        method: Method,
        url: &str,
        token: &str,
    ) -> Result<(), ApiClientError> {
        let resp = self.request(method, url, Some(token)).send().await?;
        let resp = check_status(resp).await?;
        let body = resp.text().await?;
        parse_mutation_body(&body)
    }

    /// Check status and deserialize the body.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: Response,
    ) -> Result<T, ApiClientError> {
        let resp = check_status(resp).await?;
        let body = resp.text().await?;
        serde_json::from_str::<T>(&body)
            .map_err(|e| ApiClientError::Deserialize(format!("{e}: {body}")))
    }
}

fn normalize_base(base: &str) -> Result<String, ApiClientError> {
    let parsed = Url::parse(base)?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

async fn check_status(resp: Response) -> Result<Response, ApiClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiClientError::Unauthorized(body));
    }
    Err(ApiClientError::ApiError {
        status: status.as_u16(),
        detail: body,
    })
}

fn parse_mutation_body(body: &str) -> Result<(), ApiClientError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Bool(false)) => Err(ApiClientError::Rejected),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Test support: a one-shot HTTP stub on a local port
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod stub {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// A request captured by the stub.
    #[derive(Debug)]
    pub struct Captured {
        pub request_line: String,
        pub headers: String,
        pub body: String,
    }

    /// Serve exactly one request with `status` and `body`, returning the base URL
    /// and a handle resolving to the captured request.
    pub async fn serve_once(
        status: &'static str,
        response_body: &'static str,
    ) -> (String, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _addr) = listener.accept().await.unwrap();

            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            let (head, body) = loop {
                let n = stream.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let head = text[..split].to_string();
                    let content_length = head
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    let body = text[split + 4..].to_string();
                    if body.len() >= content_length || n == 0 {
                        break (head, body);
                    }
                }
                if n == 0 {
                    break (text, String::new());
                }
            };

            let response = format!(
                "HTTP/1.1 {status}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {response_body}",
                response_body.len(),
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;

            let mut lines = head.splitn(2, "\r\n");
            Captured {
                request_line: lines.next().unwrap_or_default().to_string(),
                headers: lines.next().unwrap_or_default().to_string(),
                body,
            }
        });

        (base, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let client = ApiClient::with_urls(
            "http://localhost:8080/",
            "https://auth.fixit.test",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.url("/api/post/1"), "http://localhost:8080/api/post/1");
        assert_eq!(
            client.auth_url("/auth/refresh"),
            "https://auth.fixit.test/auth/refresh"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        let err = ApiClient::with_urls("not a url", "http://x", Duration::from_secs(1));
        assert!(matches!(err, Err(ApiClientError::InvalidUrl(_))));
    }

    #[test]
    fn mutation_body_conventions() {
        assert!(parse_mutation_body("").is_ok());
        assert!(parse_mutation_body("true").is_ok());
        assert!(parse_mutation_body("{\"ok\":1}").is_ok());
        assert!(matches!(
            parse_mutation_body(" false "),
            Err(ApiClientError::Rejected)
        ));
    }

    #[tokio::test]
    async fn mutation_sends_bearer_header() {
        let (base, captured) = stub::serve_once("200 OK", "true").await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        client
            .send_mutation(Method::POST, &client.url("/api/follow/7"), "tok-1")
            .await
            .unwrap();

        let captured = captured.await.unwrap();
        assert_eq!(captured.request_line, "POST /api/follow/7 HTTP/1.1");
        assert!(
            captured
                .headers
                .to_ascii_lowercase()
                .contains("authorization: bearer tok-1")
        );
    }

    #[tokio::test]
    async fn server_error_is_reported_with_status() {
        let (base, _captured) = stub::serve_once("500 Internal Server Error", "boom").await;
        let client = ApiClient::with_urls(&base, &base, Duration::from_secs(5)).unwrap();

        let err = client
            .get_json::<serde_json::Value>(&client.url("/api/post/1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiClientError::ApiError { status: 500, .. }));
    }
}
