//! HTTP client for bundle fetches and status reports.
//!
//! Thin wrapper over a shared `reqwest::Client` (rustls, so `https://`
//! works without a system TLS library). One timeout bounds each exchange
//! from connect through the last body byte.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = "gatesync/0.1";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    #[error("invalid URI {0}")]
    InvalidUri(String),

    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

pub type HttpResult<T> = Result<T, HttpError>;

/// Status and fully-buffered body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    timeout: Duration,
}

impl HttpClient {
    /// `timeout` bounds the whole exchange: connect, send, and body read.
    pub fn new(timeout: Duration) -> HttpResult<Self> {
        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self { inner, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn get(&self, uri: &str) -> HttpResult<HttpResponse> {
        let url = parse_url(uri)?;
        self.execute(&url, self.inner.get(url.clone())).await
    }

    /// POST a JSON body, optionally with a bearer token.
    pub async fn post_json(
        &self,
        uri: &str,
        body: Vec<u8>,
        bearer_token: Option<&str>,
    ) -> HttpResult<HttpResponse> {
        let url = parse_url(uri)?;
        let mut request = self
            .inner
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        self.execute(&url, request).await
    }

    async fn execute(&self, url: &Url, request: RequestBuilder) -> HttpResult<HttpResponse> {
        let resp = request.send().await.map_err(|e| self.classify(url, e))?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.timeout)
            } else {
                HttpError::Body(e.to_string())
            }
        })?;

        debug!(%status, %url, bytes = body.len(), "http exchange complete");
        Ok(HttpResponse { status, body })
    }

    fn classify(&self, url: &Url, e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout(self.timeout)
        } else if e.is_connect() {
            HttpError::Connect {
                address: format!(
                    "{}:{}",
                    url.host_str().unwrap_or_default(),
                    url.port_or_known_default().unwrap_or_default()
                ),
                reason: e.to_string(),
            }
        } else {
            HttpError::Request(e.to_string())
        }
    }
}

/// Accept `http://` and `https://` URLs with a host.
fn parse_url(uri: &str) -> HttpResult<Url> {
    let url = Url::parse(uri).map_err(|e| HttpError::InvalidUri(format!("{uri}: {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(HttpError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none() {
        return Err(HttpError::InvalidUri(format!("{uri}: missing host")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let base = serve(Router::new().route("/hello", get(|| async { "world" }))).await;
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();

        let resp = client.get(&format!("{base}/hello")).await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(&resp.body[..], b"world");

        let missing = client.get(&format!("{base}/nope")).await.unwrap();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_json_sends_body_and_bearer() {
        let router = Router::new().route(
            "/echo",
            post(|headers: HeaderMap, body: String| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                format!("{auth}|{body}")
            }),
        );
        let base = serve(router).await;
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();

        let resp = client
            .post_json(&format!("{base}/echo"), b"[1,2]".to_vec(), Some("abc"))
            .await
            .unwrap();
        assert_eq!(&resp.body[..], b"Bearer abc|[1,2]");
    }

    #[test]
    fn parse_url_accepts_http_and_https_only() {
        assert_eq!(parse_url("https://bundles.local/b.zip").unwrap().scheme(), "https");
        assert_eq!(parse_url("http://bundles.local/b.zip").unwrap().scheme(), "http");
        assert!(matches!(
            parse_url("ftp://bundles.local/b.zip").unwrap_err(),
            HttpError::UnsupportedScheme(s) if s == "ftp"
        ));
        assert!(matches!(parse_url("not a uri").unwrap_err(), HttpError::InvalidUri(_)));
    }

    #[tokio::test]
    async fn https_goes_through_tls() {
        // A plain-HTTP listener cannot complete a TLS handshake, so the
        // request fails in transport rather than being refused up front.
        let base = serve(Router::new().route("/x", get(|| async { "plain" }))).await;
        let https = base.replacen("http://", "https://", 1);
        let client = HttpClient::new(Duration::from_secs(2)).unwrap();

        let err = client.get(&format!("{https}/x")).await.unwrap_err();
        assert!(!matches!(err, HttpError::UnsupportedScheme(_)), "{err}");
    }

    #[tokio::test]
    async fn connection_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(Duration::from_secs(2)).unwrap();
        let err = client.get(&format!("http://{addr}/x")).await.unwrap_err();
        assert!(matches!(err, HttpError::Connect { .. }));
    }
}
