use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{ClientBuilder, Method, Proxy};
use std::time::{Duration, Instant};
use url::Url;

use crate::error::RequestError;

/// Settings a `Client` is opened with.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on the whole exchange, connect through body.
    pub timeout: Duration,
    /// When false a 3xx is returned as-is with its `Location` header.
    pub follow_redirects: bool,
    /// Opaque browser profile name handed to the transport.
    pub impersonate: String,
    pub proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            follow_redirects: false,
            impersonate: "chrome".to_string(),
            proxy: None,
        }
    }
}

/// What a transport hands back for one exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub final_url: String,
}

/// One request/response exchange. Implementations own whatever session
/// state they pool; it is released when the transport is dropped.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, url: &str) -> Result<RawResponse, RequestError>;
}

/// Opens transports for a given client configuration.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Transport>, RequestError>;
}

/// Browser header presets selected by the impersonation profile name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserProfile {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

impl BrowserProfile {
    /// Unknown names fall back to Chrome.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.starts_with("firefox") {
            BrowserProfile::Firefox
        } else if name.starts_with("safari") {
            BrowserProfile::Safari
        } else if name.starts_with("edge") {
            BrowserProfile::Edge
        } else {
            BrowserProfile::Chrome
        }
    }

    pub fn user_agent(&self) -> &'static str {
        match self {
            BrowserProfile::Chrome => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            BrowserProfile::Firefox => "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
            BrowserProfile::Safari => "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
            BrowserProfile::Edge => "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        }
    }

    pub fn headers(&self) -> HeaderMap {
        let accept = match self {
            BrowserProfile::Firefox => "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            BrowserProfile::Safari => "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            BrowserProfile::Chrome | BrowserProfile::Edge => "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
        };
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent()));
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers
    }
}

/// Transport backed by a pooled `reqwest::Client`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn request(&self, method: Method, url: &str) -> Result<RawResponse, RequestError> {
        let resp = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(e, self.timeout))?;
        let status_code = resp.status().as_u16();
        let headers = resp.headers().clone();
        let final_url = resp.url().to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|e| RequestError::from_reqwest(e, self.timeout))?;
        Ok(RawResponse { status_code, headers, body: body.to_vec(), final_url })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestConnector;

impl Connector for ReqwestConnector {
    fn connect(&self, config: &ClientConfig) -> Result<Box<dyn Transport>, RequestError> {
        let profile = BrowserProfile::from_name(&config.impersonate);
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        };
        let mut builder = ClientBuilder::new()
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .tcp_nodelay(true)
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .use_rustls_tls()
            .redirect(redirect)
            .default_headers(profile.headers())
            // Recon targets routinely present self-signed or mismatched certificates
            .danger_accept_invalid_certs(true);
        if let Some(proxy) = &config.proxy {
            let proxy = Proxy::all(proxy).map_err(|e| RequestError::invalid_url(proxy, e))?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| RequestError::Transport(e.to_string()))?;
        Ok(Box::new(ReqwestTransport { client, timeout: config.timeout }))
    }
}

/// Normalized result of one GET. Never mutated after construction.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after any redirects.
    pub url: String,
    /// URL that was requested.
    pub orig_url: String,
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Elapsed milliseconds around the transport call.
    pub response_time: f64,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP client holding one transport session until `close` (or drop).
pub struct Client {
    config: ClientConfig,
    transport: Option<Box<dyn Transport>>,
}

impl Client {
    pub fn open(connector: &dyn Connector, config: ClientConfig) -> Result<Self, RequestError> {
        let transport = connector.connect(&config)?;
        Ok(Self { config, transport: Some(transport) })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn get(&self, url: &str) -> Result<Response, RequestError> {
        Url::parse(url).map_err(|e| RequestError::invalid_url(url, e))?;
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| RequestError::Transport("client already closed".into()))?;

        let start = Instant::now();
        let raw = transport.request(Method::GET, url).await?;
        let elapsed = start.elapsed();

        Ok(Response {
            url: raw.final_url,
            orig_url: url.to_string(),
            status_code: raw.status_code,
            headers: raw.headers,
            body: raw.body,
            response_time: elapsed.as_secs_f64() * 1000.0,
        })
    }

    /// Release the session. Dropping the client has the same effect.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!("released http session");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.release();
    }
}
