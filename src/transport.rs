use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single request to the vendor API.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl Request {
    pub(crate) fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn post(url: Url, body: Value) -> Self {
        Self {
            method: Method::Post,
            url,
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// First value of header `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body text of a completed exchange.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries one request to the server and brings back its response.
///
/// Only failures to complete the exchange are errors here; HTTP error statuses
/// are returned as ordinary responses.
pub trait Transport {
    fn send(&self, request: &Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request) -> Result<Response> {
        (**self).send(request)
    }
}

/// Blocking `reqwest` transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("glowmarkt-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("glowmarkt-rs")),
        );

        let http = HttpClient::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| Error::transport("(client setup)", e))?;

        Ok(Self { http })
    }

    /// Wraps an already configured `reqwest` client.
    pub fn with_client(http: HttpClient) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let mut req = match request.method {
            Method::Get => self.http.get(request.url.clone()),
            Method::Post => self.http.post(request.url.clone()),
        };
        for (name, value) in &request.headers {
            req = req.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .map_err(|e| Error::transport(request.url.as_str(), e))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| Error::transport(request.url.as_str(), e))?;
        Ok(Response { status, body })
    }
}
