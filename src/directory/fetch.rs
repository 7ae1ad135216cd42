use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use super::error::FetchError;

/// Default per-request timeout for discovery calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// An outbound GET request to an agent endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Per-request headers. These take precedence over any adapter defaults.
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// The status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, truncated for inclusion in error messages.
    pub fn excerpt(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        match text.char_indices().nth(200) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_string(),
        }
    }
}

/// The network primitive used to reach agent endpoints.
///
/// Implementations must be shareable across concurrent resolutions.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

#[async_trait]
impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        (**self).fetch(request).await
    }
}

/// `Fetch` over a `reqwest` client.
#[derive(Clone)]
pub struct HttpFetch {
    client: Client,
}

impl HttpFetch {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let headers = build_headers(&request.headers)?;
        let response = self
            .client
            .get(&request.url)
            .headers(headers)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(FetchResponse { status, body })
    }
}

/// Converts a header map from configuration into a `reqwest` header map.
fn build_headers(source: &BTreeMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    for (key, value) in source {
        let header_name = HeaderName::from_bytes(key.as_bytes())?;
        headers.insert(header_name, HeaderValue::from_str(value)?);
    }
    Ok(headers)
}

/// Decorator that adds a fixed header set to every request of the wrapped `Fetch`.
///
/// Adapter headers act as defaults: a header already present on the request (compared
/// case-insensitively) is left untouched. Errors of the inner call pass through as-is.
#[derive(Clone)]
pub struct ProxyFetch<F> {
    inner: F,
    headers: BTreeMap<String, String>,
}

impl<F: Fetch> ProxyFetch<F> {
    pub fn new(inner: F, headers: BTreeMap<String, String>) -> Self {
        Self { inner, headers }
    }

    fn merge(&self, mut request: FetchRequest) -> FetchRequest {
        for (name, value) in &self.headers {
            let present = request
                .headers
                .keys()
                .any(|existing| existing.eq_ignore_ascii_case(name));
            if !present {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        request
    }
}

#[async_trait]
impl<F: Fetch> Fetch for ProxyFetch<F> {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        self.inner.fetch(self.merge(request)).await
    }
}

/// Builds the HTTP fetch used for agent discovery, carrying `custom_headers` on every call.
pub fn create_proxy_fetch(
    custom_headers: Option<BTreeMap<String, String>>,
    timeout: Duration,
) -> Result<ProxyFetch<HttpFetch>, FetchError> {
    Ok(ProxyFetch::new(
        HttpFetch::new(timeout)?,
        custom_headers.unwrap_or_default(),
    ))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory `Fetch` that serves canned responses by URL and records every request.
    #[derive(Default)]
    pub struct FakeFetch {
        routes: Mutex<HashMap<String, Vec<Result<FetchResponse, String>>>>,
        pub requests: Mutex<Vec<FetchRequest>>,
        delays: Mutex<HashMap<String, Duration>>,
    }

    impl FakeFetch {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a JSON response for `url`. The last queued response repeats.
        pub fn json(self, url: &str, body: &str) -> Self {
            self.respond(url, 200, body)
        }

        pub fn respond(self, url: &str, status: u16, body: &str) -> Self {
            self.routes
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(Ok(FetchResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }));
            self
        }

        pub fn fail(self, url: &str, message: &str) -> Self {
            self.routes
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(Err(message.to_string()));
            self
        }

        pub fn delay(self, url: &str, delay: Duration) -> Self {
            self.delays.lock().unwrap().insert(url.to_string(), delay);
            self
        }

        pub fn requested_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|request| request.url.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Fetch for FakeFetch {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            let delay = self.delays.lock().unwrap().get(&url).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let next = {
                let mut routes = self.routes.lock().unwrap();
                match routes.get_mut(&url) {
                    Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
                    Some(queue) => queue.first().cloned(),
                    None => None,
                }
            };
            match next {
                Some(Ok(response)) => Ok(response),
                Some(Err(message)) => Err(FetchError::Other(message)),
                None => Ok(FetchResponse {
                    status: 404,
                    body: b"not found".to_vec(),
                }),
            }
        }
    }
}
