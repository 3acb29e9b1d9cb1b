use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::error::{Error, Result};

use super::metric::Metric;
use super::request::HttpRequest;
use super::response::HttpResponse;

/// Executes realized requests. The runner only talks to this trait, so tests
/// can script responses without a server.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
    options: ClientOptions,
}

impl ReqwestClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::limited(10));
        if !options.timeout.is_zero() {
            builder = builder.timeout(options.timeout);
        }
        let client = builder
            .build()
            .map_err(|err| Error::Transport(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { client, options })
    }

    async fn attempt(&self, request: &HttpRequest, headers: &HeaderMap) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(headers.clone());

        if request.method.sends_body() {
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }
        }

        let started = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        let first_byte = started.elapsed();

        let status = response.status().as_u16();
        let response_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|err| Error::Transport(format!("Failed to read response: {err}")))?;
        let total = started.elapsed();

        let request_size = estimate_request_bytes(request) as f64;
        let size_download = bytes.len() as f64;
        let seconds = total.as_secs_f64();

        let mut metrics = BTreeMap::new();
        metrics.insert(Metric::TotalTime, seconds);
        metrics.insert(Metric::StarttransferTime, first_byte.as_secs_f64());
        metrics.insert(Metric::SizeDownload, size_download);
        metrics.insert(Metric::RequestSize, request_size);
        if seconds > 0.0 {
            metrics.insert(Metric::SpeedDownload, size_download / seconds);
            metrics.insert(Metric::SpeedUpload, request_size / seconds);
        }

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            metrics,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let headers = build_headers(&request.headers)?;
        let mut last_error = None;

        for attempt in 0..=self.options.retries {
            if attempt > 0 {
                tracing::debug!(url = %request.url, attempt, "retrying request");
                tokio::time::sleep(self.options.retry_delay).await;
            }

            match self.attempt(request, &headers).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    tracing::debug!(url = %request.url, attempt, error = %err, "request attempt failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Transport("Request failed".into())))
    }
}

pub fn build_headers(input: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    for (key, value) in input {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| Error::Transport(format!("Invalid header name `{key}`: {err}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|err| Error::Transport(format!("Invalid header value for `{key}`: {err}")))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}

/// Approximate wire size of the request line, headers and body.
fn estimate_request_bytes(request: &HttpRequest) -> usize {
    let request_line = request.method.to_string().len() + request.url.len() + 12;
    let headers: usize = request
        .headers
        .iter()
        .map(|(key, value)| key.len() + value.len() + 4)
        .sum();
    let body = if request.method.sends_body() {
        request.body.as_ref().map_or(0, String::len)
    } else {
        0
    };
    request_line + headers + body
}
