use crate::state::SourceRecord;
use crate::traits::FeedTransport;
use crate::types::{FetchConfig, FetchOutcome, Result, Validators};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{header, Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct FeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_with_conditional_headers(&self, url: &str, validators: &Validators) -> reqwest::Result<Response> {
        let mut request = self.client.get(url);

        if let Some(etag) = &validators.etag {
            request = request.header(header::IF_NONE_MATCH, etag);
        }

        if let Some(last_modified) = &validators.last_modified {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        request.send().await
    }

    fn retry_policy(&self) -> ExponentialBackoff<backoff::SystemClock> {
        let delay = Duration::from_secs(self.config.retry_delay_seconds);
        ExponentialBackoff {
            current_interval: delay,
            initial_interval: delay,
            max_interval: delay * 8,
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_seconds.max(1) * 2)),
            ..Default::default()
        }
    }
}

fn header_value(response: &Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl FeedTransport for FeedFetcher {
    async fn fetch(&self, url: &str, validators: &Validators) -> FetchOutcome {
        let start_time = Instant::now();
        let mut backoff = self.retry_policy();
        let mut last_error = String::from("no attempt made");

        for attempt in 0..=self.config.max_retries {
            match self.fetch_with_conditional_headers(url, validators).await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::NOT_MODIFIED {
                        debug!("Feed not modified: {}", url);
                        return FetchOutcome::NotModified;
                    }

                    if status.is_success() {
                        let validators = Validators {
                            etag: header_value(&response, header::ETAG),
                            last_modified: header_value(&response, header::LAST_MODIFIED),
                        };
                        match response.text().await {
                            Ok(body) => {
                                info!(
                                    "Fetched {} ({} bytes in {}ms)",
                                    url,
                                    body.len(),
                                    start_time.elapsed().as_millis()
                                );
                                return FetchOutcome::Fresh { body, validators };
                            }
                            Err(e) => last_error = format!("reading body: {}", e),
                        }
                    } else {
                        last_error = format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        );
                        if !is_retryable_status(status) {
                            break;
                        }
                    }
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < self.config.max_retries {
                match backoff.next_backoff() {
                    Some(delay) => {
                        warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => break,
                }
            }
        }

        warn!("Failed to fetch {}: {}", url, last_error);
        FetchOutcome::Failed(last_error)
    }
}

/// Conditional GET against a source record.
///
/// Returns the body of a fresh response and overwrites both validators from it;
/// any other outcome returns `None` and leaves the record untouched.
pub async fn conditional_fetch(
    transport: &dyn FeedTransport,
    url: &str,
    record: &mut SourceRecord,
) -> Option<String> {
    match transport.fetch(url, &record.validators()).await {
        FetchOutcome::Fresh { body, validators } => {
            record.set_validators(validators);
            Some(body)
        }
        FetchOutcome::NotModified => None,
        FetchOutcome::Failed(reason) => {
            debug!("No content from {}: {}", url, reason);
            None
        }
    }
}
