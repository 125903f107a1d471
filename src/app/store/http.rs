//! HTTP(S) object store with rate limiting and retry logic
//!
//! Metadata comes from a `HEAD` request (`Content-Length` plus a published
//! CRC32C header); range reads are `GET` requests with a `Range` header.
//! Retries with exponential backoff cover connection failures and
//! `429`/`503`/`5xx` responses up to the point where a response is
//! accepted. Once the body is streaming, failures surface to the caller.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, RANGE};
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::config::ClientConfig;
use super::{ByteStream, ObjectMetadata, ObjectStore};
use crate::app::checksum::Crc32c;
use crate::app::range::RangeDescriptor;
use crate::constants::http;
use crate::errors::{StoreError, StoreResult};

/// Object store speaking plain HTTP range requests
#[derive(Debug)]
pub struct HttpObjectStore {
    client: Client,
    config: ClientConfig,
    base_url: Option<Url>,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpObjectStore {
    /// Creates a store with a client built from `config`
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the rate limit is zero or the client cannot be
    /// built
    pub fn new(config: ClientConfig) -> StoreResult<Self> {
        let client = config.build_http_client()?;
        Self::with_client(client, config)
    }

    /// Creates a store around an existing client
    pub fn with_client(client: Client, config: ClientConfig) -> StoreResult<Self> {
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            config,
            base_url: None,
            rate_limiter,
        })
    }

    /// Resolve relative object names against `base_url`
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> StoreResult<RateLimiter<NotKeyed, InMemoryState, DefaultClock>> {
        let rps = NonZeroU32::new(rate_limit_rps)
            .ok_or_else(|| StoreError::Other("Rate limit must be non-zero".to_string()))?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Turn an object name into the URL to request
    pub fn resolve(&self, object: &str) -> StoreResult<Url> {
        let parsed = match &self.base_url {
            Some(base) => base.join(object),
            None => Url::parse(object),
        };
        parsed.map_err(|e| StoreError::InvalidUrl {
            url: object.to_string(),
            error: e.to_string(),
        })
    }

    /// Sends a request, retrying transient failures with backoff
    async fn send(&self, method: Method, url: &Url, range: Option<&str>) -> StoreResult<Response> {
        let mut retries = 0;
        loop {
            // Spread bursts from a fresh batch over a short window
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(20)))
                .await;

            let mut request = self.client.request(method.clone(), url.as_str());
            if let Some(range) = range {
                request = request.header(RANGE, range);
            }

            let outcome = match request.send().await {
                Ok(response) => match classify_status(response.status(), url) {
                    Ok(()) => return Ok(response),
                    Err(e) => e,
                },
                Err(e) => StoreError::Http(e),
            };

            if !outcome.is_transient() {
                return Err(outcome);
            }
            if retries >= self.config.max_retries {
                warn!(
                    "{} {} failed after {} retries: {}",
                    method, url, self.config.max_retries, outcome
                );
                return Err(StoreError::MaxRetriesExceeded {
                    max_retries: self.config.max_retries,
                });
            }

            retries += 1;
            let delay = self.config.retry_delay(retries);
            warn!(
                "{} {} failed (attempt {}/{}): {}. Retrying in {}ms",
                method,
                url,
                retries,
                self.config.max_retries,
                outcome,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn metadata(&self, object: &str) -> StoreResult<ObjectMetadata> {
        let url = self.resolve(object)?;
        let response = self.send(Method::HEAD, &url, None).await?;

        let headers = response.headers();
        let size = parse_content_length(headers)?;
        let crc32c = parse_crc32c(headers);
        debug!("Metadata for {}: {} bytes, crc32c {:?}", url, size, crc32c);

        Ok(ObjectMetadata { size, crc32c })
    }

    async fn read_range(&self, object: &str, offset: u64, length: u64) -> StoreResult<ByteStream> {
        if length == 0 {
            return Ok(stream::empty().boxed());
        }

        let range = RangeDescriptor::new(offset, length).ok_or_else(|| {
            StoreError::Other(format!("range {}+{} overflows the object size", offset, length))
        })?;
        let url = self.resolve(object)?;
        let range = range_header(range);
        let response = self.send(Method::GET, &url, Some(&range)).await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            // Server ignored the Range header; only usable from offset zero
            StatusCode::OK if offset == 0 => {}
            status => {
                return Err(StoreError::InvalidResponse {
                    reason: format!("HTTP {} for {} of {}", status.as_u16(), range, url),
                })
            }
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StoreError::Http))
            .boxed())
    }
}

/// Map a response status to success or a store error
fn classify_status(status: StatusCode, url: &Url) -> StoreResult<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(StoreError::NotFound {
            object: url.to_string(),
        }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::AccessDenied {
            object: url.to_string(),
            status: status.as_u16(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(StoreError::RateLimitExceeded),
        StatusCode::SERVICE_UNAVAILABLE => Err(StoreError::ServerOverloaded),
        s if s.is_server_error() => Err(StoreError::ServerError { status: s.as_u16() }),
        s => Err(StoreError::InvalidResponse {
            reason: format!("unexpected HTTP {} for {}", s.as_u16(), url),
        }),
    }
}

/// Inclusive `Range` header value for `range`
fn range_header(range: RangeDescriptor) -> String {
    format!("bytes={}-{}", range.offset(), range.last_byte())
}

fn parse_content_length(headers: &HeaderMap) -> StoreResult<u64> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| StoreError::InvalidResponse {
            reason: "missing Content-Length".to_string(),
        })?;

    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| StoreError::InvalidResponse {
            reason: format!("invalid Content-Length: {:?}", value),
        })
}

/// Published CRC32C, from `x-goog-hash: crc32c=<base64>` or a hex header
fn parse_crc32c(headers: &HeaderMap) -> Option<Crc32c> {
    let from_goog_hash = headers
        .get_all(http::GOOG_HASH_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|entry| entry.trim().strip_prefix("crc32c="))
        .find_map(|encoded| Crc32c::from_base64(encoded).ok());

    from_goog_hash.or_else(|| {
        headers
            .get(http::CRC32C_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Crc32c::from_hex(value.trim()).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn test_url() -> Url {
        Url::parse("https://storage.example.com/bucket/object").unwrap()
    }

    #[test]
    fn test_range_header_is_inclusive() {
        let header =
            |offset, length| range_header(RangeDescriptor::new(offset, length).unwrap());
        assert_eq!(header(0, 30), "bytes=0-29");
        assert_eq!(header(90, 10), "bytes=90-99");
        assert_eq!(header(5, 1), "bytes=5-5");
    }

    #[test]
    fn test_parse_goog_hash_header() {
        let mut headers = HeaderMap::new();
        headers.append(
            http::GOOG_HASH_HEADER,
            HeaderValue::from_static("crc32c=4waSgw==,md5=ZmFrZQ=="),
        );
        assert_eq!(parse_crc32c(&headers), Some(Crc32c::new(0xe306_9283)));

        let mut headers = HeaderMap::new();
        headers.append(http::GOOG_HASH_HEADER, HeaderValue::from_static("md5=ZmFrZQ=="));
        headers.append(http::GOOG_HASH_HEADER, HeaderValue::from_static("crc32c=AAAAAA=="));
        assert_eq!(parse_crc32c(&headers), Some(Crc32c::new(0)));
    }

    #[test]
    fn test_parse_hex_checksum_header_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(http::CRC32C_HEADER, HeaderValue::from_static("e3069283"));
        assert_eq!(parse_crc32c(&headers), Some(Crc32c::new(0xe306_9283)));

        assert_eq!(parse_crc32c(&HeaderMap::new()), None);
    }

    #[test]
    fn test_parse_content_length() {
        let mut headers = HeaderMap::new();
        assert!(parse_content_length(&headers).is_err());

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1048576"));
        assert_eq!(parse_content_length(&headers).unwrap(), 1_048_576);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("-3"));
        assert!(parse_content_length(&headers).is_err());
    }

    #[test]
    fn test_status_classification() {
        let url = test_url();
        assert!(classify_status(StatusCode::PARTIAL_CONTENT, &url).is_ok());
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, &url),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, &url),
            Err(StoreError::AccessDenied { status: 403, .. })
        ));

        let overloaded = classify_status(StatusCode::SERVICE_UNAVAILABLE, &url).unwrap_err();
        assert!(overloaded.is_transient());
        let bad_gateway = classify_status(StatusCode::BAD_GATEWAY, &url).unwrap_err();
        assert!(bad_gateway.is_transient());
        let range_error = classify_status(StatusCode::RANGE_NOT_SATISFIABLE, &url).unwrap_err();
        assert!(!range_error.is_transient());
    }

    #[test]
    fn test_resolve_object_names() {
        let store = HttpObjectStore::new(ClientConfig::default()).unwrap();
        assert_eq!(
            store.resolve("https://example.com/a/b.bin").unwrap().as_str(),
            "https://example.com/a/b.bin"
        );
        assert!(store.resolve("relative/name").is_err());

        let store = store.with_base_url(Url::parse("https://example.com/bucket/").unwrap());
        assert_eq!(
            store.resolve("dir/object.bin").unwrap().as_str(),
            "https://example.com/bucket/dir/object.bin"
        );
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let config = ClientConfig {
            rate_limit_rps: 0,
            ..Default::default()
        };
        assert!(HttpObjectStore::new(config).is_err());
    }

    #[tokio::test]
    async fn test_zero_length_read_needs_no_request() {
        let store = HttpObjectStore::new(ClientConfig::default()).unwrap();
        let stream = store
            .read_range("https://invalid.invalid/object", 0, 0)
            .await
            .unwrap();
        assert_eq!(stream.count().await, 0);
    }
}
