use std::net::IpAddr;
use std::time::Duration;

use forage_core::error::AppError;
use forage_core::traits::Fetcher;
use reqwest::Client;
use url::Url;

/// HTTP fetcher using reqwest.
///
/// Downloads page bodies and API responses with a configurable timeout,
/// mapping transport and status failures into the error taxonomy so the
/// retry executor can classify them. Because source URLs come from
/// operator configuration and are fetched unattended on a schedule,
/// requests to private/reserved addresses are refused by default; use
/// [`allow_private_urls`](Self::allow_private_urls) to lift that for
/// local testing.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    timeout_secs: u64,
    guard_private_hosts: bool,
}

impl PageFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("forage/0.1 (content collector)")
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            guard_private_hosts: true,
        })
    }

    /// Allow requests to private/reserved addresses (local testing only).
    pub fn allow_private_urls(mut self) -> Self {
        self.guard_private_hosts = false;
        self
    }

    /// Reject non-http(s) schemes and hosts that resolve to
    /// private/reserved addresses.
    async fn check_target(&self, url: &str) -> Result<(), AppError> {
        let parsed =
            Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL '{url}': {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "URL scheme '{}' is not allowed (only http/https)",
                parsed.scheme()
            )));
        }

        if !self.guard_private_hosts {
            return Ok(());
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| AppError::Validation(format!("URL '{url}' has no host")))?;

        let resolved: Vec<IpAddr> = if let Ok(ip) = host.parse::<IpAddr>() {
            vec![ip]
        } else {
            let port = parsed.port_or_known_default().unwrap_or(443);
            tokio::net::lookup_host((host, port))
                .await
                .map_err(|e| AppError::Network(format!("DNS resolution failed for {host}: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        };

        if resolved.is_empty() {
            return Err(AppError::Network(format!(
                "DNS resolution returned no addresses for {host}"
            )));
        }
        if let Some(ip) = resolved.into_iter().find(|ip| is_reserved_ip(*ip)) {
            return Err(AppError::Validation(format!(
                "Refusing to fetch {host}: resolves to private/reserved address {ip}"
            )));
        }
        Ok(())
    }
}

impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.check_target(url).await?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::Network(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimitExceeded);
        }
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status_code: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}

/// Private, loopback, link-local, and otherwise non-routable addresses.
fn is_reserved_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_reserved_ip(IpAddr::V4(v4)))
        }
    }
}
