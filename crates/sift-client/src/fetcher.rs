use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sift_core::error::AppError;
use sift_core::traits::Fetcher;
use url::Url;

/// Listing pages routinely serve bot-detection stubs to unknown agents.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP fetcher for listing pages.
///
/// Sends a browser User-Agent and refuses bodies that are clearly not
/// markup. Requests to private or reserved addresses are refused unless
/// [`allow_private_urls`](Self::allow_private_urls) is called, which the
/// CLI does since the user owns the machine.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
    block_private: bool,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            block_private: true,
        })
    }

    /// Permit requests to private/reserved addresses.
    pub fn allow_private_urls(mut self) -> Self {
        self.block_private = false;
        self
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let target = parse_target(url)?;
        if self.block_private {
            ensure_public(&target).await?;
        }

        let response = self.client.get(target).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = content_type.as_deref() {
            if !is_markup(content_type) {
                return Err(AppError::HttpError(format!(
                    "{url} served {content_type}, not a page"
                )));
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;
        tracing::debug!(%url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Parse `url` and require an `http(s)` scheme with a host.
fn parse_target(url: &str) -> Result<Url, AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::InvalidUrl(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }
    if parsed.host_str().is_none() {
        return Err(AppError::InvalidUrl(format!("{url} has no host")));
    }
    Ok(parsed)
}

/// Markup or plain text; binary downloads are refused.
fn is_markup(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/") || mime == "application/xhtml+xml" || mime == "application/xml"
}

// ---------------------------------------------------------------------------
// Private address guard
// ---------------------------------------------------------------------------

/// Refuse hosts that are, or resolve to, private/reserved addresses.
async fn ensure_public(target: &Url) -> Result<(), AppError> {
    let host = target.host_str().unwrap_or_default();
    let blocked = |ip: IpAddr| {
        AppError::HttpError(format!("Blocked: {host} resolves to reserved address {ip}"))
    };

    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        return if is_reserved(ip) { Err(blocked(ip)) } else { Ok(()) };
    }

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
        .map(|addr| addr.ip())
        .collect();

    if addrs.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }
    match addrs.into_iter().find(|ip| is_reserved(*ip)) {
        Some(ip) => Err(blocked(ip)),
        None => Ok(()),
    }
}

fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_reserved_v4(v4),
        IpAddr::V6(v6) => is_reserved_v6(v6),
    }
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        // carrier-grade NAT, 100.64.0.0/10
        || (a == 100 && (b & 0xC0) == 64)
}

fn is_reserved_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xFFC0) == 0xFE80
        || (first & 0xFE00) == 0xFC00
        || ip.to_ipv4_mapped().is_some_and(is_reserved_v4)
}
