//! Cross-domain proxy for clients that cannot fetch non-local origins
//! directly.
//!
//! The actual fetch is a capability supplied by the host ([`UrlFetcher`]),
//! selected at startup: a plain HTTP client in most deployments, a
//! platform fetch API elsewhere. The proxy itself only parses the target
//! out of the query string, relays the fetched body, and suppresses
//! hop-by-hop headers that must not be forwarded.

use percent_encoding::percent_decode_str;
use tracing::error;

use crate::errors::BoxError;

pub(crate) const PROXY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::proxy");

/// Headers never forwarded from the fetched response.
const SUPPRESSED_HEADERS: [&str; 2] = ["transfer-encoding", "set-cookie"];

/// Result of fetching a proxied URL.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Response headers as received from the origin.
    pub headers: Vec<(String, String)>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

/// Capability interface for performing the outbound fetch.
#[cfg_attr(test, mockall::automock)]
pub trait UrlFetcher {
    /// Fetches `url` and returns the origin's headers and body.
    ///
    /// # Errors
    ///
    /// Returns an error when the fetch fails for any reason.
    fn fetch(&self, url: &str) -> Result<FetchedResponse, BoxError>;
}

/// Response the host's transport layer writes back to the client.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: u16,
    /// Headers to forward, already filtered.
    pub headers: Vec<(String, String)>,
    /// Body bytes to relay.
    pub body: Vec<u8>,
}

impl ProxyResponse {
    fn rejection(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// Bounces requests to non-local origins through a host-supplied fetcher.
#[derive(Debug)]
pub struct CrossDomainProxy<F> {
    fetcher: F,
}

impl<F: UrlFetcher> CrossDomainProxy<F> {
    /// Creates a proxy over the given fetch capability.
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Handles one proxy request given the raw query string.
    ///
    /// The target is taken from the `url` query parameter; a missing
    /// parameter is a `400`. Values that arrive without a scheme separator
    /// are percent-decoded once more, matching clients that pre-encode the
    /// whole target.
    pub fn handle(&self, query_string: &str) -> ProxyResponse {
        let target = url::form_urlencoded::parse(query_string.as_bytes())
            .find(|(key, _)| key == "url")
            .map(|(_, value)| value.into_owned());
        let Some(mut target) = target else {
            return ProxyResponse::rejection(400);
        };

        if !target.contains("://") {
            target = percent_decode_str(&target).decode_utf8_lossy().into_owned();
        }

        match self.fetcher.fetch(&target) {
            Ok(fetched) => ProxyResponse {
                status: 200,
                headers: filter_headers(fetched.headers),
                body: fetched.body,
            },
            Err(fault) => {
                error!(target: PROXY_TARGET, url = %target, error = %fault, "proxied fetch failed");
                ProxyResponse::rejection(502)
            }
        }
    }
}

fn filter_headers(headers: Vec<(String, String)>) -> Vec<(String, String)> {
    headers
        .into_iter()
        .filter(|(name, _)| {
            !SUPPRESSED_HEADERS
                .iter()
                .any(|suppressed| name.eq_ignore_ascii_case(suppressed))
        })
        .collect()
}
