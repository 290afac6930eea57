use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use url::Host;

/// Longest a preflight lookup may take before the host counts as unresolvable.
pub const DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Hostname lookup used as a preflight before a check is stored.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Whether `host` resolves to at least one address.
    async fn resolves(&self, host: &str) -> bool;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio).
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolves(&self, host: &str) -> bool {
        // IP literals need no lookup.
        match Host::parse(host) {
            Ok(Host::Ipv4(_)) | Ok(Host::Ipv6(_)) => return true,
            Ok(Host::Domain(_)) => {}
            Err(_) => return false,
        }
        within(DNS_TIMEOUT, host, tokio::net::lookup_host((host, 80))).await
    }
}

async fn within<F, I>(deadline: Duration, host: &str, lookup: F) -> bool
where
    F: Future<Output = io::Result<I>>,
    I: Iterator<Item = SocketAddr>,
{
    match tokio::time::timeout(deadline, lookup).await {
        Ok(Ok(mut addrs)) => addrs.next().is_some(),
        Ok(Err(e)) => {
            tracing::debug!(host, error = %e, "DNS lookup failed");
            false
        }
        Err(_) => {
            tracing::warn!(host, "DNS lookup timed out");
            false
        }
    }
}
