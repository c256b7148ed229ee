// # IP Source Trait
//
// Resolves the host's current public IPv4 address, once per cycle.
//
// ## Implementations
//
// - HTTP echo service: `ddns-ip-http` crate

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP resolvers
///
/// Implementations perform one lookup per call and must not cache; the
/// engine calls [`current`](IpSource::current) exactly once per cycle.
/// Failures are reported as [`Error::IpResolution`](crate::Error::IpResolution).
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Fetch the current public IPv4 address
    async fn current(&self) -> crate::Result<Ipv4Addr>;
}
