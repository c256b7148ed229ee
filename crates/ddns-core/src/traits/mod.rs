//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Read and write A records on a DNS backend
//! - [`IpSource`]: Resolve the current public IP
//! - [`StatsStore`]: Per-name outcome counters
//! - [`LogStore`]: Append-only activity log storage
//! - [`ConfigStore`] / [`PolicyStore`]: Global settings and per-name overrides
//! - [`HostnameDiscovery`]: Read-only hostname sources

pub mod config_store;
pub mod discovery;
pub mod dns_provider;
pub mod ip_source;
pub mod log_store;
pub mod stats_store;

pub use config_store::{ConfigStore, PolicyStore};
pub use discovery::{DiscoveredHost, HostnameDiscovery};
pub use dns_provider::{DnsProvider, DnsProviderFactory, ProviderRecord};
pub use ip_source::IpSource;
pub use log_store::{LogEntry, LogLevel, LogStore};
pub use stats_store::{RecordStats, StatsStore};
