// # ddns-core
//
// Core library for the DDNS reconciliation system.
//
// ## Architecture Overview
//
// This library keeps a managed set of hostnames pointed at the right IPv4
// address on two backends:
// - **DnsProvider**: Trait for reading and writing A records (public zone or
//   local network controller)
// - **IpSource**: Trait for resolving the current public IP
// - **DdnsEngine**: Public pass, one provider call sequence per name
// - **LocalSync**: Local pass, exact name plus its `.local` companion
// - **CheckCycle** / **Scheduler**: Periodic, single-instance execution
// - **StatsStore** / **ActivityLog**: Per-name counters and the
//   human-readable event log
// - **ConfigStore** / **PolicyStore**: Global settings and per-name overrides
// - **ProviderRegistry**: Plugin-based registry for DNS providers
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Contained Failure**: One name's provider error never stops the cycle

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod management;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use activity::ActivityLog;
pub use config::{GlobalConfig, IpMode, LocalProviderSettings, Policy, ProviderConfig, ZoneMap};
pub use engine::{CheckCycle, CycleReport, CycleSummary, DdnsEngine, LocalSync, LocalTally, Outcome};
pub use error::{Error, Result};
pub use management::ManagementService;
pub use registry::ProviderRegistry;
pub use scheduler::{ScheduledJob, Scheduler, SchedulerControl, SchedulerHandle};
pub use state::{JsonConfigStore, JsonLinesLogStore, JsonPolicyStore, JsonStatsStore};
pub use traits::{
    ConfigStore, DiscoveredHost, DnsProvider, DnsProviderFactory, HostnameDiscovery, IpSource,
    LogEntry, LogLevel, LogStore, PolicyStore, ProviderRecord, RecordStats, StatsStore,
};
