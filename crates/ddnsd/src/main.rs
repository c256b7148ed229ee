// # ddnsd - DDNS Daemon
//
// Thin integration layer: reads environment configuration, opens the JSON
// stores, registers the providers, and runs the check cycle on the
// scheduler until a shutdown signal arrives. All reconciliation logic
// lives in ddns-core.
//
// ## Configuration
//
// ### Daemon
// - `DDNS_DATA_DIR`: Directory for config.json, policies.json, stats.json
//   and activity.jsonl (default `/var/lib/ddns`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
// - `DDNS_IP_SOURCE_URL`: Plain-text IP echo service (default ipify)
// - `DDNS_LOG_RETENTION_DAYS`: Activity log retention (default 7)
// - `DDNS_SHUTDOWN_GRACE_SECS`: Wait for an in-flight cycle (default 30)
//
// ### Bootstrap overrides
//
// Merged into the stored configuration at startup when set:
// - `DDNS_CLOUDFLARE_API_TOKEN`
// - `DDNS_ZONES`: JSON object of base domain to zone id
// - `DDNS_RECORDS`: Comma-separated managed names
// - `DDNS_CHECK_INTERVAL`: Seconds between cycles (10-86400)
// - `DDNS_UNIFI_ENABLED`, `DDNS_UNIFI_HOST`, `DDNS_UNIFI_API_KEY`,
//   `DDNS_UNIFI_SITE_ID`, `DDNS_UNIFI_DEFAULT_IP`
// - `DDNS_K8S_ENABLED`
//
// ## Signals
//
// - SIGHUP: reload config.json, apply the interval, list discovery suggestions
// - SIGTERM / SIGINT: stop scheduling and wait for the running cycle
//
// ## Example
//
// ```bash
// export DDNS_DATA_DIR=/var/lib/ddns
// export DDNS_CLOUDFLARE_API_TOKEN=your_token
// export DDNS_ZONES='{"example.com":"023e105f4ecef8ad9ca31a8372d0c353"}'
// export DDNS_RECORDS=home.example.com,vpn.example.com
//
// ddnsd
// ```

use anyhow::Result;
use ddns_core::config::{CHECK_INTERVAL_RANGE, parse_optional_ipv4, validate_hostname};
use ddns_core::state::{JsonConfigStore, JsonLinesLogStore, JsonPolicyStore, JsonStatsStore};
use ddns_core::traits::ConfigStore;
use ddns_core::{
    ActivityLog, CheckCycle, GlobalConfig, ManagementService, ProviderRegistry, Scheduler,
    SchedulerHandle, ZoneMap,
};
use ddns_ip_http::{DEFAULT_IP_URL, HttpIpSource};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_DATA_DIR: &str = "/var/lib/ddns";
const DEFAULT_RETENTION_DAYS: u32 = 7;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Values merged into the stored configuration at startup
#[derive(Default)]
struct BootstrapOverrides {
    api_token: Option<String>,
    zones: Option<String>,
    records: Option<Vec<String>>,
    interval_secs: Option<u64>,
    unifi_enabled: Option<bool>,
    unifi_host: Option<String>,
    unifi_api_key: Option<String>,
    unifi_site_id: Option<String>,
    unifi_default_ip: Option<String>,
    k8s_enabled: Option<bool>,
}

impl BootstrapOverrides {
    /// Apply every set value; returns whether anything was set
    fn apply(&self, config: &mut GlobalConfig) -> Result<bool> {
        let mut changed = false;

        if let Some(token) = &self.api_token {
            config.api_token = token.clone();
            changed = true;
        }
        if let Some(zones) = &self.zones {
            config.zones = parse_zones(zones)?;
            changed = true;
        }
        if let Some(records) = &self.records {
            config.records = records.clone();
            changed = true;
        }
        if let Some(interval) = self.interval_secs {
            config.interval_secs = interval;
            changed = true;
        }
        if let Some(enabled) = self.unifi_enabled {
            config.local.enabled = enabled;
            changed = true;
        }
        if let Some(host) = &self.unifi_host {
            config.local.host = host.clone();
            changed = true;
        }
        if let Some(key) = &self.unifi_api_key {
            config.local.api_key = key.clone();
            changed = true;
        }
        if let Some(site) = &self.unifi_site_id {
            config.local.site_id = site.clone();
            changed = true;
        }
        if let Some(ip) = &self.unifi_default_ip {
            config.local.default_ip = parse_optional_ipv4(ip)?;
            changed = true;
        }
        if let Some(enabled) = self.k8s_enabled {
            config.k8s_enabled = enabled;
            changed = true;
        }

        Ok(changed)
    }
}

/// Application configuration
struct Config {
    data_dir: PathBuf,
    log_level: String,
    ip_source_url: String,
    log_retention_days: u32,
    shutdown_grace_secs: u64,
    overrides: BootstrapOverrides,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Empty values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            data_dir: get("DDNS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            log_level: get("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            ip_source_url: get("DDNS_IP_SOURCE_URL").unwrap_or_else(|| DEFAULT_IP_URL.to_string()),
            log_retention_days: parse_number("DDNS_LOG_RETENTION_DAYS", get("DDNS_LOG_RETENTION_DAYS"))?
                .unwrap_or(DEFAULT_RETENTION_DAYS),
            shutdown_grace_secs: parse_number("DDNS_SHUTDOWN_GRACE_SECS", get("DDNS_SHUTDOWN_GRACE_SECS"))?
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            overrides: BootstrapOverrides {
                api_token: get("DDNS_CLOUDFLARE_API_TOKEN").map(|s| s.trim().to_string()),
                zones: get("DDNS_ZONES"),
                records: get("DDNS_RECORDS").map(|s| {
                    s.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                }),
                interval_secs: parse_number("DDNS_CHECK_INTERVAL", get("DDNS_CHECK_INTERVAL"))?,
                unifi_enabled: parse_bool("DDNS_UNIFI_ENABLED", get("DDNS_UNIFI_ENABLED"))?,
                unifi_host: get("DDNS_UNIFI_HOST").map(|s| s.trim().to_string()),
                unifi_api_key: get("DDNS_UNIFI_API_KEY"),
                unifi_site_id: get("DDNS_UNIFI_SITE_ID").map(|s| s.trim().to_string()),
                unifi_default_ip: get("DDNS_UNIFI_DEFAULT_IP"),
                k8s_enabled: parse_bool("DDNS_K8S_ENABLED", get("DDNS_K8S_ENABLED"))?,
            },
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        if !self.ip_source_url.starts_with("https://") && !self.ip_source_url.starts_with("http://") {
            anyhow::bail!(
                "DDNS_IP_SOURCE_URL must use HTTP or HTTPS scheme. Got: {}",
                self.ip_source_url
            );
        }

        if !(1..=3650).contains(&self.log_retention_days) {
            anyhow::bail!(
                "DDNS_LOG_RETENTION_DAYS must be between 1 and 3650. Got: {}",
                self.log_retention_days
            );
        }

        if !(1..=300).contains(&self.shutdown_grace_secs) {
            anyhow::bail!(
                "DDNS_SHUTDOWN_GRACE_SECS must be between 1 and 300 seconds. Got: {}",
                self.shutdown_grace_secs
            );
        }

        let overrides = &self.overrides;
        if let Some(interval) = overrides.interval_secs
            && !CHECK_INTERVAL_RANGE.contains(&interval)
        {
            anyhow::bail!(
                "DDNS_CHECK_INTERVAL must be between {} and {} seconds. Got: {}",
                CHECK_INTERVAL_RANGE.start(),
                CHECK_INTERVAL_RANGE.end(),
                interval
            );
        }

        if let Some(zones) = &overrides.zones {
            parse_zones(zones)?;
        }

        for record in overrides.records.iter().flatten() {
            validate_hostname(record)
                .map_err(|e| anyhow::anyhow!("DDNS_RECORDS entry '{}' is invalid: {}", record, e))?;
        }

        if let Some(ip) = &overrides.unifi_default_ip {
            parse_optional_ipv4(ip)
                .map_err(|e| anyhow::anyhow!("DDNS_UNIFI_DEFAULT_IP is invalid: {}", e))?;
        }

        Ok(())
    }

    fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{} must be a whole number. Got: {}", key, v))
        })
        .transpose()
}

fn parse_bool(key: &str, value: Option<String>) -> Result<Option<bool>> {
    value
        .map(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!("{} must be true or false. Got: {}", key, v)),
        })
        .transpose()
}

fn parse_zones(text: &str) -> Result<ZoneMap> {
    serde_json::from_str(text).map_err(|e| {
        anyhow::anyhow!(
            "DDNS_ZONES must be a JSON object of base domain to zone id: {}",
            e
        )
    })
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd daemon");
    info!("Data directory: {}", config.data_dir.display());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::start(&config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };
        match daemon.run(Duration::from_secs(config.shutdown_grace_secs)).await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DdnsExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Everything the daemon keeps alive between signals
struct Daemon {
    config_store: Arc<JsonConfigStore>,
    management: ManagementService,
    scheduler: SchedulerHandle,
}

impl Daemon {
    async fn start(config: &Config) -> Result<Self> {
        let dir = &config.data_dir;

        let config_store = Arc::new(JsonConfigStore::open(dir.join("config.json")).await?);
        let mut stored = config_store.load().await?;
        if config.overrides.apply(&mut stored)? {
            stored.validate()?;
            config_store.save(&stored).await?;
            info!("Applied environment overrides to stored configuration");
        }
        info!(
            "Configuration loaded: {} record(s), {} zone(s), check every {}s",
            stored.records.len(),
            stored.zones.len(),
            stored.interval_secs
        );

        let policy_store = Arc::new(JsonPolicyStore::open(dir.join("policies.json")).await?);
        let stats = Arc::new(JsonStatsStore::open(dir.join("stats.json")).await?);
        let log_store = Arc::new(JsonLinesLogStore::open(dir.join("activity.jsonl")).await?);
        let activity = Arc::new(ActivityLog::new(log_store));

        let registry = Arc::new(ProviderRegistry::new());
        info!("Registering Cloudflare provider");
        ddns_provider_cloudflare::register(&registry);
        info!("Registering UniFi provider");
        ddns_provider_unifi::register(&registry);

        let ip_source = Arc::new(HttpIpSource::new(config.ip_source_url.clone())?);
        info!("Public IP source: {}", ip_source.url());

        let cycle = CheckCycle::new(
            registry.clone(),
            config_store.clone(),
            policy_store.clone(),
            stats.clone(),
            activity.clone(),
            ip_source.clone(),
        )
        .with_retention_days(config.log_retention_days);

        let scheduler = Scheduler::spawn(Arc::new(cycle), Duration::from_secs(stored.interval_secs))?;

        let management = ManagementService::new(
            config_store.clone(),
            policy_store,
            stats,
            activity,
            registry,
            ip_source,
        )
        .with_scheduler(scheduler.control());

        #[cfg(feature = "k8s")]
        let management = management.with_discovery(Arc::new(
            ddns_discovery_k8s::IngressDiscovery::new(true),
        ));

        Ok(Self {
            config_store,
            management,
            scheduler,
        })
    }

    async fn run(self, grace: Duration) -> Result<()> {
        info!("Daemon initialized successfully");
        self.report_discovery().await;

        let signal = wait_for_shutdown(&self).await?;
        info!("Received shutdown signal: {}", signal);
        info!("Shutting down daemon");

        if !self.scheduler.shutdown(grace).await {
            warn!("Check cycle still running after {:?}; abandoned", grace);
        }
        Ok(())
    }

    /// Re-read config.json and apply what can change at runtime
    async fn reload(&self) {
        match self.config_store.reload().await {
            Ok(config) => {
                match reloaded_interval(&config) {
                    Ok(interval) => {
                        if let Err(e) = self.scheduler.reschedule(interval) {
                            warn!("Ignoring reloaded check interval: {}", e);
                        }
                    }
                    Err(e) => warn!(
                        "Ignoring reloaded check interval, keeping {}s: {}",
                        self.scheduler.interval().as_secs(),
                        e
                    ),
                }
                info!("Configuration reloaded: {} record(s)", config.records.len());
                self.report_discovery().await;
            }
            Err(e) => error!("Failed to reload configuration: {}", e),
        }
    }

    async fn report_discovery(&self) {
        match self.management.discover_unmanaged().await {
            Ok(hosts) => {
                for host in hosts {
                    info!(
                        "Unmanaged hostname {} (ingress {}/{})",
                        host.hostname, host.namespace, host.source_name
                    );
                }
            }
            Err(e) => warn!("Hostname discovery failed: {}", e),
        }
    }
}

/// Check interval from a reloaded config.json, if it is in range
fn reloaded_interval(config: &GlobalConfig) -> Result<Duration> {
    if !CHECK_INTERVAL_RANGE.contains(&config.interval_secs) {
        anyhow::bail!(
            "Check interval must be between {} and {} seconds, got {}",
            CHECK_INTERVAL_RANGE.start(),
            CHECK_INTERVAL_RANGE.end(),
            config.interval_secs
        );
    }
    Ok(Duration::from_secs(config.interval_secs))
}

/// Wait for SIGTERM or SIGINT, handling SIGHUP reloads in the meantime
#[cfg(unix)]
async fn wait_for_shutdown(daemon: &Daemon) -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
    let mut sighup = signal(SignalKind::hangup())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGHUP handler: {}", e))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => return Ok("SIGTERM"),
            _ = sigint.recv() => return Ok("SIGINT"),
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                daemon.reload().await;
            }
        }
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown(_daemon: &Daemon) -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
