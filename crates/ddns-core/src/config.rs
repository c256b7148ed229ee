//! Configuration types for the DDNS system
//!
//! Two persisted shapes live here: the singleton [`GlobalConfig`] and the
//! optional per-name [`Policy`]. Both are strongly typed in memory and only
//! become JSON at the storage boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default background check interval in seconds
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Default UI auto-refresh interval in seconds
pub const DEFAULT_REFRESH_SECS: u64 = 30;

/// Accepted range for the check interval
pub const CHECK_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10..=86_400;

/// Main runtime configuration (exactly one exists)
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Cloudflare API token
    #[serde(default)]
    pub api_token: String,

    /// Registrable base domain → Cloudflare zone id
    #[serde(default)]
    pub zones: ZoneMap,

    /// Managed hostnames, in display order
    #[serde(default)]
    pub records: Vec<String>,

    /// UI auto-refresh interval in seconds
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Background check interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Dashboard section visibility
    #[serde(default = "default_ui_state")]
    pub ui_state: BTreeMap<String, bool>,

    /// Local network controller settings
    #[serde(default)]
    pub local: LocalProviderSettings,

    /// Whether Kubernetes Ingress discovery is enabled
    #[serde(default)]
    pub k8s_enabled: bool,
}

impl GlobalConfig {
    /// Whether the public provider has a credential to work with
    pub fn has_public_credentials(&self) -> bool {
        !self.api_token.trim().is_empty()
    }

    /// Provider configuration for the public pass, if credentialed
    pub fn public_provider(&self) -> Option<ProviderConfig> {
        self.has_public_credentials()
            .then(|| ProviderConfig::Cloudflare {
                api_token: self.api_token.clone(),
            })
    }

    /// Provider configuration for the local pass, if enabled and credentialed
    pub fn local_provider(&self) -> Option<ProviderConfig> {
        self.local.is_ready().then(|| ProviderConfig::Unifi {
            host: self.local.host.clone(),
            api_key: self.local.api_key.clone(),
        })
    }

    /// Whether `name` is in the managed list
    pub fn is_managed(&self, name: &str) -> bool {
        self.records.iter().any(|r| r == name)
    }

    /// Add a managed name; returns `false` when it is already present
    pub fn add_record(&mut self, name: &str) -> bool {
        if self.is_managed(name) {
            return false;
        }
        self.records.push(name.to_string());
        true
    }

    /// Remove a managed name; returns `false` when it was not present
    pub fn remove_record(&mut self, name: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r != name);
        self.records.len() != before
    }

    /// Managed names encoded as a JSON array
    pub fn records_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }

    /// Zone map encoded as a JSON object
    pub fn zones_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.zones)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !CHECK_INTERVAL_RANGE.contains(&self.interval_secs) {
            return Err(Error::config(format!(
                "Check interval must be between {} and {} seconds, got {}",
                CHECK_INTERVAL_RANGE.start(),
                CHECK_INTERVAL_RANGE.end(),
                self.interval_secs
            )));
        }
        if self.refresh_secs == 0 {
            return Err(Error::config("Refresh interval must be > 0"));
        }
        for name in &self.records {
            validate_hostname(name)?;
        }
        Ok(())
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            zones: ZoneMap::default(),
            records: Vec::new(),
            refresh_secs: DEFAULT_REFRESH_SECS,
            interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            ui_state: default_ui_state(),
            local: LocalProviderSettings::default(),
            k8s_enabled: false,
        }
    }
}

// Keeps the API token out of logs.
impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("api_token", &redact(&self.api_token))
            .field("zones", &self.zones)
            .field("records", &self.records)
            .field("refresh_secs", &self.refresh_secs)
            .field("interval_secs", &self.interval_secs)
            .field("ui_state", &self.ui_state)
            .field("local", &self.local)
            .field("k8s_enabled", &self.k8s_enabled)
            .finish()
    }
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_SECS
}

fn default_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_ui_state() -> BTreeMap<String, bool> {
    ["settings", "all_records", "logs"]
        .into_iter()
        .map(|section| (section.to_string(), true))
        .collect()
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<REDACTED>" }
}

/// Map of registrable base domain to provider zone identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneMap(BTreeMap<String, String>);

impl ZoneMap {
    /// Create an empty zone map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object, falling back to an empty map on malformed input
    pub fn from_json_lossy(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(map) => Self(map),
            Err(e) => {
                tracing::warn!("Invalid zones JSON ({}), using an empty zone map", e);
                Self::default()
            }
        }
    }

    /// Zone id for a base domain
    pub fn get(&self, base_domain: &str) -> Option<&str> {
        self.0.get(base_domain).map(String::as_str)
    }

    /// Insert or replace a zone
    pub fn insert(&mut self, base_domain: impl Into<String>, zone_id: impl Into<String>) {
        self.0.insert(base_domain.into(), zone_id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(base_domain, zone_id)` pairs in domain order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ZoneMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Local network controller (UniFi) settings
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalProviderSettings {
    /// Whether the local pass runs at all
    #[serde(default)]
    pub enabled: bool,
    /// Controller host name or address
    #[serde(default)]
    pub host: String,
    /// API key with DNS policy write access
    #[serde(default)]
    pub api_key: String,
    /// Site identifier used as the zone for DNS policy calls
    #[serde(default)]
    pub site_id: String,
    /// Fallback target for names without a local static IP
    #[serde(default)]
    pub default_ip: Option<Ipv4Addr>,
}

impl LocalProviderSettings {
    /// Enabled and fully credentialed
    pub fn is_ready(&self) -> bool {
        self.enabled
            && !self.host.trim().is_empty()
            && !self.api_key.trim().is_empty()
            && !self.site_id.trim().is_empty()
    }
}

impl fmt::Debug for LocalProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProviderSettings")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("api_key", &redact(&self.api_key))
            .field("site_id", &self.site_id)
            .field("default_ip", &self.default_ip)
            .finish()
    }
}

/// How the public target IP for a name is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpMode {
    /// Follow the resolved public IP
    #[default]
    Dynamic,
    /// Pin to the policy's static IP
    Static,
}

impl IpMode {
    /// Parse user input, treating anything unrecognised as dynamic
    pub fn parse_lossy(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for IpMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Self::Dynamic),
            "static" => Ok(Self::Static),
            other => Err(Error::invalid_input(format!("Unknown IP mode: {}", other))),
        }
    }
}

impl fmt::Display for IpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dynamic => "dynamic",
            Self::Static => "static",
        })
    }
}

/// Per-name override policy; absence means [`Policy::default_for`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,

    /// Reconcile against the public provider
    #[serde(default = "default_true")]
    pub public_enabled: bool,

    #[serde(default)]
    pub ip_mode: IpMode,

    /// Used only when `ip_mode` is static
    #[serde(default)]
    pub static_ip: Option<Ipv4Addr>,

    /// Manage a local DNS policy for the exact name
    #[serde(default)]
    pub local_enabled: bool,

    #[serde(default)]
    pub local_static_ip: Option<Ipv4Addr>,

    /// Manage a local DNS policy for the `.local` companion name
    #[serde(default)]
    pub local_companion_enabled: bool,

    #[serde(default)]
    pub local_companion_static_ip: Option<Ipv4Addr>,
}

impl Policy {
    /// The policy a name gets when nothing has been saved for it
    pub fn default_for(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public_enabled: true,
            ip_mode: IpMode::Dynamic,
            static_ip: None,
            local_enabled: false,
            local_static_ip: None,
            local_companion_enabled: false,
            local_companion_static_ip: None,
        }
    }

    /// Static override for the public pass, if one applies
    pub fn static_override(&self) -> Option<Ipv4Addr> {
        match self.ip_mode {
            IpMode::Static => self.static_ip,
            IpMode::Dynamic => None,
        }
    }

    /// Whether the public pass needs the resolved dynamic IP for this name
    pub fn needs_dynamic_ip(&self) -> bool {
        self.public_enabled && self.static_override().is_none()
    }

    /// One-line summary used in activity log entries
    pub fn summary(&self) -> String {
        format!(
            "public={} mode={} local={} local_companion={}",
            self.public_enabled, self.ip_mode, self.local_enabled, self.local_companion_enabled
        )
    }
}

fn default_true() -> bool {
    true
}

/// Parse an optional IPv4 field from user input; blank means unset
pub fn parse_optional_ipv4(value: &str) -> Result<Option<Ipv4Addr>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::invalid_input(format!("Not an IPv4 address: {}", value)))
}

/// Validate a hostname per RFC 1035 label rules.
///
/// A leading `*` label (wildcard record) is accepted. Names are stored
/// verbatim, so surrounding whitespace is rejected rather than trimmed.
pub fn validate_hostname(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("Domain name cannot be empty"));
    }
    if name.trim() != name {
        return Err(Error::invalid_input(format!(
            "Domain name has surrounding whitespace: '{}'",
            name
        )));
    }
    if name.len() > 253 {
        return Err(Error::invalid_input(format!(
            "Domain name too long: {} chars (max 253)",
            name.len()
        )));
    }
    let labels = match name.strip_prefix("*.") {
        Some(rest) => rest,
        None => name,
    };
    for label in labels.split('.') {
        if label.is_empty() {
            return Err(Error::invalid_input(format!("Domain name has empty label: '{}'", name)));
        }
        if label.len() > 63 {
            return Err(Error::invalid_input(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::invalid_input(format!(
                "Domain label contains invalid characters: '{}'",
                label
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_input(format!(
                "Domain label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }
    Ok(())
}

/// Provider construction parameters, resolved by the registry
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// Cloudflare public DNS
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
    },

    /// UniFi Network controller DNS policies
    Unifi {
        /// Controller host
        host: String,
        /// Controller API key
        api_key: String,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            ProviderConfig::Cloudflare { api_token } => {
                if api_token.trim().is_empty() {
                    return Err(Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Unifi { host, api_key } => {
                if host.trim().is_empty() {
                    return Err(Error::config("UniFi host cannot be empty"));
                }
                if api_key.trim().is_empty() {
                    return Err(Error::config("UniFi API key cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Unifi { .. } => "unifi",
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Cloudflare { api_token } => f
                .debug_struct("Cloudflare")
                .field("api_token", &redact(api_token))
                .finish(),
            ProviderConfig::Unifi { host, api_key } => f
                .debug_struct("Unifi")
                .field("host", host)
                .field("api_key", &redact(api_key))
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_access_row() {
        let config = GlobalConfig::default();
        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.refresh_secs, 30);
        assert!(config.records.is_empty());
        assert!(config.zones.is_empty());
        assert!(!config.k8s_enabled);
        assert!(!config.local.enabled);
        assert_eq!(config.ui_state.get("logs"), Some(&true));
    }

    #[test]
    fn empty_json_object_deserializes_to_defaults() {
        let config: GlobalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn add_record_rejects_duplicates() {
        let mut config = GlobalConfig::default();
        assert!(config.add_record("home.example.com"));
        assert!(!config.add_record("home.example.com"));
        assert_eq!(config.records.len(), 1);
        assert!(config.remove_record("home.example.com"));
        assert!(!config.remove_record("home.example.com"));
    }

    #[test]
    fn zones_json_lossy_falls_back_to_empty() {
        assert!(ZoneMap::from_json_lossy("not json").is_empty());
        let zones = ZoneMap::from_json_lossy(r#"{"example.com": "zone1"}"#);
        assert_eq!(zones.get("example.com"), Some("zone1"));
    }

    #[test]
    fn records_and_zones_encode_as_json() {
        let mut config = GlobalConfig::default();
        config.add_record("a.example.com");
        config.zones.insert("example.com", "zone1");
        assert_eq!(config.records_json().unwrap(), r#"["a.example.com"]"#);
        assert_eq!(config.zones_json().unwrap(), r#"{"example.com":"zone1"}"#);
    }

    #[test]
    fn local_provider_requires_every_credential() {
        let mut config = GlobalConfig::default();
        config.local.enabled = true;
        config.local.host = "192.168.1.1".into();
        config.local.api_key = "key".into();
        assert!(config.local_provider().is_none());

        config.local.site_id = "default".into();
        assert_eq!(config.local_provider().map(|p| p.type_name()), Some("unifi"));

        config.local.enabled = false;
        assert!(config.local_provider().is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = GlobalConfig::default();
        config.api_token = "cf_secret_token".into();
        config.local.api_key = "unifi_secret_key".into();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("cf_secret_token"));
        assert!(!debug.contains("unifi_secret_key"));

        let provider = config.public_provider().unwrap();
        assert!(!format!("{:?}", provider).contains("cf_secret_token"));
    }

    #[test]
    fn interval_out_of_range_is_rejected() {
        let mut config = GlobalConfig::default();
        config.interval_secs = 5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn policy_defaults() {
        let policy = Policy::default_for("home.example.com");
        assert!(policy.public_enabled);
        assert_eq!(policy.ip_mode, IpMode::Dynamic);
        assert!(!policy.local_enabled);
        assert!(!policy.local_companion_enabled);
        assert!(policy.needs_dynamic_ip());
    }

    #[test]
    fn static_mode_without_ip_still_needs_dynamic() {
        let mut policy = Policy::default_for("a.example.com");
        policy.ip_mode = IpMode::Static;
        assert!(policy.needs_dynamic_ip());

        policy.static_ip = Some(Ipv4Addr::new(203, 0, 113, 7));
        assert!(!policy.needs_dynamic_ip());
        assert_eq!(policy.static_override(), Some(Ipv4Addr::new(203, 0, 113, 7)));

        policy.public_enabled = false;
        policy.static_ip = None;
        assert!(!policy.needs_dynamic_ip());
    }

    #[test]
    fn ip_mode_parse_lossy_normalizes_to_dynamic() {
        assert_eq!(IpMode::parse_lossy("STATIC"), IpMode::Static);
        assert_eq!(IpMode::parse_lossy("pinned"), IpMode::Dynamic);
    }

    #[test]
    fn optional_ipv4_parsing() {
        assert_eq!(parse_optional_ipv4("  ").unwrap(), None);
        assert_eq!(
            parse_optional_ipv4(" 10.0.0.5 ").unwrap(),
            Some(Ipv4Addr::new(10, 0, 0, 5))
        );
        assert!(parse_optional_ipv4("10.0.0").is_err());
    }

    #[test]
    fn hostname_validation() {
        assert!(validate_hostname("home.example.com").is_ok());
        assert!(validate_hostname("single").is_ok());
        assert!(validate_hostname("bad..example.com").is_err());
        assert!(validate_hostname("-bad.example.com").is_err());
        assert!(validate_hostname("bad_label.example.com").is_err());
    }

    #[test]
    fn wildcard_names_are_valid_hostnames() {
        assert!(validate_hostname("*.example.com").is_ok());
        assert!(validate_hostname("*.home.example.com").is_ok());
        assert!(validate_hostname("*").is_err());
        assert!(validate_hostname("home.*.example.com").is_err());
        assert!(validate_hostname("**.example.com").is_err());
    }

    #[test]
    fn surrounding_whitespace_is_rejected() {
        assert!(matches!(
            validate_hostname(" home.example.com"),
            Err(Error::InvalidInput(_))
        ));
        assert!(validate_hostname("home.example.com\n").is_err());
    }
}
