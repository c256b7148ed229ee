//! Hostname helpers: zone lookup and `.local` companion names

use crate::config::ZoneMap;

/// Suffix used for local-network companion names
pub const LOCAL_SUFFIX: &str = ".local";

/// Registrable base domain of `name` (public suffix plus one label).
///
/// Uses the public suffix list, so `home.example.co.uk` yields
/// `example.co.uk`. Returns `None` for names that are themselves a suffix.
/// A leading wildcard label is ignored.
pub fn base_domain(name: &str) -> Option<&str> {
    let name = name.trim_end_matches('.');
    psl::domain_str(name.strip_prefix("*.").unwrap_or(name))
}

/// Zone identifier for `name`, if its base domain is in the zone map
pub fn resolve_zone_id<'a>(name: &str, zones: &'a ZoneMap) -> Option<&'a str> {
    base_domain(name).and_then(|domain| zones.get(domain))
}

/// The `.local` companion of a managed name.
///
/// Everything before the final dot is kept and the last label becomes
/// `local`. Names already ending in `.local`, and single-label names, map to
/// themselves.
pub fn derive_local_name(name: &str) -> String {
    if name.ends_with(LOCAL_SUFFIX) {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((head, _tld)) => format!("{}{}", head, LOCAL_SUFFIX),
        None => name.to_string(),
    }
}
