//! Contract Test: Local Provider Pass
//!
//! Verifies `LocalSync`, which mirrors managed names (and their `.local`
//! companions) into a local controller's DNS policies.
//!
//! Constraints verified:
//! - Disabling local DNS for a name deletes its existing policy, nothing else
//! - Enabling creates or updates policies toward the chosen target IP
//! - The companion sub-pass runs only when the companion differs from the name
//! - The pass stamps `last_checked` but never touches the counters

mod common;

use common::*;
use ddns_core::config::Policy;
use ddns_core::traits::{LogLevel, StatsStore};
use ddns_core::{LocalSync, LocalTally};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

const SITE: &str = "site-1";

fn local_sync(
    provider: &MockDnsProvider,
    default_ip: Option<Ipv4Addr>,
) -> (LocalSync, Arc<ddns_core::JsonStatsStore>, Arc<ddns_core::ActivityLog>) {
    let (stats, activity) = stores();
    let sync = LocalSync::new(
        Arc::new(MockDnsProvider::sharing_counters_with(provider)),
        SITE,
        default_ip,
        stats.clone(),
        activity.clone(),
    );
    (sync, stats, activity)
}

fn local_policy(name: &str, local: bool, companion: bool) -> Policy {
    Policy {
        local_enabled: local,
        local_companion_enabled: companion,
        ..Policy::default_for(name)
    }
}

#[tokio::test]
async fn disabled_name_with_existing_policy_is_deleted_once() {
    let provider = MockDnsProvider::new("UniFi");
    let id = provider.seed(SITE, "home.example.com", "192.168.1.10");
    let (sync, _stats, activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let tally = sync
        .run(
            &names(&["home.example.com"]),
            &policies(vec![local_policy("home.example.com", false, false)]),
        )
        .await;

    assert_eq!(
        provider.count(|c| matches!(c, Call::Delete { .. })),
        1,
        "exactly one delete"
    );
    assert!(provider.calls().contains(&Call::Delete {
        zone: SITE.into(),
        record_id: id,
    }));
    assert_eq!(provider.count(|c| matches!(c, Call::Create { .. })), 0);
    assert_eq!(provider.count(|c| matches!(c, Call::Update { .. })), 0);
    assert_eq!(tally.deleted, 1);

    let info = messages(&activity, LogLevel::Info).await;
    assert!(info.contains(&"Local DNS: removed policy home.example.com (disabled by user).".to_string()));
}

#[tokio::test]
async fn enabled_name_creates_policy_from_default_ip() {
    let provider = MockDnsProvider::new("UniFi");
    let (sync, _stats, _activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let tally = sync
        .run(
            &names(&["home.example.com"]),
            &policies(vec![local_policy("home.example.com", true, false)]),
        )
        .await;

    assert_eq!(
        tally,
        LocalTally {
            created: 1,
            ..LocalTally::default()
        }
    );
    assert_eq!(
        provider.record(SITE, "home.example.com").unwrap().content,
        "192.168.1.10"
    );
}

#[tokio::test]
async fn static_local_ip_wins_and_drift_is_updated() {
    let provider = MockDnsProvider::new("UniFi");
    provider.seed(SITE, "home.example.com", "192.168.1.10");
    let (sync, _stats, _activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let policy = Policy {
        local_static_ip: Some(ip("10.0.0.5")),
        ..local_policy("home.example.com", true, false)
    };
    let tally = sync
        .run(&names(&["home.example.com"]), &policies(vec![policy]))
        .await;

    assert_eq!(tally.updated, 1);
    assert_eq!(provider.update_call_count(), 1);
    assert_eq!(provider.record(SITE, "home.example.com").unwrap().content, "10.0.0.5");
}

#[tokio::test]
async fn matching_policy_is_left_alone() {
    let provider = MockDnsProvider::new("UniFi");
    provider.seed(SITE, "home.example.com", "192.168.1.10");
    let (sync, _stats, _activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let tally = sync
        .run(
            &names(&["home.example.com"]),
            &policies(vec![local_policy("home.example.com", true, false)]),
        )
        .await;

    assert_eq!(tally.unchanged, 1);
    assert_eq!(provider.update_call_count(), 0);
    assert_eq!(provider.count(|c| matches!(c, Call::Create { .. })), 0);
}

#[tokio::test]
async fn companion_gets_its_own_policy() {
    let provider = MockDnsProvider::new("UniFi");
    let (sync, _stats, _activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let policy = Policy {
        local_companion_static_ip: Some(ip("192.168.1.20")),
        ..local_policy("home.example.com", true, true)
    };
    let tally = sync
        .run(&names(&["home.example.com"]), &policies(vec![policy]))
        .await;

    assert_eq!(tally.created, 2);
    assert_eq!(
        provider.record(SITE, "home.example.com").unwrap().content,
        "192.168.1.10"
    );
    assert_eq!(
        provider.record(SITE, "home.example.local").unwrap().content,
        "192.168.1.20"
    );
}

#[tokio::test]
async fn companion_equal_to_name_is_not_synced_twice() {
    let provider = MockDnsProvider::new("UniFi");
    let (sync, _stats, _activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let tally = sync
        .run(
            &names(&["nas.local"]),
            &policies(vec![local_policy("nas.local", true, true)]),
        )
        .await;

    assert_eq!(tally.created, 1);
    assert_eq!(provider.count(|c| matches!(c, Call::Get { .. })), 1);
}

#[tokio::test]
async fn enabled_without_target_is_skipped_with_warning() {
    let provider = MockDnsProvider::new("UniFi");
    let (sync, stats, activity) = local_sync(&provider, None);

    let tally = sync
        .run(
            &names(&["nas.local"]),
            &policies(vec![local_policy("nas.local", true, false)]),
        )
        .await;

    assert_eq!(tally.skipped, 1);
    assert!(provider.calls().is_empty());
    assert!(stats.get_for_name("nas.local").await.unwrap().is_none());

    let warnings = messages(&activity, LogLevel::Warning).await;
    assert!(warnings.iter().any(|m| m.contains("nas.local")));
}

#[tokio::test]
async fn pass_stamps_last_checked_only() {
    let provider = MockDnsProvider::new("UniFi");
    provider.seed(SITE, "home.example.com", "192.168.1.1");
    let (sync, stats, _activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    sync.run(
        &names(&["home.example.com"]),
        &policies(vec![local_policy("home.example.com", true, false)]),
    )
    .await;

    let row = stats.get_for_name("home.example.com").await.unwrap().unwrap();
    assert!(row.last_checked.is_some());
    assert_eq!(row.update_count, 0);
    assert_eq!(row.failure_count, 0);
    assert!(row.last_updated.is_none());
}

#[tokio::test]
async fn failure_in_one_sub_pass_does_not_stop_the_rest() {
    let provider = MockDnsProvider::new("UniFi");
    provider.fail_for("bad.example.com");
    let (sync, _stats, activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let tally = sync
        .run(
            &names(&["bad.example.com", "good.example.com"]),
            &policies(vec![
                local_policy("bad.example.com", true, true),
                local_policy("good.example.com", true, false),
            ]),
        )
        .await;

    // bad.example.com fails, its companion bad.example.local and good.example.com are created
    assert_eq!(tally.failed, 1);
    assert_eq!(tally.created, 2);
    assert!(provider.record(SITE, "bad.example.local").is_some());

    let all = all_messages(&activity).await;
    assert!(all.last().unwrap().starts_with("Local DNS pass (UniFi):"));
    let warnings = messages(&activity, LogLevel::Warning).await;
    assert!(warnings.last().unwrap().starts_with("Local DNS pass"));
    assert_eq!(messages(&activity, LogLevel::Error).await.len(), 1);
}

#[tokio::test]
async fn default_policy_touches_nothing_when_nothing_exists() {
    let provider = MockDnsProvider::new("UniFi");
    let (sync, _stats, _activity) = local_sync(&provider, Some(ip("192.168.1.10")));

    let tally = sync.run(&names(&["home.example.com"]), &HashMap::new()).await;

    assert_eq!(tally, LocalTally::default());
    assert_eq!(provider.count(|c| matches!(c, Call::Delete { .. })), 0);
    assert_eq!(provider.count(|c| matches!(c, Call::Create { .. })), 0);
}
