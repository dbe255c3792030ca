use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tokio::sync::watch;

use liveops_core::{AlertKind, Config};
use liveops_sync::{
    Document, LiveOps, MemoryStore, Phase, Session, Source, SourceStatus, StoreError, ViewOptions,
};

// ── Helpers ─────────────────────────────────────────────────────

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn doc(id: &str, data: Value) -> Document {
    Document::new(id, data)
}

fn engine(store: &MemoryStore) -> LiveOps {
    engine_with(store, ViewOptions::default())
}

fn engine_with(store: &MemoryStore, options: ViewOptions) -> LiveOps {
    LiveOps::new(Arc::new(store.clone()), Config::default(), options)
}

fn signed_in() -> Session {
    Session::signed_in("admin-1", Some("admin@example.com".into()))
}

fn ids(ops: &LiveOps) -> Vec<String> {
    ops.snapshot().jobs.iter().map(|j| j.qualified_id()).collect()
}

fn unavailable() -> StoreError {
    StoreError::unavailable("transport closed")
}

/// Sign in and push three non-benign errors on the jobs stream.
async fn degrade(store: &MemoryStore, ops: &LiveOps) {
    ops.on_session(&signed_in());
    settle().await;
    for _ in 0..3 {
        store.push_error("jobs", unavailable());
    }
    settle().await;
}

// ── Scenarios ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scenario_a_counts_by_status() {
    let store = MemoryStore::new();
    store.set_collection(
        "jobs",
        vec![
            doc("1", json!({"status": "Pending"})),
            doc("2", json!({"status": "In Progress"})),
            doc("3", json!({"status": "Completed", "proofPhotos": ["a.jpg"]})),
            doc("4", json!({"status": "In Progress"})),
            doc("5", json!({})),
        ],
    );
    store.set_collection("guest-bookings", vec![]);
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;

    let snap = ops.snapshot();
    assert!(!snap.loading);
    assert_eq!(snap.counts.total_jobs, 5);
    assert_eq!(snap.counts.in_progress, 2);
    assert_eq!(snap.counts.completed, 1);
    assert_eq!(snap.counts.pending, 2);
}

#[tokio::test(start_paused = true)]
async fn scenario_b_overdue_job_raises_sla_breach() {
    let now = Utc::now();
    let yesterday = (now - ChronoDuration::days(1)).to_rfc3339();
    let store = MemoryStore::new();
    store.set_collection(
        "jobs",
        vec![doc(
            "late",
            json!({"title": "Lobby clean", "status": "Scheduled", "scheduledDate": yesterday}),
        )],
    );
    store.set_collection("guest-bookings", vec![]);
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;

    let snap = ops.snapshot_at(now);
    assert_eq!(snap.alerts.len(), 1);
    assert_eq!(snap.alerts[0].kind, AlertKind::SlaBreach);
    assert_eq!(snap.alerts[0].job_id, "late");
    assert_eq!(snap.alerts[0].message, "SLA breach: Lobby clean is overdue");
}

#[tokio::test(start_paused = true)]
async fn scenario_c_old_completed_job_hidden_but_counted() {
    let now = Utc::now();
    let two_days_ago = (now - ChronoDuration::days(2)).to_rfc3339();
    let store = MemoryStore::new();
    store.set_collection(
        "jobs",
        vec![doc(
            "done",
            json!({"status": "Completed", "completedAt": two_days_ago, "proofPhotos": ["p.jpg"]}),
        )],
    );
    store.set_collection("guest-bookings", vec![]);
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;

    let snap = ops.snapshot_at(now);
    assert!(snap.jobs.is_empty());
    assert_eq!(snap.counts.completed, 1);

    let mut options = ops.options();
    options.include_past = true;
    ops.set_options(options);
    assert_eq!(ops.snapshot_at(now).jobs.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_permission_denied_is_silent() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;

    store.push_error("jobs", StoreError::permission_denied("missing role"));
    settle().await;

    let snap = ops.snapshot();
    assert!(snap.error.is_none());
    assert!(snap.jobs.is_empty());
    assert!(!snap.loading);
    assert!(!snap.polling);
}

#[tokio::test(start_paused = true)]
async fn scenario_e_escalation_switches_to_polling() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;

    store.write_silently("jobs", vec![doc("polled", json!({"title": "Fetched"}))]);
    store.push_error("jobs", unavailable());
    settle().await;
    assert_eq!(
        ops.snapshot().error.as_deref(),
        Some("Connection error (1/3) - retrying...")
    );
    store.push_error("jobs", unavailable());
    store.push_error("jobs", unavailable());
    settle().await;

    let snap = ops.snapshot();
    assert!(snap.polling);
    assert_eq!(snap.phase, Phase::Degraded);
    assert_eq!(
        snap.error.as_deref(),
        Some("Connection unstable - using polling mode")
    );

    ops.poll().await;
    let snap = ops.snapshot();
    assert_eq!(snap.jobs.len(), 1);
    assert_eq!(snap.jobs[0].id, "polled");
    assert!(!snap.loading);
}

// ── Properties ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn merged_set_tracks_latest_snapshot_per_source() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());

    let steps: Vec<(&str, Vec<&str>)> = vec![
        ("jobs", vec!["J1", "J2"]),
        ("guest-bookings", vec!["G1"]),
        ("jobs", vec!["J2", "J3"]),
        ("guest-bookings", vec!["G1", "G2"]),
        ("guest-bookings", vec![]),
        ("jobs", vec!["J1"]),
    ];
    let mut latest_jobs: Vec<String> = Vec::new();
    let mut latest_guest: Vec<String> = Vec::new();

    for (collection, docs) in steps {
        store.set_collection(
            collection,
            docs.iter().map(|id| doc(id, json!({}))).collect(),
        );
        settle().await;
        let qualified: Vec<String> = if collection == "jobs" {
            docs.iter().map(|id| id.to_string()).collect()
        } else {
            docs.iter().map(|id| format!("guest/{id}")).collect()
        };
        if collection == "jobs" {
            latest_jobs = qualified;
        } else {
            latest_guest = qualified;
        }

        let snap = ops.snapshot();
        if snap.loading {
            continue;
        }
        let mut got = ids(&ops);
        got.sort();
        let mut want: Vec<String> = latest_jobs.iter().chain(&latest_guest).cloned().collect();
        want.sort();
        assert_eq!(got, want);
        assert_eq!(snap.counts.total_jobs, want.len());
    }
}

#[tokio::test(start_paused = true)]
async fn loading_waits_for_both_origins() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    store.set_collection("jobs", vec![doc("J1", json!({}))]);
    settle().await;
    assert!(ops.snapshot().loading);
    assert_eq!(ops.phase(), Phase::Subscribing);

    store.push_error("guest-bookings", unavailable());
    settle().await;
    let snap = ops.snapshot();
    assert!(!snap.loading);
    assert!(snap.error.is_none());
    assert_eq!(snap.jobs.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_jobs_error_keeps_loading_until_guest_reports() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;

    store.push_error("jobs", unavailable());
    settle().await;
    let snap = ops.snapshot();
    assert!(snap.loading);
    assert_eq!(snap.phase, Phase::Subscribing);
    assert_eq!(snap.error.as_deref(), Some("Connection error (1/3) - retrying..."));

    store.set_collection("guest-bookings", vec![doc("G1", json!({}))]);
    settle().await;
    let snap = ops.snapshot();
    assert!(!snap.loading);
    assert_eq!(snap.phase, Phase::Live);
    assert_eq!(ids(&ops), vec!["guest/G1"]);
}

#[tokio::test(start_paused = true)]
async fn search_is_debounced() {
    let store = MemoryStore::new();
    store.set_collection(
        "jobs",
        vec![
            doc("1", json!({"title": "Office tower"})),
            doc("2", json!({"title": "Warehouse", "client": "ABC Corp"})),
            doc("3", json!({"title": "Clinic"})),
        ],
    );
    store.set_collection("guest-bookings", vec![]);
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;

    ops.set_search("a");
    tokio::time::sleep(Duration::from_millis(100)).await;
    ops.set_search("ab");
    tokio::time::sleep(Duration::from_millis(100)).await;
    ops.set_search("abc");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(ops.snapshot().jobs.len(), 3);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ids(&ops), vec!["2"]);
}

#[tokio::test(start_paused = true)]
async fn success_resets_escalation_and_polling_starts_once() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    store.set_collection("guest-bookings", vec![]);
    settle().await;

    store.push_error("jobs", unavailable());
    store.push_error("jobs", unavailable());
    store.set_collection("jobs", vec![]);
    store.push_error("jobs", unavailable());
    store.push_error("jobs", unavailable());
    settle().await;
    assert!(!ops.is_polling());
    assert_eq!(store.fetch_count(), 0);

    store.push_error("jobs", unavailable());
    settle().await;
    assert!(ops.is_polling());
    // One immediate poll: a jobs fetch and an employees fetch.
    assert_eq!(store.fetch_count(), 2);

    store.push_error("jobs", unavailable());
    store.push_error("jobs", unavailable());
    settle().await;
    assert_eq!(store.fetch_count(), 2);

    let jobs_state = ops
        .subscription_states()
        .into_iter()
        .find(|(source, _)| *source == Source::Jobs)
        .map(|(_, state)| state)
        .unwrap();
    assert_eq!(jobs_state.status, SourceStatus::Polling);
    assert_eq!(jobs_state.consecutive_errors, 5);
}

// ── Polling mode ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn polling_repeats_on_interval() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    degrade(&store, &ops).await;
    assert_eq!(store.fetch_count(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(store.fetch_count(), 4);
    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(store.fetch_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn polled_jobs_keep_guest_contribution() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    store.set_collection("guest-bookings", vec![doc("G1", json!({}))]);
    settle().await;

    store.write_silently("jobs", vec![doc("J1", json!({}))]);
    for _ in 0..3 {
        store.push_error("jobs", unavailable());
    }
    settle().await;

    let mut got = ids(&ops);
    got.sort();
    assert_eq!(got, vec!["J1", "guest/G1"]);
}

#[tokio::test(start_paused = true)]
async fn poll_failure_keeps_cached_data_and_schedule() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;
    store.write_silently("jobs", vec![doc("J1", json!({}))]);
    for _ in 0..3 {
        store.push_error("jobs", unavailable());
    }
    settle().await;
    assert_eq!(ops.snapshot().jobs.len(), 1);

    store.fail_next_fetch("jobs", unavailable());
    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    let snap = ops.snapshot();
    assert_eq!(snap.error.as_deref(), Some("Connection error - using cached data"));
    assert_eq!(snap.jobs.len(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(
        ops.snapshot().error.as_deref(),
        Some("Connection unstable - using polling mode")
    );
}

#[tokio::test(start_paused = true)]
async fn benign_poll_failure_is_suppressed() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    degrade(&store, &ops).await;

    store.fail_next_fetch("jobs", StoreError::permission_denied("rules"));
    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(
        ops.snapshot().error.as_deref(),
        Some("Connection unstable - using polling mode")
    );
}

#[tokio::test(start_paused = true)]
async fn push_recovery_leaves_polling_mode() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    degrade(&store, &ops).await;
    assert!(ops.is_polling());

    store.set_collection("jobs", vec![doc("fresh", json!({}))]);
    settle().await;
    let snap = ops.snapshot();
    assert!(!snap.polling);
    assert!(snap.error.is_none());
    assert_eq!(snap.phase, Phase::Live);

    let fetches = store.fetch_count();
    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(store.fetch_count(), fetches);
}

#[tokio::test(start_paused = true)]
async fn refresh_in_polling_mode_polls_now_and_resets_schedule() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    degrade(&store, &ops).await;
    assert_eq!(store.fetch_count(), 2);

    tokio::time::sleep(Duration::from_secs(20)).await;
    ops.refresh();
    settle().await;
    assert_eq!(store.fetch_count(), 4);
    assert!(ops.is_polling());

    // The old schedule would fire at 30s; the new one fires at 50s.
    tokio::time::sleep(Duration::from_secs(15)).await;
    settle().await;
    assert_eq!(store.fetch_count(), 4);
    tokio::time::sleep(Duration::from_secs(16)).await;
    settle().await;
    assert_eq!(store.fetch_count(), 6);
}

#[tokio::test(start_paused = true)]
async fn refresh_outside_polling_resubscribes_and_clears_counter() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;
    store.push_error("jobs", unavailable());
    store.push_error("jobs", unavailable());
    settle().await;
    assert!(ops.snapshot().error.is_some());

    ops.refresh();
    settle().await;
    assert!(ops.snapshot().error.is_none());
    assert_eq!(store.active_subscriptions(), 3);

    store.push_error("jobs", unavailable());
    store.push_error("jobs", unavailable());
    settle().await;
    assert!(!ops.is_polling());
}

// ── Lifecycle ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn setup_failure_surfaces_error_and_clears_loading() {
    let store = MemoryStore::new();
    store.reject_subscriptions("guest-bookings", StoreError::invalid_argument("missing index"));
    let ops = engine(&store);
    ops.on_session(&signed_in());

    let snap = ops.snapshot();
    assert!(!snap.loading);
    assert_eq!(snap.phase, Phase::TornDown);
    assert_eq!(
        snap.error.as_deref(),
        Some("failed to subscribe to guest-bookings: invalid-argument: missing index")
    );
    assert_eq!(store.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn page_size_change_restarts_with_new_limit() {
    let store = MemoryStore::new();
    store.set_collection(
        "jobs",
        (0..5)
            .map(|i| doc(&format!("J{i}"), json!({"createdAt": format!("2024-01-0{}T00:00:00Z", i + 1)})))
            .collect(),
    );
    store.set_collection("guest-bookings", vec![]);
    let ops = engine(&store);
    ops.on_session(&signed_in());
    settle().await;
    assert_eq!(ops.snapshot().counts.total_jobs, 5);

    let mut options = ops.options();
    options.page_size = Some(2);
    ops.set_options(options);
    settle().await;

    assert_eq!(store.active_subscriptions(), 3);
    assert_eq!(ids(&ops), vec!["J4", "J3"]);
}

#[tokio::test(start_paused = true)]
async fn sign_out_and_user_switch_clear_data() {
    let store = MemoryStore::new();
    store.set_collection("jobs", vec![doc("J1", json!({}))]);
    store.set_collection("guest-bookings", vec![]);
    let ops = engine(&store);

    ops.on_session(&signed_in());
    settle().await;
    assert_eq!(ops.snapshot().jobs.len(), 1);

    ops.on_session(&Session::signed_out());
    let snap = ops.snapshot();
    assert!(snap.jobs.is_empty());
    assert!(!snap.loading);
    assert_eq!(snap.phase, Phase::Idle);
    assert_eq!(store.active_subscriptions(), 0);

    ops.on_session(&Session::signed_in("other-admin", None));
    assert!(ops.snapshot().loading);
    settle().await;
    assert_eq!(ops.snapshot().jobs.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn follows_session_channel() {
    let store = MemoryStore::new();
    let ops = engine(&store);
    let (tx, rx) = watch::channel(Session::pending());
    let follower = ops.follow_session(rx);
    settle().await;
    assert_eq!(store.active_subscriptions(), 0);

    tx.send(signed_in()).unwrap();
    settle().await;
    assert_eq!(store.active_subscriptions(), 3);

    tx.send(Session::signed_out()).unwrap();
    settle().await;
    assert_eq!(store.active_subscriptions(), 0);

    drop(tx);
    settle().await;
    assert!(follower.is_finished());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_polling_and_debounce() {
    let store = MemoryStore::new();
    store.set_collection("jobs", vec![doc("1", json!({"title": "Alpha"}))]);
    let ops = engine_with(
        &store,
        ViewOptions {
            include_past: true,
            ..Default::default()
        },
    );
    degrade(&store, &ops).await;
    ops.set_search("zzz");
    ops.shutdown();

    let fetches = store.fetch_count();
    tokio::time::sleep(Duration::from_secs(90)).await;
    settle().await;
    assert_eq!(store.fetch_count(), fetches);
    assert_eq!(store.active_subscriptions(), 0);
    assert_eq!(ops.snapshot().jobs.len(), 1);
}
