use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Source of raw configuration values, keyed by variable name.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled key: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_opt(lookup: Lookup<'_>, profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = lookup(&prefixed) {
            return Some(v);
        }
    }
    lookup(key)
}

fn profiled_or(lookup: Lookup<'_>, profile: &str, key: &str, default: &str) -> String {
    profiled_opt(lookup, profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_u64(lookup: Lookup<'_>, profile: &str, key: &str, default: u64) -> u64 {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_u32(lookup: Lookup<'_>, profile: &str, key: &str, default: u32) -> u32 {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_usize(lookup: Lookup<'_>, profile: &str, key: &str, default: usize) -> usize {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub collections: CollectionConfig,
    pub sync: SyncConfig,
    pub views: ViewConfig,
}

impl Default for Config {
    fn default() -> Self {
        let empty = |_: &str| -> Option<String> { None };
        Self::from_lookup("", &empty)
    }
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LIVEOPS_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = process_env("LIVEOPS_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        Self::from_lookup(&profile, &process_env)
    }

    /// Build config for a profile from an arbitrary key/value source.
    pub fn from_lookup(profile: &str, lookup: Lookup<'_>) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            collections: CollectionConfig::from_lookup(lookup, p),
            sync: SyncConfig::from_lookup(lookup, p),
            views: ViewConfig::from_lookup(lookup, p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  collections: jobs={}, guest={}, users={}",
            self.collections.jobs,
            self.collections.guest_bookings,
            self.collections.users
        );
        tracing::info!(
            "  sync:        page_size={}, poll_interval={}s, escalation_threshold={}, debounce={}ms",
            self.sync.page_size,
            self.sync.poll_interval_secs,
            self.sync.escalation_threshold,
            self.sync.debounce_ms
        );
        tracing::info!(
            "  views:       retention={}h, long_running={}h",
            self.views.retention_hours,
            self.views.long_running_hours
        );
    }
}

// ── Collections ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub jobs: String,
    pub guest_bookings: String,
    pub users: String,
    /// `userType` value that marks a user document as an employee.
    pub employee_user_type: String,
}

impl CollectionConfig {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            jobs: profiled_or(lookup, p, "LIVEOPS_JOBS_COLLECTION", "jobs"),
            guest_bookings: profiled_or(lookup, p, "LIVEOPS_GUEST_COLLECTION", "guest-bookings"),
            users: profiled_or(lookup, p, "LIVEOPS_USERS_COLLECTION", "users"),
            employee_user_type: profiled_or(lookup, p, "LIVEOPS_EMPLOYEE_USER_TYPE", "employee"),
        }
    }
}

// ── Sync engine ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Default page size for the jobs and guest-bookings queries.
    pub page_size: usize,
    pub debounce_ms: u64,
    pub poll_interval_secs: u64,
    /// Consecutive non-benign jobs-stream errors before switching to polling.
    pub escalation_threshold: u32,
}

impl SyncConfig {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            page_size: profiled_usize(lookup, p, "LIVEOPS_PAGE_SIZE", 50).max(1),
            debounce_ms: profiled_u64(lookup, p, "LIVEOPS_DEBOUNCE_MS", 300),
            poll_interval_secs: profiled_u64(lookup, p, "LIVEOPS_POLL_INTERVAL_SECS", 30).max(1),
            escalation_threshold: profiled_u32(lookup, p, "LIVEOPS_ESCALATION_THRESHOLD", 3).max(1),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// ── Derived views ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// How long completed jobs stay visible when past jobs are hidden.
    pub retention_hours: u32,
    /// In-progress duration after which a job raises a long-running alert.
    pub long_running_hours: u32,
}

impl ViewConfig {
    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        Self {
            retention_hours: profiled_u32(lookup, p, "LIVEOPS_RETENTION_HOURS", 24),
            long_running_hours: profiled_u32(lookup, p, "LIVEOPS_LONG_RUNNING_HOURS", 4),
        }
    }
}
