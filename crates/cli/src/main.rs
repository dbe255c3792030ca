mod cli;
mod fixture;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use liveops_core::timestamp::parse_instant_str;
use liveops_core::Config;
use liveops_sync::{
    LiveOps, LiveOpsSnapshot, MemoryStore, Session, Source, StoreError, SubscriptionState,
    ViewOptions,
};
use liveops_views::{AlertThresholds, DateRange, DerivedView};

use crate::cli::{CliArgs, Command, SimulateArgs, ViewArgs};
use crate::fixture::Fixture;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    liveops_core::config::load_dotenv();
    let args = CliArgs::parse();
    let config = Config::from_env();
    config.log_summary();

    match args.command {
        Command::View(view) => run_view(&config, view),
        Command::Simulate(sim) => run_simulate(config, sim).await,
    }
}

fn parse_instant_arg(flag: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        parse_instant_str(s).with_context(|| format!("--{flag}: unrecognised timestamp '{s}'"))
    })
    .transpose()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

// ── view ────────────────────────────────────────────────────────────

fn run_view(config: &Config, args: ViewArgs) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let now = parse_instant_arg("now", args.now.as_deref())?.unwrap_or_else(Utc::now);
    let range = DateRange::new(
        parse_instant_arg("from", args.from.as_deref())?,
        parse_instant_arg("to", args.to.as_deref())?,
    );

    let options = ViewOptions {
        search: args.search.clone(),
        date_range: range.is_active().then_some(range),
        status: args.status,
        include_past: args.include_past,
        page_size: None,
    };
    let filter = options.to_filter(args.search, config);
    let thresholds = AlertThresholds::from_hours(config.views.long_running_hours);

    let records = fixture.merged_records();
    info!(records = records.len(), now = %now, "computing view");
    let view = DerivedView::compute(&records, &filter, &thresholds, now);
    print_json(&view)
}

// ── simulate ────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    snapshot: LiveOpsSnapshot,
    subscriptions: Vec<SourceReport>,
    fetches: usize,
}

#[derive(Serialize)]
struct SourceReport {
    source: Source,
    #[serde(flatten)]
    state: SubscriptionState,
}

/// Let spawned subscription and polling tasks drain their queues.
async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

async fn run_simulate(config: Config, args: SimulateArgs) -> Result<()> {
    let fixture = Fixture::load(&args.fixture)?;
    let store = MemoryStore::new();
    fixture.seed(&store, &config);

    let options = ViewOptions {
        include_past: args.include_past,
        page_size: args.page_size,
        ..Default::default()
    };
    let jobs_collection = config.collections.jobs.clone();
    let ops = LiveOps::new(Arc::new(store.clone()), config, options);

    ops.on_session(&Session::signed_in("liveops-cli", None));
    settle().await;

    for n in 1..=args.errors {
        info!(n, "injecting jobs stream error");
        store.push_error(
            &jobs_collection,
            StoreError::unavailable(format!("simulated failure {n}")),
        );
        settle().await;
    }

    if args.recover {
        info!("re-delivering jobs collection");
        store.set_collection(&jobs_collection, fixture.jobs.clone());
        settle().await;
    }

    let report = SimulationReport {
        snapshot: ops.snapshot(),
        subscriptions: ops
            .subscription_states()
            .into_iter()
            .map(|(source, state)| SourceReport { source, state })
            .collect(),
        fetches: store.fetch_count(),
    };
    ops.shutdown();
    print_json(&report)
}
