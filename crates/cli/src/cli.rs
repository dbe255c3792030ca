use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Live operations dashboard tooling.
///
/// Computes derived views from fixture files and drives the sync engine
/// against an in-memory store.
#[derive(Parser, Debug)]
#[command(name = "liveops", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter a fixture and print jobs, counts and alerts as JSON.
    View(ViewArgs),
    /// Run the sync engine over a fixture, injecting jobs-stream errors.
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
pub struct ViewArgs {
    /// Fixture file: a job array, or an object with `jobs`,
    /// `guestBookings` and `users` arrays.
    #[arg(long)]
    pub fixture: PathBuf,

    /// Case-insensitive text search over title, client, address, assignee.
    #[arg(long, default_value = "")]
    pub search: String,

    /// Status label to keep, or `all`.
    #[arg(long)]
    pub status: Option<String>,

    /// Keep completed jobs regardless of completion time.
    #[arg(long)]
    pub include_past: bool,

    /// Range start (RFC 3339 or YYYY-MM-DD), inclusive.
    #[arg(long)]
    pub from: Option<String>,

    /// Range end (RFC 3339 or YYYY-MM-DD), inclusive.
    #[arg(long)]
    pub to: Option<String>,

    /// Evaluate as of this instant instead of the current time.
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Fixture file, same format as `view`.
    #[arg(long)]
    pub fixture: PathBuf,

    /// Non-benign errors to push on the jobs stream after the first snapshot.
    #[arg(long, default_value_t = 0)]
    pub errors: u32,

    /// Push the jobs collection again after the errors.
    #[arg(long)]
    pub recover: bool,

    /// Page size override for both job queries.
    #[arg(long, env = "LIVEOPS_PAGE_SIZE")]
    pub page_size: Option<usize>,

    /// Keep completed jobs regardless of completion time.
    #[arg(long)]
    pub include_past: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_view_flags() {
        let args = CliArgs::try_parse_from([
            "liveops",
            "view",
            "--fixture",
            "jobs.json",
            "--search",
            "office",
            "--status",
            "In Progress",
            "--include-past",
            "--from",
            "2024-05-01",
        ])
        .unwrap();
        match args.command {
            Command::View(view) => {
                assert_eq!(view.search, "office");
                assert_eq!(view.status.as_deref(), Some("In Progress"));
                assert!(view.include_past);
                assert_eq!(view.from.as_deref(), Some("2024-05-01"));
                assert!(view.to.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_simulate_flags() {
        let args =
            CliArgs::try_parse_from(["liveops", "simulate", "--fixture", "f.json", "--errors", "3"])
                .unwrap();
        match args.command {
            Command::Simulate(sim) => {
                assert_eq!(sim.errors, 3);
                assert!(!sim.recover);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
