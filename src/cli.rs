use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::demo::DemoPlan;
use crate::error::RouteError;
use crate::source::{FileSource, MockSource, RecordSource};

#[derive(Parser, Debug)]
#[command(
    name = "routeswap",
    version,
    about = "Routing table with lock-free lookups and background reloads"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run concurrent lookup rounds while the table reloads in the background (default)
    Demo(DemoArgs),
    /// Load the table once and resolve the given keys
    Resolve(ResolveArgs),
}

/// Where route records come from.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SourceArgs {
    /// JSON file with an array of route records; generated data when omitted
    #[arg(long)]
    pub routes: Option<PathBuf>,

    /// Number of generated routes when no file is given [default: 10]
    #[arg(long, default_value_t = 10, value_parser = validate_mock_routes)]
    pub mock_routes: usize,
}

impl SourceArgs {
    /// Build the record source. Generated data rotates on every fetch when
    /// `rotating` is set so that reloads produce visibly new tables.
    pub fn open(&self, rotating: bool) -> Arc<dyn RecordSource> {
        match &self.routes {
            Some(path) => Arc::new(FileSource::new(path)),
            None if rotating => Arc::new(MockSource::rotating(self.mock_routes)),
            None => Arc::new(MockSource::new(self.mock_routes)),
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DemoArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// JSON config file (poll_interval_ms, worker_pool_size, recognized_entity_types)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Watcher poll interval in milliseconds (overrides config)
    #[arg(long, value_parser = validate_poll_interval)]
    pub poll_interval_ms: Option<u64>,

    /// Resolver worker threads (overrides config)
    #[arg(long, value_parser = validate_workers)]
    pub workers: Option<usize>,

    /// Entity type that triggers a reload; repeatable (overrides config)
    #[arg(long = "entity-type")]
    pub entity_types: Vec<String>,

    /// Number of lookup rounds [default: 10]
    #[arg(long, default_value_t = 10, value_parser = validate_rounds)]
    pub rounds: u32,

    /// Lookups per round; keys are "0".."n-1" [default: 10]
    #[arg(long, default_value_t = 10, value_parser = validate_lookups)]
    pub lookups: usize,

    /// Pause before each round in milliseconds [default: 3000]
    #[arg(long, default_value_t = 3000)]
    pub round_delay_ms: u64,

    /// Emit a change notification every N watcher polls [default: 1]
    #[arg(long, default_value_t = 1, value_parser = validate_change_every)]
    pub change_every: u64,

    /// Output format [default: tsv]
    #[arg(long, default_value = "tsv")]
    pub format: OutputFormat,
}

impl DemoArgs {
    /// Layer config sources: defaults, then the config file, then flags.
    pub fn config(&self) -> Result<Config, RouteError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(n) = self.workers {
            config.worker_pool_size = n;
        }
        if !self.entity_types.is_empty() {
            config.recognized_entity_types = self.entity_types.iter().cloned().collect();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn plan(&self) -> DemoPlan {
        DemoPlan {
            rounds: self.rounds,
            lookups_per_round: self.lookups,
            round_delay: Duration::from_millis(self.round_delay_ms),
            change_every: self.change_every,
            format: self.format,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Routing keys to resolve
    #[arg(required = true, num_args = 1..)]
    pub keys: Vec<String>,

    /// Output format [default: tsv]
    #[arg(long, default_value = "tsv")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tsv,
    Json,
}

impl Cli {
    /// The selected subcommand, falling back to `demo` with its flag defaults.
    pub fn command_or_default(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Demo(DefaultDemo::parse_from(["routeswap"]).args))
    }
}

/// `demo` flags on their own, used to materialize the clap defaults.
#[derive(Parser)]
struct DefaultDemo {
    #[command(flatten)]
    args: DemoArgs,
}

fn parse_in_range<T>(s: &str, what: &str, min: T, max: T) -> Result<T, String>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
{
    let val: T = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid integer"))?;
    if val < min {
        Err(format!("{what} must be at least {min}"))
    } else if val > max {
        Err(format!("{what} must be at most {max}"))
    } else {
        Ok(val)
    }
}

fn validate_poll_interval(s: &str) -> Result<u64, String> {
    parse_in_range(s, "poll-interval-ms", 1, 3_600_000)
}

fn validate_workers(s: &str) -> Result<usize, String> {
    parse_in_range(s, "workers", 1, 1024)
}

fn validate_rounds(s: &str) -> Result<u32, String> {
    parse_in_range(s, "rounds", 1, 100_000)
}

fn validate_lookups(s: &str) -> Result<usize, String> {
    parse_in_range(s, "lookups", 1, 1_000_000)
}

fn validate_mock_routes(s: &str) -> Result<usize, String> {
    parse_in_range(s, "mock-routes", 1, 1_000_000)
}

fn validate_change_every(s: &str) -> Result<u64, String> {
    parse_in_range(s, "change-every", 1, 1_000_000)
}
