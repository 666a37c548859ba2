use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use laning_ledger::collect::{self, CollectArgs, DirectorySource};
use laning_ledger::config::EngineConfig;
use laning_ledger::report::{self, MatchupReportArgs};
use laning_ledger::riot_api::{DEFAULT_MAX_REQS_PER_2MIN, RiotClient};
use laning_ledger::rows::RowBuilder;
use laning_ledger::sink::CsvFormat;
use log::{error, info};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "laning-ledger",
    about = "Laning-phase checkpoint stats from Riot match timelines",
    version
)]
struct Cli {
    /// Debug logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transform saved match/timeline JSON pairs into rows
    Transform {
        /// Directory holding <id>.json and <id>.timeline.json files
        #[arg(long = "input-dir")]
        input_dir: PathBuf,

        /// CSV file to append rows to
        #[arg(long)]
        out: PathBuf,

        /// Also write this batch as Parquet
        #[arg(long)]
        parquet: Option<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        csv: CsvArgs,
    },

    /// Fetch new matches from the Riot API and append their rows
    Collect {
        /// Platform routing value (br1, kr, euw1, ...)
        #[arg(long, default_value = "br1")]
        platform: String,

        /// Tracked player as Name#TAG (repeatable)
        #[arg(long = "riot-id")]
        riot_ids: Vec<String>,

        /// Seed from the master league ladder
        #[arg(long)]
        ladder: bool,

        #[arg(long, default_value = "RANKED_SOLO_5x5")]
        queue: String,

        #[arg(long = "max-ladder-players", default_value_t = 200)]
        max_ladder_players: usize,

        #[arg(long = "matches-per-player", default_value_t = 10)]
        matches_per_player: usize,

        #[arg(long = "match-target", default_value_t = 1440)]
        match_target: usize,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        parquet: Option<PathBuf>,

        /// Keep the raw payloads here for later `transform` runs
        #[arg(long = "raw-dir")]
        raw_dir: Option<PathBuf>,

        #[arg(long = "max-req-per-2min", default_value_t = DEFAULT_MAX_REQS_PER_2MIN)]
        max_req_per_2min: usize,

        /// Pause between matches, in milliseconds
        #[arg(long = "pause-ms", default_value_t = 1200)]
        pause_ms: u64,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        csv: CsvArgs,
    },

    /// Matchup table for one champion from stored rows
    Report {
        /// CSV or Parquet produced by transform/collect
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        champion: String,

        /// Drill into a single enemy champion
        #[arg(long)]
        enemy: Option<String>,

        /// Checkpoint minute the diff columns are read at
        #[arg(long, default_value_t = 14)]
        minute: u32,

        #[command(flatten)]
        csv: CsvArgs,
    },
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// Checkpoint preset: default, ladder or tracked
    #[arg(long, default_value = "default")]
    preset: String,

    /// JSON engine config; overrides --preset
    #[arg(long)]
    config: Option<PathBuf>,
}

impl EngineArgs {
    fn engine_config(&self) -> Result<EngineConfig> {
        let config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::preset(&self.preset)?.validated()?,
        };
        info!(
            "Checkpoints {:?}, minimum duration {}s, damage {:?}, role conflicts {:?}",
            config.checkpoints, config.min_duration_secs, config.damage, config.role_conflicts
        );
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct CsvArgs {
    #[arg(long, default_value_t = ';')]
    delimiter: char,

    /// Write decimals with a point instead of a comma
    #[arg(long = "decimal-point")]
    decimal_point: bool,
}

impl CsvArgs {
    fn format(&self) -> Result<CsvFormat> {
        if !self.delimiter.is_ascii() {
            return Err(anyhow!("Delimiter must be a single ASCII character"));
        }
        Ok(CsvFormat {
            delimiter: self.delimiter as u8,
            decimal_comma: !self.decimal_point,
        })
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Transform {
            input_dir,
            out,
            parquet,
            engine,
            csv,
        } => {
            let builder = RowBuilder::new(engine.engine_config()?);
            let source = DirectorySource::new(&input_dir);
            let ids = source.match_ids()?;
            info!("{} match/timeline pairs in {}", ids.len(), input_dir.display());

            let (records, stats) =
                collect::process_matches(&ids, &source, &builder, None, Duration::ZERO);
            collect::persist(&records, &out, parquet.as_deref(), csv.format()?)?;
            info!(
                "Done: {} matches, {} failed, {} without rows, {} rows",
                stats.matches_seen, stats.matches_failed, stats.matches_without_rows, stats.rows
            );
        }
        Command::Collect {
            platform,
            riot_ids,
            ladder,
            queue,
            max_ladder_players,
            matches_per_player,
            match_target,
            out,
            parquet,
            raw_dir,
            max_req_per_2min,
            pause_ms,
            engine,
            csv,
        } => {
            let builder = RowBuilder::new(engine.engine_config()?);
            let client = RiotClient::new_with_max(&platform, max_req_per_2min)?;
            let args = CollectArgs {
                riot_ids,
                ladder,
                queue,
                max_ladder_players,
                matches_per_player,
                match_target,
                out_csv: out,
                parquet_out: parquet,
                raw_dir,
                format: csv.format()?,
                pause_ms,
            };
            collect::run_collect(&args, &client, &builder)?;
        }
        Command::Report {
            input,
            champion,
            enemy,
            minute,
            csv,
        } => {
            report::run_matchup_report(MatchupReportArgs {
                input: &input,
                champion: &champion,
                enemy: enemy.as_deref(),
                minute,
                format: csv.format()?,
            })?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    if let Err(err) = run(cli) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}
