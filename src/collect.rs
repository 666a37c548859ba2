//! Collector runs: find match ids, fetch match + timeline, transform, persist.

use crate::ingest::{parse_match, parse_timeline};
use crate::metrics::Record;
use crate::riot_api::{RiotClient, parse_riot_id};
use crate::rows::RowBuilder;
use crate::sink::{self, CsvFormat};
use anyhow::{Result, anyhow};
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

const TIMELINE_SUFFIX: &str = ".timeline.json";

/// Where raw match/timeline pairs come from.
pub trait MatchSource {
    fn fetch(&self, match_id: &str) -> Result<(Value, Value)>;
}

impl MatchSource for RiotClient {
    fn fetch(&self, match_id: &str) -> Result<(Value, Value)> {
        let match_json = self.get_match_json(match_id)?;
        let timeline_json = self.get_timeline_json(match_id)?;
        Ok((match_json, timeline_json))
    }
}

/// A directory of `<id>.json` + `<id>.timeline.json` pairs, as written by
/// `save_raw`.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Ids with both files present, sorted.
    pub fn match_ids(&self) -> Result<Vec<String>> {
        let mut ids = BTreeSet::new();

        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(TIMELINE_SUFFIX) || !name.ends_with(".json") {
                continue;
            }
            let id = name.trim_end_matches(".json");
            if self.dir.join(format!("{}{}", id, TIMELINE_SUFFIX)).exists() {
                ids.insert(id.to_string());
            } else {
                warn!("Skipping {}: no timeline next to it", path.display());
            }
        }

        Ok(ids.into_iter().collect())
    }
}

impl MatchSource for DirectorySource {
    fn fetch(&self, match_id: &str) -> Result<(Value, Value)> {
        let read = |name: String| -> Result<Value> {
            let contents = fs::read_to_string(self.dir.join(name))?;
            Ok(serde_json::from_str(&contents)?)
        };
        Ok((
            read(format!("{}.json", match_id))?,
            read(format!("{}{}", match_id, TIMELINE_SUFFIX))?,
        ))
    }
}

fn save_raw(out_dir: &Path, match_id: &str, match_json: &Value, timeline_json: &Value) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    fs::write(
        out_dir.join(format!("{}.json", match_id)),
        serde_json::to_vec_pretty(match_json)?,
    )?;
    fs::write(
        out_dir.join(format!("{}{}", match_id, TIMELINE_SUFFIX)),
        serde_json::to_vec_pretty(timeline_json)?,
    )?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub matches_seen: usize,
    pub matches_failed: usize,
    pub matches_without_rows: usize,
    pub rows: usize,
}

/// Fetches and transforms each id. A match that cannot be fetched or
/// validated is logged and skipped; it never aborts the batch.
pub fn process_matches<S: MatchSource>(
    match_ids: &[String],
    source: &S,
    builder: &RowBuilder,
    raw_dir: Option<&Path>,
    pause: Duration,
) -> (Vec<Record>, BatchStats) {
    let mut records = Vec::new();
    let mut stats = BatchStats::default();
    let total = match_ids.len();

    for (idx, match_id) in match_ids.iter().enumerate() {
        stats.matches_seen += 1;

        let (match_json, timeline_json) = match source.fetch(match_id) {
            Ok(pair) => pair,
            Err(err) => {
                warn!("Failed to fetch match {}: {}", match_id, err);
                stats.matches_failed += 1;
                continue;
            }
        };

        if let Some(dir) = raw_dir {
            if let Err(err) = save_raw(dir, match_id, &match_json, &timeline_json) {
                warn!("Failed to save raw match {}: {}", match_id, err);
            }
        }

        let parsed = parse_match(match_json)
            .and_then(|game| parse_timeline(timeline_json).map(|timeline| (game, timeline)));
        let (game, timeline) = match parsed {
            Ok(pair) => pair,
            Err(err) => {
                warn!("Skipping invalid match {}: {}", match_id, err);
                stats.matches_failed += 1;
                continue;
            }
        };

        let rows = builder.build_records(&game, &timeline);
        let count = rows.len();
        if count == 0 {
            stats.matches_without_rows += 1;
        }
        stats.rows += count;
        records.extend(rows);

        info!(
            "Match {}/{} {}: {} rows (total {})",
            idx + 1,
            total,
            match_id,
            count,
            stats.rows
        );

        if !pause.is_zero() && idx + 1 < total {
            sleep(pause);
        }
    }

    (records, stats)
}

/// Writes a batch to the CSV (and optionally a Parquet snapshot of it).
pub fn persist(
    records: &[Record],
    out_csv: &Path,
    parquet_out: Option<&Path>,
    format: CsvFormat,
) -> Result<()> {
    if records.is_empty() {
        warn!("No rows extracted, nothing written");
        return Ok(());
    }

    let written = sink::append_csv(out_csv, records, format)?;
    info!("Appended {} rows to {}", written, out_csv.display());

    if let Some(path) = parquet_out {
        sink::write_parquet(path, records)?;
        info!("Wrote {} rows to {}", records.len(), path.display());
    }

    Ok(())
}

#[derive(Debug, Clone)]
pub struct CollectArgs {
    pub riot_ids: Vec<String>,
    pub ladder: bool,
    pub queue: String,
    pub max_ladder_players: usize,
    pub matches_per_player: usize,
    pub match_target: usize,
    pub out_csv: PathBuf,
    pub parquet_out: Option<PathBuf>,
    pub raw_dir: Option<PathBuf>,
    pub format: CsvFormat,
    pub pause_ms: u64,
}

fn seed_puuids(args: &CollectArgs, client: &RiotClient) -> Result<Vec<String>> {
    let mut puuids = Vec::new();

    for riot_id in &args.riot_ids {
        let Some((name, tag)) = parse_riot_id(riot_id) else {
            warn!("Invalid Riot id '{}' (expected Name#TAG)", riot_id);
            continue;
        };
        match client.get_account_by_riot_id(name, tag) {
            Ok(account) => {
                info!("Found {}", riot_id);
                puuids.push(account.puuid);
            }
            Err(err) => warn!("Failed to look up {}: {}", riot_id, err),
        }
    }

    if args.ladder {
        let mut entries = client.get_master_league(&args.queue)?;
        info!("{} players in the master league", entries.len());
        entries.sort_by(|a, b| b.league_points.cmp(&a.league_points));

        for entry in entries.into_iter().take(args.max_ladder_players) {
            let puuid = match (entry.puuid, entry.summoner_id) {
                (Some(puuid), _) => puuid,
                (None, Some(summoner_id)) => match client.get_puuid_by_summoner_id(&summoner_id) {
                    Ok(puuid) => puuid,
                    Err(err) => {
                        warn!("Failed to resolve summoner {}: {}", summoner_id, err);
                        continue;
                    }
                },
                (None, None) => continue,
            };
            puuids.push(puuid);
        }
    }

    Ok(puuids)
}

/// Ids not yet stored, in first-seen order, capped at `match_target`.
fn collect_match_ids(
    args: &CollectArgs,
    client: &RiotClient,
    puuids: &[String],
    processed: &HashSet<String>,
) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut ids = Vec::new();

    for puuid in puuids {
        if ids.len() >= args.match_target {
            break;
        }

        let recent = match client.get_match_ids_by_puuid(puuid, args.matches_per_player) {
            Ok(recent) => recent,
            Err(err) => {
                warn!("Failed to fetch match ids for {}: {}", puuid, err);
                continue;
            }
        };

        for id in recent {
            if processed.contains(&id) || !seen.insert(id.clone()) {
                continue;
            }
            ids.push(id);
            if ids.len() >= args.match_target {
                break;
            }
        }

        info!("Collected {} new match ids", ids.len());
    }

    ids
}

pub fn run_collect(args: &CollectArgs, client: &RiotClient, builder: &RowBuilder) -> Result<BatchStats> {
    if args.riot_ids.is_empty() && !args.ladder {
        return Err(anyhow!("Provide at least one --riot-id or use --ladder"));
    }

    let processed = sink::load_processed_ids(&args.out_csv, args.format)?;
    info!("{} matches already stored", processed.len());

    let puuids = seed_puuids(args, client)?;
    if puuids.is_empty() {
        warn!("No players found, nothing to collect");
        return Ok(BatchStats::default());
    }

    let match_ids = collect_match_ids(args, client, &puuids, &processed);
    if match_ids.is_empty() {
        info!("No new matches to process");
        return Ok(BatchStats::default());
    }

    info!("Processing {} matches", match_ids.len());
    let (records, stats) = process_matches(
        &match_ids,
        client,
        builder,
        args.raw_dir.as_deref(),
        Duration::from_millis(args.pause_ms),
    );

    persist(&records, &args.out_csv, args.parquet_out.as_deref(), args.format)?;

    info!(
        "Done: {} matches, {} failed, {} without rows, {} rows",
        stats.matches_seen, stats.matches_failed, stats.matches_without_rows, stats.rows
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use serde_json::json;
    use std::collections::HashMap;

    struct FakeSource {
        payloads: HashMap<String, (Value, Value)>,
    }

    impl MatchSource for FakeSource {
        fn fetch(&self, match_id: &str) -> Result<(Value, Value)> {
            self.payloads
                .get(match_id)
                .cloned()
                .ok_or_else(|| anyhow!("404 for {}", match_id))
        }
    }

    fn payload(match_id: &str, duration: i64) -> (Value, Value) {
        let game = json!({
            "metadata": {"matchId": match_id},
            "info": {
                "gameCreation": 0, "gameDuration": duration, "gameEndTimestamp": 1,
                "gameVersion": "14.3.1",
                "participants": [
                    {"participantId": 1, "teamId": 100, "teamPosition": "TOP",
                     "championName": "Darius", "win": true},
                    {"participantId": 2, "teamId": 200, "teamPosition": "TOP",
                     "championName": "Garen", "win": false}
                ]
            }
        });
        let frames: Vec<Value> = (0..20)
            .map(|m| {
                json!({
                    "timestamp": m * 60_000,
                    "participantFrames": {
                        "1": {"totalGold": 500 + m * 300},
                        "2": {"totalGold": 500 + m * 250}
                    },
                    "events": []
                })
            })
            .collect();
        (game, json!({"info": {"frames": frames}}))
    }

    #[test]
    fn skips_failures_and_counts_rows() {
        let mut payloads = HashMap::new();
        payloads.insert("KR_1".to_string(), payload("KR_1", 1800));
        payloads.insert("KR_2".to_string(), payload("KR_2", 150));
        payloads.insert("KR_3".to_string(), (json!({"bogus": true}), json!({})));
        let source = FakeSource { payloads };

        let ids: Vec<String> = ["KR_1", "KR_2", "KR_3", "KR_4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let builder = RowBuilder::new(EngineConfig::tracked_players());
        let (records, stats) = process_matches(&ids, &source, &builder, None, Duration::ZERO);

        assert_eq!(records.len(), 2);
        assert_eq!(
            stats,
            BatchStats {
                matches_seen: 4,
                matches_failed: 2,
                matches_without_rows: 1,
                rows: 2
            }
        );
    }

    #[test]
    fn raw_dir_round_trips_through_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut payloads = HashMap::new();
        payloads.insert("BR1_9".to_string(), payload("BR1_9", 1800));
        let source = FakeSource { payloads };
        let builder = RowBuilder::new(EngineConfig::tracked_players());

        let ids = vec!["BR1_9".to_string()];
        let (first, _) = process_matches(&ids, &source, &builder, Some(dir.path()), Duration::ZERO);

        let local = DirectorySource::new(dir.path());
        assert_eq!(local.match_ids().unwrap(), ids);
        let (second, _) = process_matches(&ids, &local, &builder, None, Duration::ZERO);
        assert_eq!(first, second);
    }

    #[test]
    fn persist_appends_and_dedups_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("rows.csv");
        let mut payloads = HashMap::new();
        payloads.insert("KR_1".to_string(), payload("KR_1", 1800));
        let source = FakeSource { payloads };
        let builder = RowBuilder::new(EngineConfig::tracked_players());

        let (records, _) = process_matches(
            &["KR_1".to_string()],
            &source,
            &builder,
            None,
            Duration::ZERO,
        );
        persist(&records, &csv_path, None, CsvFormat::default()).unwrap();

        let processed = sink::load_processed_ids(&csv_path, CsvFormat::default()).unwrap();
        assert!(processed.contains("KR_1"));
    }
}
