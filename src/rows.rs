//! Turns one match and its timeline into one row per laned participant.

use crate::config::{DamageEstimate, EngineConfig};
use crate::events::events_up_to;
use crate::frames::{Snapshot, snapshot, team_gold_at};
use crate::ingest::{Match, Participant, ParticipantId, TeamId, Timeline};
use crate::lanes::resolve_opponents;
use crate::metrics::{CheckpointTable, Metric, Record, round2, safe_div};
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::HashMap;

/// End-of-game columns that hold text; everything else in a row is numeric.
pub const TEXT_FIELDS: [&str; 9] = [
    "Match ID",
    "Patch",
    "Game Date",
    "Lane",
    "Champion",
    "Enemy Champion",
    "Player Name",
    "PUUID",
    "Result",
];

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRow {
    pub match_id: String,
    pub participant_id: ParticipantId,
    pub opponent_id: ParticipantId,
    /// End-of-game fields in output order.
    pub summary: Record,
    pub checkpoints: CheckpointTable,
}

impl CheckpointRow {
    /// Flattens the checkpoint table into `"{metric} {minute}'"` columns.
    pub fn to_record(&self) -> Record {
        let mut record = self.summary.clone();
        for (minute, metric, value) in self.checkpoints.iter() {
            record.push(metric.column(minute), value.clone());
        }
        record
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TeamTotals {
    damage_to_champions: i64,
    damage_taken: i64,
}

pub struct RowBuilder {
    config: EngineConfig,
}

impl RowBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Zero rows for games under the minimum duration; otherwise one row per
    /// participant with a role and a resolvable lane opponent.
    pub fn build(&self, game: &Match, timeline: &Timeline) -> Vec<CheckpointRow> {
        if game.duration_secs < self.config.min_duration_secs {
            debug!(
                "{}: {}s is under the {}s minimum, no rows",
                game.id, game.duration_secs, self.config.min_duration_secs
            );
            return Vec::new();
        }

        let opponents = resolve_opponents(&game.participants, self.config.role_conflicts);

        let mut team_totals: HashMap<TeamId, TeamTotals> = HashMap::new();
        for p in &game.participants {
            let totals = team_totals.entry(p.team_id).or_default();
            totals.damage_to_champions += p.totals.damage_to_champions;
            totals.damage_taken += p.totals.damage_taken;
        }

        let mut rows = Vec::new();

        for p in &game.participants {
            if p.role.is_none() {
                debug!("{}: participant {} has no role", game.id, p.id);
                continue;
            }

            let Some(opponent) = opponents
                .get(&p.id)
                .copied()
                .flatten()
                .and_then(|id| game.participant(id))
            else {
                debug!("{}: participant {} has no lane opponent", game.id, p.id);
                continue;
            };

            let team = team_totals.get(&p.team_id).copied().unwrap_or_default();

            let mut checkpoints = CheckpointTable::default();
            for &minute in &self.config.checkpoints {
                self.fill_checkpoint(&mut checkpoints, game, timeline, p, opponent, minute);
            }

            rows.push(CheckpointRow {
                match_id: game.id.clone(),
                participant_id: p.id,
                opponent_id: opponent.id,
                summary: end_of_game(game, p, opponent, team),
                checkpoints,
            });
        }

        rows
    }

    pub fn build_records(&self, game: &Match, timeline: &Timeline) -> Vec<Record> {
        self.build(game, timeline)
            .iter()
            .map(CheckpointRow::to_record)
            .collect()
    }

    fn fill_checkpoint(
        &self,
        table: &mut CheckpointTable,
        game: &Match,
        timeline: &Timeline,
        player: &Participant,
        opponent: &Participant,
        minute: u32,
    ) {
        // No frame recorded for this minute: the whole checkpoint is "no data".
        if minute as usize >= timeline.frames.len() {
            table.insert_empty(minute);
            return;
        }

        let frames = &timeline.frames;
        let own = snapshot(frames, minute, player.id);
        let enemy = snapshot(frames, minute, opponent.id);
        let own_values = own.unwrap_or_default();
        let enemy_values = enemy.unwrap_or_default();

        let tally = events_up_to(timeline, minute, player.id);
        let team_gold = team_gold_at(frames, minute, player.team_id, &game.participants);

        let own_damage = self.damage_at(game, player, own.as_ref(), minute);
        let enemy_damage = match enemy {
            Some(ref snap) => self.damage_at(game, opponent, Some(snap), minute),
            None => 0.0,
        };

        table.insert(minute, Metric::Cs, own_values.creep_score);
        table.insert(minute, Metric::Gold, own_values.gold);
        table.insert(minute, Metric::Xp, own_values.experience);
        table.insert(minute, Metric::Level, own_values.level);
        table.insert(minute, Metric::Damage, own_damage);
        table.insert(minute, Metric::Kills, tally.kills);
        table.insert(minute, Metric::Deaths, tally.deaths);
        table.insert(minute, Metric::Assists, tally.assists);
        table.insert(minute, Metric::Plates, tally.plates);
        table.insert(
            minute,
            Metric::GoldShare,
            safe_div(own_values.gold as f64, team_gold as f64),
        );

        table.insert(minute, Metric::EnemyCs, enemy_values.creep_score);
        table.insert(minute, Metric::EnemyGold, enemy_values.gold);
        table.insert(minute, Metric::EnemyXp, enemy_values.experience);
        table.insert(minute, Metric::EnemyLevel, enemy_values.level);
        table.insert(minute, Metric::EnemyDamage, enemy_damage);

        // A missing side means there is nothing to compare, not a zero opponent.
        let comparable = own.is_some() && enemy.is_some();
        let diff = |a: i64, b: i64| if comparable { a - b } else { 0 };

        table.insert(
            minute,
            Metric::CsDiff,
            diff(own_values.creep_score, enemy_values.creep_score),
        );
        table.insert(minute, Metric::GoldDiff, diff(own_values.gold, enemy_values.gold));
        table.insert(
            minute,
            Metric::XpDiff,
            diff(own_values.experience, enemy_values.experience),
        );
        table.insert(minute, Metric::LevelDiff, diff(own_values.level, enemy_values.level));
        table.insert(
            minute,
            Metric::DamageDiff,
            if comparable {
                round2(own_damage - enemy_damage)
            } else {
                0.0
            },
        );
    }

    fn damage_at(
        &self,
        game: &Match,
        participant: &Participant,
        snap: Option<&Snapshot>,
        minute: u32,
    ) -> f64 {
        let interpolated = || {
            let minutes = game.duration_minutes();
            if minutes <= 0.0 {
                return 0.0;
            }
            round2(participant.totals.damage_to_champions as f64 / minutes * f64::from(minute))
        };

        match self.config.damage {
            DamageEstimate::Interpolated => interpolated(),
            DamageEstimate::Cumulative => snap
                .and_then(|s| s.damage_to_champions)
                .map(|d| d as f64)
                .unwrap_or_else(interpolated),
        }
    }
}

fn format_ts_millis(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn end_of_game(game: &Match, p: &Participant, opponent: &Participant, team: TeamTotals) -> Record {
    let totals = &p.totals;
    let minutes = game.duration_minutes();
    let lane = p.role.map(|r| r.as_str()).unwrap_or_default();

    let mut record = Record::new();
    record.push("Match ID", game.id.as_str());
    record.push("Patch", game.patch.as_str());
    record.push("Game Start Time", game.created_at_ms);
    record.push("Game Date", format_ts_millis(game.created_at_ms));
    record.push("Lane", lane);
    record.push("Champion", p.champion.as_str());
    record.push("Enemy Champion", opponent.champion.as_str());
    record.push("Player Name", p.player_name.as_str());
    record.push("PUUID", p.puuid.as_str());
    record.push("Result", if p.win { "Win" } else { "Loss" });
    record.push("Win", p.win);
    record.push("Kills", totals.kills);
    record.push("Deaths", totals.deaths);
    record.push("Assists", totals.assists);
    record.push(
        "KDA",
        safe_div((totals.kills + totals.assists) as f64, totals.deaths as f64),
    );
    record.push("Gold Earned", totals.gold_earned);
    record.push("Total Damage Dealt", totals.damage_to_champions);
    record.push("Damage Taken", totals.damage_taken);
    record.push("Damage to Buildings", totals.damage_to_buildings);
    record.push("Damage to Objectives", totals.damage_to_objectives);
    record.push("Farm/Min", safe_div(totals.creep_score() as f64, minutes));
    record.push(
        "Damage/Min",
        safe_div(totals.damage_to_champions as f64, minutes),
    );
    record.push("Vision Score", totals.vision_score);
    record.push("Wards Placed", totals.wards_placed);
    record.push("Turret Plates Taken", totals.turret_plates_taken);
    record.push("First Blood", totals.first_blood);
    record.push("First Tower", totals.first_tower);
    record.push(
        "Team Damage %",
        safe_div(
            totals.damage_to_champions as f64,
            team.damage_to_champions as f64,
        ),
    );
    record.push(
        "Damage Taken %",
        safe_div(totals.damage_taken as f64, team.damage_taken as f64),
    );
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleConflictPolicy;
    use crate::ingest::{EndOfGame, Event, EventKind, Frame, ParticipantFrame, Role};
    use crate::metrics::FieldValue;

    fn participant(id: ParticipantId, team_id: TeamId, role: Option<Role>) -> Participant {
        Participant {
            id,
            team_id,
            role,
            champion: format!("Champ{}", id),
            win: team_id == 100,
            puuid: format!("puuid-{}", id),
            player_name: format!("Player{}", id),
            totals: EndOfGame {
                kills: 4,
                deaths: 2,
                assists: 6,
                damage_to_champions: 20_000,
                damage_taken: 10_000,
                minions_killed: 180,
                neutral_minions_killed: 20,
                ..EndOfGame::default()
            },
        }
    }

    fn game(duration_secs: i64, participants: Vec<Participant>) -> Match {
        Match {
            id: "EUW1_42".to_string(),
            duration_secs,
            game_version: "14.3.1".to_string(),
            patch: "14.3".to_string(),
            created_at_ms: 0,
            queue_id: 420,
            participants,
            teams: Vec::new(),
        }
    }

    /// `minutes` frames where each participant's gold grows by `rate * id` a minute.
    fn timeline(minutes: u32, ids: &[ParticipantId]) -> Timeline {
        let frames = (0..minutes)
            .map(|m| {
                let mut frame = Frame {
                    timestamp_ms: i64::from(m) * 60_000,
                    ..Frame::default()
                };
                for &id in ids {
                    frame.participants.insert(
                        id,
                        ParticipantFrame {
                            minions_killed: i64::from(m) * 8,
                            jungle_minions_killed: 0,
                            total_gold: 500 + i64::from(m) * 100 * i64::from(id),
                            xp: i64::from(m) * 200,
                            level: 1 + i64::from(m) / 2,
                            damage_to_champions: Some(i64::from(m) * 300),
                        },
                    );
                }
                frame
            })
            .collect();
        Timeline { frames }
    }

    fn lane_pair() -> Vec<Participant> {
        vec![
            participant(1, 100, Some(Role::Middle)),
            participant(2, 200, Some(Role::Middle)),
        ]
    }

    fn builder(checkpoints: Vec<u32>) -> RowBuilder {
        RowBuilder::new(EngineConfig {
            checkpoints,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn short_game_has_no_rows() {
        let rows = builder(vec![5]).build(&game(899, lane_pair()), &timeline(15, &[1, 2]));
        assert!(rows.is_empty());
        let rows = builder(vec![5]).build(&game(900, lane_pair()), &timeline(15, &[1, 2]));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn skips_roleless_and_unmatched() {
        let participants = vec![
            participant(1, 100, Some(Role::Middle)),
            participant(2, 200, Some(Role::Middle)),
            participant(3, 100, None),
            participant(4, 100, Some(Role::Top)),
            participant(5, 200, Some(Role::Jungle)),
        ];
        let rows = builder(vec![5]).build(&game(1800, participants), &timeline(20, &[1, 2, 3, 4, 5]));
        let ids: Vec<ParticipantId> = rows.iter().map(|r| r.participant_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn differentials_and_self_metrics() {
        let rows = builder(vec![10]).build(&game(1800, lane_pair()), &timeline(20, &[1, 2]));
        let row = &rows[0];
        // gold: 500 + 10*100*1 vs 500 + 10*100*2
        assert_eq!(row.checkpoints.get(10, Metric::Gold), Some(&FieldValue::Int(1500)));
        assert_eq!(row.checkpoints.get(10, Metric::EnemyGold), Some(&FieldValue::Int(2500)));
        assert_eq!(row.checkpoints.get(10, Metric::GoldDiff), Some(&FieldValue::Int(-1000)));
        assert_eq!(row.checkpoints.get(10, Metric::CsDiff), Some(&FieldValue::Int(0)));
        // only one participant per team: share is 1.0
        assert_eq!(row.checkpoints.get(10, Metric::GoldShare), Some(&FieldValue::Float(1.0)));
        assert_eq!(rows[1].checkpoints.get(10, Metric::GoldDiff), Some(&FieldValue::Int(1000)));
    }

    #[test]
    fn interpolated_damage_is_linear_estimate() {
        let rows = builder(vec![6]).build(&game(1800, lane_pair()), &timeline(20, &[1, 2]));
        // 20_000 over 30 minutes, sampled at 6
        assert_eq!(rows[0].checkpoints.get(6, Metric::Damage), Some(&FieldValue::Float(4000.0)));
        assert_eq!(rows[0].checkpoints.get(6, Metric::DamageDiff), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn cumulative_damage_reads_frames() {
        let builder = RowBuilder::new(EngineConfig {
            checkpoints: vec![6],
            damage: DamageEstimate::Cumulative,
            ..EngineConfig::default()
        });
        let mut tl = timeline(20, &[1, 2]);
        tl.frames[6].participants.get_mut(&2).unwrap().damage_to_champions = None;

        let rows = builder.build(&game(1800, lane_pair()), &tl);
        assert_eq!(rows[0].checkpoints.get(6, Metric::Damage), Some(&FieldValue::Float(1800.0)));
        // participant 2 falls back to the estimate
        assert_eq!(rows[0].checkpoints.get(6, Metric::EnemyDamage), Some(&FieldValue::Float(4000.0)));
        assert_eq!(rows[0].checkpoints.get(6, Metric::DamageDiff), Some(&FieldValue::Float(-2200.0)));
    }

    #[test]
    fn missing_opponent_snapshot_zeroes_differentials() {
        let mut tl = timeline(20, &[1, 2]);
        tl.frames[8].participants.remove(&2);
        let rows = builder(vec![8]).build(&game(1800, lane_pair()), &tl);
        let row = &rows[0];
        assert_eq!(row.checkpoints.get(8, Metric::Gold), Some(&FieldValue::Int(1300)));
        assert_eq!(row.checkpoints.get(8, Metric::EnemyGold), Some(&FieldValue::Int(0)));
        assert_eq!(row.checkpoints.get(8, Metric::GoldDiff), Some(&FieldValue::Int(0)));
        assert_eq!(row.checkpoints.get(8, Metric::DamageDiff), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn checkpoint_past_timeline_is_all_zero() {
        let mut tl = timeline(10, &[1, 2]);
        tl.frames[3].events.push(Event {
            kind: EventKind::ChampionKill,
            timestamp_ms: 200_000,
            killer: Some(1),
            victim: Some(2),
            assisting: vec![],
        });
        let rows = builder(vec![5, 25]).build(&game(1800, lane_pair()), &tl);
        let row = &rows[0];
        assert_eq!(row.checkpoints.get(5, Metric::Kills), Some(&FieldValue::Int(1)));
        for metric in Metric::ALL {
            let value = row.checkpoints.get(25, metric).unwrap();
            assert!(value.is_zero(), "{:?} should be zero", metric);
        }
    }

    #[test]
    fn summary_fields() {
        let mut participants = lane_pair();
        participants[0].totals.deaths = 0;
        let rows = builder(vec![5]).build(&game(1800, participants), &timeline(20, &[1, 2]));
        let summary = &rows[0].summary;
        assert_eq!(summary.get("Match ID"), Some(&FieldValue::Text("EUW1_42".into())));
        assert_eq!(summary.get("Lane"), Some(&FieldValue::Text("MIDDLE".into())));
        assert_eq!(summary.get("Enemy Champion"), Some(&FieldValue::Text("Champ2".into())));
        assert_eq!(summary.get("Result"), Some(&FieldValue::Text("Win".into())));
        assert_eq!(summary.get("Win"), Some(&FieldValue::Int(1)));
        assert_eq!(summary.get("KDA"), Some(&FieldValue::Float(0.0)));
        assert_eq!(summary.get("Farm/Min"), Some(&FieldValue::Float(6.67)));
        assert_eq!(summary.get("Team Damage %"), Some(&FieldValue::Float(1.0)));
        assert_eq!(
            summary.get("Game Date"),
            Some(&FieldValue::Text("1970-01-01T00:00:00+00:00".into()))
        );
        assert_eq!(rows[1].summary.get("KDA"), Some(&FieldValue::Float(5.0)));
    }

    #[test]
    fn exclude_policy_drops_conflicting_lane() {
        let participants = vec![
            participant(1, 100, Some(Role::Top)),
            participant(2, 100, Some(Role::Top)),
            participant(3, 200, Some(Role::Top)),
            participant(4, 100, Some(Role::Bottom)),
            participant(5, 200, Some(Role::Bottom)),
        ];
        let tl = timeline(20, &[1, 2, 3, 4, 5]);

        let exclude = RowBuilder::new(EngineConfig {
            checkpoints: vec![5],
            role_conflicts: RoleConflictPolicy::Exclude,
            ..EngineConfig::default()
        });
        let ids: Vec<ParticipantId> = exclude
            .build(&game(1800, participants.clone()), &tl)
            .iter()
            .map(|r| r.participant_id)
            .collect();
        assert_eq!(ids, vec![4, 5]);

        let last_seen = builder(vec![5]);
        let ids: Vec<ParticipantId> = last_seen
            .build(&game(1800, participants), &tl)
            .iter()
            .map(|r| r.participant_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn record_flattens_with_minute_suffix() {
        let rows = builder(vec![5, 14]).build(&game(1800, lane_pair()), &timeline(20, &[1, 2]));
        let record = rows[0].to_record();
        assert_eq!(record.get("Gold Diff 14'"), Some(&FieldValue::Int(-1400)));
        assert!(record.get("CS 5'").is_some());
        assert_eq!(
            record.len(),
            rows[0].summary.len() + 2 * Metric::ALL.len()
        );
    }
}
