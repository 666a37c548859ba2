//! Wire shapes of the match-v5 `match` and `timeline` payloads.
//!
//! Only the fields the ledger reads are declared. Identity fields are
//! required; counters the API sometimes omits default to zero so a single
//! missing stat never drops a whole match.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct MatchDto {
    pub metadata: MatchMetadataDto,
    pub info: MatchInfoDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadataDto {
    pub match_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfoDto {
    pub game_creation: i64,
    pub game_duration: i64,
    /// Absent on payloads from before the duration unit switched to seconds.
    #[serde(default)]
    pub game_end_timestamp: Option<i64>,
    pub game_version: String,
    #[serde(default)]
    pub queue_id: i64,
    pub participants: Vec<ParticipantDto>,
    #[serde(default)]
    pub teams: Vec<TeamDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDto {
    pub team_id: u32,
    #[serde(default)]
    pub win: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub participant_id: u32,
    pub team_id: u32,
    #[serde(default)]
    pub team_position: Option<String>,
    pub champion_name: String,
    pub win: bool,

    #[serde(default)]
    pub puuid: String,
    #[serde(default)]
    pub riot_id_game_name: Option<String>,
    #[serde(default)]
    pub summoner_name: Option<String>,

    #[serde(default)]
    pub kills: i64,
    #[serde(default)]
    pub deaths: i64,
    #[serde(default)]
    pub assists: i64,
    #[serde(default)]
    pub gold_earned: i64,
    #[serde(default)]
    pub total_damage_dealt_to_champions: i64,
    #[serde(default)]
    pub total_damage_taken: i64,
    #[serde(default)]
    pub damage_dealt_to_buildings: i64,
    #[serde(default)]
    pub damage_dealt_to_objectives: i64,
    #[serde(default)]
    pub vision_score: i64,
    #[serde(default)]
    pub wards_placed: i64,
    #[serde(default)]
    pub total_minions_killed: i64,
    #[serde(default)]
    pub neutral_minions_killed: i64,
    #[serde(default)]
    pub first_blood_kill: bool,
    #[serde(default)]
    pub first_tower_kill: bool,
    #[serde(default)]
    pub challenges: Option<ChallengesDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengesDto {
    #[serde(default)]
    pub turret_plates_taken: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineDto {
    pub info: TimelineInfoDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineInfoDto {
    pub frames: Vec<FrameDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDto {
    pub timestamp: i64,
    /// Keyed by the participant id rendered as a string ("1".."10").
    #[serde(default)]
    pub participant_frames: HashMap<String, ParticipantFrameDto>,
    #[serde(default)]
    pub events: Vec<EventDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantFrameDto {
    #[serde(default)]
    pub minions_killed: i64,
    #[serde(default)]
    pub jungle_minions_killed: i64,
    #[serde(default)]
    pub total_gold: i64,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub level: i64,
    #[serde(default)]
    pub damage_stats: Option<DamageStatsDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageStatsDto {
    #[serde(default)]
    pub total_damage_done_to_champions: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: i64,
    #[serde(default)]
    pub killer_id: Option<u32>,
    #[serde(default)]
    pub victim_id: Option<u32>,
    #[serde(default)]
    pub assisting_participant_ids: Vec<u32>,
}
