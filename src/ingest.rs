//! Typed match and timeline, validated once from the wire DTOs.

use crate::error::IngestError;
use crate::model::{EventDto, FrameDto, MatchDto, ParticipantDto, TimelineDto};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

pub type ParticipantId = u32;
pub type TeamId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Top,
    Jungle,
    Middle,
    Bottom,
    Utility,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Top => "TOP",
            Role::Jungle => "JUNGLE",
            Role::Middle => "MIDDLE",
            Role::Bottom => "BOTTOM",
            Role::Utility => "UTILITY",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TOP" => Ok(Role::Top),
            "JUNGLE" => Ok(Role::Jungle),
            "MIDDLE" => Ok(Role::Middle),
            "BOTTOM" => Ok(Role::Bottom),
            "UTILITY" => Ok(Role::Utility),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndOfGame {
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub gold_earned: i64,
    pub damage_to_champions: i64,
    pub damage_taken: i64,
    pub damage_to_buildings: i64,
    pub damage_to_objectives: i64,
    pub vision_score: i64,
    pub wards_placed: i64,
    pub minions_killed: i64,
    pub neutral_minions_killed: i64,
    pub turret_plates_taken: i64,
    pub first_blood: bool,
    pub first_tower: bool,
}

impl EndOfGame {
    pub fn creep_score(&self) -> i64 {
        self.minions_killed + self.neutral_minions_killed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: ParticipantId,
    pub team_id: TeamId,
    /// `None` when the upstream position is empty or not one of the five lanes.
    pub role: Option<Role>,
    pub champion: String,
    pub win: bool,
    pub puuid: String,
    pub player_name: String,
    pub totals: EndOfGame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub win: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub id: String,
    pub duration_secs: i64,
    pub game_version: String,
    pub patch: String,
    pub created_at_ms: i64,
    pub queue_id: i64,
    pub participants: Vec<Participant>,
    pub teams: Vec<Team>,
}

impl Match {
    pub fn duration_minutes(&self) -> f64 {
        self.duration_secs as f64 / 60.0
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParticipantFrame {
    pub minions_killed: i64,
    pub jungle_minions_killed: i64,
    pub total_gold: i64,
    pub xp: i64,
    pub level: i64,
    pub damage_to_champions: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ChampionKill,
    TurretPlateDestroyed,
    Other,
}

impl From<&str> for EventKind {
    fn from(value: &str) -> Self {
        match value {
            "CHAMPION_KILL" => EventKind::ChampionKill,
            "TURRET_PLATE_DESTROYED" => EventKind::TurretPlateDestroyed,
            _ => EventKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp_ms: i64,
    pub killer: Option<ParticipantId>,
    pub victim: Option<ParticipantId>,
    pub assisting: Vec<ParticipantId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub timestamp_ms: i64,
    pub participants: BTreeMap<ParticipantId, ParticipantFrame>,
    pub events: Vec<Event>,
}

/// Per-minute frames; `frames[m]` is the state at minute `m`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    pub frames: Vec<Frame>,
}

/// "14.3.558.106" -> "14.3"
pub fn clean_version(version: &str) -> String {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() >= 2 {
        format!("{}.{}", parts[0], parts[1])
    } else {
        version.to_string()
    }
}

pub fn parse_match(value: Value) -> Result<Match, IngestError> {
    let dto: MatchDto = serde_json::from_value(value)?;
    Match::try_from(dto)
}

pub fn parse_timeline(value: Value) -> Result<Timeline, IngestError> {
    let dto: TimelineDto = serde_json::from_value(value)?;
    Timeline::try_from(dto)
}

impl TryFrom<MatchDto> for Match {
    type Error = IngestError;

    fn try_from(dto: MatchDto) -> Result<Self, Self::Error> {
        let id = dto.metadata.match_id.trim().to_string();
        if id.is_empty() {
            return Err(IngestError::MissingMatchId);
        }

        let info = dto.info;

        let mut seen = HashSet::new();
        for participant in &info.participants {
            if !seen.insert(participant.participant_id) {
                return Err(IngestError::DuplicateParticipant {
                    id: participant.participant_id,
                });
            }
        }

        let team_ids: BTreeSet<TeamId> = info
            .participants
            .iter()
            .map(|p| p.team_id)
            .chain(info.teams.iter().map(|t| t.team_id))
            .collect();
        if team_ids.len() > 2 {
            return Err(IngestError::TooManyTeams {
                found: team_ids.len(),
            });
        }

        // Older payloads report milliseconds and carry no end timestamp.
        let duration_secs = match info.game_end_timestamp {
            Some(_) => info.game_duration,
            None => info.game_duration / 1000,
        };

        Ok(Match {
            id,
            duration_secs,
            patch: clean_version(&info.game_version),
            game_version: info.game_version,
            created_at_ms: info.game_creation,
            queue_id: info.queue_id,
            participants: info.participants.into_iter().map(participant_from).collect(),
            teams: info
                .teams
                .into_iter()
                .map(|t| Team {
                    id: t.team_id,
                    win: t.win,
                })
                .collect(),
        })
    }
}

fn participant_from(dto: ParticipantDto) -> Participant {
    let role = dto
        .team_position
        .as_deref()
        .and_then(|pos| pos.parse::<Role>().ok());

    let player_name = dto
        .riot_id_game_name
        .filter(|name| !name.is_empty())
        .or(dto.summoner_name)
        .unwrap_or_default();

    let turret_plates_taken = dto
        .challenges
        .and_then(|c| c.turret_plates_taken)
        .map(|v| v as i64)
        .unwrap_or_default();

    Participant {
        id: dto.participant_id,
        team_id: dto.team_id,
        role,
        champion: dto.champion_name,
        win: dto.win,
        puuid: dto.puuid,
        player_name,
        totals: EndOfGame {
            kills: dto.kills,
            deaths: dto.deaths,
            assists: dto.assists,
            gold_earned: dto.gold_earned,
            damage_to_champions: dto.total_damage_dealt_to_champions,
            damage_taken: dto.total_damage_taken,
            damage_to_buildings: dto.damage_dealt_to_buildings,
            damage_to_objectives: dto.damage_dealt_to_objectives,
            vision_score: dto.vision_score,
            wards_placed: dto.wards_placed,
            minions_killed: dto.total_minions_killed,
            neutral_minions_killed: dto.neutral_minions_killed,
            turret_plates_taken,
            first_blood: dto.first_blood_kill,
            first_tower: dto.first_tower_kill,
        },
    }
}

impl TryFrom<TimelineDto> for Timeline {
    type Error = IngestError;

    fn try_from(dto: TimelineDto) -> Result<Self, Self::Error> {
        let mut frames = Vec::with_capacity(dto.info.frames.len());
        let mut previous: Option<i64> = None;

        for (index, frame) in dto.info.frames.into_iter().enumerate() {
            // The replayer stops at the first frame past its boundary.
            if let Some(prev) = previous {
                if frame.timestamp < prev {
                    return Err(IngestError::UnorderedFrames {
                        index,
                        previous: prev,
                        found: frame.timestamp,
                    });
                }
            }
            previous = Some(frame.timestamp);
            frames.push(frame_from(frame)?);
        }

        Ok(Timeline { frames })
    }
}

fn frame_from(dto: FrameDto) -> Result<Frame, IngestError> {
    let mut participants = BTreeMap::new();
    for (key, pf) in dto.participant_frames {
        let id: ParticipantId = key
            .trim()
            .parse()
            .map_err(|_| IngestError::BadFrameKey { key: key.clone() })?;
        participants.insert(
            id,
            ParticipantFrame {
                minions_killed: pf.minions_killed,
                jungle_minions_killed: pf.jungle_minions_killed,
                total_gold: pf.total_gold,
                xp: pf.xp,
                level: pf.level,
                damage_to_champions: pf
                    .damage_stats
                    .and_then(|d| d.total_damage_done_to_champions),
            },
        );
    }

    Ok(Frame {
        timestamp_ms: dto.timestamp,
        participants,
        events: dto.events.into_iter().map(event_from).collect(),
    })
}

fn event_from(dto: EventDto) -> Event {
    Event {
        kind: EventKind::from(dto.kind.as_str()),
        timestamp_ms: dto.timestamp,
        killer: dto.killer_id,
        victim: dto.victim_id,
        assisting: dto.assisting_participant_ids,
    }
}
