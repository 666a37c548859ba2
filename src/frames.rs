use crate::ingest::{Frame, Participant, ParticipantId, TeamId};

/// Cumulative counters of one participant at one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub creep_score: i64,
    pub gold: i64,
    pub experience: i64,
    pub level: i64,
    /// Only present on payloads whose frames carry damage stats.
    pub damage_to_champions: Option<i64>,
}

/// Reads `participant_id` out of frame `minute`. No interpolation: minute `m`
/// is exactly what frame `m` recorded. `None` past the end of the timeline or
/// when the participant is missing from that frame.
pub fn snapshot(frames: &[Frame], minute: u32, participant_id: ParticipantId) -> Option<Snapshot> {
    let frame = frames.get(minute as usize)?;
    let pf = frame.participants.get(&participant_id)?;

    Some(Snapshot {
        creep_score: pf.minions_killed + pf.jungle_minions_killed,
        gold: pf.total_gold,
        experience: pf.xp,
        level: pf.level,
        damage_to_champions: pf.damage_to_champions,
    })
}

/// Total gold of `team_id` at `minute`, floored at 1 so gold shares stay finite.
pub fn team_gold_at(
    frames: &[Frame],
    minute: u32,
    team_id: TeamId,
    participants: &[Participant],
) -> i64 {
    let Some(frame) = frames.get(minute as usize) else {
        return 1;
    };

    let total: i64 = participants
        .iter()
        .filter(|p| p.team_id == team_id)
        .filter_map(|p| frame.participants.get(&p.id))
        .map(|pf| pf.total_gold)
        .sum();

    total.max(1)
}
