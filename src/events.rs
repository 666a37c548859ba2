use crate::ingest::{EventKind, ParticipantId, Timeline};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventTally {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub plates: u32,
}

pub fn minute_to_ms(minute: u32) -> i64 {
    i64::from(minute) * 60 * 1000
}

/// Replays the event log up to and including `minute_limit` and tallies what
/// `participant_id` did. Frames must be in timestamp order; replay stops at the
/// first frame that starts past the boundary.
pub fn events_up_to(timeline: &Timeline, minute_limit: u32, participant_id: ParticipantId) -> EventTally {
    let limit_ms = minute_to_ms(minute_limit);
    let mut tally = EventTally::default();

    for frame in &timeline.frames {
        if frame.timestamp_ms > limit_ms {
            break;
        }

        // A frame may straddle the boundary.
        for event in frame.events.iter().filter(|e| e.timestamp_ms <= limit_ms) {
            let assisted = event.assisting.contains(&participant_id);
            let killed = event.killer == Some(participant_id);

            match event.kind {
                EventKind::ChampionKill => {
                    if killed {
                        tally.kills += 1;
                    }
                    if event.victim == Some(participant_id) {
                        tally.deaths += 1;
                    }
                    if assisted {
                        tally.assists += 1;
                    }
                }
                EventKind::TurretPlateDestroyed => {
                    if killed || assisted {
                        tally.plates += 1;
                    }
                }
                EventKind::Other => {}
            }
        }
    }

    tally
}
