use crate::config::RoleConflictPolicy;
use crate::ingest::{Participant, ParticipantId, Role, TeamId};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Maps every participant to the enemy occupying the same role, or `None` when
/// there is no such enemy (no role, missing role on the other team, conflict
/// dropped under `RoleConflictPolicy::Exclude`).
pub fn resolve_opponents(
    participants: &[Participant],
    policy: RoleConflictPolicy,
) -> BTreeMap<ParticipantId, Option<ParticipantId>> {
    let mut roles: HashMap<TeamId, HashMap<Role, ParticipantId>> = HashMap::new();
    let mut conflicts: HashSet<(TeamId, Role)> = HashSet::new();

    for p in participants {
        let Some(role) = p.role else {
            continue;
        };

        let previous = roles.entry(p.team_id).or_default().insert(role, p.id);
        if let Some(previous) = previous {
            debug!(
                "team {} reports {} twice (participants {} and {})",
                p.team_id, role, previous, p.id
            );
            conflicts.insert((p.team_id, role));
        }
    }

    if policy == RoleConflictPolicy::Exclude {
        for (team_id, role) in &conflicts {
            if let Some(team_roles) = roles.get_mut(team_id) {
                team_roles.remove(role);
            }
        }
    }

    let team_ids: BTreeSet<TeamId> = participants.iter().map(|p| p.team_id).collect();

    participants
        .iter()
        .map(|p| {
            let opponent = p.role.and_then(|role| {
                if policy == RoleConflictPolicy::Exclude && conflicts.contains(&(p.team_id, role)) {
                    return None;
                }
                let enemy = enemy_team(&team_ids, p.team_id)?;
                roles.get(&enemy)?.get(&role).copied()
            });
            (p.id, opponent)
        })
        .collect()
}

fn enemy_team(team_ids: &BTreeSet<TeamId>, own: TeamId) -> Option<TeamId> {
    if team_ids.len() != 2 {
        return None;
    }
    team_ids.iter().copied().find(|id| *id != own)
}
