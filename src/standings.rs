use std::collections::HashMap;

use crate::store::{ClubId, PlayedMatch};

/// One classification-table row. Rebuilt from scratch every cycle, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandingsEntry {
    pub club_id: ClubId,
    pub points: i64,
    pub wins: i64,
    pub draws: i64,
    pub losses: i64,
    pub goals_for: i64,
    pub goals_against: i64,
    pub goal_diff: i64,
    pub played: i64,
    pub points_ratio: f64,
    pub position: usize,
    /// 1.0 for the leader, 0.0 for the last-placed club.
    pub strength: f64,
}

impl StandingsEntry {
    fn new(club_id: ClubId) -> Self {
        StandingsEntry {
            club_id,
            points: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_for: 0,
            goals_against: 0,
            goal_diff: 0,
            played: 0,
            points_ratio: 0.0,
            position: 0,
            strength: 0.5,
        }
    }
}

/// Builds the classification table from results already in replay order.
/// Only clubs that actually played appear.
pub fn build_standings(results: &[PlayedMatch]) -> HashMap<ClubId, StandingsEntry> {
    let mut table: HashMap<ClubId, StandingsEntry> = HashMap::new();

    for m in results {
        // (points, wins, draws, losses) per side.
        let (home_line, away_line) = if m.home_goals > m.away_goals {
            ((3, 1, 0, 0), (0, 0, 0, 1))
        } else if m.home_goals < m.away_goals {
            ((0, 0, 0, 1), (3, 1, 0, 0))
        } else {
            ((1, 0, 1, 0), (1, 0, 1, 0))
        };

        let home = table
            .entry(m.home_id)
            .or_insert_with(|| StandingsEntry::new(m.home_id));
        home.played += 1;
        home.goals_for += m.home_goals;
        home.goals_against += m.away_goals;
        home.points += home_line.0;
        home.wins += home_line.1;
        home.draws += home_line.2;
        home.losses += home_line.3;

        let away = table
            .entry(m.away_id)
            .or_insert_with(|| StandingsEntry::new(m.away_id));
        away.played += 1;
        away.goals_for += m.away_goals;
        away.goals_against += m.home_goals;
        away.points += away_line.0;
        away.wins += away_line.1;
        away.draws += away_line.2;
        away.losses += away_line.3;
    }

    for entry in table.values_mut() {
        entry.goal_diff = entry.goals_for - entry.goals_against;
        let possible = entry.played * 3;
        entry.points_ratio = if possible > 0 {
            entry.points as f64 / possible as f64
        } else {
            0.0
        };
    }

    let mut ordered: Vec<ClubId> = table.keys().copied().collect();
    ordered.sort_by(|a, b| {
        let ea = &table[a];
        let eb = &table[b];
        eb.points
            .cmp(&ea.points)
            .then(eb.wins.cmp(&ea.wins))
            .then(eb.goal_diff.cmp(&ea.goal_diff))
            .then(eb.goals_for.cmp(&ea.goals_for))
            .then(a.cmp(b))
    });

    let total = ordered.len();
    for (idx, club_id) in ordered.iter().enumerate() {
        let position = idx + 1;
        if let Some(entry) = table.get_mut(club_id) {
            entry.position = position;
            entry.strength = if total > 1 {
                let position_score = 1.0 - ((position - 1) as f64 / (total - 1) as f64);
                0.7 * position_score + 0.3 * entry.points_ratio
            } else {
                0.5
            };
        }
    }

    table
}

/// Normalized strength of one club; unknown clubs count as neutral.
pub fn club_strength(table: &HashMap<ClubId, StandingsEntry>, club: ClubId) -> f64 {
    table.get(&club).map(|e| e.strength).unwrap_or(0.5)
}
