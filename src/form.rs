use std::collections::HashMap;

use crate::standings::{StandingsEntry, club_strength};
use crate::store::{ClubId, RecentMatch};

/// Strength-of-schedule tuning. Wins over strong opponents count more, losses
/// to strong opponents count less.
const RESULT_WEIGHT_FACTOR: f64 = 0.4;
const EFFICIENCY_ADJUST_FACTOR: f64 = 0.3;
const GOAL_DIFF_ADJUST_FACTOR: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    pub fn from_scores(goals_for: i64, goals_against: i64) -> Self {
        if goals_for > goals_against {
            Outcome::Win
        } else if goals_for < goals_against {
            Outcome::Loss
        } else {
            Outcome::Draw
        }
    }

    pub fn base_points(self) -> f64 {
        match self {
            Outcome::Win => 3.0,
            Outcome::Draw => 1.0,
            Outcome::Loss => 0.0,
        }
    }
}

/// Aggregated recent form for one club in one role.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideForm {
    pub played: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals_for: i64,
    pub goals_against: i64,
    /// Points share over the window, already SoS-adjusted for the adjusted
    /// variant. Zero when no matches qualify.
    pub efficiency: f64,
    /// Raw or SoS-scaled goal differential over the window.
    pub goal_diff: f64,
    pub avg_scored: f64,
    pub avg_conceded: f64,
}

/// Plain form over the window: 3/1/0 points, raw goal counts.
pub fn side_form(recent: &[RecentMatch]) -> SideForm {
    let mut form = SideForm::default();
    for m in recent {
        match Outcome::from_scores(m.goals_for, m.goals_against) {
            Outcome::Win => form.wins += 1,
            Outcome::Draw => form.draws += 1,
            Outcome::Loss => form.losses += 1,
        }
        form.goals_for += m.goals_for;
        form.goals_against += m.goals_against;
    }
    form.played = recent.len();

    let points = (form.wins * 3 + form.draws) as f64;
    let possible = (form.played * 3) as f64;
    form.efficiency = if possible > 0.0 { points / possible } else { 0.0 };
    form.goal_diff = (form.goals_for - form.goals_against) as f64;
    if form.played > 0 {
        form.avg_scored = form.goals_for as f64 / form.played as f64;
        form.avg_conceded = form.goals_against as f64 / form.played as f64;
    }
    form
}

/// Form over the window with every result weighted by the opponent's
/// normalized strength, then nudged by the average opponent strength.
pub fn side_form_adjusted(
    recent: &[RecentMatch],
    table: &HashMap<ClubId, StandingsEntry>,
) -> SideForm {
    let mut form = SideForm::default();
    let mut weighted_points = 0.0;
    let mut weighted_possible = 0.0;

    for m in recent {
        let outcome = Outcome::from_scores(m.goals_for, m.goals_against);
        match outcome {
            Outcome::Win => form.wins += 1,
            Outcome::Draw => form.draws += 1,
            Outcome::Loss => form.losses += 1,
        }
        form.goals_for += m.goals_for;
        form.goals_against += m.goals_against;

        let strength = club_strength(table, m.opponent_id);
        let weight = result_weight(outcome, strength);
        weighted_points += outcome.base_points() * weight;
        weighted_possible += 3.0 * weight;
    }
    form.played = recent.len();

    let efficiency = if weighted_possible > 0.0 {
        weighted_points / weighted_possible
    } else {
        0.0
    };

    let avg_strength = average_opponent_strength(recent, table);
    form.efficiency = adjust_efficiency(efficiency, avg_strength);
    form.goal_diff =
        adjust_goal_diff((form.goals_for - form.goals_against) as f64, avg_strength);
    if form.played > 0 {
        form.avg_scored = form.goals_for as f64 / form.played as f64;
        form.avg_conceded = form.goals_against as f64 / form.played as f64;
    }
    form
}

/// Weight of one result given the opponent's strength. A win over the leader
/// is worth more than a win over the last-placed club; a loss to the leader
/// is penalized less.
pub fn result_weight(outcome: Outcome, opponent_strength: f64) -> f64 {
    match outcome {
        Outcome::Win => 1.0 + (opponent_strength - 0.5) * RESULT_WEIGHT_FACTOR,
        Outcome::Draw => 1.0 + (opponent_strength - 0.5) * RESULT_WEIGHT_FACTOR * 0.5,
        Outcome::Loss => 1.0 + (0.5 - opponent_strength) * RESULT_WEIGHT_FACTOR,
    }
}

/// Mean opponent strength over the window; neutral 0.5 when empty.
pub fn average_opponent_strength(
    recent: &[RecentMatch],
    table: &HashMap<ClubId, StandingsEntry>,
) -> f64 {
    if recent.is_empty() {
        return 0.5;
    }
    let sum: f64 = recent
        .iter()
        .map(|m| club_strength(table, m.opponent_id))
        .sum();
    sum / recent.len() as f64
}

pub fn adjust_efficiency(efficiency: f64, avg_opponent_strength: f64) -> f64 {
    let adjusted = efficiency + (avg_opponent_strength - 0.5) * EFFICIENCY_ADJUST_FACTOR;
    adjusted.clamp(0.0, 1.0)
}

pub fn adjust_goal_diff(goal_diff: f64, avg_opponent_strength: f64) -> f64 {
    goal_diff * (1.0 + (avg_opponent_strength - 0.5) * GOAL_DIFF_ADJUST_FACTOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standings::build_standings;
    use crate::store::PlayedMatch;

    fn recent(gf: i64, ga: i64, opponent: ClubId) -> RecentMatch {
        RecentMatch {
            round: 1,
            match_id: 1,
            goals_for: gf,
            goals_against: ga,
            opponent_id: opponent,
        }
    }

    #[test]
    fn plain_form_counts_points_and_goals() {
        let form = side_form(&[recent(2, 0, 9), recent(1, 1, 9), recent(0, 3, 9)]);
        assert_eq!((form.wins, form.draws, form.losses), (1, 1, 1));
        assert!((form.efficiency - 4.0 / 9.0).abs() < 1e-12);
        assert!((form.goal_diff - -1.0).abs() < 1e-12);
        assert!((form.avg_scored - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_window_is_all_zero() {
        let form = side_form(&[]);
        assert_eq!(form.played, 0);
        assert!((form.efficiency).abs() < 1e-12);
        assert!((form.avg_scored).abs() < 1e-12);
    }

    #[test]
    fn result_weight_rewards_strong_opposition() {
        assert!((result_weight(Outcome::Win, 1.0) - 1.2).abs() < 1e-12);
        assert!((result_weight(Outcome::Win, 0.0) - 0.8).abs() < 1e-12);
        assert!((result_weight(Outcome::Draw, 1.0) - 1.1).abs() < 1e-12);
        // Losing to the leader hurts less than losing to the last-placed club.
        assert!(result_weight(Outcome::Loss, 1.0) < result_weight(Outcome::Loss, 0.0));
        // Neutral opposition leaves every outcome unweighted.
        for outcome in [Outcome::Win, Outcome::Draw, Outcome::Loss] {
            assert!((result_weight(outcome, 0.5) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn efficiency_adjustment_clamps() {
        assert!((adjust_efficiency(0.95, 1.0) - 1.0).abs() < 1e-12);
        assert!((adjust_efficiency(0.05, 0.0) - 0.0).abs() < 1e-12);
        assert!((adjust_efficiency(0.5, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn goal_diff_adjustment_scales_with_strength() {
        assert!((adjust_goal_diff(5.0, 1.0) - 5.5).abs() < 1e-12);
        assert!((adjust_goal_diff(5.0, 0.0) - 4.5).abs() < 1e-12);
        assert!((adjust_goal_diff(-5.0, 1.0) - -5.5).abs() < 1e-12);
    }

    #[test]
    fn adjusted_form_against_neutral_table_matches_plain() {
        // No standings data: every opponent is neutral, so the adjusted form
        // must collapse to the plain one.
        let table = build_standings(&[]);
        let window = [recent(2, 1, 7), recent(0, 0, 8)];
        let plain = side_form(&window);
        let adjusted = side_form_adjusted(&window, &table);
        assert!((plain.efficiency - adjusted.efficiency).abs() < 1e-12);
        assert!((plain.goal_diff - adjusted.goal_diff).abs() < 1e-12);
    }

    #[test]
    fn adjusted_form_shifts_with_real_table() {
        // Club 1 dominates, so it tops the table and carries high strength.
        let table = build_standings(&[
            PlayedMatch {
                match_id: 1,
                round: 1,
                home_id: 1,
                away_id: 2,
                home_goals: 3,
                away_goals: 0,
            },
            PlayedMatch {
                match_id: 2,
                round: 2,
                home_id: 2,
                away_id: 1,
                home_goals: 0,
                away_goals: 1,
            },
        ]);

        // A win over the leader must read better than the same win over the
        // bottom club.
        let vs_leader = side_form_adjusted(&[recent(1, 0, 1)], &table);
        let vs_bottom = side_form_adjusted(&[recent(1, 0, 2)], &table);
        assert!(vs_leader.efficiency > vs_bottom.efficiency);
    }
}
