use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::form;
use crate::standings::{StandingsEntry, club_strength};
use crate::store::{self, ClubId, RecentMatch, Role};

/// Positions feeding the probable-lineup factor.
const LINEUP_DEFENSE_POSITIONS: [i64; 3] = [1, 2, 3];
const LINEUP_ATTACK_POSITIONS: [i64; 2] = [4, 5];

/// Opponent-strength sensitivities for the adjusted variant.
const CONCEDED_STRENGTH_FACTOR: f64 = 0.3;
const SCORED_STRENGTH_FACTOR: f64 = 0.3;
const CLEAN_SHEET_STRENGTH_FACTOR: f64 = 0.4;
const RECENT_FORM_STRENGTH_FACTOR: f64 = 0.3;

const RECENT_FORM_WINDOW: u32 = 3;

/// Relative importance of the five raw factors.
#[derive(Debug, Clone, Copy)]
pub struct FactorWeights {
    pub clean_sheet_rate: f64,
    pub defense: f64,
    pub opponent_attack: f64,
    pub recent_form: f64,
    pub lineup: f64,
}

impl FactorWeights {
    /// Leans on clean sheets and defensive record.
    pub fn aggressive() -> Self {
        FactorWeights {
            clean_sheet_rate: 0.3,
            defense: 0.3,
            opponent_attack: 0.15,
            recent_form: 0.1,
            lineup: 0.15,
        }
    }

    /// Evenly spread, with the lineup factor carrying more.
    pub fn mild() -> Self {
        FactorWeights {
            clean_sheet_rate: 0.2,
            defense: 0.2,
            opponent_attack: 0.2,
            recent_form: 0.1,
            lineup: 0.3,
        }
    }

    fn combine(&self, f: &RawFactors) -> f64 {
        self.clean_sheet_rate * f.clean_sheet_rate
            + self.defense * f.defense
            + self.opponent_attack * f.opponent_attack
            + self.recent_form * f.recent_form
            + self.lineup * f.lineup
    }
}

#[derive(Debug, Clone, Copy)]
struct RawFactors {
    clean_sheet_rate: f64,
    defense: f64,
    opponent_attack: f64,
    recent_form: f64,
    lineup: f64,
}

fn defense_factor(avg_conceded: f64) -> f64 {
    (1.0 - avg_conceded / 3.0).max(0.0)
}

fn opponent_attack_factor(opponent_avg_scored: f64) -> f64 {
    (1.0 - opponent_avg_scored / 3.0).max(0.0)
}

fn recent_points_ratio(recent: &[RecentMatch]) -> f64 {
    if recent.is_empty() {
        return 0.0;
    }
    let points: f64 = recent
        .iter()
        .map(|m| form::Outcome::from_scores(m.goals_for, m.goals_against).base_points())
        .sum();
    points / (recent.len() as f64 * 3.0)
}

/// Probable-lineup factor: own defensive quality against the opponent's
/// attacking quality. Neutral 0.5 when either side lacks lineup data.
fn lineup_factor(conn: &Connection, club: ClubId, opponent: ClubId) -> Result<f64> {
    let defense = store::probable_average(conn, club, &LINEUP_DEFENSE_POSITIONS)?;
    let opponent_attack = store::probable_average(conn, opponent, &LINEUP_ATTACK_POSITIONS)?;
    Ok(match (defense, opponent_attack) {
        (Some(d), Some(a)) => (d / 10.0 - a / 10.0 + 0.5).clamp(0.1, 1.0),
        _ => 0.5,
    })
}

fn gather(
    conn: &Connection,
    club: ClubId,
    role: Role,
    opponent: ClubId,
    round: u32,
    lookback: u32,
) -> Result<(Vec<RecentMatch>, Vec<RecentMatch>, Vec<RecentMatch>)> {
    let last_round = round.saturating_sub(1);
    let own = store::recent_results(conn, club, role, last_round, lookback)?;
    let opponent_role = match role {
        Role::Home => Role::Away,
        Role::Away => Role::Home,
    };
    let opp = store::recent_results(conn, opponent, opponent_role, last_round, lookback)?;
    let recent3 = store::recent_results(conn, club, role, last_round, RECENT_FORM_WINDOW)?;
    Ok((own, opp, recent3))
}

/// Baseline raw score for one club in one fixture, before round normalization.
pub fn raw_score(
    conn: &Connection,
    club: ClubId,
    role: Role,
    opponent: ClubId,
    round: u32,
    lookback: u32,
    weights: &FactorWeights,
    use_lineups: bool,
) -> Result<f64> {
    let (own, opp, recent3) = gather(conn, club, role, opponent, round, lookback)?;

    let played = own.len() as f64;
    let avg_conceded = if own.is_empty() {
        0.0
    } else {
        own.iter().map(|m| m.goals_against as f64).sum::<f64>() / played
    };
    let clean_sheets = own.iter().filter(|m| m.goals_against == 0).count() as f64;
    let clean_sheet_rate = if own.is_empty() { 0.0 } else { clean_sheets / played };

    let opp_avg_scored = if opp.is_empty() {
        0.0
    } else {
        opp.iter().map(|m| m.goals_for as f64).sum::<f64>() / opp.len() as f64
    };

    let lineup = if use_lineups {
        lineup_factor(conn, club, opponent)?
    } else {
        0.5
    };

    let factors = RawFactors {
        clean_sheet_rate,
        defense: defense_factor(avg_conceded),
        opponent_attack: opponent_attack_factor(opp_avg_scored),
        recent_form: recent_points_ratio(&recent3),
        lineup,
    };
    Ok(weights.combine(&factors))
}

/// Strength-adjusted raw score: the same five factors, with each historical
/// match weighted by the strength of the opponent it was played against.
pub fn raw_score_adjusted(
    conn: &Connection,
    table: &HashMap<ClubId, StandingsEntry>,
    club: ClubId,
    role: Role,
    opponent: ClubId,
    round: u32,
    lookback: u32,
    weights: &FactorWeights,
    use_lineups: bool,
) -> Result<f64> {
    let (own, opp, recent3) = gather(conn, club, role, opponent, round, lookback)?;

    // Goals conceded against strong opposition count for less.
    let mut conceded_weighted = 0.0;
    let mut conceded_weight_sum = 0.0;
    let mut clean_sheet_weighted = 0.0;
    for m in &own {
        let s = club_strength(table, m.opponent_id);
        let w = 1.0 + (0.5 - s) * CONCEDED_STRENGTH_FACTOR;
        conceded_weighted += m.goals_against as f64 * w;
        conceded_weight_sum += w;
        if m.goals_against == 0 {
            // A shutout of a strong side is worth more.
            clean_sheet_weighted += 1.0 + (s - 0.5) * CLEAN_SHEET_STRENGTH_FACTOR;
        }
    }
    let avg_conceded = if conceded_weight_sum > 0.0 {
        conceded_weighted / conceded_weight_sum
    } else {
        0.0
    };
    let clean_sheet_rate = if conceded_weight_sum > 0.0 {
        clean_sheet_weighted / conceded_weight_sum
    } else {
        0.0
    };

    // Opponent goals scored against strong opposition count for more.
    let mut scored_weighted = 0.0;
    let mut scored_weight_sum = 0.0;
    for m in &opp {
        let s = club_strength(table, m.opponent_id);
        let w = 1.0 + (s - 0.5) * SCORED_STRENGTH_FACTOR;
        scored_weighted += m.goals_for as f64 * w;
        scored_weight_sum += w;
    }
    let opp_avg_scored = if scored_weight_sum > 0.0 {
        scored_weighted / scored_weight_sum
    } else {
        0.0
    };

    let mut points_weighted = 0.0;
    let mut points_possible = 0.0;
    for m in &recent3 {
        let s = club_strength(table, m.opponent_id);
        let w = 1.0 + (s - 0.5) * RECENT_FORM_STRENGTH_FACTOR;
        points_weighted +=
            form::Outcome::from_scores(m.goals_for, m.goals_against).base_points() * w;
        points_possible += 3.0 * w;
    }
    let recent_ratio = if points_possible > 0.0 {
        points_weighted / points_possible
    } else {
        0.0
    };
    let recent_form = form::adjust_efficiency(
        recent_ratio,
        form::average_opponent_strength(&recent3, table),
    );

    let lineup = if use_lineups {
        lineup_factor(conn, club, opponent)?
    } else {
        0.5
    };

    let factors = RawFactors {
        clean_sheet_rate,
        defense: defense_factor(avg_conceded),
        opponent_attack: opponent_attack_factor(opp_avg_scored),
        recent_form,
        lineup,
    };
    Ok(weights.combine(&factors))
}

/// Min-max normalizes one round's raw scores into [0.1, 1.0] in place.
/// A degenerate round where every club scored the same collapses to 0.5.
pub fn normalize(rows: &mut [(ClubId, f64)]) {
    if rows.is_empty() {
        return;
    }
    let min = rows.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max = rows.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);

    for (_, value) in rows.iter_mut() {
        *value = if max > min {
            0.1 + (*value - min) / (max - min) * 0.9
        } else {
            0.5
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standings::build_standings;
    use crate::store::open_in_memory;
    use crate::store::testutil::*;

    #[test]
    fn factor_weights_sum_to_one() {
        for w in [FactorWeights::aggressive(), FactorWeights::mild()] {
            let sum =
                w.clean_sheet_rate + w.defense + w.opponent_attack + w.recent_form + w.lineup;
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn defense_factors_floor_at_zero() {
        assert!((defense_factor(0.0) - 1.0).abs() < 1e-12);
        assert!((defense_factor(1.5) - 0.5).abs() < 1e-12);
        assert!(defense_factor(4.0).abs() < 1e-12);
        assert!(opponent_attack_factor(9.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_spreads_into_band() {
        let mut rows = vec![(1, 0.2), (2, 0.5), (3, 0.8)];
        normalize(&mut rows);
        assert!((rows[0].1 - 0.1).abs() < 1e-12);
        assert!((rows[1].1 - 0.55).abs() < 1e-12);
        assert!((rows[2].1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_collapses_equal_values() {
        let mut rows = vec![(1, 0.42), (2, 0.42)];
        normalize(&mut rows);
        assert!((rows[0].1 - 0.5).abs() < 1e-12);
        assert!((rows[1].1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn shutout_record_beats_leaky_record() {
        let conn = open_in_memory().unwrap();
        // Club 1 kept two home clean sheets; club 2 conceded twice at home.
        insert_result(&conn, 1, 1, 1, 9, 2, 0);
        insert_result(&conn, 2, 2, 1, 8, 1, 0);
        insert_result(&conn, 3, 1, 2, 9, 1, 2);
        insert_result(&conn, 4, 2, 2, 8, 0, 3);

        let w = FactorWeights::mild();
        let tight = raw_score(&conn, 1, Role::Home, 5, 3, 4, &w, false).unwrap();
        let leaky = raw_score(&conn, 2, Role::Home, 5, 3, 4, &w, false).unwrap();
        assert!(tight > leaky);
    }

    #[test]
    fn adjusted_matches_baseline_against_neutral_opposition() {
        let conn = open_in_memory().unwrap();
        insert_result(&conn, 1, 1, 1, 9, 2, 0);
        insert_result(&conn, 2, 2, 1, 8, 1, 1);

        let table = build_standings(&[]);
        let w = FactorWeights::aggressive();
        let base = raw_score(&conn, 1, Role::Home, 5, 3, 4, &w, false).unwrap();
        let adjusted =
            raw_score_adjusted(&conn, &table, 1, Role::Home, 5, 3, 4, &w, false).unwrap();
        assert!((base - adjusted).abs() < 1e-9);
    }

    #[test]
    fn lineup_factor_neutral_without_probable_data() {
        let conn = open_in_memory().unwrap();
        insert_player(&conn, 1, 1, 2, 6.0, 10);

        // No probable lineup rows at all: neutral on both sides.
        let f = lineup_factor(&conn, 1, 2).unwrap();
        assert!((f - 0.5).abs() < 1e-12);
    }

    #[test]
    fn lineup_factor_compares_defense_and_attack_averages() {
        let conn = open_in_memory().unwrap();
        insert_player(&conn, 1, 1, 2, 8.0, 10);
        insert_player(&conn, 2, 2, 5, 4.0, 10);
        for id in [1, 2] {
            conn.execute(
                "INSERT INTO probable_lineups (player_id, status) VALUES (?1, 'probable')",
                rusqlite::params![id],
            )
            .unwrap();
        }

        let f = lineup_factor(&conn, 1, 2).unwrap();
        assert!((f - 0.9).abs() < 1e-12);
    }
}
