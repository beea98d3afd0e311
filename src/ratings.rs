use std::collections::HashMap;

use crate::store::{ClubId, PlayedMatch, RecentMatch};

pub const INITIAL_RATING: f64 = 1000.0;
pub const K_FACTOR: f64 = 20.0;
const ELO_DIVISOR: f64 = 400.0;

/// tanh scale: a ~120-point rating gap saturates the weight near the cap.
const DIFF_SCALE: f64 = 60.0;
pub const MAX_RATING_WEIGHT: f64 = 5.0;

/// Expected score for a club against an opponent, in [0, 1].
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((opponent - rating) / ELO_DIVISOR))
}

/// Post-match rating; `outcome` is 1.0 win, 0.5 draw, 0.0 loss.
pub fn update_rating(rating: f64, opponent: f64, outcome: f64) -> f64 {
    rating + K_FACTOR * (outcome - expected_score(rating, opponent))
}

fn home_outcome(m: &PlayedMatch) -> f64 {
    if m.home_goals > m.away_goals {
        1.0
    } else if m.home_goals < m.away_goals {
        0.0
    } else {
        0.5
    }
}

/// Replays every result in order, all clubs starting at 1000. The caller is
/// responsible for passing results restricted to rounds before the target
/// round and already sorted in replay order.
pub fn historical_ratings(results: &[PlayedMatch]) -> HashMap<ClubId, f64> {
    ratings_as_of(results, u32::MAX)
}

/// Snapshot of ratings considering only rounds strictly before `cutoff_round`.
pub fn ratings_as_of(results: &[PlayedMatch], cutoff_round: u32) -> HashMap<ClubId, f64> {
    let mut ratings: HashMap<ClubId, f64> = HashMap::new();

    for m in results {
        if m.round >= cutoff_round {
            break;
        }
        let home = *ratings.entry(m.home_id).or_insert(INITIAL_RATING);
        let away = *ratings.entry(m.away_id).or_insert(INITIAL_RATING);

        let outcome = home_outcome(m);
        ratings.insert(m.home_id, update_rating(home, away, outcome));
        ratings.insert(m.away_id, update_rating(away, home, 1.0 - outcome));
    }

    ratings
}

/// Rating restricted to the club's last N matches in one role.
///
/// The base rating is the historical snapshot as of the round preceding the
/// earliest of those matches; each update then uses the opponent's
/// full-history rating as a static reference. That is deliberately an
/// approximation, not a time-consistent two-sided simulation.
pub fn recent_rating(
    results: &[PlayedMatch],
    history: &HashMap<ClubId, f64>,
    club: ClubId,
    recent: &[RecentMatch],
) -> f64 {
    if recent.is_empty() {
        return history.get(&club).copied().unwrap_or(INITIAL_RATING);
    }

    let mut window: Vec<RecentMatch> = recent.to_vec();
    window.sort_by(|a, b| a.round.cmp(&b.round).then(a.match_id.cmp(&b.match_id)));

    let first_round = window[0].round;
    let base = ratings_as_of(results, first_round);
    let mut rating = base.get(&club).copied().unwrap_or(INITIAL_RATING);

    for m in &window {
        let opponent = history
            .get(&m.opponent_id)
            .copied()
            .unwrap_or(INITIAL_RATING);
        let outcome = if m.goals_for > m.goals_against {
            1.0
        } else if m.goals_for < m.goals_against {
            0.0
        } else {
            0.5
        };
        rating = update_rating(rating, opponent, outcome);
    }

    rating
}

/// Maps a rating gap onto a smooth, odd, bounded weight in
/// (-max_weight, max_weight).
pub fn rating_diff_weight(home: f64, away: f64, max_weight: f64) -> f64 {
    ((home - away) / DIFF_SCALE).tanh() * max_weight
}
