use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::store::{self, ClubId, SectorPlayer};

/// Tactical sector, mapping onto the player position codes in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sector {
    Defense,
    Midfield,
    Attack,
}

pub const ALL_SECTORS: [Sector; 3] = [Sector::Defense, Sector::Midfield, Sector::Attack];

impl Sector {
    pub fn positions(self) -> &'static [i64] {
        match self {
            Sector::Defense => &[1, 2, 3],
            Sector::Midfield => &[4],
            Sector::Attack => &[5],
        }
    }

    /// How many players count as the starting core of the sector.
    fn starter_slots(self) -> usize {
        match self {
            Sector::Defense => 3,
            Sector::Midfield | Sector::Attack => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorScore {
    pub score: f64,
    pub players: usize,
}

/// Sector scores computed once per cycle, shared across profiles, matches and
/// home/away roles. Owned by the cycle runner, never global.
pub type SectorCache = HashMap<(ClubId, Sector), f64>;

/// Composite score for a single player: capped average performance plus a
/// capped appearance-count factor.
pub fn player_score(p: &SectorPlayer) -> f64 {
    let average = p.average.max(1.0);
    let games = p.games.max(0) as f64;

    let average_score = (average / 10.0).min(1.0);
    let consistency_score = (games / 20.0).min(1.0);

    0.7 * average_score + 0.3 * consistency_score
}

/// Aggregates individual player scores into a sector score.
///
/// Starters are the top-K by average; depth is the remainder (or 80% of the
/// starters score when the squad is thin); consistency penalizes spread.
/// An empty sector is neutral: score 1.0 with zero players.
pub fn sector_score(players: &[SectorPlayer], sector: Sector) -> SectorScore {
    if players.is_empty() {
        return SectorScore {
            score: 1.0,
            players: 0,
        };
    }

    let scores: Vec<f64> = players.iter().map(player_score).collect();

    let starters = scores.len().min(sector.starter_slots());
    let starters_score = scores[..starters].iter().sum::<f64>() / starters as f64;

    let depth_score = if scores.len() > starters {
        let rest = &scores[starters..];
        rest.iter().sum::<f64>() / rest.len() as f64
    } else {
        starters_score * 0.8
    };

    let consistency_score = if scores.len() > 1 {
        let deviation = sample_stdev(&scores);
        (1.0 - deviation / 2.0).max(0.1)
    } else {
        1.0
    };

    let score = (0.6 * starters_score + 0.25 * depth_score + 0.15 * consistency_score).max(0.1);

    SectorScore {
        score,
        players: players.len(),
    }
}

fn sample_stdev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

/// Cached sector score lookup; computes and stores on first access.
pub fn cached_sector_score(
    conn: &Connection,
    cache: &mut SectorCache,
    club: ClubId,
    sector: Sector,
    probable_only: bool,
) -> Result<f64> {
    if let Some(score) = cache.get(&(club, sector)) {
        return Ok(*score);
    }
    let players = store::sector_players(conn, club, sector.positions(), probable_only)?;
    let score = sector_score(&players, sector).score;
    cache.insert((club, sector), score);
    Ok(score)
}
