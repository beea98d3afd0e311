use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::clean_sheet::{self, FactorWeights};
use crate::config::{
    Aggressiveness, CleanSheetProfile, EngineConfig, MatchWeightProfile, WeightMethod,
    clean_sheet_profiles, match_weight_profiles,
};
use crate::match_weights;
use crate::ratings;
use crate::sectors::SectorCache;
use crate::standings::{self, StandingsEntry};
use crate::store::{self, ClubId, PlayedMatch, Role, RoundFixture, WeightTable};

/// Outcome of one computation cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    pub round: u32,
    pub fixtures: usize,
    pub match_weight_profiles_done: usize,
    pub clean_sheet_profiles_done: usize,
    pub failed_profiles: usize,
}

/// Shared per-cycle state: built once, read by every profile.
struct CycleContext {
    fixtures: Vec<RoundFixture>,
    results: Vec<PlayedMatch>,
    standings: HashMap<ClubId, StandingsEntry>,
    rating_history: HashMap<ClubId, f64>,
    club_names: HashMap<ClubId, String>,
}

/// Runs every configured profile for one round. A failing profile is logged
/// and skipped; it never aborts the rest of the cycle.
pub fn run_cycle(conn: &mut Connection, config: &EngineConfig, round: u32) -> Result<CycleReport> {
    let mut report = CycleReport {
        round,
        ..CycleReport::default()
    };

    let fixtures = store::round_fixtures(conn, round)?;
    if fixtures.is_empty() {
        warn!(round, "no fixtures scheduled, skipping cycle");
        return Ok(report);
    }
    report.fixtures = fixtures.len();
    info!(round, fixtures = fixtures.len(), "starting computation cycle");

    let mw_profiles = match_weight_profiles();
    let cs_profiles = clean_sheet_profiles();

    // Rating replay stops strictly before the target round; the
    // classification table also counts results already played in it.
    let results = store::season_results_through(conn, round.saturating_sub(1))?;
    let standings = if config.strength_adjusted {
        standings_for_round(conn, round)?
    } else {
        HashMap::new()
    };
    let rating_history = if mw_profiles.iter().any(|p| p.method == WeightMethod::Rating) {
        ratings::historical_ratings(&results)
    } else {
        HashMap::new()
    };
    let club_names = fixtures
        .iter()
        .flat_map(|f| {
            [
                (f.home_id, f.home_name.clone()),
                (f.away_id, f.away_name.clone()),
            ]
        })
        .collect();

    let ctx = CycleContext {
        fixtures,
        results,
        standings,
        rating_history,
        club_names,
    };
    let mut sector_cache = SectorCache::new();

    for profile in &mw_profiles {
        match run_match_weight_profile(conn, config, &ctx, &mut sector_cache, round, profile) {
            Ok(written) => {
                info!(profile = profile.id, rows = written, "match weights stored");
                report.match_weight_profiles_done += 1;
                log_ranking(conn, WeightTable::MatchWeights, profile.id, round, &ctx);
            }
            Err(err) => {
                error!(profile = profile.id, error = %err, "match weight profile failed");
                report.failed_profiles += 1;
            }
        }
    }

    for profile in &cs_profiles {
        match run_clean_sheet_profile(conn, config, &ctx, round, profile) {
            Ok(written) => {
                info!(profile = profile.id, rows = written, "clean sheet weights stored");
                report.clean_sheet_profiles_done += 1;
                log_ranking(conn, WeightTable::CleanSheetWeights, profile.id, round, &ctx);
            }
            Err(err) => {
                error!(profile = profile.id, error = %err, "clean sheet profile failed");
                report.failed_profiles += 1;
            }
        }
    }

    info!(
        round,
        match_weight_profiles = report.match_weight_profiles_done,
        clean_sheet_profiles = report.clean_sheet_profiles_done,
        failed = report.failed_profiles,
        "cycle finished"
    );
    Ok(report)
}

/// Classification table over every finished result up to and including the
/// round being scored.
fn standings_for_round(
    conn: &Connection,
    round: u32,
) -> Result<HashMap<ClubId, StandingsEntry>> {
    let results = store::season_results_through(conn, round)?;
    Ok(standings::build_standings(&results))
}

fn run_match_weight_profile(
    conn: &mut Connection,
    config: &EngineConfig,
    ctx: &CycleContext,
    sector_cache: &mut SectorCache,
    round: u32,
    profile: &MatchWeightProfile,
) -> Result<usize> {
    let mut rows: Vec<(ClubId, f64)> = Vec::with_capacity(ctx.fixtures.len() * 2);

    for fixture in &ctx.fixtures {
        let home_weight = match profile.method {
            WeightMethod::Rating => match_weights::rating_weight(
                conn,
                sector_cache,
                &ctx.rating_history,
                &ctx.results,
                fixture,
                profile.lookback,
                config.use_probable_lineups,
            )?,
            WeightMethod::Form if config.strength_adjusted => {
                match_weights::strength_adjusted_weight(
                    conn,
                    sector_cache,
                    &ctx.standings,
                    fixture,
                    profile.lookback,
                    profile.aggressiveness.exponent(),
                    config.use_probable_lineups,
                )?
            }
            WeightMethod::Form => match_weights::baseline_weight(
                conn,
                sector_cache,
                fixture,
                profile.lookback,
                profile.aggressiveness.exponent(),
                config.use_probable_lineups,
            )?,
        };
        rows.push((fixture.home_id, home_weight));
        rows.push((fixture.away_id, -home_weight));
    }

    store::replace_weights(
        conn,
        WeightTable::MatchWeights,
        profile.id,
        round,
        profile.lookback,
        &rows,
    )
}

fn run_clean_sheet_profile(
    conn: &mut Connection,
    config: &EngineConfig,
    ctx: &CycleContext,
    round: u32,
    profile: &CleanSheetProfile,
) -> Result<usize> {
    let weights = match profile.aggressiveness {
        Aggressiveness::Mild => FactorWeights::mild(),
        Aggressiveness::Aggressive => FactorWeights::aggressive(),
    };

    let mut rows: Vec<(ClubId, f64)> = Vec::with_capacity(ctx.fixtures.len() * 2);
    for fixture in &ctx.fixtures {
        for (club, role, opponent) in [
            (fixture.home_id, Role::Home, fixture.away_id),
            (fixture.away_id, Role::Away, fixture.home_id),
        ] {
            let raw = if config.strength_adjusted {
                clean_sheet::raw_score_adjusted(
                    conn,
                    &ctx.standings,
                    club,
                    role,
                    opponent,
                    round,
                    profile.lookback,
                    &weights,
                    config.use_probable_lineups,
                )?
            } else {
                clean_sheet::raw_score(
                    conn,
                    club,
                    role,
                    opponent,
                    round,
                    profile.lookback,
                    &weights,
                    config.use_probable_lineups,
                )?
            };
            rows.push((club, raw));
        }
    }

    clean_sheet::normalize(&mut rows);

    store::replace_weights(
        conn,
        WeightTable::CleanSheetWeights,
        profile.id,
        round,
        profile.lookback,
        &rows,
    )
}

/// Logs the stored ranking for one profile, heaviest club first.
fn log_ranking(
    conn: &Connection,
    table: WeightTable,
    profile_id: u32,
    round: u32,
    ctx: &CycleContext,
) {
    let rows = match store::stored_weights(conn, table, profile_id, round) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(profile = profile_id, error = %err, "could not read ranking");
            return;
        }
    };
    let opponents: HashMap<ClubId, ClubId> = ctx
        .fixtures
        .iter()
        .flat_map(|f| [(f.home_id, f.away_id), (f.away_id, f.home_id)])
        .collect();

    let name_of = |id: &ClubId| {
        ctx.club_names
            .get(id)
            .map(String::as_str)
            .unwrap_or("unknown")
    };
    for (position, (club_id, weight)) in rows.iter().enumerate() {
        let opponent = opponents.get(club_id).map(name_of).unwrap_or("unknown");
        info!(
            profile = profile_id,
            position = position + 1,
            club = name_of(club_id),
            opponent,
            weight = *weight,
            "ranking"
        );
    }
}
