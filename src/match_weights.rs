use std::collections::HashMap;

use anyhow::Result;
use rusqlite::Connection;

use crate::form::{self, SideForm};
use crate::ratings::{self, MAX_RATING_WEIGHT};
use crate::sectors::{ALL_SECTORS, SectorCache, cached_sector_score};
use crate::standings::StandingsEntry;
use crate::store::{self, ClubId, PlayedMatch, Role, RoundFixture};

/// Form index tuning shared by the baseline and strength-adjusted variants.
const FORM_BASE: f64 = 0.1;
const FORM_EFFICIENCY_SCALE: f64 = 2.5;
const FORM_GOAL_DIFF_SCALE: f64 = 0.10;
const ATTACK_GOAL_DIFF_SCALE: f64 = 0.12;

/// Sector fine-tuning share in the rating variant.
const RATING_SECTOR_FACTOR: f64 = 0.3;
const RATING_EXPONENT: f64 = 2.0 / 3.0;

/// Signed fractional power: preserves the sign of `value` while compressing
/// its magnitude.
pub fn signed_pow(value: f64, exponent: f64) -> f64 {
    if value >= 0.0 {
        value.powf(exponent)
    } else {
        -((-value).powf(exponent))
    }
}

/// Cube-rooted home/away sector strength ratios, in defense/midfield/attack
/// order. The away side uses the reciprocals.
fn sector_ratios(
    conn: &Connection,
    cache: &mut SectorCache,
    home: ClubId,
    away: ClubId,
    probable_only: bool,
) -> Result<[f64; 3]> {
    let mut ratios = [1.0; 3];
    for (slot, sector) in ALL_SECTORS.into_iter().enumerate() {
        let home_score = cached_sector_score(conn, cache, home, sector, probable_only)?;
        let away_score = cached_sector_score(conn, cache, away, sector, probable_only)?;
        ratios[slot] = (home_score / away_score).powf(1.0 / 3.0);
    }
    Ok(ratios)
}

/// Attack pressure factor: recent scoring output against how leaky the
/// opponent has been, capped to [0.1, 2.0] and scaled by goal differential.
fn side_attack_factor(form: &SideForm, opponent_avg_conceded: f64) -> f64 {
    let attack_index = form.avg_scored * (opponent_avg_conceded + 0.1);
    let base = (attack_index / 2.0).clamp(0.1, 2.0);
    base * (1.0 + form.goal_diff * ATTACK_GOAL_DIFF_SCALE)
}

fn form_shares(home_index: f64, away_index: f64) -> (f64, f64) {
    let sum = home_index + away_index;
    if sum > 0.0 {
        (home_index / sum, away_index / sum)
    } else {
        (0.5, 0.5)
    }
}

fn form_index(form: &SideForm) -> f64 {
    (FORM_BASE + form.efficiency * FORM_EFFICIENCY_SCALE)
        * (1.0 + form.goal_diff * FORM_GOAL_DIFF_SCALE)
}

/// Combines both sides' form, attack factors and sector ratios into the
/// signed home weight. The away weight is its negation.
fn compose(
    home_form: &SideForm,
    away_form: &SideForm,
    ratios: [f64; 3],
    exponent: f64,
) -> f64 {
    let home_index = form_index(home_form);
    let away_index = form_index(away_form);
    let (home_share, away_share) = form_shares(home_index, away_index);

    let home_attack = side_attack_factor(home_form, away_form.avg_conceded);
    let away_attack = side_attack_factor(away_form, home_form.avg_conceded);

    let home_ratio_sum: f64 = ratios.iter().sum();
    let away_ratio_sum: f64 = ratios.iter().map(|r| 1.0 / r).sum();

    let raw_home = home_ratio_sum * home_share * home_index * home_attack;
    let raw_away = away_ratio_sum * away_share * away_index * away_attack;

    signed_pow(raw_home - raw_away, exponent)
}

/// Baseline variant: form over each side's own recent role-restricted record,
/// sector ratios, and the profile's compression exponent.
pub fn baseline_weight(
    conn: &Connection,
    cache: &mut SectorCache,
    fixture: &RoundFixture,
    lookback: u32,
    exponent: f64,
    probable_only: bool,
) -> Result<f64> {
    let last_round = fixture.round.saturating_sub(1);
    let home_recent =
        store::recent_results(conn, fixture.home_id, Role::Home, last_round, lookback)?;
    let away_recent =
        store::recent_results(conn, fixture.away_id, Role::Away, last_round, lookback)?;

    let home_form = form::side_form(&home_recent);
    let away_form = form::side_form(&away_recent);
    let ratios = sector_ratios(
        conn,
        cache,
        fixture.home_id,
        fixture.away_id,
        probable_only,
    )?;

    Ok(compose(&home_form, &away_form, ratios, exponent))
}

/// Strength-adjusted variant: same shape as the baseline, but form inputs are
/// weighted and nudged by the strength of the opposition actually faced.
pub fn strength_adjusted_weight(
    conn: &Connection,
    cache: &mut SectorCache,
    table: &HashMap<ClubId, StandingsEntry>,
    fixture: &RoundFixture,
    lookback: u32,
    exponent: f64,
    probable_only: bool,
) -> Result<f64> {
    let last_round = fixture.round.saturating_sub(1);
    let home_recent =
        store::recent_results(conn, fixture.home_id, Role::Home, last_round, lookback)?;
    let away_recent =
        store::recent_results(conn, fixture.away_id, Role::Away, last_round, lookback)?;

    let home_form = form::side_form_adjusted(&home_recent, table);
    let away_form = form::side_form_adjusted(&away_recent, table);
    let ratios = sector_ratios(
        conn,
        cache,
        fixture.home_id,
        fixture.away_id,
        probable_only,
    )?;

    Ok(compose(&home_form, &away_form, ratios, exponent))
}

/// Rating variant: the tanh-bounded rating gap carries the weight, with the
/// averaged sector ratios as a centered fine adjustment, compressed by a
/// fixed 2/3 exponent.
pub fn rating_weight(
    conn: &Connection,
    cache: &mut SectorCache,
    history: &HashMap<ClubId, f64>,
    results: &[PlayedMatch],
    fixture: &RoundFixture,
    lookback: u32,
    probable_only: bool,
) -> Result<f64> {
    let last_round = fixture.round.saturating_sub(1);
    let home_recent =
        store::recent_results(conn, fixture.home_id, Role::Home, last_round, lookback)?;
    let away_recent =
        store::recent_results(conn, fixture.away_id, Role::Away, last_round, lookback)?;

    let home_rating = ratings::recent_rating(results, history, fixture.home_id, &home_recent);
    let away_rating = ratings::recent_rating(results, history, fixture.away_id, &away_recent);
    let base = ratings::rating_diff_weight(home_rating, away_rating, MAX_RATING_WEIGHT);

    let ratios = sector_ratios(
        conn,
        cache,
        fixture.home_id,
        fixture.away_id,
        probable_only,
    )?;
    let sector_factor = (ratios.iter().sum::<f64>() / 3.0 - 1.0) * RATING_SECTOR_FACTOR;

    Ok(signed_pow(base + sector_factor, RATING_EXPONENT))
}
