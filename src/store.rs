use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

pub type ClubId = i64;

/// One fixture of the target round, with display names for logging.
#[derive(Debug, Clone)]
pub struct RoundFixture {
    pub match_id: i64,
    pub round: u32,
    pub home_id: ClubId,
    pub home_name: String,
    pub away_id: ClubId,
    pub away_name: String,
}

/// A finished, valid match with both scores known.
#[derive(Debug, Clone, Copy)]
pub struct PlayedMatch {
    pub match_id: i64,
    pub round: u32,
    pub home_id: ClubId,
    pub away_id: ClubId,
    pub home_goals: i64,
    pub away_goals: i64,
}

/// Which side of the pitch a club's history is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Home,
    Away,
}

/// One historical result seen from a single club's perspective.
#[derive(Debug, Clone, Copy)]
pub struct RecentMatch {
    pub round: u32,
    pub match_id: i64,
    pub goals_for: i64,
    pub goals_against: i64,
    pub opponent_id: ClubId,
}

#[derive(Debug, Clone, Copy)]
pub struct SectorPlayer {
    pub average: f64,
    pub games: i64,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS clubs (
            club_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            round INTEGER NOT NULL,
            home_club_id INTEGER NOT NULL,
            away_club_id INTEGER NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            valid INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_round ON matches(round);
        CREATE INDEX IF NOT EXISTS idx_matches_home ON matches(home_club_id);
        CREATE INDEX IF NOT EXISTS idx_matches_away ON matches(away_club_id);

        CREATE TABLE IF NOT EXISTS players (
            player_id INTEGER PRIMARY KEY,
            club_id INTEGER NOT NULL,
            position_id INTEGER NOT NULL,
            average REAL NOT NULL,
            games INTEGER NOT NULL,
            price REAL NOT NULL,
            fit INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_players_club ON players(club_id);

        CREATE TABLE IF NOT EXISTS probable_lineups (
            player_id INTEGER PRIMARY KEY,
            status TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS match_weights (
            id INTEGER PRIMARY KEY,
            profile_id INTEGER NOT NULL,
            round INTEGER NOT NULL,
            club_id INTEGER NOT NULL,
            weight REAL NOT NULL,
            lookback INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(profile_id, round, club_id)
        );
        CREATE INDEX IF NOT EXISTS idx_match_weights
            ON match_weights(profile_id, round, club_id);

        CREATE TABLE IF NOT EXISTS clean_sheet_weights (
            id INTEGER PRIMARY KEY,
            profile_id INTEGER NOT NULL,
            round INTEGER NOT NULL,
            club_id INTEGER NOT NULL,
            weight REAL NOT NULL,
            lookback INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(profile_id, round, club_id)
        );
        CREATE INDEX IF NOT EXISTS idx_clean_sheet_weights
            ON clean_sheet_weights(profile_id, round, club_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Valid fixtures scheduled for one round, whether or not they have scores yet.
pub fn round_fixtures(conn: &Connection, round: u32) -> Result<Vec<RoundFixture>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT m.match_id, m.round, m.home_club_id, c1.name, m.away_club_id, c2.name
            FROM matches m
            JOIN clubs c1 ON m.home_club_id = c1.club_id
            JOIN clubs c2 ON m.away_club_id = c2.club_id
            WHERE m.round = ?1 AND m.valid = 1
            ORDER BY m.match_id ASC
            "#,
        )
        .context("prepare round fixtures query")?;

    let rows = stmt
        .query_map(params![round as i64], |row| {
            Ok(RoundFixture {
                match_id: row.get(0)?,
                round: row.get::<_, i64>(1)? as u32,
                home_id: row.get(2)?,
                home_name: row.get(3)?,
                away_id: row.get(4)?,
                away_name: row.get(5)?,
            })
        })
        .context("query round fixtures")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode fixture row")?);
    }
    Ok(out)
}

/// All valid finished results up to and including `round`, in replay order.
pub fn season_results_through(conn: &Connection, round: u32) -> Result<Vec<PlayedMatch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT match_id, round, home_club_id, away_club_id, home_goals, away_goals
            FROM matches
            WHERE valid = 1
              AND round <= ?1
              AND home_goals IS NOT NULL
              AND away_goals IS NOT NULL
            ORDER BY round ASC, match_id ASC
            "#,
        )
        .context("prepare season results query")?;

    let rows = stmt
        .query_map(params![round as i64], |row| {
            Ok(PlayedMatch {
                match_id: row.get(0)?,
                round: row.get::<_, i64>(1)? as u32,
                home_id: row.get(2)?,
                away_id: row.get(3)?,
                home_goals: row.get(4)?,
                away_goals: row.get(5)?,
            })
        })
        .context("query season results")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode result row")?);
    }
    Ok(out)
}

/// The club's last `limit` results in the given role, most recent first,
/// restricted to rounds up to and including `last_round`.
pub fn recent_results(
    conn: &Connection,
    club: ClubId,
    role: Role,
    last_round: u32,
    limit: u32,
) -> Result<Vec<RecentMatch>> {
    let sql = match role {
        Role::Home => {
            r#"
            SELECT round, match_id, home_goals, away_goals, away_club_id
            FROM matches
            WHERE home_club_id = ?1 AND valid = 1 AND round <= ?2
              AND home_goals IS NOT NULL AND away_goals IS NOT NULL
            ORDER BY round DESC, match_id DESC
            LIMIT ?3
            "#
        }
        Role::Away => {
            r#"
            SELECT round, match_id, away_goals, home_goals, home_club_id
            FROM matches
            WHERE away_club_id = ?1 AND valid = 1 AND round <= ?2
              AND home_goals IS NOT NULL AND away_goals IS NOT NULL
            ORDER BY round DESC, match_id DESC
            LIMIT ?3
            "#
        }
    };

    let mut stmt = conn.prepare(sql).context("prepare recent results query")?;
    let rows = stmt
        .query_map(params![club, last_round as i64, limit as i64], |row| {
            Ok(RecentMatch {
                round: row.get::<_, i64>(0)? as u32,
                match_id: row.get(1)?,
                goals_for: row.get(2)?,
                goals_against: row.get(3)?,
                opponent_id: row.get(4)?,
            })
        })
        .context("query recent results")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode recent result row")?);
    }
    Ok(out)
}

/// Eligible players for one club and position set, best average first.
/// With `probable_only`, restricts to the externally flagged probable lineup;
/// otherwise to fit players.
pub fn sector_players(
    conn: &Connection,
    club: ClubId,
    positions: &[i64],
    probable_only: bool,
) -> Result<Vec<SectorPlayer>> {
    let placeholders = vec!["?"; positions.len()].join(", ");
    let sql = if probable_only {
        format!(
            r#"
            SELECT p.average, p.games
            FROM players p
            JOIN probable_lineups l ON p.player_id = l.player_id
            WHERE p.club_id = ?1 AND l.status = 'probable'
              AND p.position_id IN ({placeholders})
            ORDER BY p.average DESC, p.player_id ASC
            "#
        )
    } else {
        format!(
            r#"
            SELECT p.average, p.games
            FROM players p
            WHERE p.club_id = ?1 AND p.fit = 1
              AND p.position_id IN ({placeholders})
            ORDER BY p.average DESC, p.player_id ASC
            "#
        )
    };

    let mut stmt = conn.prepare(&sql).context("prepare sector players query")?;
    let mut values: Vec<&dyn rusqlite::ToSql> = vec![&club];
    for p in positions {
        values.push(p);
    }
    let rows = stmt
        .query_map(values.as_slice(), |row| {
            Ok(SectorPlayer {
                average: row.get(0)?,
                games: row.get(1)?,
            })
        })
        .context("query sector players")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player row")?);
    }
    Ok(out)
}

/// Mean player average over the probable lineup for one position set.
/// `None` when no probable player matches.
pub fn probable_average(
    conn: &Connection,
    club: ClubId,
    positions: &[i64],
) -> Result<Option<f64>> {
    let placeholders = vec!["?"; positions.len()].join(", ");
    let sql = format!(
        r#"
        SELECT AVG(p.average)
        FROM players p
        JOIN probable_lineups l ON p.player_id = l.player_id
        WHERE p.club_id = ?1 AND l.status = 'probable'
          AND p.position_id IN ({placeholders})
        "#
    );
    let mut stmt = conn.prepare(&sql).context("prepare probable average query")?;
    let mut values: Vec<&dyn rusqlite::ToSql> = vec![&club];
    for p in positions {
        values.push(p);
    }
    let avg: Option<f64> = stmt
        .query_row(values.as_slice(), |row| row.get(0))
        .context("query probable average")?;
    Ok(avg)
}

/// Replaces one profile's rows for the round inside a single transaction.
/// Returns the number of rows written.
pub fn replace_weights(
    conn: &mut Connection,
    table: WeightTable,
    profile_id: u32,
    round: u32,
    lookback: u32,
    rows: &[(ClubId, f64)],
) -> Result<usize> {
    let table_name = table.name();
    let tx = conn.transaction().context("begin weights transaction")?;

    tx.execute(
        &format!("DELETE FROM {table_name} WHERE profile_id = ?1 AND round = ?2"),
        params![profile_id as i64, round as i64],
    )
    .with_context(|| format!("delete stale rows from {table_name}"))?;

    let now = Utc::now().to_rfc3339();
    {
        let mut stmt = tx
            .prepare(&format!(
                r#"
                INSERT INTO {table_name} (profile_id, round, club_id, weight, lookback, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(profile_id, round, club_id) DO UPDATE SET
                    weight = excluded.weight,
                    lookback = excluded.lookback,
                    updated_at = excluded.updated_at
                "#
            ))
            .with_context(|| format!("prepare insert into {table_name}"))?;
        for (club_id, weight) in rows {
            stmt.execute(params![
                profile_id as i64,
                round as i64,
                club_id,
                weight,
                lookback as i64,
                now,
            ])
            .with_context(|| format!("insert weight row into {table_name}"))?;
        }
    }

    tx.commit().context("commit weights transaction")?;
    Ok(rows.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightTable {
    MatchWeights,
    CleanSheetWeights,
}

impl WeightTable {
    fn name(self) -> &'static str {
        match self {
            WeightTable::MatchWeights => "match_weights",
            WeightTable::CleanSheetWeights => "clean_sheet_weights",
        }
    }
}

/// Stored weights for one (profile, round), heaviest first. Used by the
/// post-profile ranking report and by tests.
pub fn stored_weights(
    conn: &Connection,
    table: WeightTable,
    profile_id: u32,
    round: u32,
) -> Result<Vec<(ClubId, f64)>> {
    let mut stmt = conn
        .prepare(&format!(
            r#"
            SELECT club_id, weight FROM {}
            WHERE profile_id = ?1 AND round = ?2
            ORDER BY weight DESC, club_id ASC
            "#,
            table.name()
        ))
        .context("prepare stored weights query")?;
    let rows = stmt
        .query_map(params![profile_id as i64, round as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })
        .context("query stored weights")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode stored weight row")?);
    }
    Ok(out)
}

#[cfg(test)]
pub mod testutil {
    use super::*;

    pub fn insert_club(conn: &Connection, id: ClubId, name: &str) {
        conn.execute(
            "INSERT INTO clubs (club_id, name) VALUES (?1, ?2)",
            params![id, name],
        )
        .unwrap();
    }

    pub fn insert_result(
        conn: &Connection,
        match_id: i64,
        round: u32,
        home: ClubId,
        away: ClubId,
        home_goals: i64,
        away_goals: i64,
    ) {
        conn.execute(
            "INSERT INTO matches (match_id, round, home_club_id, away_club_id, home_goals, away_goals, valid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            params![match_id, round as i64, home, away, home_goals, away_goals],
        )
        .unwrap();
    }

    pub fn insert_fixture(
        conn: &Connection,
        match_id: i64,
        round: u32,
        home: ClubId,
        away: ClubId,
    ) {
        conn.execute(
            "INSERT INTO matches (match_id, round, home_club_id, away_club_id, home_goals, away_goals, valid)
             VALUES (?1, ?2, ?3, ?4, NULL, NULL, 1)",
            params![match_id, round as i64, home, away],
        )
        .unwrap();
    }

    pub fn insert_player(
        conn: &Connection,
        player_id: i64,
        club: ClubId,
        position: i64,
        average: f64,
        games: i64,
    ) {
        conn.execute(
            "INSERT INTO players (player_id, club_id, position_id, average, games, price, fit)
             VALUES (?1, ?2, ?3, ?4, ?5, 5.0, 1)",
            params![player_id, club, position, average, games],
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn recent_results_are_role_restricted_and_capped() {
        let conn = open_in_memory().unwrap();
        insert_result(&conn, 1, 1, 10, 20, 2, 0);
        insert_result(&conn, 2, 2, 20, 10, 1, 1);
        insert_result(&conn, 3, 3, 10, 30, 0, 3);
        insert_result(&conn, 4, 4, 10, 20, 1, 0);

        let home = recent_results(&conn, 10, Role::Home, 4, 2).unwrap();
        assert_eq!(home.len(), 2);
        // Most recent first.
        assert_eq!(home[0].round, 4);
        assert_eq!(home[0].goals_for, 1);
        assert_eq!(home[1].round, 3);
        assert_eq!(home[1].goals_against, 3);

        let away = recent_results(&conn, 10, Role::Away, 4, 5).unwrap();
        assert_eq!(away.len(), 1);
        assert_eq!(away[0].goals_for, 1);
        assert_eq!(away[0].opponent_id, 20);
    }

    #[test]
    fn season_results_exclude_unfinished_and_invalid() {
        let conn = open_in_memory().unwrap();
        insert_result(&conn, 1, 1, 10, 20, 2, 0);
        insert_fixture(&conn, 2, 2, 20, 10);
        conn.execute(
            "INSERT INTO matches (match_id, round, home_club_id, away_club_id, home_goals, away_goals, valid)
             VALUES (3, 2, 10, 30, 1, 1, 0)",
            [],
        )
        .unwrap();

        let results = season_results_through(&conn, 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_id, 1);
    }

    #[test]
    fn replace_weights_is_idempotent_per_profile_round() {
        let mut conn = open_in_memory().unwrap();
        replace_weights(
            &mut conn,
            WeightTable::MatchWeights,
            1,
            5,
            4,
            &[(10, 1.25), (20, -1.25)],
        )
        .unwrap();
        replace_weights(
            &mut conn,
            WeightTable::MatchWeights,
            1,
            5,
            4,
            &[(10, 0.75), (20, -0.75)],
        )
        .unwrap();

        let rows = stored_weights(&conn, WeightTable::MatchWeights, 1, 5).unwrap();
        assert_eq!(rows, vec![(10, 0.75), (20, -0.75)]);
    }

    #[test]
    fn sector_players_ordered_by_average() {
        let conn = open_in_memory().unwrap();
        insert_player(&conn, 1, 10, 5, 4.0, 10);
        insert_player(&conn, 2, 10, 5, 8.0, 12);
        insert_player(&conn, 3, 10, 4, 9.0, 12);
        conn.execute(
            "INSERT INTO players (player_id, club_id, position_id, average, games, price, fit)
             VALUES (4, 10, 5, 9.9, 12, 5.0, 0)",
            [],
        )
        .unwrap();

        let attackers = sector_players(&conn, 10, &[5], false).unwrap();
        assert_eq!(attackers.len(), 2);
        assert!(attackers[0].average > attackers[1].average);
    }
}
