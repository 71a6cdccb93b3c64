use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;

use crate::models::{
    BestScore, Candidate, CardMeta, CardRef, CardState, Direction, Note, SelectionPolicy,
    StoreError,
};
use crate::session::{BestScoreSink, CardStore};

type Result<T> = std::result::Result<T, StoreError>;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                korean TEXT NOT NULL,
                french TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One card per note per review direction, each with its own
            -- scheduling metadata.
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                note_id INTEGER NOT NULL,
                direction TEXT NOT NULL CHECK(direction IN ('fr_ko', 'ko_fr')),
                interval_days INTEGER NOT NULL DEFAULT 1,
                ease_factor REAL NOT NULL DEFAULT 2.2,
                reps INTEGER NOT NULL DEFAULT 0,
                lapses INTEGER NOT NULL DEFAULT 0,
                success_streak INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL DEFAULT 'new'
                    CHECK(state IN ('new', 'learning', 'review', 'relearning')),
                due_at TEXT,
                last_reviewed_at TEXT,
                UNIQUE (note_id, direction),
                FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS best_scores (
                policy TEXT NOT NULL,
                direction TEXT NOT NULL,
                score INTEGER NOT NULL,
                achieved_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (policy, direction)
            );

            CREATE INDEX IF NOT EXISTS idx_cards_direction_due ON cards(direction, due_at);
            CREATE INDEX IF NOT EXISTS idx_cards_direction_streak ON cards(direction, success_streak);
            "#,
        )?;
        Ok(())
    }

    // Note operations

    /// Add a prompt pair and create its two cards with fresh metadata.
    pub fn add_note(&self, korean: &str, french: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO notes (korean, french) VALUES (?1, ?2)",
            params![korean, french],
        )?;
        let note_id = self.conn.last_insert_rowid();

        for direction in [Direction::FrKo, Direction::KoFr] {
            self.conn.execute(
                "INSERT INTO cards (note_id, direction) VALUES (?1, ?2)",
                params![note_id, direction.as_db_str()],
            )?;
        }
        Ok(note_id)
    }

    pub fn get_note(&self, id: i64) -> Result<Option<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, korean, french, created_at, updated_at FROM notes WHERE id = ?1",
        )?;

        let note = stmt.query_row(params![id], |row| {
            Ok(Note {
                id: row.get(0)?,
                korean: row.get(1)?,
                french: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        });

        match note {
            Ok(n) => Ok(Some(n)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_notes(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, korean, french, created_at, updated_at FROM notes ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Note {
                id: row.get(0)?,
                korean: row.get(1)?,
                french: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Delete a note and, via the foreign key, both of its cards.
    pub fn delete_note(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Card operations

    pub fn get_card_meta(&self, card: CardRef) -> Result<Option<CardMeta>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT interval_days, ease_factor, reps, lapses, success_streak, state, due_at
            FROM cards
            WHERE id = ?1
            "#,
        )?;

        let meta = stmt.query_row(params![card], |row| {
            let state: String = row.get(5)?;
            let due_at: Option<String> = row.get(6)?;
            Ok(CardMeta {
                interval_days: row.get(0)?,
                ease_factor: row.get(1)?,
                reps: row.get(2)?,
                lapses: row.get(3)?,
                success_streak: row.get(4)?,
                state: CardState::from_str(&state),
                due_at: parse_timestamp(due_at),
            })
        });

        match meta {
            Ok(m) => Ok(Some(m)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a scheduler result back. Full-row update, so retrying the same
    /// meta is naturally idempotent.
    pub fn persist_meta(&self, card: CardRef, meta: &CardMeta) -> Result<()> {
        let rows = self.conn.execute(
            r#"
            UPDATE cards
            SET interval_days = ?1,
                ease_factor = ?2,
                reps = ?3,
                lapses = ?4,
                success_streak = ?5,
                state = ?6,
                due_at = ?7,
                last_reviewed_at = ?8
            WHERE id = ?9
            "#,
            params![
                meta.interval_days,
                meta.ease_factor,
                meta.reps,
                meta.lapses,
                meta.success_streak,
                meta.state.as_str(),
                meta.due_at.map(|dt| dt.to_rfc3339()),
                Utc::now().to_rfc3339(),
                card
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::CardNotFound(card));
        }
        Ok(())
    }

    // Candidate selection

    const CANDIDATE_SELECT: &'static str = r#"
        SELECT c.id, c.interval_days, c.ease_factor, c.reps, c.lapses,
               c.success_streak, c.state, c.due_at, n.korean, n.french
        FROM cards c
        JOIN notes n ON n.id = c.note_id
    "#;

    pub fn fetch_for_review(
        &self,
        direction: Direction,
        policy: SelectionPolicy,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        match policy {
            SelectionPolicy::DueFirst => self.fetch_due_first(direction, limit),
            SelectionPolicy::LowestMasteryFirst => self.fetch_lowest_mastery(direction, limit),
        }
    }

    // Due cards (never-scheduled first, then due_at ascending), backfilled
    // with upcoming cards until the limit or exhaustion. The two queries
    // partition on due_at, so no card appears twice.
    fn fetch_due_first(&self, direction: Direction, limit: usize) -> Result<Vec<Candidate>> {
        let now = Utc::now().to_rfc3339();

        // SQLite sorts NULLs first under ASC, which is exactly the
        // never-scheduled-first ordering we want.
        let query = format!(
            r#"{}
            WHERE c.direction = ?1 AND (c.due_at IS NULL OR c.due_at <= ?2)
            ORDER BY c.due_at ASC
            LIMIT ?3
            "#,
            Self::CANDIDATE_SELECT
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![direction.as_db_str(), now, limit as i64], |row| {
            map_candidate_row(row, direction)
        })?;
        let mut due: Vec<Candidate> = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        if due.len() >= limit {
            return Ok(due);
        }

        let query = format!(
            r#"{}
            WHERE c.direction = ?1 AND c.due_at > ?2
            ORDER BY c.due_at ASC
            LIMIT ?3
            "#,
            Self::CANDIDATE_SELECT
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(
            params![direction.as_db_str(), now, (limit - due.len()) as i64],
            |row| map_candidate_row(row, direction),
        )?;
        let upcoming: Vec<Candidate> = rows.collect::<std::result::Result<Vec<_>, _>>()?;

        due.extend(upcoming);
        Ok(due)
    }

    fn fetch_lowest_mastery(&self, direction: Direction, limit: usize) -> Result<Vec<Candidate>> {
        let query = format!(
            r#"{}
            WHERE c.direction = ?1
            ORDER BY c.success_streak ASC, c.due_at ASC
            LIMIT ?2
            "#,
            Self::CANDIDATE_SELECT
        );
        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params![direction.as_db_str(), limit as i64], |row| {
            map_candidate_row(row, direction)
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // Best scores

    /// Keep the maximum score per (policy, direction).
    pub fn record_best_score(
        &self,
        policy: SelectionPolicy,
        direction: Direction,
        score: i64,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO best_scores (policy, direction, score, achieved_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(policy, direction) DO UPDATE SET
                score = excluded.score,
                achieved_at = excluded.achieved_at
            WHERE excluded.score > best_scores.score
            "#,
            params![
                policy.as_str(),
                direction.as_db_str(),
                score,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn best_scores(&self) -> Result<Vec<BestScore>> {
        let mut stmt = self.conn.prepare(
            "SELECT policy, direction, score, achieved_at FROM best_scores ORDER BY policy, direction",
        )?;
        let rows = stmt.query_map([], |row| {
            let policy: String = row.get(0)?;
            let direction: String = row.get(1)?;
            Ok((policy, direction, row.get::<_, i64>(2)?, row.get::<_, String>(3)?))
        })?;

        let mut scores = Vec::new();
        for row in rows {
            let (policy, direction, score, achieved_at) = row?;
            // Skip rows whose codec we no longer recognize
            if let (Some(policy), Some(direction)) = (
                SelectionPolicy::from_str(&policy),
                Direction::from_str(&direction),
            ) {
                scores.push(BestScore {
                    policy,
                    direction,
                    score,
                    achieved_at,
                });
            }
        }
        Ok(scores)
    }

    // Statistics

    pub fn get_stats(&self) -> Result<Stats> {
        Ok(Stats {
            total_notes: self
                .conn
                .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?,
            fr_ko: self.direction_stats(Direction::FrKo)?,
            ko_fr: self.direction_stats(Direction::KoFr)?,
            best: self.best_scores()?,
        })
    }

    fn direction_stats(&self, direction: Direction) -> Result<DirectionStats> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                COUNT(*),
                SUM(state = 'new'),
                SUM(state = 'learning'),
                SUM(state = 'review'),
                SUM(state = 'relearning'),
                SUM(due_at IS NULL OR due_at <= ?2)
            FROM cards
            WHERE direction = ?1
            "#,
        )?;

        let stats = stmt.query_row(params![direction.as_db_str(), now], |row| {
            Ok(DirectionStats {
                direction,
                total: row.get(0)?,
                new: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                learning: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                review: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                relearning: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                due_now: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            })
        })?;
        Ok(stats)
    }
}

impl CardStore for Database {
    fn fetch_candidates(
        &self,
        direction: Direction,
        policy: SelectionPolicy,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        self.fetch_for_review(direction, policy, limit)
    }

    fn persist(&self, card: CardRef, meta: &CardMeta) -> Result<()> {
        self.persist_meta(card, meta)
    }
}

impl BestScoreSink for Database {
    fn record_best(
        &self,
        policy: SelectionPolicy,
        direction: Direction,
        score: i64,
    ) -> Result<()> {
        self.record_best_score(policy, direction, score)
    }
}

fn map_candidate_row(
    row: &rusqlite::Row<'_>,
    direction: Direction,
) -> rusqlite::Result<Candidate> {
    let state: String = row.get(6)?;
    let due_at: Option<String> = row.get(7)?;
    let korean: String = row.get(8)?;
    let french: String = row.get(9)?;

    let (prompt, expected) = match direction {
        Direction::FrKo => (french, korean),
        Direction::KoFr => (korean, french),
    };

    Ok(Candidate {
        card: row.get(0)?,
        meta: CardMeta {
            interval_days: row.get(1)?,
            ease_factor: row.get(2)?,
            reps: row.get(3)?,
            lapses: row.get(4)?,
            success_streak: row.get(5)?,
            state: CardState::from_str(&state),
            due_at: parse_timestamp(due_at),
        },
        prompt,
        expected,
    })
}

// Unparseable timestamps read back as never-scheduled rather than erroring.
fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionStats {
    pub direction: Direction,
    pub total: i64,
    pub new: i64,
    pub learning: i64,
    pub review: i64,
    pub relearning: i64,
    pub due_now: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_notes: i64,
    pub fr_ko: DirectionStats,
    pub ko_fr: DirectionStats,
    pub best: Vec<BestScore>,
}
