//! SQLite-backed persistence for cycles, candidates and task watermarks.
//! Survives restarts between phases; every write is a single statement or a
//! single transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tedclub_core::error::{Result, TedClubError};
use tedclub_core::traits::CycleStore;
use tedclub_core::types::{Candidate, Cycle, NewCycle, PollRef, PollTally};

use crate::engine::FireLog;

const OCCURRENCE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// SQLite-backed store for all scheduler and workflow data.
pub struct SchedulerDb {
    conn: Mutex<Connection>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> TedClubError + '_ {
    move |e| TedClubError::Store(format!("{context}: {e}"))
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| TedClubError::Store(format!("bad timestamp '{s}': {e}")))
}

impl SchedulerDb {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err("DB open"))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("DB open"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TedClubError::Store(format!("DB lock poisoned: {e}")))
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            PRAGMA foreign_keys = ON;

            -- One row per weekly cycle
            CREATE TABLE IF NOT EXISTS cycles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,         -- RFC3339 UTC, fixed precision
                topic TEXT NOT NULL,
                poll_ref TEXT NOT NULL,           -- opaque messaging handle
                selected_candidate_id TEXT,
                discussion TEXT,
                selected_at TEXT,
                prepared_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_cycles_started_at ON cycles(started_at);

            -- Candidates proposed in a cycle
            CREATE TABLE IF NOT EXISTS candidates (
                cycle_id INTEGER NOT NULL,
                id TEXT NOT NULL,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                poll_option INTEGER NOT NULL,
                duration_secs INTEGER NOT NULL,
                url TEXT,
                votes INTEGER,
                PRIMARY KEY (cycle_id, id),
                FOREIGN KEY (cycle_id) REFERENCES cycles(id) ON DELETE CASCADE
            );

            -- Last occurrence each scheduled task fired for
            CREATE TABLE IF NOT EXISTS task_fires (
                task_name TEXT PRIMARY KEY,
                occurrence TEXT NOT NULL,         -- local wall time, minute resolution
                fired_at TEXT NOT NULL
            );
         ",
            )
            .map_err(db_err("Migration"))
    }

    fn load_candidates(conn: &Connection, cycle_id: i64) -> Result<Vec<Candidate>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, title, description, poll_option, duration_secs, url, votes
                 FROM candidates WHERE cycle_id = ?1 ORDER BY position",
            )
            .map_err(db_err("Load candidates"))?;
        let rows = stmt
            .query_map([cycle_id], |row| {
                Ok(Candidate {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    poll_option: row.get::<_, i64>(3)? as usize,
                    duration_secs: row.get(4)?,
                    url: row.get(5)?,
                    votes: row.get(6)?,
                })
            })
            .map_err(db_err("Load candidates"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Load candidates"))
    }

    fn load_cycles(conn: &Connection, limit: usize) -> Result<Vec<Cycle>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, started_at, topic, poll_ref, selected_candidate_id, discussion
                 FROM cycles ORDER BY started_at DESC, id DESC LIMIT ?1",
            )
            .map_err(db_err("Load cycles"))?;
        let heads = stmt
            .query_map([limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })
            .map_err(db_err("Load cycles"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Load cycles"))?;

        heads
            .into_iter()
            .map(|(id, started_at, topic, poll_ref, selected, discussion)| -> Result<Cycle> {
                Ok(Cycle {
                    id,
                    started_at: parse_ts(&started_at)?,
                    topic,
                    poll_ref: PollRef(poll_ref),
                    candidates: Self::load_candidates(conn, id)?,
                    selected_candidate_id: selected,
                    discussion,
                })
            })
            .collect()
    }

    fn cycle_exists(conn: &Connection, cycle_id: i64) -> Result<bool> {
        conn.query_row("SELECT 1 FROM cycles WHERE id = ?1", [cycle_id], |_| Ok(()))
            .optional()
            .map(|r| r.is_some())
            .map_err(db_err("Find cycle"))
    }
}

impl CycleStore for SchedulerDb {
    fn insert_cycle(&self, cycle: &NewCycle) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err("Begin"))?;
        tx.execute(
            "INSERT INTO cycles (started_at, topic, poll_ref) VALUES (?1, ?2, ?3)",
            params![ts(&cycle.started_at), cycle.topic, cycle.poll_ref.0],
        )
        .map_err(db_err("Insert cycle"))?;
        let cycle_id = tx.last_insert_rowid();

        for (position, c) in cycle.candidates.iter().enumerate() {
            tx.execute(
                "INSERT INTO candidates
                 (cycle_id, id, position, title, description, poll_option, duration_secs, url, votes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    cycle_id,
                    c.id,
                    position as i64,
                    c.title,
                    c.description,
                    c.poll_option as i64,
                    c.duration_secs,
                    c.url,
                    c.votes,
                ],
            )
            .map_err(db_err("Insert candidate"))?;
        }
        tx.commit().map_err(db_err("Commit cycle"))?;

        tracing::debug!(
            "💾 Cycle {} stored with {} candidates",
            cycle_id,
            cycle.candidates.len()
        );
        Ok(cycle_id)
    }

    fn current_cycle(&self) -> Result<Option<Cycle>> {
        let conn = self.lock()?;
        Ok(Self::load_cycles(&conn, 1)?.into_iter().next())
    }

    fn update_selection(
        &self,
        cycle_id: i64,
        candidate_id: &str,
        tallies: &[PollTally],
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err("Begin"))?;

        let belongs = tx
            .query_row(
                "SELECT 1 FROM candidates WHERE cycle_id = ?1 AND id = ?2",
                params![cycle_id, candidate_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(db_err("Find candidate"))?
            .is_some();
        if !belongs {
            return Err(TedClubError::CandidateNotInCycle {
                cycle_id,
                candidate_id: candidate_id.to_string(),
            });
        }

        for tally in tallies {
            tx.execute(
                "UPDATE candidates SET votes = ?1 WHERE cycle_id = ?2 AND poll_option = ?3",
                params![tally.votes, cycle_id, tally.option_index as i64],
            )
            .map_err(db_err("Update votes"))?;
        }
        tx.execute(
            "UPDATE cycles SET selected_candidate_id = ?1, selected_at = ?2 WHERE id = ?3",
            params![candidate_id, ts(&Utc::now()), cycle_id],
        )
        .map_err(db_err("Update selection"))?;
        tx.commit().map_err(db_err("Commit selection"))
    }

    fn update_discussion(&self, cycle_id: i64, text: &str) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE cycles SET discussion = ?1, prepared_at = ?2
                 WHERE id = ?3 AND selected_candidate_id IS NOT NULL",
                params![text, ts(&Utc::now()), cycle_id],
            )
            .map_err(db_err("Update discussion"))?;
        if updated == 0 {
            return if Self::cycle_exists(&conn, cycle_id)? {
                Err(TedClubError::NoSelectionYet)
            } else {
                Err(TedClubError::Store(format!("cycle {cycle_id} not found")))
            };
        }
        Ok(())
    }

    fn recent_cycles(&self, limit: usize) -> Result<Vec<Cycle>> {
        let conn = self.lock()?;
        Self::load_cycles(&conn, limit)
    }

    fn ping(&self) -> Result<()> {
        self.lock()?
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(db_err("Ping"))
    }
}

impl FireLog for SchedulerDb {
    fn last_fired(&self, task_name: &str) -> Result<Option<NaiveDateTime>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT occurrence FROM task_fires WHERE task_name = ?1",
                [task_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("Load watermark"))?;
        Ok(raw.and_then(|s| NaiveDateTime::parse_from_str(&s, OCCURRENCE_FORMAT).ok()))
    }

    fn record_fire(&self, task_name: &str, occurrence: NaiveDateTime) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO task_fires (task_name, occurrence, fired_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    task_name,
                    occurrence.format(OCCURRENCE_FORMAT).to_string(),
                    ts(&Utc::now())
                ],
            )
            .map_err(db_err("Save watermark"))?;
        Ok(())
    }
}
