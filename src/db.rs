use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use crate::models::{
    Assignment, AssignmentStatus, Difficulty, ItemType, Learner, LessonItem, LessonPlan,
    PlanSettings, PracticeEvent, Skill, SkillState, Stats,
};

pub struct Database {
    conn: Connection,
}

const SKILL_STATE_COLUMNS: &str = "id, learner_id, skill_id, level, evidence_count, \
     last_practice, next_due, history, version";

const ITEM_COLUMNS: &str =
    "id, plan_id, subject, item_type, skill_ids, estimated_minutes, order_index";

const ASSIGNMENT_COLUMNS: &str = "id, item_id, learner_id, scheduled_date, status, \
     started_at, completed_at, carried_from";

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS learners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                grade TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Registry of catalog skills (owned by the external curriculum)
            CREATE TABLE IF NOT EXISTS skills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                grade TEXT NOT NULL,
                subject TEXT NOT NULL,
                difficulty TEXT NOT NULL CHECK(difficulty IN ('easy', 'medium', 'hard')),
                sequence INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS skill_states (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                skill_id INTEGER NOT NULL,
                level INTEGER NOT NULL DEFAULT 0 CHECK(level BETWEEN 0 AND 5),
                evidence_count INTEGER NOT NULL DEFAULT 0,
                last_practice TEXT,
                next_due TEXT,
                history TEXT NOT NULL DEFAULT '[]',
                version INTEGER NOT NULL DEFAULT 1,
                UNIQUE (learner_id, skill_id),
                FOREIGN KEY (learner_id) REFERENCES learners(id),
                FOREIGN KEY (skill_id) REFERENCES skills(id)
            );

            -- Evidence log: append-only, never trimmed
            CREATE TABLE IF NOT EXISTS practice_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                skill_id INTEGER NOT NULL,
                success INTEGER NOT NULL,
                score REAL,
                practiced_at TEXT NOT NULL,
                FOREIGN KEY (learner_id) REFERENCES learners(id),
                FOREIGN KEY (skill_id) REFERENCES skills(id)
            );

            CREATE TABLE IF NOT EXISTS lesson_plans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id INTEGER NOT NULL,
                week_start TEXT NOT NULL,
                settings TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (learner_id, week_start),
                FOREIGN KEY (learner_id) REFERENCES learners(id)
            );

            CREATE TABLE IF NOT EXISTS lesson_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id INTEGER NOT NULL,
                subject TEXT NOT NULL,
                item_type TEXT NOT NULL CHECK(item_type IN ('lesson', 'practice', 'review', 'assessment')),
                skill_ids TEXT NOT NULL DEFAULT '[]',
                estimated_minutes INTEGER NOT NULL,
                order_index INTEGER NOT NULL,
                FOREIGN KEY (plan_id) REFERENCES lesson_plans(id)
            );

            CREATE TABLE IF NOT EXISTS assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                item_id INTEGER NOT NULL,
                learner_id INTEGER NOT NULL,
                scheduled_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'in_progress', 'completed', 'excused')),
                started_at TEXT,
                completed_at TEXT,
                carried_from INTEGER REFERENCES assignments(id),
                FOREIGN KEY (item_id) REFERENCES lesson_items(id),
                FOREIGN KEY (learner_id) REFERENCES learners(id)
            );

            CREATE INDEX IF NOT EXISTS idx_skills_scope ON skills(grade, subject);
            CREATE INDEX IF NOT EXISTS idx_states_due ON skill_states(learner_id, next_due);
            CREATE INDEX IF NOT EXISTS idx_events_pair ON practice_events(learner_id, skill_id);
            CREATE INDEX IF NOT EXISTS idx_items_plan ON lesson_items(plan_id);
            CREATE INDEX IF NOT EXISTS idx_assignments_day ON assignments(learner_id, scheduled_date);
            -- A source assignment is carried over at most once
            CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_carried ON assignments(carried_from);
            "#,
        )?;

        Ok(())
    }

    /// Starts a transaction on the shared connection. Every other method called
    /// while the returned guard is alive runs inside it; dropping the guard
    /// without `commit` rolls everything back.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        self.conn.unchecked_transaction()
    }

    /// Switches a file database to write-ahead logging so readers and a
    /// writer on separate connections do not block each other. The mode is
    /// stored in the file; in-memory databases stay in `memory` mode.
    pub fn enable_wal(&self) -> Result<String> {
        self.conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
    }

    // Learner registry
    pub fn add_learner(&self, name: &str, grade: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO learners (name, grade) VALUES (?1, ?2)",
            params![name, grade],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_learner(&self, id: i64) -> Result<Option<Learner>> {
        self.conn
            .query_row(
                "SELECT id, name, grade, created_at FROM learners WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Learner {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        grade: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
    }

    pub fn list_learners(&self) -> Result<Vec<Learner>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, grade, created_at FROM learners ORDER BY name, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Learner {
                id: row.get(0)?,
                name: row.get(1)?,
                grade: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;
        rows.collect()
    }

    // Skill registry
    pub fn add_skill(
        &self,
        code: &str,
        name: &str,
        grade: &str,
        subject: &str,
        difficulty: Difficulty,
        sequence: i64,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO skills (code, name, grade, subject, difficulty, sequence)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![code, name, grade, subject, difficulty.as_str(), sequence],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_skill(&self, id: i64) -> Result<Option<Skill>> {
        self.conn
            .query_row(
                "SELECT id, code, name, grade, subject, difficulty, sequence FROM skills WHERE id = ?1",
                params![id],
                skill_from_row,
            )
            .optional()
    }

    /// Scope and sequence for one grade/subject, in catalog order.
    pub fn skills_for(&self, grade: &str, subject: &str) -> Result<Vec<Skill>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, code, name, grade, subject, difficulty, sequence
            FROM skills
            WHERE grade = ?1 AND subject = ?2
            ORDER BY sequence ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![grade, subject], skill_from_row)?;
        rows.collect()
    }

    // Skill state operations
    pub fn get_skill_state(&self, learner_id: i64, skill_id: i64) -> Result<Option<SkillState>> {
        let sql = format!(
            "SELECT {} FROM skill_states WHERE learner_id = ?1 AND skill_id = ?2",
            SKILL_STATE_COLUMNS
        );
        self.conn
            .query_row(&sql, params![learner_id, skill_id], skill_state_from_row)
            .optional()
    }

    pub fn list_skill_states(&self, learner_id: i64) -> Result<Vec<SkillState>> {
        let sql = format!(
            "SELECT {} FROM skill_states WHERE learner_id = ?1 ORDER BY skill_id",
            SKILL_STATE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![learner_id], skill_state_from_row)?;
        rows.collect()
    }

    /// Inserts a first-time state with version 1. A concurrent insert for the
    /// same pair surfaces as a UNIQUE constraint violation.
    pub fn insert_skill_state(&self, state: &SkillState) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO skill_states
                (learner_id, skill_id, level, evidence_count, last_practice, next_due, history, version)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
            "#,
            params![
                state.learner_id,
                state.skill_id,
                state.level,
                state.evidence_count,
                state.last_practice.map(fmt_ts),
                state.next_due.map(fmt_ts),
                to_json(&state.history)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Writes `state` only if the stored version still equals
    /// `expected_version`. Returns false when another writer got there first.
    pub fn update_skill_state(&self, state: &SkillState, expected_version: i64) -> Result<bool> {
        let rows = self.conn.execute(
            r#"
            UPDATE skill_states
            SET level = ?1,
                evidence_count = ?2,
                last_practice = ?3,
                next_due = ?4,
                history = ?5,
                version = version + 1
            WHERE learner_id = ?6 AND skill_id = ?7 AND version = ?8
            "#,
            params![
                state.level,
                state.evidence_count,
                state.last_practice.map(fmt_ts),
                state.next_due.map(fmt_ts),
                to_json(&state.history)?,
                state.learner_id,
                state.skill_id,
                expected_version,
            ],
        )?;
        Ok(rows == 1)
    }

    /// Skill states due at `now`, most overdue and least mastered first.
    pub fn due_skill_states(
        &self,
        learner_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SkillState>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM skill_states
            WHERE learner_id = ?1
              AND level < 5
              AND next_due IS NOT NULL
              AND next_due <= ?2
            ORDER BY next_due ASC, level ASC, skill_id ASC
            LIMIT ?3
            "#,
            SKILL_STATE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(
            params![learner_id, fmt_ts(now), limit],
            skill_state_from_row,
        )?;
        rows.collect()
    }

    // Evidence log
    pub fn append_evidence(
        &self,
        learner_id: i64,
        skill_id: i64,
        success: bool,
        score: Option<f64>,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO practice_events (learner_id, skill_id, success, score, practiced_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![learner_id, skill_id, success, score, fmt_ts(at)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent evidence first.
    pub fn list_evidence(
        &self,
        learner_id: i64,
        skill_id: i64,
        limit: usize,
    ) -> Result<Vec<PracticeEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, learner_id, skill_id, success, score, practiced_at
            FROM practice_events
            WHERE learner_id = ?1 AND skill_id = ?2
            ORDER BY practiced_at DESC, id DESC
            LIMIT ?3
            "#,
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![learner_id, skill_id, limit], |row| {
            let practiced_at: String = row.get(5)?;
            Ok(PracticeEvent {
                id: row.get(0)?,
                learner_id: row.get(1)?,
                skill_id: row.get(2)?,
                success: row.get(3)?,
                score: row.get(4)?,
                practiced_at: parse_ts(5, &practiced_at)?,
            })
        })?;
        rows.collect()
    }

    // Lesson plan operations
    pub fn plan_exists(&self, learner_id: i64, week_start: NaiveDate) -> Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM lesson_plans WHERE learner_id = ?1 AND week_start = ?2)",
            params![learner_id, fmt_date(week_start)],
            |row| row.get(0),
        )
    }

    pub fn insert_plan(
        &self,
        learner_id: i64,
        week_start: NaiveDate,
        settings: &PlanSettings,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO lesson_plans (learner_id, week_start, settings, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                learner_id,
                fmt_date(week_start),
                to_json(settings)?,
                fmt_ts(created_at)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_plan(&self, plan_id: i64) -> Result<Option<LessonPlan>> {
        self.conn
            .query_row(
                "SELECT id, learner_id, week_start, settings, created_at FROM lesson_plans WHERE id = ?1",
                params![plan_id],
                plan_from_row,
            )
            .optional()
    }

    pub fn find_plan(&self, learner_id: i64, week_start: NaiveDate) -> Result<Option<LessonPlan>> {
        self.conn
            .query_row(
                r#"
                SELECT id, learner_id, week_start, settings, created_at
                FROM lesson_plans
                WHERE learner_id = ?1 AND week_start = ?2
                "#,
                params![learner_id, fmt_date(week_start)],
                plan_from_row,
            )
            .optional()
    }

    // Lesson item operations
    pub fn insert_item(
        &self,
        plan_id: i64,
        subject: &str,
        item_type: ItemType,
        skill_ids: &[i64],
        estimated_minutes: u32,
        order_index: i64,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO lesson_items (plan_id, subject, item_type, skill_ids, estimated_minutes, order_index)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                plan_id,
                subject,
                item_type.as_str(),
                to_json(&skill_ids)?,
                estimated_minutes,
                order_index
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_item(&self, item_id: i64) -> Result<Option<LessonItem>> {
        let sql = format!("SELECT {} FROM lesson_items WHERE id = ?1", ITEM_COLUMNS);
        self.conn
            .query_row(&sql, params![item_id], item_from_row)
            .optional()
    }

    pub fn list_items(&self, plan_id: i64) -> Result<Vec<LessonItem>> {
        let sql = format!(
            "SELECT {} FROM lesson_items WHERE plan_id = ?1 ORDER BY order_index, id",
            ITEM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![plan_id], item_from_row)?;
        rows.collect()
    }

    pub fn set_item_order(&self, item_id: i64, order_index: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE lesson_items SET order_index = ?1 WHERE id = ?2",
            params![order_index, item_id],
        )?;
        Ok(())
    }

    // Assignment operations
    pub fn insert_assignment(
        &self,
        item_id: i64,
        learner_id: i64,
        scheduled_date: NaiveDate,
        carried_from: Option<i64>,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO assignments (item_id, learner_id, scheduled_date, status, carried_from)
            VALUES (?1, ?2, ?3, 'pending', ?4)
            "#,
            params![item_id, learner_id, fmt_date(scheduled_date), carried_from],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_assignment(&self, assignment_id: i64) -> Result<Option<Assignment>> {
        let sql = format!("SELECT {} FROM assignments WHERE id = ?1", ASSIGNMENT_COLUMNS);
        self.conn
            .query_row(&sql, params![assignment_id], assignment_from_row)
            .optional()
    }

    pub fn assignments_on(&self, learner_id: i64, date: NaiveDate) -> Result<Vec<Assignment>> {
        let sql = format!(
            "SELECT {} FROM assignments WHERE learner_id = ?1 AND scheduled_date = ?2 ORDER BY id",
            ASSIGNMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![learner_id, fmt_date(date)], assignment_from_row)?;
        rows.collect()
    }

    pub fn list_plan_assignments(&self, plan_id: i64) -> Result<Vec<Assignment>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM assignments
            WHERE item_id IN (SELECT id FROM lesson_items WHERE plan_id = ?1)
            ORDER BY scheduled_date, id
            "#,
            ASSIGNMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![plan_id], assignment_from_row)?;
        rows.collect()
    }

    pub fn is_carried_over(&self, assignment_id: i64) -> Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM assignments WHERE carried_from = ?1)",
            params![assignment_id],
            |row| row.get(0),
        )
    }

    pub fn update_assignment_status(
        &self,
        assignment_id: i64,
        status: AssignmentStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE assignments
            SET status = ?1, started_at = ?2, completed_at = ?3
            WHERE id = ?4
            "#,
            params![
                status.as_str(),
                started_at.map(fmt_ts),
                completed_at.map(fmt_ts),
                assignment_id
            ],
        )?;
        Ok(())
    }

    pub fn get_stats(&self, learner_id: i64, now: DateTime<Utc>) -> Result<Stats> {
        let tracked_skills: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM skill_states WHERE learner_id = ?1",
            params![learner_id],
            |row| row.get(0),
        )?;

        let total_evidence: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM practice_events WHERE learner_id = ?1",
            params![learner_id],
            |row| row.get(0),
        )?;

        let mastered: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM skill_states WHERE learner_id = ?1 AND level >= 5",
            params![learner_id],
            |row| row.get(0),
        )?;

        let due_now: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM skill_states
            WHERE learner_id = ?1 AND level < 5 AND next_due IS NOT NULL AND next_due <= ?2
            "#,
            params![learner_id, fmt_ts(now)],
            |row| row.get(0),
        )?;

        let avg_level: f64 = self.conn.query_row(
            "SELECT COALESCE(AVG(level), 0) FROM skill_states WHERE learner_id = ?1",
            params![learner_id],
            |row| row.get(0),
        )?;

        Ok(Stats {
            tracked_skills,
            total_evidence,
            mastered,
            due_now,
            avg_level,
        })
    }
}

// Fixed-width UTC text so lexical order in SQL matches time order
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_ts(idx: usize, s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_ts(idx, &s)).transpose()
}

pub(crate) fn fmt_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_date(idx: usize, s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json<T: DeserializeOwned>(idx: usize, s: &str) -> Result<T> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn invalid_text(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid {} '{}'", what, value).into(),
    )
}

fn skill_from_row(row: &Row<'_>) -> Result<Skill> {
    let difficulty: String = row.get(5)?;
    Ok(Skill {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        grade: row.get(3)?,
        subject: row.get(4)?,
        difficulty: Difficulty::from_str(&difficulty)
            .ok_or_else(|| invalid_text(5, "difficulty", &difficulty))?,
        sequence: row.get(6)?,
    })
}

fn skill_state_from_row(row: &Row<'_>) -> Result<SkillState> {
    let history: String = row.get(7)?;
    Ok(SkillState {
        id: row.get(0)?,
        learner_id: row.get(1)?,
        skill_id: row.get(2)?,
        level: row.get(3)?,
        evidence_count: row.get(4)?,
        last_practice: parse_opt_ts(5, row.get(5)?)?,
        next_due: parse_opt_ts(6, row.get(6)?)?,
        history: from_json(7, &history)?,
        version: row.get(8)?,
    })
}

fn plan_from_row(row: &Row<'_>) -> Result<LessonPlan> {
    let week_start: String = row.get(2)?;
    let settings: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(LessonPlan {
        id: row.get(0)?,
        learner_id: row.get(1)?,
        week_start: parse_date(2, &week_start)?,
        settings: from_json(3, &settings)?,
        created_at: parse_ts(4, &created_at)?,
    })
}

fn item_from_row(row: &Row<'_>) -> Result<LessonItem> {
    let item_type: String = row.get(3)?;
    let skill_ids: String = row.get(4)?;
    Ok(LessonItem {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        subject: row.get(2)?,
        item_type: ItemType::from_str(&item_type)
            .ok_or_else(|| invalid_text(3, "item type", &item_type))?,
        skill_ids: from_json(4, &skill_ids)?,
        estimated_minutes: row.get(5)?,
        order_index: row.get(6)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> Result<Assignment> {
    let scheduled_date: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(Assignment {
        id: row.get(0)?,
        item_id: row.get(1)?,
        learner_id: row.get(2)?,
        scheduled_date: parse_date(3, &scheduled_date)?,
        status: AssignmentStatus::from_str(&status)
            .ok_or_else(|| invalid_text(4, "status", &status))?,
        started_at: parse_opt_ts(5, row.get(5)?)?,
        completed_at: parse_opt_ts(6, row.get(6)?)?,
        carried_from: row.get(7)?,
    })
}

#[cfg(test)]
impl Database {
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)
    }

    pub(crate) fn count_rows(&self, table: &str) -> i64 {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }
}
