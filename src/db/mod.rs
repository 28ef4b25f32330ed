pub mod queries;

use crate::stats::MarkSet;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct GoalRow {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        // Check rows must go away with their goal.
        conn.pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign key enforcement")?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    /// Inserts a goal with the given display name. Returns `None` when the
    /// name is already taken.
    pub fn create_goal(&self, name: &str) -> Result<Option<GoalRow>> {
        let created_at = Utc::now().to_rfc3339();
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO goals (name, created_at) VALUES (?1, ?2)",
                params![name, created_at],
            )
            .context("Failed to insert goal")?;

        if inserted == 0 {
            return Ok(None);
        }

        let id = self.conn.last_insert_rowid();
        self.goal_by_id(id)
    }

    pub fn list_goals(&self) -> Result<Vec<GoalRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, name, created_at FROM goals ORDER BY created_at ASC",
        )?;

        let rows = statement
            .query_map([], |row| {
                Ok(GoalRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query goals")?;

        Ok(rows)
    }

    pub fn goal_by_id(&self, id: i64) -> Result<Option<GoalRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM goals WHERE id = ?1",
                params![id],
                |row| {
                    Ok(GoalRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .context("Failed to query goal")?;

        Ok(row)
    }

    /// Renames an existing goal. Returns `false` when the new name belongs
    /// to another goal; the caller is expected to have checked the id.
    pub fn rename_goal(&self, id: i64, name: &str) -> Result<bool> {
        let updated = self
            .conn
            .execute(
                "UPDATE OR IGNORE goals SET name = ?1 WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to rename goal")?;

        Ok(updated > 0)
    }

    /// Deletes a goal and, through the cascade, all of its checks.
    pub fn delete_goal(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM goals WHERE id = ?1", params![id])
            .context("Failed to delete goal")?;

        Ok(deleted > 0)
    }

    pub fn goal_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM goals", [], |row| row.get(0))
            .context("Failed to count goals")?;

        Ok(count)
    }

    /// All marks for one goal as a day-to-done map, optionally restricted
    /// to an inclusive day range.
    pub fn marks_for_goal(
        &self,
        goal_id: i64,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<MarkSet> {
        let mut sql = "SELECT day, done FROM checks WHERE goal_id = ?1".to_string();
        if range.is_some() {
            sql.push_str(" AND day BETWEEN ?2 AND ?3");
        }

        let mut statement = self.conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            let day: NaiveDate = row.get(0)?;
            let done: bool = row.get(1)?;
            Ok((day, done))
        };

        let rows = match range {
            Some((start, end)) => statement
                .query_map(params![goal_id, start, end], map_row)?
                .collect::<Result<MarkSet, _>>(),
            None => statement
                .query_map(params![goal_id], map_row)?
                .collect::<Result<MarkSet, _>>(),
        }
        .context("Failed to query checks")?;

        Ok(rows)
    }

    /// Upserts the done flag for one goal-day. Last write wins.
    pub fn set_mark(&self, goal_id: i64, day: NaiveDate, done: bool) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO checks (goal_id, day, done) VALUES (?1, ?2, ?3)
                 ON CONFLICT(goal_id, day) DO UPDATE SET done=excluded.done",
                params![goal_id, day, done],
            )
            .context("Failed to upsert check")?;

        Ok(())
    }

    pub fn latest_marked_day(&self) -> Result<Option<NaiveDate>> {
        let day = self
            .conn
            .query_row(
                "SELECT day FROM checks ORDER BY day DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query latest marked day")?;

        Ok(day)
    }
}
