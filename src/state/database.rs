//! SQLite turn log with WAL mode and schema versioning.

use crate::state::schema;
use crate::types::*;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// The turn-log database.
pub struct Database {
    conn: Connection,
}

/// A turn as stored in the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedTurn {
    pub id: String,
    pub key: SessionKey,
    pub input: String,
    pub output: String,
    pub iterations: u32,
    pub invocations: Vec<ToolInvocation>,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema creation.
    fn migrate(&mut self) -> Result<()> {
        let version = self.schema_version();

        if version == 0 {
            info!("Creating turn log schema v{}", schema::SCHEMA_VERSION);
            self.conn
                .execute_batch(schema::CREATE_SCHEMA)
                .context("Failed to create schema")?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::SCHEMA_VERSION],
            )?;
        } else if version > schema::SCHEMA_VERSION {
            bail!(
                "Turn log schema v{} is newer than this build (v{})",
                version,
                schema::SCHEMA_VERSION
            );
        }

        Ok(())
    }

    /// Get the current schema version (0 if uninitialized).
    fn schema_version(&self) -> u32 {
        self.conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    /// Persist a completed turn and its tool calls. Returns the turn id.
    pub fn record_turn(
        &mut self,
        key: &SessionKey,
        input: &str,
        outcome: &TurnOutcome,
    ) -> Result<String> {
        let id = ulid::Ulid::new().to_string();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO turns (id, user_id, convo_id, input, output, iterations, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                key.user_id,
                key.convo_id,
                input,
                outcome.answer,
                outcome.iterations,
                outcome.completed_at.to_rfc3339(),
            ],
        )?;

        for (seq, inv) in outcome.invocations.iter().enumerate() {
            tx.execute(
                "INSERT INTO tool_calls (id, turn_id, seq, tool_name, input, output, success)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ulid::Ulid::new().to_string(),
                    id,
                    seq as i64,
                    inv.tool,
                    inv.input,
                    inv.output,
                    inv.success as i32,
                ],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    /// All logged turns for a conversation, oldest first.
    pub fn turns_for(&self, key: &SessionKey) -> Result<Vec<LoggedTurn>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, input, output, iterations, created_at FROM turns
             WHERE user_id = ?1 AND convo_id = ?2
             ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![key.user_id, key.convo_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (id, input, output, iterations, created_at) = row?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            let invocations = self.invocations_for(&id)?;
            turns.push(LoggedTurn {
                id,
                key: key.clone(),
                input,
                output,
                iterations,
                invocations,
                created_at,
            });
        }
        Ok(turns)
    }

    fn invocations_for(&self, turn_id: &str) -> Result<Vec<ToolInvocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT tool_name, input, output, success FROM tool_calls
             WHERE turn_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![turn_id], |row| {
            Ok(ToolInvocation {
                tool: row.get(0)?,
                input: row.get(1)?,
                output: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                success: row.get::<_, i32>(3)? != 0,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read tool calls")
    }

    /// Get the total number of turns.
    pub fn turn_count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(answer: &str, invocations: Vec<ToolInvocation>) -> TurnOutcome {
        TurnOutcome {
            answer: answer.into(),
            iterations: invocations.len() as u32 + 1,
            invocations,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn records_and_reads_back_turns_in_order() {
        let mut db = Database::open_memory().unwrap();
        let key = SessionKey::new("alice", "c1");
        let other = SessionKey::new("bob", "c1");

        db.record_turn(
            &key,
            "what's my balance",
            &outcome(
                "Balance: 12.5 APT",
                vec![ToolInvocation {
                    tool: "Account Balance".into(),
                    input: "0xabc".into(),
                    output: "12.5".into(),
                    success: true,
                }],
            ),
        )
        .unwrap();
        db.record_turn(&key, "thanks", &outcome("You're welcome", vec![]))
            .unwrap();
        db.record_turn(&other, "hi", &outcome("hello", vec![])).unwrap();

        let turns = db.turns_for(&key).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].input, "what's my balance");
        assert_eq!(turns[0].iterations, 2);
        assert_eq!(turns[0].invocations.len(), 1);
        assert_eq!(turns[0].invocations[0].output, "12.5");
        assert_eq!(turns[1].output, "You're welcome");
        assert_eq!(db.turn_count().unwrap(), 3);
    }

    #[test]
    fn unknown_conversation_has_no_turns() {
        let db = Database::open_memory().unwrap();
        assert!(db
            .turns_for(&SessionKey::new("nobody", "none"))
            .unwrap()
            .is_empty());
    }
}
