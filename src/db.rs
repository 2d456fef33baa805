use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::view::{Person, RollState};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("rollcall.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    // Key/value snapshot store, local-storage get/set semantics only.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rolls(
            id TEXT PRIMARY KEY,
            name TEXT,
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            student_states TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

/// Roster in fetch order. Roll states are owned by the board, not the table,
/// so every fetched student starts unmarked.
pub fn list_students(conn: &Connection) -> anyhow::Result<Vec<Person>> {
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name
         FROM students
         ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(Person {
            id: r.get(0)?,
            first_name: r.get(1)?,
            last_name: r.get(2)?,
            roll_state: RollState::Unmarked,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn insert_student(conn: &Connection, first_name: &str, last_name: &str) -> anyhow::Result<i64> {
    let next_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM students",
        [],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO students(first_name, last_name, sort_order) VALUES(?, ?, ?)",
        (first_name, last_name, next_order),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_student(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let changed = conn.execute("DELETE FROM students WHERE id = ?", [id])?;
    Ok(changed > 0)
}

pub fn snapshot_set(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO snapshots(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value.to_string()),
    )?;
    Ok(())
}

pub fn snapshot_get(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM snapshots WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn snapshot_clear(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM snapshots WHERE key = ?", [key])?;
    Ok(())
}

pub struct RollRecord {
    pub id: String,
    pub name: Option<String>,
    pub started_at: String,
    pub completed_at: String,
    pub student_states: serde_json::Value,
}

pub fn insert_roll(conn: &Connection, record: &RollRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO rolls(id, name, started_at, completed_at, student_states)
         VALUES(?, ?, ?, ?, ?)",
        (
            &record.id,
            &record.name,
            &record.started_at,
            &record.completed_at,
            record.student_states.to_string(),
        ),
    )?;
    Ok(())
}

pub fn list_rolls(conn: &Connection) -> anyhow::Result<Vec<RollRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, started_at, completed_at, student_states
         FROM rolls
         ORDER BY completed_at DESC, id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, Option<String>>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, name, started_at, completed_at, raw_states) = row?;
        out.push(RollRecord {
            id,
            name,
            started_at,
            completed_at,
            student_states: serde_json::from_str(&raw_states)?,
        });
    }
    Ok(out)
}
