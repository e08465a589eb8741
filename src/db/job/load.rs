use std::str::FromStr;

use log::info;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::job::JobRecord;
use crate::job::StatusCode;

static COLUMNS: &str = "local_id, backend, target, bin_path, scheduler_id, num_tasks, status, submitted_at";

pub fn load_job(conn: &Connection, local_id: &str) -> rusqlite::Result<Option<JobRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM job WHERE local_id = ?1");
    info!("Loading job {local_id} from db");
    conn.query_row(&sql, [local_id], from_row).optional()
}

pub fn job_exists(conn: &Connection, local_id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM job WHERE local_id = ?1)", [local_id], |row| row.get(0))
}

pub fn load_jobs(conn: &Connection) -> rusqlite::Result<Vec<JobRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM job ORDER BY submitted_at, local_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    rows.collect()
}

fn from_row(row: &Row) -> rusqlite::Result<JobRecord> {
    let status: String = row.get(6)?;
    let status = StatusCode::from_str(&status)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(err)))?;
    Ok(JobRecord {
        local_id: row.get(0)?,
        backend: row.get(1)?,
        target: row.get(2)?,
        bin_path: row.get(3)?,
        scheduler_id: row.get(4)?,
        num_tasks: row.get(5)?,
        status,
        submitted_at: row.get(7)?,
    })
}
