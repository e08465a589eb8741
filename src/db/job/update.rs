use log::info;
use rusqlite::{params, Connection};

use crate::db::job::JobRecord;
use crate::job::StatusCode;

pub fn insert_job(conn: &Connection, record: &JobRecord) -> rusqlite::Result<()> {
    info!("Recording job {} with scheduler ID {}", record.local_id, record.scheduler_id);
    conn.execute(
        "INSERT INTO job (local_id, backend, target, bin_path, scheduler_id, num_tasks, status, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.local_id,
            record.backend,
            record.target,
            record.bin_path,
            record.scheduler_id,
            record.num_tasks,
            record.status.to_string(),
            record.submitted_at,
        ],
    )?;
    Ok(())
}

pub fn update_status(conn: &Connection, local_id: &str, status: StatusCode) -> rusqlite::Result<()> {
    info!("Updating {local_id} with status {status}");
    conn.execute("UPDATE job SET status = ?1 WHERE local_id = ?2", params![status.to_string(), local_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::job::load::{job_exists, load_job, load_jobs};
    use crate::db::open::{init_db, release_or_rollback};

    fn record(local_id: &str) -> JobRecord {
        JobRecord {
            local_id: local_id.to_string(),
            backend: "PBS".to_string(),
            target: "host1".to_string(),
            bin_path: "/opt/pbs/bin".to_string(),
            scheduler_id: "12345.server".to_string(),
            num_tasks: 2,
            status: StatusCode::Wait,
            submitted_at: "2026-10-16T10:02:11+00:00".to_string(),
        }
    }

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn inserted_job_is_loaded() {
        let conn = connection();
        insert_job(&conn, &record("job-1")).unwrap();
        assert_eq!(load_job(&conn, "job-1").unwrap(), Some(record("job-1")));
        assert_eq!(load_job(&conn, "job-2").unwrap(), None);
    }

    #[test]
    fn local_ids_are_unique() {
        let conn = connection();
        assert!(!job_exists(&conn, "job-1").unwrap());
        insert_job(&conn, &record("job-1")).unwrap();
        assert!(job_exists(&conn, "job-1").unwrap());
        assert!(insert_job(&conn, &record("job-1")).is_err());
    }

    #[test]
    fn status_is_updated() {
        let conn = connection();
        insert_job(&conn, &record("job-1")).unwrap();
        update_status(&conn, "job-1", StatusCode::Error).unwrap();
        assert_eq!(load_job(&conn, "job-1").unwrap().unwrap().status, StatusCode::Error);
    }

    #[test]
    fn dry_run_discards_writes() {
        let conn = connection();
        insert_job(&conn, &record("job-1")).unwrap();
        release_or_rollback(&conn, true).unwrap();
        assert!(load_jobs(&conn).unwrap().is_empty());
    }

    #[test]
    fn release_keeps_writes() {
        let conn = connection();
        insert_job(&conn, &record("job-1")).unwrap();
        insert_job(&conn, &record("job-2")).unwrap();
        release_or_rollback(&conn, false).unwrap();
        assert_eq!(load_jobs(&conn).unwrap().len(), 2);
    }
}
