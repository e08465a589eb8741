use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::{info, warn};
use rusqlite::Connection;

use hpcc::db::job::load::{job_exists, load_job, load_jobs};
use hpcc::db::job::update::{insert_job, update_status};
use hpcc::db::job::JobRecord;
use hpcc::job::{JobDescriptor, StatusCode, StatusReport};
use hpcc::registry::ManagerRegistry;
use hpcc::request::read::get_message_paths;
use hpcc::request::schema::load_schema;
use hpcc::request::{JobRequest, Message};

#[derive(Parser, Debug)]
#[command(name = "hpcc")]
#[command(author, version, about = "Submit and track jobs on batch schedulers", long_about = None)]
pub struct Args {
    /// Directory holding the job database (default: ~/.hpcc)
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,
    /// Don't keep changes to the job database
    #[arg(long)]
    pub dry_run: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a job request file, or every .json request in a directory
    Submit { path: PathBuf },
    /// Query the scheduler for a job's status
    Status {
        local_id: String,
        /// Query even if an error was recorded before
        #[arg(long)]
        refresh: bool,
    },
    /// Remove a job from its scheduler's queue
    Delete { local_id: String },
    /// List recorded jobs
    List,
}

pub fn run(command: Command, conn: &Connection, registry: &ManagerRegistry) -> Result<()> {
    match command {
        Command::Submit { path } => {
            let paths = get_message_paths(&path).with_context(|| format!("Can't read {}", path.display()))?;
            if paths.is_empty() {
                warn!("No job requests found in {}", path.display());
            }
            for path in paths {
                submit(conn, registry, path)?;
            }
        }
        Command::Status { local_id, refresh } => {
            let report = status(conn, registry, &local_id, refresh)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Delete { local_id } => {
            let record = find(conn, &local_id)?;
            let manager = registry.get_or_create(&record.backend, &record.target, &record.bin_path)?;
            let deleted = manager.delete(&record.scheduler_id)?;
            println!("{} {}", local_id, if deleted { "deleted" } else { "not deleted" });
        }
        Command::List => {
            for record in load_jobs(conn)? {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    record.local_id, record.backend, record.target, record.scheduler_id, record.status, record.submitted_at
                );
            }
        }
    }
    Ok(())
}

fn submit(conn: &Connection, registry: &ManagerRegistry, path: PathBuf) -> Result<()> {
    let message = Message { path, compiled_schema: load_schema()? };
    let request: JobRequest = message.read()?;
    if let Some(id) = &request.job.id {
        if job_exists(conn, id)? {
            bail!("Job {} is already in the job database, use a new ID to submit again", id);
        }
    }

    let dependencies = request
        .job
        .depends_on
        .iter()
        .map(|id| {
            let record = find(conn, id)?;
            Ok(Arc::new(JobDescriptor::submitted(&record.local_id, &record.scheduler_id, record.status)))
        })
        .collect::<Result<Vec<_>>>()?;

    let job = request.job.descriptor(dependencies)?;
    let manager = registry.get_or_create(&request.backend, &request.target, &request.bin_path)?;
    job.set_manager(manager);
    let scheduler_id = job.submit(request.overwrite, &request.options)?;

    insert_job(
        conn,
        &JobRecord {
            local_id: job.id().to_string(),
            backend: request.backend.clone(),
            target: request.target.clone(),
            bin_path: request.bin_path.clone(),
            scheduler_id: scheduler_id.clone(),
            num_tasks: job.num_tasks(),
            status: StatusCode::Wait,
            submitted_at: Utc::now().to_rfc3339(),
        },
    )?;
    println!("{}\t{}", job.id(), scheduler_id);
    Ok(())
}

/// Status of a recorded job; a recorded error is returned without asking the scheduler
fn status(conn: &Connection, registry: &ManagerRegistry, local_id: &str, refresh: bool) -> Result<StatusReport> {
    let record = find(conn, local_id)?;
    let job = JobDescriptor::builder()
        .id(&record.local_id)
        .tasks(record.num_tasks)
        .already_submitted(&record.scheduler_id, record.status)
        .build()?;
    let manager = registry.get_or_create(&record.backend, &record.target, &record.bin_path)?;
    job.set_manager(manager);

    let report = if refresh { job.refresh_status()? } else { job.status()? };
    if report.code() != record.status {
        update_status(conn, local_id, report.code())?;
    }
    info!("{} ({}) is {}", local_id, record.scheduler_id, report.code());
    Ok(report)
}

fn find(conn: &Connection, local_id: &str) -> Result<JobRecord> {
    load_job(conn, local_id)?.ok_or_else(|| anyhow!("No job {} in the job database", local_id))
}
