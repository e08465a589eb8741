use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use hpcc::db::open::{open_db, release_or_rollback};
use hpcc::registry::ManagerRegistry;
use hpcc::WorkingDirectory;

use crate::cli::Args;

mod cli;

fn main() -> Result<()> {
    env_logger::init();
    info!("hpcc starting up");

    let args = Args::parse();
    let wd = WorkingDirectory { path: args.work_dir.clone().unwrap_or_else(default_work_dir) };
    fs::create_dir_all(&wd.path).with_context(|| format!("Can't create {}", wd.path.display()))?;

    let conn = open_db(&wd).context("Can't open job database")?;
    let registry = ManagerRegistry::new();
    let outcome = cli::run(args.command, &conn, &registry);

    // failed commands still keep whatever was recorded before the failure
    release_or_rollback(&conn, args.dry_run)?;
    outcome
}

fn default_work_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".hpcc")
}
