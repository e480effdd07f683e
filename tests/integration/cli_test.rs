// Strata CLI Integration Tests

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::{NamedTempFile, TempDir};

#[path = "../common/mod.rs"]
mod common;

use common::{crash, ensure_blocks, test_config, write_int, TEST_FILE};
use std::sync::Arc;
use stratadb::{BlockId, Database, DiskManager, LogManager, LogRecord};

fn strata(db_dir: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_strata"));
    command
        .arg("--db-dir")
        .arg(db_dir)
        .args(["--block-size", "400"])
        .args(args);
    // Keep the shell's history file out of the source tree
    if let Some(parent) = db_dir.parent() {
        command.current_dir(parent);
    }
    command
}

fn stdout_of(output: &Output) -> Result<String> {
    Ok(String::from_utf8(output.stdout.clone())?)
}

// A database whose log ends with a committed write of 1 by transaction 2
// and an abandoned write of 9999 by transaction 3
fn crashed_database(dir: &TempDir) -> Result<()> {
    let db = Database::open(test_config(dir))?;
    ensure_blocks(&db, TEST_FILE, 2)?;
    let block = BlockId::new(TEST_FILE, 1);
    write_int(&db, &block, 80, 1)?;

    let mut tx3 = db.new_transaction()?;
    tx3.pin(&block)?;
    tx3.set_int(&block, 80, 9999, true)?;
    db.buffer_pool().flush_all(tx3.id())?;
    crash(db, vec![tx3]);
    Ok(())
}

fn snapshot(db_dir: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(db_dir)? {
        let entry = entry?;
        files.push((entry.file_name().to_string_lossy().into_owned(), fs::read(entry.path())?));
    }
    files.sort();
    Ok(files)
}

#[test]
fn test_cli_log_command() -> Result<()> {
    let dir = tempfile::tempdir()?;
    crashed_database(&dir)?;
    let db_dir = dir.path().join("db");

    let output = strata(&db_dir, &["log"]).output()?;
    assert!(output.status.success(), "CLI log command failed");

    let output_str = stdout_of(&output)?;
    let lines: Vec<&str> = output_str.lines().collect();
    assert_eq!(lines.len(), 7, "unexpected log dump: {}", output_str);
    assert!(lines[0].ends_with("<SETINT 3 [file testfile, block 1] 80 1>"));
    assert!(lines[1].ends_with("<START 3>"));
    assert!(lines[2].ends_with("<COMMIT 2>"));
    assert!(lines[3].ends_with("<SETINT 2 [file testfile, block 1] 80 0>"));
    assert!(lines[4].ends_with("<START 2>"));
    assert!(lines[5].ends_with("<COMMIT 1>"));
    assert!(lines[6].ends_with("<START 1>"));

    let raw = strata(&db_dir, &["log", "--raw"]).output()?;
    assert!(raw.status.success(), "CLI log --raw command failed");
    let raw_str = stdout_of(&raw)?;
    assert_eq!(raw_str.lines().count(), 14);
    // START 3: opcode 1, txnum 3
    assert!(raw_str.contains("0100000003000000"));
    Ok(())
}

#[test]
fn test_cli_info_command() -> Result<()> {
    let dir = tempfile::tempdir()?;
    crashed_database(&dir)?;
    let db_dir = dir.path().join("db");

    let output = strata(&db_dir, &["info"]).output()?;
    assert!(output.status.success(), "CLI info command failed");

    let output_str = stdout_of(&output)?;
    assert!(output_str.contains("Block size:         400 bytes"));
    assert!(output_str.contains("Log records:        7 (0 malformed)"));
    assert!(output_str.contains("Last checkpoint:    none"));
    assert!(output_str.contains("Data file:          testfile (2 blocks)"));
    assert!(output_str.contains("Blocks read by info:"));
    Ok(())
}

#[test]
fn test_cli_reports_malformed_records() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_dir = dir.path().join("db");
    {
        let disk_manager = Arc::new(DiskManager::new(&db_dir, 400)?);
        let log_manager = LogManager::new(disk_manager, "stratadb.log")?;
        log_manager.append(&LogRecord::Start { txn_id: 1 }.to_bytes()?)?;
        // opcode 9 is not a record type
        log_manager.append(&[9, 0, 0, 0, 1, 0, 0, 0])?;
        let lsn = log_manager.append(&LogRecord::Checkpoint.to_bytes()?)?;
        log_manager.flush(lsn)?;
    }

    let output = strata(&db_dir, &["info"]).output()?;
    assert!(output.status.success(), "CLI info command failed");
    let output_str = stdout_of(&output)?;
    assert!(output_str.contains("Log records:        3 (1 malformed)"));
    assert!(output_str.contains("Last checkpoint:    0 records from the end"));

    let output = strata(&db_dir, &["log"]).output()?;
    assert!(output.status.success(), "CLI log command failed");
    let lines: Vec<String> = stdout_of(&output)?.lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("<CHECKPOINT>"));
    assert!(lines[1].contains("<malformed:"));
    assert!(lines[2].ends_with("<START 1>"));
    Ok(())
}

#[test]
fn test_cli_inspection_leaves_database_unchanged() -> Result<()> {
    let dir = tempfile::tempdir()?;
    crashed_database(&dir)?;
    let db_dir = dir.path().join("db");
    fs::write(db_dir.join("temp7"), b"scratch")?;
    let before = snapshot(&db_dir)?;

    assert!(strata(&db_dir, &["info"]).output()?.status.success());
    assert!(strata(&db_dir, &["log", "--raw"]).output()?.status.success());

    assert_eq!(snapshot(&db_dir)?, before);

    // The abandoned write is still undone by the next real open
    let db = Database::open(test_config(&dir))?;
    let mut tx = db.new_transaction()?;
    let block = BlockId::new(TEST_FILE, 1);
    tx.pin(&block)?;
    assert_eq!(tx.get_int(&block, 80)?, 1);
    tx.commit()?;
    Ok(())
}

#[test]
fn test_cli_inspection_requires_log() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_dir = dir.path().join("db");
    fs::create_dir_all(&db_dir)?;
    fs::write(db_dir.join("temp7"), b"scratch")?;

    for command in ["info", "log"] {
        let output = strata(&db_dir, &[command]).output()?;
        assert!(!output.status.success(), "{} should fail without a log", command);
        assert!(String::from_utf8(output.stderr)?.contains("missing or empty"));
    }

    let names: Vec<String> = snapshot(&db_dir)?.into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["temp7".to_string()]);

    let output = strata(&dir.path().join("nowhere"), &["info"]).output()?;
    assert!(!output.status.success());
    assert!(!dir.path().join("nowhere").exists());
    Ok(())
}

#[test]
fn test_cli_shell_rollback() -> Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let db = Database::open(test_config(&dir))?;
        ensure_blocks(&db, TEST_FILE, 2)?;
        write_int(&db, &BlockId::new(TEST_FILE, 1), 80, 1717)?;
    }
    let db_dir = dir.path().join("db");

    let mut input_file = NamedTempFile::new()?;
    writeln!(input_file, "begin")?;
    writeln!(input_file, "pin testfile 1")?;
    writeln!(input_file, "setint testfile 1 80 4242")?;
    writeln!(input_file, "getint testfile 1 80")?;
    writeln!(input_file, "rollback")?;
    writeln!(input_file, "begin")?;
    writeln!(input_file, "pin testfile 1")?;
    writeln!(input_file, "getint testfile 1 80")?;
    writeln!(input_file, "commit")?;
    writeln!(input_file, "getint testfile 1 80")?;
    writeln!(input_file, "exit")?;
    input_file.flush()?;

    let output = strata(&db_dir, &["shell"])
        .stdin(Stdio::from(input_file.reopen()?))
        .output()?;
    assert!(output.status.success(), "CLI shell interaction failed");

    let output_str = stdout_of(&output)?;
    assert!(output_str.contains("Welcome to the Strata shell"));
    assert!(output_str.contains("Recovered existing database."));

    let values: Vec<&str> = output_str
        .lines()
        .filter(|line| line.ends_with("4242") || line.ends_with("1717"))
        .collect();
    assert_eq!(values.len(), 2, "unexpected shell output: {}", output_str);
    assert!(values[0].ends_with("4242"));
    assert!(values[1].ends_with("1717"));
    assert!(output_str.contains("Rolled back transaction"));
    assert!(output_str.contains("Committed transaction"));
    assert!(output_str.contains("Error: no active transaction"));

    let db = Database::open(test_config(&dir))?;
    assert_eq!(common::read_int(&db, &BlockId::new(TEST_FILE, 1), 80)?, 1717);
    Ok(())
}

#[test]
fn test_cli_shell_rolls_back_after_timeout() -> Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let db = Database::open(test_config(&dir))?;
        ensure_blocks(&db, TEST_FILE, 2)?;
    }
    let db_dir = dir.path().join("db");

    let mut input_file = NamedTempFile::new()?;
    writeln!(input_file, "begin")?;
    writeln!(input_file, "pin testfile 0")?;
    writeln!(input_file, "setint testfile 0 8 55")?;
    writeln!(input_file, "pin testfile 1")?;
    writeln!(input_file, "getint testfile 0 8")?;
    writeln!(input_file, "exit")?;
    input_file.flush()?;

    let output = strata(&db_dir, &["--pool-size", "1", "--max-wait-ms", "100", "shell"])
        .stdin(Stdio::from(input_file.reopen()?))
        .output()?;
    assert!(output.status.success(), "CLI shell interaction failed");

    let output_str = stdout_of(&output)?;
    assert!(output_str.contains("after timeout"), "unexpected shell output: {}", output_str);
    // The transaction is gone, so the next block access has nothing to run in
    assert!(output_str.contains("Error: no active transaction"));

    let db = Database::open(test_config(&dir))?;
    assert_eq!(common::read_int(&db, &BlockId::new(TEST_FILE, 0), 8)?, 0);
    Ok(())
}
