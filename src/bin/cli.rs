use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use rustyline::history::DefaultHistory;

use stratadb::storage::disk::DiskManager;
use stratadb::transaction::wal::{LogIterator, LogRecord};
use stratadb::{BlockId, Database, DatabaseConfig, ReplacementPolicy, Transaction};

const HISTORY_FILE: &str = ".strata_history";

#[derive(Parser)]
#[command(author, version, about = "Strata - inspect and drive a StrataDB database")]
struct Cli {
    /// Database directory
    #[arg(short, long, default_value = "stratadb")]
    db_dir: PathBuf,

    /// Block size in bytes
    #[arg(short, long, default_value_t = stratadb::common::types::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Buffer pool size (number of frames)
    #[arg(short, long, default_value_t = stratadb::common::types::DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Log file name inside the database directory
    #[arg(short, long, default_value = stratadb::common::types::DEFAULT_LOG_FILE)]
    log_file: String,

    /// Maximum wait for a buffer or lock, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    max_wait_ms: u64,

    /// Buffer replacement policy (naive or lru)
    #[arg(long, default_value_t = ReplacementPolicy::Naive)]
    replacement: ReplacementPolicy,

    /// Command to execute
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive shell
    Shell,

    /// Print log records, newest first
    Log {
        /// Also print each record's raw bytes in hex
        #[arg(short, long)]
        raw: bool,
    },

    /// Show database information
    Info,
}

impl Cli {
    fn config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.db_dir)
            .with_block_size(self.block_size)
            .with_pool_size(self.pool_size)
            .with_log_file(self.log_file.clone())
            .with_max_wait(Duration::from_millis(self.max_wait_ms))
            .with_replacement(self.replacement)
    }

    /// Open the directory for inspection; nothing is recovered, created or removed
    fn open_read_only(&self) -> Result<Arc<DiskManager>> {
        let disk_manager = DiskManager::open_read_only(&self.db_dir, self.block_size)
            .with_context(|| format!("cannot inspect {}", self.db_dir.display()))?;
        Ok(Arc::new(disk_manager))
    }

    fn log_records(&self, disk_manager: &Arc<DiskManager>) -> Result<LogIterator> {
        LogIterator::open(Arc::clone(disk_manager), &self.log_file)
            .with_context(|| format!("cannot read log in {}", self.db_dir.display()))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Log { raw }) => dump_log(&cli, raw),
        Some(Commands::Info) => show_info(&cli),
        Some(Commands::Shell) | None => {
            let db = Database::open(cli.config())
                .with_context(|| format!("failed to open {}", cli.db_dir.display()))?;
            run_shell(&db)
        }
    }
}

fn dump_log(cli: &Cli, raw: bool) -> Result<()> {
    let disk_manager = cli.open_read_only()?;
    for (index, bytes) in cli.log_records(&disk_manager)?.enumerate() {
        let bytes = bytes?;
        match LogRecord::from_bytes(&bytes) {
            Ok(record) => println!("{:>6}  {}", index, record),
            Err(err) => println!("{:>6}  <malformed: {}>", index, err),
        }
        if raw {
            println!("        {}", hex::encode(&bytes));
        }
    }
    Ok(())
}

fn show_info(cli: &Cli) -> Result<()> {
    let disk_manager = cli.open_read_only()?;
    let log_records = cli.log_records(&disk_manager)?;

    println!("Database directory: {}", cli.db_dir.display());
    println!("Block size:         {} bytes", disk_manager.block_size());
    println!("Buffer pool:        {} frames ({} replacement)", cli.pool_size, cli.replacement);
    println!("Max wait:           {} ms", cli.max_wait_ms);
    println!("Log file:           {} ({} blocks)", cli.log_file, disk_manager.length(&cli.log_file)?);

    let mut records = 0;
    let mut malformed = 0;
    let mut last_checkpoint = None;
    for bytes in log_records {
        match LogRecord::from_bytes(&bytes?) {
            Ok(LogRecord::Checkpoint) if last_checkpoint.is_none() => last_checkpoint = Some(records),
            Ok(_) => {}
            Err(_) => malformed += 1,
        }
        records += 1;
    }
    println!("Log records:        {} ({} malformed)", records, malformed);
    match last_checkpoint {
        Some(newer) => println!("Last checkpoint:    {} records from the end", newer),
        None => println!("Last checkpoint:    none"),
    }

    let mut data_files = Vec::new();
    for entry in std::fs::read_dir(&cli.db_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != cli.log_file && entry.file_type()?.is_file() {
            data_files.push(name);
        }
    }
    data_files.sort();
    for name in &data_files {
        println!("Data file:          {} ({} blocks)", name, disk_manager.length(name)?);
    }

    println!("Blocks read by info: {}", disk_manager.stats().blocks_read);
    Ok(())
}

fn run_shell(db: &Database) -> Result<()> {
    println!("Welcome to the Strata shell. Type 'help' for assistance or 'exit' to quit.");
    if !db.is_new() {
        println!("Recovered existing database.");
    }

    let mut rl = Editor::<(), DefaultHistory>::new()?;
    if let Err(err) = rl.load_history(HISTORY_FILE) {
        if !err.to_string().contains("No such file or directory") {
            println!("Error loading history: {}", err);
        }
    }

    let mut current: Option<Transaction> = None;
    loop {
        let prompt = match &current {
            Some(tx) => format!("strata[tx {}]> ", tx.id()),
            None => "strata> ".to_string(),
        };

        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match execute(db, &mut current, line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => println!("Error: {:#}", err),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    if let Some(tx) = current.take() {
        println!("Rolling back transaction {}", tx.id());
        tx.rollback()?;
    }
    if let Err(err) = rl.save_history(HISTORY_FILE) {
        println!("Error saving history: {}", err);
    }
    Ok(())
}

/// Run one shell command; returns false when the shell should exit
fn execute(db: &Database, current: &mut Option<Transaction>, line: &str) -> Result<bool> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (command, args) = match words.split_first() {
        Some((command, args)) => (command.to_lowercase(), args),
        None => return Ok(true),
    };

    match command.as_str() {
        "exit" | "quit" => return Ok(false),
        "help" => print_help(),
        "begin" => {
            if let Some(tx) = current {
                bail!("transaction {} is still active", tx.id());
            }
            let tx = db.new_transaction()?;
            println!("Started transaction {}", tx.id());
            *current = Some(tx);
        }
        "commit" => {
            let tx = current.take().ok_or_else(no_transaction)?;
            let id = tx.id();
            tx.commit()?;
            println!("Committed transaction {}", id);
        }
        "rollback" => {
            let tx = current.take().ok_or_else(no_transaction)?;
            let id = tx.id();
            tx.rollback()?;
            println!("Rolled back transaction {}", id);
        }
        "available" => println!("{} unpinned buffers", db.buffer_pool().available()),
        _ => {
            let tx = current.as_mut().ok_or_else(no_transaction)?;
            if let Err(err) = run_in_transaction(tx, &command, args) {
                if err.downcast_ref::<stratadb::TransactionError>().is_some_and(|e| e.is_timeout()) {
                    if let Some(tx) = current.take() {
                        let id = tx.id();
                        tx.rollback()?;
                        println!("Rolled back transaction {} after timeout", id);
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(true)
}

fn run_in_transaction(tx: &mut Transaction, command: &str, args: &[&str]) -> Result<()> {
    match (command, args) {
        ("pin", [file, number]) => {
            let block = parse_block(file, number)?;
            tx.pin(&block)?;
            println!("Pinned {} ({} local pins)", block, tx.pin_count(&block));
        }
        ("unpin", [file, number]) => {
            let block = parse_block(file, number)?;
            tx.unpin(&block)?;
            println!("Unpinned {} ({} local pins)", block, tx.pin_count(&block));
        }
        ("getint", [file, number, offset]) => {
            let block = parse_block(file, number)?;
            println!("{}", tx.get_int(&block, parse_offset(offset)?)?);
        }
        ("setint", [file, number, offset, value]) => {
            let block = parse_block(file, number)?;
            let value: i32 = value.parse().with_context(|| format!("invalid integer '{}'", value))?;
            tx.set_int(&block, parse_offset(offset)?, value, true)?;
        }
        ("getstring", [file, number, offset]) => {
            let block = parse_block(file, number)?;
            println!("{:?}", tx.get_string(&block, parse_offset(offset)?)?);
        }
        ("setstring", [file, number, offset, text @ ..]) if !text.is_empty() => {
            let block = parse_block(file, number)?;
            tx.set_string(&block, parse_offset(offset)?, &text.join(" "), true)?;
        }
        ("size", [file]) => println!("{} blocks", tx.size(file)?),
        ("append", [file]) => println!("Appended {}", tx.append(file)?),
        _ => bail!("unrecognized command or arguments: '{} {}' (try 'help')", command, args.join(" ")),
    }
    Ok(())
}

fn parse_block(file: &str, number: &str) -> Result<BlockId> {
    let number: u32 = number
        .parse()
        .with_context(|| format!("invalid block number '{}'", number))?;
    Ok(BlockId::new(file.to_string(), number))
}

fn parse_offset(offset: &str) -> Result<usize> {
    offset.parse().with_context(|| format!("invalid offset '{}'", offset))
}

fn no_transaction() -> anyhow::Error {
    anyhow!("no active transaction (use 'begin')")
}

fn print_help() {
    println!("Transactions:");
    println!("  begin                              - Start a transaction");
    println!("  commit                             - Commit the current transaction");
    println!("  rollback                           - Roll back the current transaction");
    println!();
    println!("Block access (inside a transaction):");
    println!("  pin <file> <block>                 - Pin a block");
    println!("  unpin <file> <block>               - Unpin a block");
    println!("  getint <file> <block> <offset>     - Read an integer");
    println!("  setint <file> <block> <offset> <n> - Write an integer");
    println!("  getstring <file> <block> <offset>  - Read a string");
    println!("  setstring <file> <block> <offset> <text> - Write a string");
    println!("  size <file>                        - Number of blocks in a file");
    println!("  append <file>                      - Add a block to a file");
    println!();
    println!("Other commands:");
    println!("  available                          - Unpinned buffers in the pool");
    println!("  help                               - Display this help message");
    println!("  exit                               - Exit the shell");
}
