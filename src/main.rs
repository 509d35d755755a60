//! slotdb - command line front end for a slotdb data directory

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use log::info;
use rand::Rng;
use slotdb::access::schema::Schema;
use slotdb::access::value::Value;
use slotdb::config::StorageConfig;
use slotdb::database::{Database, CATALOG_FILE};
use std::path::PathBuf;

/// Inspect and modify heap tables stored in a slotdb data directory
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = "./slotdb_data")]
    data_dir: PathBuf,

    /// Buffer pool capacity in pages
    #[arg(short = 'p', long, default_value_t = StorageConfig::DEFAULT_POOL_CAPACITY)]
    pool_pages: usize,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a table of integer columns
    CreateTable {
        name: String,
        #[arg(long, default_value_t = 2)]
        int_columns: usize,
    },
    /// Insert random rows into a table
    Load {
        name: String,
        #[arg(long, default_value_t = 100)]
        rows: usize,
    },
    /// Print every row of a table
    Scan { name: String },
    /// Delete every row of a table
    DeleteAll { name: String },
    /// List tables
    Tables,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = StorageConfig::default().with_pool_capacity(args.pool_pages);
    let db = if args.data_dir.join(CATALOG_FILE).exists() {
        Database::open(&args.data_dir, config).context("Failed to open database")?
    } else {
        info!("Creating new database in {}", args.data_dir.display());
        Database::create(&args.data_dir, config).context("Failed to create database")?
    };

    match args.command {
        Command::CreateTable { name, int_columns } => {
            let table_id = db
                .create_table(&name, Schema::ints(int_columns)?)
                .with_context(|| format!("Failed to create table {}", name))?;
            println!("Created table {} (id {})", name, table_id);
        }
        Command::Load { name, rows } => {
            let table_id = db.catalog().table_id(&name)?;
            let num_fields = db.catalog().schema(table_id)?.num_fields();
            let mut rng = rand::thread_rng();

            let tid = db.begin();
            for _ in 0..rows {
                let values = (0..num_fields)
                    .map(|_| Value::Int(rng.gen_range(0..1000)))
                    .collect();
                if let Err(e) = db.insert(tid, table_id, values) {
                    db.abort(tid)?;
                    return Err(e).context("Load failed; transaction rolled back");
                }
            }
            db.commit(tid)?;
            println!("Inserted {} rows into {}", rows, name);
        }
        Command::Scan { name } => {
            let table_id = db.catalog().table_id(&name)?;
            let tid = db.begin();
            let tuples = db.scan(tid, table_id)?;
            println!("{}", db.catalog().schema(table_id)?);
            for tuple in &tuples {
                println!("{}", tuple);
            }
            db.commit(tid)?;
            println!("({} rows)", tuples.len());
        }
        Command::DeleteAll { name } => {
            let table_id = db.catalog().table_id(&name)?;
            let tid = db.begin();
            let mut tuples = db.scan(tid, table_id)?;
            for tuple in &mut tuples {
                if let Err(e) = db.buffer_pool().delete_tuple(tid, tuple) {
                    db.abort(tid)?;
                    return Err(e).context("Delete failed; transaction rolled back");
                }
            }
            db.commit(tid)?;
            println!("Deleted {} rows from {}", tuples.len(), name);
        }
        Command::Tables => {
            for table in db.catalog().tables() {
                let pages = db.catalog().table_file(table.table_id)?.num_pages();
                println!(
                    "{}\t{}\t{} pages\t{}",
                    table.table_id, table.table_name, pages, table.schema
                );
            }
        }
    }

    Ok(())
}
