use anyhow::Result;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "monitore")]
#[command(about = "Monitore occurrence-reporting CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export canonical JSON Schemas to the ./schemas directory
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Create the database file and its tables
    DbInit {
        /// Database path
        #[arg(long, default_value = "monitore.db")]
        db: String,
    },
    /// Ensure the well-known admin account exists (idempotent)
    Bootstrap {
        /// Database path
        #[arg(long, default_value = "monitore.db")]
        db: String,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
        Commands::DbInit { db } => db_init(&db),
        Commands::Bootstrap { db } => bootstrap(&db),
    }
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    let occurrence_schema = schema_for!(monitore_core::schema::Occurrence);
    let occurrence_json = serde_json::to_string_pretty(&occurrence_schema)?;
    fs::write(out_dir.join("Occurrence.schema.json"), occurrence_json)?;

    let history_schema = schema_for!(monitore_core::schema::HistoryEntry);
    let history_json = serde_json::to_string_pretty(&history_schema)?;
    fs::write(out_dir.join("HistoryEntry.schema.json"), history_json)?;

    let submission_schema = schema_for!(monitore_core::schema::NewOccurrence);
    let submission_json = serde_json::to_string_pretty(&submission_schema)?;
    fs::write(out_dir.join("NewOccurrence.schema.json"), submission_json)?;

    let change_schema = schema_for!(monitore_core::notify::ChangeEvent);
    let change_json = serde_json::to_string_pretty(&change_schema)?;
    fs::write(out_dir.join("ChangeEvent.schema.json"), change_json)?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

fn db_init(db: &str) -> Result<()> {
    monitore_core::db::open(db)?;
    println!("Initialized database at {db}");
    Ok(())
}

fn bootstrap(db: &str) -> Result<()> {
    let mut conn = monitore_core::db::open(db)?;
    let outcome = monitore_core::bootstrap::ensure_admin(&mut conn)?;
    if outcome.user_exists {
        println!("Admin user already exists ({})", outcome.user_id);
    } else {
        println!("Admin user created ({})", outcome.user_id);
    }
    Ok(())
}
