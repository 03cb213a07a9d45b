use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use reactivate_lib::dates::DateNormalizer;
use reactivate_lib::db::{
    backup_database, with_store, ClientDb, ClientStore, OpenStore, SqliteLocation,
};
use reactivate_lib::email::{MessageTemplate, OutboxTransport};
use reactivate_lib::ingest::{ingest_interactive, ingest_staging_file};
use reactivate_lib::lifecycle::{archive_overdue_between, reschedule, sweep_rem_date_in_past};
use reactivate_lib::outreach::{commit, decline, propose, Dispatch};
use reactivate_lib::selector::select_due;
use reactivate_lib::state::{load_config, load_config_at, DataPaths};
use reactivate_lib::types::{ClientKey, Config};
use reactivate_lib::validate::{InteractiveInput, RecordValidator};

#[derive(Debug, Parser)]
#[command(name = "reactivate", version, about = "Remind lapsed clients that you miss them")]
struct Cli {
    /// Config file (defaults to ~/.reactivate/config.json).
    #[arg(long, global = true, env = "REACTIVATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Add one client by hand.
    Add {
        first_name: String,
        last_name: String,
        /// Date of last visit, M/D/Y or M-D-Y.
        last_visit: String,
        /// When to remind (defaults to 30 days from today).
        #[arg(long)]
        rem_date: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Import the staging file; rejected lines are written back for fixing.
    Import {
        #[arg(long)]
        staging: Option<PathBuf>,
    },

    /// List clients due for a reminder.
    Due,

    /// Email every due client that has an address, after confirmation.
    Contact {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Count a contact for every client whose reminder date has passed.
    Sweep,

    /// Move clients contacted more than the threshold into the archive.
    Archive {
        #[arg(long)]
        threshold: Option<u32>,
    },

    /// Set a new reminder date for a client.
    Reschedule {
        first_name: String,
        last_name: String,
        date: String,
    },

    /// Show stored clients matching a name.
    Show { first_name: String, last_name: String },

    /// Copy the client database to a backup file.
    Backup { dest: PathBuf },

    /// Delete every client from the active list (or the archive).
    Clear {
        #[arg(long)]
        archive: bool,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config_at(path),
        None => load_config(),
    }
    .context("Failed to load config")?;
    let paths = DataPaths::resolve(&config)?;
    let active = SqliteLocation::new(&paths.db);
    let archive = SqliteLocation::new(&paths.archive);
    let dates = DateNormalizer::new(&config);

    match cli.command {
        Commands::Add {
            first_name,
            last_name,
            last_visit,
            rem_date,
            email,
        } => {
            let mut input = InteractiveInput::new(&first_name, &last_name, &last_visit);
            input.reminder_date = rem_date;
            input.email = email;
            let outcome = ingest_interactive(&active, &RecordValidator::new(dates), &input);
            println!("{}", outcome.message);
        }

        Commands::Import { staging } => {
            let staging = staging.unwrap_or(paths.staging);
            let report = ingest_staging_file(&staging, &active, &RecordValidator::new(dates))?;
            for name in &report.written {
                println!("Added {}", name);
            }
            for (bucket, lines) in &report.failures {
                println!("{}:", bucket.label());
                for rejected in lines {
                    println!("  {}", rejected.line);
                }
            }
            println!("{}", report.summary());
        }

        Commands::Due => {
            let due = with_store(&active, |store| select_due(&*store, &dates))?;
            if due.is_empty() {
                println!("No clients are due.");
            }
            for client in due {
                println!("{}", client);
            }
        }

        Commands::Contact { yes } => contact(&config, &paths, &active, &archive, &dates, yes)?,

        Commands::Sweep => {
            let swept = with_store(&active, |store| sweep_rem_date_in_past(store, &dates))?;
            println!("Counted a contact for {} overdue clients.", swept);
        }

        Commands::Archive { threshold } => {
            let threshold = threshold.unwrap_or(config.removal_threshold);
            let moved = archive_overdue_between(&active, &archive, threshold)?;
            println!("Archived {} clients.", moved.len());
        }

        Commands::Reschedule {
            first_name,
            last_name,
            date,
        } => {
            let key = ClientKey::new(&first_name, &last_name);
            let updated = with_store(&active, |store| reschedule(store, &dates, &key, &date))?;
            println!("Rescheduled {} clients.", updated);
        }

        Commands::Show {
            first_name,
            last_name,
        } => {
            let key = ClientKey::new(&first_name, &last_name);
            let rows = with_store(&active, |store| store.find_clients(&key))?;
            if rows.is_empty() {
                println!("No client named {} {}.", first_name, last_name);
            }
            for (_, row) in rows {
                println!("{}", serde_json::to_string_pretty(&row)?);
            }
        }

        Commands::Backup { dest } => {
            let db = ClientDb::open_at(paths.db.clone())?;
            let written = backup_database(&db, &dest)?;
            println!("Backed up to {}", written.display());
        }

        Commands::Clear { archive: from_archive, yes } => {
            let target = if from_archive { &archive } else { &active };
            if !yes && !confirm(&format!("Delete every client in {}?", target.describe()))? {
                println!("Nothing was deleted.");
                return Ok(());
            }
            let removed = with_store(target, |store| store.clear())?;
            println!("Deleted {} clients.", removed);
        }
    }
    Ok(())
}

fn contact(
    config: &Config,
    paths: &DataPaths,
    active: &SqliteLocation,
    archive: &SqliteLocation,
    dates: &DateNormalizer,
    yes: bool,
) -> anyhow::Result<()> {
    let due = with_store(active, |store| select_due(&*store, dates))?;
    let token = propose(due, dates);
    for client in token.skipped() {
        println!("No email on file, skipping: {}", client);
    }
    if token.is_empty() {
        println!("No emails were sent.");
        decline(token);
        return Ok(());
    }
    for client in token.recipients() {
        println!("{}", client);
    }

    let count = token.recipients().len();
    if !yes && !confirm(&format!(
        "Are you sure you want to email {} client{}?",
        count,
        if count > 1 { "s" } else { "" }
    ))? {
        decline(token);
        println!("No emails were sent.");
        return Ok(());
    }

    let template = MessageTemplate::load(paths.template.as_deref())?;
    let mut transport = OutboxTransport::new(&paths.outbox);
    let outcome = commit(
        token,
        Dispatch {
            template: &template,
            sender: &config.sender,
            transport: &mut transport,
            dates,
            removal_threshold: config.removal_threshold,
        },
        active,
        archive,
    )?;
    println!(
        "Email(s) queued for {}: {}",
        paths.outbox.display(),
        outcome.sent.join(", ")
    );
    for (name, reason) in &outcome.failed {
        println!("Not sent to {}: {}", name, reason);
    }
    if !outcome.archived.is_empty() {
        println!("Archived: {}", outcome.archived.join(", "));
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

