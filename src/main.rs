use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use tally::list::ListSession;
use tally::notify::ChangeBus;
use tally::provider::{constants, Record, RecordProvider, Scalar};
use tally::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "tally", about = "URI-routed record store with an async feed list")]
struct Args {
    /// Database path (use :memory: for a throwaway store)
    #[arg(long, default_value = "tally.db")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert a record into the constants collection
    Add {
        title: String,
        #[arg(long)]
        value: Option<f64>,
    },
    /// List all records, title ascending
    List,
    /// Show one record by id
    Get { id: i64 },
    /// Update the value of a record
    Set { id: i64, value: f64 },
    /// Delete a record by id
    Remove { id: i64 },
    /// Fetch a feed and print its items
    Fetch { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Fetch { url } => fetch_feed(&url).await,
        command => run_record_command(&args.db, command).await,
    }
}

async fn run_record_command(db_path: &str, command: Command) -> Result<()> {
    let db = Database::open(db_path)
        .await
        .context("failed to open database")?;
    let bus = Arc::new(ChangeBus::new());
    let provider = RecordProvider::new(db, bus);
    let collection = constants::content_uri();

    match command {
        Command::Add { title, value } => {
            let mut record = Record::new().set(constants::TITLE, title);
            if let Some(value) = value {
                record = record.set(constants::VALUE, value);
            }
            let created = provider.insert(&collection, &record).await?;
            println!("created {created}");
        }
        Command::List => {
            let cursor = provider.query(&collection, None, None, &[], None).await?;
            for record in cursor.rows() {
                print_record(record);
            }
        }
        Command::Get { id } => {
            let cursor = provider
                .query(&collection.item(id), None, None, &[], None)
                .await?;
            match cursor.rows().first() {
                Some(record) => print_record(record),
                None => println!("no record {id}"),
            }
        }
        Command::Set { id, value } => {
            let count = provider
                .update(
                    &collection.item(id),
                    &Record::new().set(constants::VALUE, value),
                    None,
                    &[],
                )
                .await?;
            println!("{count} row(s) updated");
        }
        Command::Remove { id } => {
            let count = provider.delete(&collection.item(id), None, &[]).await?;
            println!("{count} row(s) removed");
        }
        Command::Fetch { .. } => unreachable!("handled in main"),
    }

    Ok(())
}

async fn fetch_feed(url: &str) -> Result<()> {
    let mut session = ListSession::new(reqwest::Client::new());
    session.load(url)?;

    if !session.next_feed().await {
        anyhow::bail!("fetch failed (see log for details)");
    }

    let adapter = session.adapter().context("no feed loaded")?;
    for position in 0..adapter.len() {
        if let Some(item) = adapter.item(position) {
            println!("{:>3}. {}  <{}>", adapter.item_id(position), item.title, item.link);
        }
    }

    Ok(())
}

fn print_record(record: &Record) {
    let id = record
        .get(constants::ID)
        .and_then(Scalar::as_integer)
        .unwrap_or_default();
    let title = record
        .get(constants::TITLE)
        .and_then(Scalar::as_text)
        .unwrap_or("");
    let value = record
        .get(constants::VALUE)
        .and_then(Scalar::as_real)
        .unwrap_or_default();
    println!("{id:>4}  {title}  =  {value}");
}
