use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Ledger, LedgerView, NoCatalog, TransactionType, ViewFilter};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "rawstock_admin")]
#[command(about = "Admin utilities for Rawstock (inspect and soft-delete batches)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./rawstock.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print batches and reconciliation groups.
    View(ViewArgs),
    /// Soft-delete a batch by id (or `legacy:` key).
    DeleteBatch(DeleteBatchArgs),
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Only batches of this type, e.g. `CHECK_OUT`.
    #[arg(long = "type")]
    kind: Option<String>,
    #[arg(long)]
    branch: Option<String>,
    /// Show deleted batches instead of active ones.
    #[arg(long)]
    archive: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DeleteBatchArgs {
    #[arg(long)]
    batch_id: String,
    /// Name recorded as `deleted_by`.
    #[arg(long)]
    actor: String,
}

fn parse_type(raw: &str) -> Result<TransactionType, String> {
    TransactionType::try_from(raw).map_err(|err| err.to_string())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn print_view(view: &LedgerView) {
    for batch in &view.batches {
        println!(
            "{}  {}  {:<10}  {:<12}  qty {:>6}  lines {:>3}  by {}{}",
            batch.date,
            batch.branch_name,
            batch.kind,
            batch.group_key,
            batch.total_qty,
            batch.items.len(),
            batch.user_name,
            batch
                .deleted_by
                .as_deref()
                .map(|by| format!("  (deleted by {by})"))
                .unwrap_or_default()
        );
    }

    if !view.groups.is_empty() {
        println!();
        for group in &view.groups {
            println!(
                "{}  {}  {:<14}  out {:>6}  in {:>6}",
                group.date, group.branch_name, group.status, group.checked_out_qty, group.checked_in_qty
            );
        }
        let summary = view.summary();
        println!(
            "\n{} groups: {} complete, {} missing return, {} only return",
            summary.total, summary.complete, summary.missing_return, summary.only_return
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let ledger = Ledger::builder().database(db).build().await?;

    match cli.command {
        Command::View(args) => {
            let mut filter = ViewFilter::default();
            if let Some(raw) = args.kind.as_deref() {
                match parse_type(raw) {
                    Ok(kind) => filter = filter.kind(kind),
                    Err(err) => {
                        eprintln!("{err}");
                        std::process::exit(2);
                    }
                }
            }
            if let Some(branch) = args.branch {
                filter = filter.branch_id(branch);
            }

            let view = if args.archive {
                ledger.archive_view(&filter, &NoCatalog).await
            } else {
                ledger.active_view(&filter, &NoCatalog).await
            };

            if args.json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }
        Command::DeleteBatch(args) => {
            let receipt = ledger.delete_batch_id(&args.batch_id, &args.actor).await?;
            if let Some(warning) = receipt.warning {
                eprintln!("batch deleted locally only: {warning}");
                std::process::exit(1);
            }
            if receipt.stamped == 0 {
                println!("batch already deleted: {}", args.batch_id);
            } else {
                println!("deleted batch {} ({} lines)", args.batch_id, receipt.stamped);
            }
        }
    }

    Ok(())
}
