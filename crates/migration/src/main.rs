use sea_orm::Database;
use sea_orm_migration::prelude::*;

const DEFAULT_DATABASE_URL: &str = "sqlite:./rawstock.db?mode=rwc";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cmd = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());
    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = Database::connect(&db_url).await?;

    match cmd.as_str() {
        "up" => migration::Migrator::up(&db, None).await?,
        "down" => migration::Migrator::down(&db, Some(1)).await?,
        "refresh" => migration::Migrator::refresh(&db).await?,
        "status" => migration::Migrator::status(&db).await?,
        "check" => {
            let manager = SchemaManager::new(&db);
            if manager.has_table("stock_transactions").await? {
                println!("stock_transactions present ({db_url})");
            } else {
                eprintln!("stock_transactions missing, run `up` first ({db_url})");
                std::process::exit(1);
            }
        }
        other => {
            eprintln!("unknown command {other:?}");
            eprintln!("Usage: migration [up|down|refresh|status|check]");
            std::process::exit(2);
        }
    }

    Ok(())
}
