use sqlx::Row;
use sqlx::sqlite::SqlitePoolOptions;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let key_filter = args.get(1).cloned();

    let database_url = "sqlite://gunsub.db";
    let pool = SqlitePoolOptions::new()
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    let rows = sqlx::query("SELECT key, value FROM kv ORDER BY key")
        .fetch_all(&pool)
        .await?;

    if rows.is_empty() {
        println!("Store is empty.");
        return Ok(());
    }

    for row in rows {
        let key: String = row.get("key");
        if let Some(ref filter) = key_filter {
            if &key != filter {
                continue;
            }
        }

        let value: String = row.get("value");
        println!("Key: {}", key);
        println!(
            "--------------------------------------------------------------------------------"
        );
        match serde_json::from_str::<serde_json::Value>(&value) {
            Ok(parsed) => println!("{}", serde_json::to_string_pretty(&parsed)?),
            Err(_) => println!("{}", value),
        }
        println!();
    }

    Ok(())
}
