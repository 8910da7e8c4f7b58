use mongodb::bson::doc;
use mongodb::{Client, Database};

use crate::config::AppConfig;

pub async fn get_db_client(config: &AppConfig) -> Database {
    let client = Client::with_uri_str(&config.database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db = client.database(&config.database_name);

    match db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => tracing::info!("✅ Connected to database: {}", config.database_name),
        Err(e) => tracing::warn!(
            "⚠️ Database '{}' did not answer ping: {}",
            config.database_name,
            e
        ),
    }

    db
}
