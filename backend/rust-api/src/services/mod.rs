use std::time::Duration;

use anyhow::Context;
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use crate::config::Config;

pub mod email_service;
pub mod placement_service;
pub mod progress_service;
pub mod question_service;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let redis = connect_redis(redis_client).await?;

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }
}

async fn connect_redis(client: redis::Client) -> anyhow::Result<ConnectionManager> {
    let manager = tokio::time::timeout(Duration::from_secs(30), ConnectionManager::new(client))
        .await
        .context("Redis connection timeout after 30s")?
        .context("Failed to establish Redis connection")?;

    // Verify the connection actually answers before serving traffic.
    let mut conn = manager.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .context("Redis PING timeout after 5s")?
    .context("Redis PING failed")?;

    tracing::info!("Redis connection established");
    Ok(manager)
}
