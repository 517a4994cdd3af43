pub mod booking;
pub mod notification;
pub mod opening_hours;
pub mod payment;
pub mod session;
pub mod stats;
pub mod subscription;
pub mod table;
pub mod user;
pub mod venue;
pub mod webhook_event;

use crate::PGPool;
use log::info;
use sqlx::postgres::PgPoolOptions;

pub async fn init_db_pool(db_url: &str, max_connections: u32) -> Result<PGPool, sqlx::Error> {
    let pool: PGPool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;
    info!("connected to postgresql (max {} connections)", max_connections);
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");
    Ok(pool)
}
