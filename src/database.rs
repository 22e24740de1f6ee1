use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};

use crate::configuration::DatabaseSettings;

pub fn get_connection_pool(configuration: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(
            configuration.acquire_timeout,
        ))
        .max_connections(configuration.max_connections)
        .min_connections(configuration.min_connections)
        .connect_lazy_with(configuration.with_db())
}

#[tracing::instrument(name = "Create Database", skip(config), fields(database = %config.name))]
pub async fn create_database(config: &DatabaseSettings) -> Result<(), anyhow::Error> {
    let mut connection = PgConnection::connect_with(&config.without_db()).await?;

    let db_count: i64 =
        sqlx::query_scalar::<_, i64>("SELECT count(*) FROM pg_database WHERE datname = $1")
            .bind(&config.name)
            .fetch_one(&mut connection)
            .await?;

    if db_count > 0 {
        tracing::info!("Database {} already exists.", &config.name);
    } else {
        connection
            .execute(format!(r#"CREATE DATABASE "{}";"#, config.name).as_str())
            .await?;
        tracing::info!("Database {} created.", &config.name);
    }
    Ok(())
}

#[tracing::instrument(name = "Migrate Database", skip(config), fields(database = %config.name))]
pub async fn migrate_database(config: &DatabaseSettings) -> Result<PgPool, anyhow::Error> {
    create_database(config).await?;
    let connection_pool = PgPool::connect_with(config.with_db()).await?;
    sqlx::migrate!("./migrations").run(&connection_pool).await?;
    tracing::info!("Migrations applied.");
    Ok(connection_pool)
}
