mod api;
mod db;
mod env;
mod error;
mod models;
mod roll_number;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::str::FromStr;

use api::{
    api_create_school, api_create_student, api_delete_school, api_delete_student,
    api_get_school, api_get_school_students, api_get_schools, api_get_student,
    api_get_students, api_update_school, api_update_student, default_catcher, health,
};
use env::{AppConfig, load_environment};
use error::AppError;
use rocket::{Build, Rocket, catchers, launch, routes};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use telemetry::{TelemetryFairing, init_tracing, shutdown_fairing};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Anyhow(anyhow::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Anyhow(value)
    }
}

async fn prepare_database(config: &AppConfig) -> Result<SqlitePool, Error> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    Ok(pool)
}

async fn startup() -> Result<SqlitePool, Error> {
    load_environment()?;
    let config = AppConfig::from_env()?;
    init_tracing(&config)?;

    info!(
        database_url = %config.database_url,
        otlp_export = config.otlp_endpoint.is_some(),
        "Loaded configuration"
    );

    prepare_database(&config).await
}

#[launch]
async fn rocket() -> _ {
    let pool = match startup().await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Startup failed: {}", e);
            panic!("Startup failed: {}", e);
        }
    };

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting school roster");

    rocket::build()
        .manage(pool)
        .mount(
            "/",
            routes![
                api_create_school,
                api_create_student,
                api_get_students,
                api_get_schools,
                api_get_school,
                api_get_school_students,
                api_get_student,
                api_delete_student,
                api_delete_school,
                api_update_student,
                api_update_school,
                health,
            ],
        )
        .register("/", catchers![default_catcher])
        .attach(TelemetryFairing)
        .attach(shutdown_fairing())
}
