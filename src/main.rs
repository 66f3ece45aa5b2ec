#[macro_use]
extern crate rocket;

mod api;
mod cors;
mod db;
mod env;
mod error;
mod models;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_create_attendance, api_create_attendance_batch, api_create_student, api_delete_attendance,
    api_get_courses, api_get_history, api_get_latest_attendance, api_get_students,
    api_get_subjects, api_update_attendance, bad_request, health, internal_error, not_found,
    unprocessable_entity,
};
use cors::{Cors, preflight};
use env::EnvFileStatus;
use rocket::{Build, Rocket};
use telemetry::TelemetryFairing;
use thiserror::Error;

use sqlx::SqlitePool;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Env(#[from] dotenvy::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("{0}")]
    Rocket(#[from] rocket::Error),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let env_files = env::load_environment()?;

    telemetry::init_tracing();

    for status in env_files {
        match status {
            EnvFileStatus::Loaded(path) => info!("Loaded environment from: {}", path),
            EnvFileStatus::Missing(path) => {
                warn!("Warning: Environment file {} not found, skipping", path)
            }
        }
    }

    let database_url = env::database_url();
    let pool = SqlitePool::connect_with(db::connect_options(&database_url)?).await?;

    info!("Running database migrations...");
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        return Err(e.into());
    }
    info!("Migrations completed successfully");

    let launched = init_rocket(pool).launch().await;

    telemetry::shutdown_telemetry();

    launched?;
    Ok(())
}

pub fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting attendance tracker");

    rocket::build()
        .manage(pool)
        .mount(
            "/",
            routes![
                api_get_courses,
                api_get_subjects,
                api_get_students,
                api_get_latest_attendance,
                api_create_attendance,
                api_create_attendance_batch,
                api_get_history,
                api_update_attendance,
                api_delete_attendance,
                api_create_student,
                health,
                preflight,
            ],
        )
        .register(
            "/",
            catchers![bad_request, not_found, unprocessable_entity, internal_error],
        )
        .attach(TelemetryFairing)
        .attach(Cors)
}
