#[path = "../env.rs"]
mod env;

use anyhow::Context;
use env::EnvFileStatus;
use sqlx::SqlitePool;
use tracing::{info, warn};

const COURSES: [&str; 3] = ["1° A", "1° B", "2° A"];

/// Subject name and the courses it is taught in.
const SUBJECTS: [(&str, &[&str]); 5] = [
    ("Matemática", &["1° A", "1° B", "2° A"]),
    ("Lengua", &["1° A", "1° B", "2° A"]),
    ("Historia", &["1° A", "1° B"]),
    ("Biología", &["2° A"]),
    ("Educación Física", &["1° A", "2° A"]),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_files = env::load_environment().context("Failed to load environment files")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    for status in env_files {
        match status {
            EnvFileStatus::Loaded(path) => info!("Loaded environment from: {}", path),
            EnvFileStatus::Missing(path) => warn!("Environment file {} not found, skipping", path),
        }
    }

    let database_url = env::database_url();

    let pool = SqlitePool::connect(&database_url)
        .await
        .with_context(|| format!("Failed to connect to {}", database_url))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cursos")
        .fetch_one(&pool)
        .await?;

    if existing > 0 {
        info!("Database already has {} courses, nothing to seed", existing);
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    let mut course_ids = Vec::with_capacity(COURSES.len());

    for course in COURSES {
        let res = sqlx::query("INSERT INTO cursos (nombre) VALUES (?)")
            .bind(course)
            .execute(&mut *tx)
            .await?;
        course_ids.push((course, res.last_insert_rowid()));
    }

    for (subject, courses) in SUBJECTS {
        let subject_id = sqlx::query("INSERT INTO materias (nombre) VALUES (?)")
            .bind(subject)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for course in courses {
            let course_id = course_ids
                .iter()
                .find(|(name, _)| name == course)
                .map(|(_, id)| *id)
                .with_context(|| format!("Unknown course {} for {}", course, subject))?;

            sqlx::query("INSERT INTO curso_materia (curso_id, materia_id) VALUES (?, ?)")
                .bind(course_id)
                .bind(subject_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;

    info!(
        "Seeded {} courses and {} subjects",
        COURSES.len(),
        SUBJECTS.len()
    );
    Ok(())
}
