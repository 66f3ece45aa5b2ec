use std::cmp::Ordering;
use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    AttendanceRecord, AttendanceState, Course, DbAttendanceRecord, DbCourse, DbHistoryEntry,
    DbStudent, DbSubject, HistoryEntry, NewAttendance, NewStudent, Student, Subject,
};

/// Case- and accent-insensitive ordering for person and subject names.
pub const NAME_COLLATION: &str = "nombres";

/// Connection options shared by the server, the seeding tool and tests.
pub fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?.collation(NAME_COLLATION, compare_names))
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'Á' | 'À' | 'Â' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other.to_lowercase().next().unwrap_or(other),
    }
}

/// Compares folded names first; exact text breaks ties so the order is total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(fold_char)
        .cmp(b.chars().map(fold_char))
        .then_with(|| a.cmp(b))
}

#[instrument]
pub async fn get_all_courses(pool: &Pool<Sqlite>) -> Result<Vec<Course>, AppError> {
    info!("Getting all courses");
    let rows = sqlx::query_as::<_, DbCourse>("SELECT id, nombre FROM cursos ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Course::from).collect())
}

#[instrument]
pub async fn course_exists(pool: &Pool<Sqlite>, course_id: i64) -> Result<bool, AppError> {
    let row = sqlx::query_scalar::<_, i64>("SELECT id FROM cursos WHERE id = ?")
        .bind(course_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

#[instrument]
pub async fn get_subjects_for_course(
    pool: &Pool<Sqlite>,
    course_id: i64,
) -> Result<Vec<Subject>, AppError> {
    info!("Getting subjects for course");
    let rows = sqlx::query_as::<_, DbSubject>(
        "SELECT m.id, m.nombre
         FROM materias m
         JOIN curso_materia cm ON m.id = cm.materia_id
         WHERE cm.curso_id = ?
         ORDER BY m.nombre COLLATE nombres, m.id",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Subject::from).collect())
}

#[instrument]
pub async fn get_students_for_course(
    pool: &Pool<Sqlite>,
    course_id: i64,
) -> Result<Vec<Student>, AppError> {
    info!("Getting students for course");
    let rows = sqlx::query_as::<_, DbStudent>(
        "SELECT id, nombre, apellido, curso_id
         FROM alumnos
         WHERE curso_id = ?
         ORDER BY apellido COLLATE nombres, nombre COLLATE nombres, id",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Student::from).collect())
}

#[instrument]
pub async fn create_student(pool: &Pool<Sqlite>, student: &NewStudent) -> Result<i64, AppError> {
    info!("Creating student");

    if !course_exists(pool, student.course_id).await? {
        return Err(AppError::Validation(format!(
            "El curso {} no existe.",
            student.course_id
        )));
    }

    let res = sqlx::query("INSERT INTO alumnos (nombre, apellido, curso_id) VALUES (?, ?, ?)")
        .bind(&student.name)
        .bind(&student.surname)
        .bind(student.course_id)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

/// Checks that the student belongs to the course and the subject is taught in it.
#[instrument]
pub async fn check_attendance_references(
    pool: &Pool<Sqlite>,
    student_id: i64,
    course_id: i64,
    subject_id: i64,
) -> Result<(), AppError> {
    let student_course = sqlx::query_scalar::<_, i64>("SELECT curso_id FROM alumnos WHERE id = ?")
        .bind(student_id)
        .fetch_optional(pool)
        .await?;

    match student_course {
        None => {
            return Err(AppError::Validation(format!(
                "El alumno {} no existe.",
                student_id
            )));
        }
        Some(found) if found != course_id => {
            return Err(AppError::Validation(format!(
                "El alumno {} no pertenece al curso {}.",
                student_id, course_id
            )));
        }
        Some(_) => {}
    }

    let linked = sqlx::query_scalar::<_, i64>(
        "SELECT materia_id FROM curso_materia WHERE curso_id = ? AND materia_id = ?",
    )
    .bind(course_id)
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    if linked.is_none() {
        return Err(AppError::Validation(format!(
            "La materia {} no está asignada al curso {}.",
            subject_id, course_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn get_latest_attendance(
    pool: &Pool<Sqlite>,
    student_id: i64,
    course_id: i64,
    subject_id: i64,
) -> Result<Option<AttendanceRecord>, AppError> {
    info!("Getting most recent attendance");
    let row = sqlx::query_as::<_, DbAttendanceRecord>(
        "SELECT id, alumno_id, curso_id, materia_id, estado, fecha
         FROM asistencia
         WHERE alumno_id = ? AND curso_id = ? AND materia_id = ?
         ORDER BY fecha DESC, id DESC
         LIMIT 1",
    )
    .bind(student_id)
    .bind(course_id)
    .bind(subject_id)
    .fetch_optional(pool)
    .await?;

    row.map(AttendanceRecord::try_from).transpose()
}

#[instrument]
pub async fn create_attendance_record(
    pool: &Pool<Sqlite>,
    attendance: &NewAttendance,
) -> Result<i64, AppError> {
    info!("Registering attendance");

    check_attendance_references(
        pool,
        attendance.student_id,
        attendance.course_id,
        attendance.subject_id,
    )
    .await?;

    let res = sqlx::query(
        "INSERT INTO asistencia (alumno_id, curso_id, materia_id, estado) VALUES (?, ?, ?, ?)",
    )
    .bind(attendance.student_id)
    .bind(attendance.course_id)
    .bind(attendance.subject_id)
    .bind(attendance.state.code())
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Inserts every registration or none of them.
#[instrument(skip(attendances), fields(count = attendances.len()))]
pub async fn create_attendance_batch(
    pool: &Pool<Sqlite>,
    attendances: &[NewAttendance],
) -> Result<usize, AppError> {
    info!("Registering attendance batch");

    for attendance in attendances {
        check_attendance_references(
            pool,
            attendance.student_id,
            attendance.course_id,
            attendance.subject_id,
        )
        .await?;
    }

    // Dropping the transaction without committing rolls it back.
    let mut tx = pool.begin().await?;

    for attendance in attendances {
        sqlx::query(
            "INSERT INTO asistencia (alumno_id, curso_id, materia_id, estado) VALUES (?, ?, ?, ?)",
        )
        .bind(attendance.student_id)
        .bind(attendance.course_id)
        .bind(attendance.subject_id)
        .bind(attendance.state.code())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(attendances.len())
}

#[instrument]
pub async fn get_attendance_history(
    pool: &Pool<Sqlite>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<HistoryEntry>, AppError> {
    info!("Getting attendance history");

    let mut sql = String::from(
        "SELECT
             a.id AS registro_id,
             a.fecha,
             a.estado,
             al.nombre AS alumno_nombre,
             al.apellido AS alumno_apellido,
             c.nombre AS curso_nombre,
             m.nombre AS materia_nombre
         FROM asistencia a
         JOIN alumnos al ON a.alumno_id = al.id
         JOIN cursos c ON a.curso_id = c.id
         JOIN materias m ON a.materia_id = m.id",
    );

    if range.is_some() {
        sql.push_str(" WHERE DATE(a.fecha) BETWEEN ? AND ?");
    }

    sql.push_str(" ORDER BY a.fecha DESC, a.id DESC");

    let mut query = sqlx::query_as::<_, DbHistoryEntry>(&sql);
    if let Some((start, end)) = range {
        query = query
            .bind(start.format("%Y-%m-%d").to_string())
            .bind(end.format("%Y-%m-%d").to_string());
    }

    let rows = query.fetch_all(pool).await?;

    rows.into_iter().map(HistoryEntry::try_from).collect()
}

#[instrument]
pub async fn update_attendance_state(
    pool: &Pool<Sqlite>,
    record_id: i64,
    state: AttendanceState,
) -> Result<(), AppError> {
    info!("Updating attendance record");
    let result = sqlx::query(
        "UPDATE asistencia SET estado = ?, fecha = datetime('now', 'localtime') WHERE id = ?",
    )
    .bind(state.code())
    .bind(record_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Registro no encontrado.".to_string()));
    }

    Ok(())
}

#[instrument]
pub async fn delete_attendance_record(pool: &Pool<Sqlite>, record_id: i64) -> Result<(), AppError> {
    info!("Deleting attendance record");
    let result = sqlx::query("DELETE FROM asistencia WHERE id = ?")
        .bind(record_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Registro no encontrado.".to_string()));
    }

    Ok(())
}
