use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const VALID_STATE_CODES: [&str; 5] = ["P", "A", "T", "RA", "AP"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceState {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "A")]
    Absent,
    #[serde(rename = "T")]
    Late,
    #[serde(rename = "RA")]
    RetiredWithNotice,
    #[serde(rename = "AP")]
    JustifiedAbsence,
}

impl AttendanceState {
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceState::Present => "P",
            AttendanceState::Absent => "A",
            AttendanceState::Late => "T",
            AttendanceState::RetiredWithNotice => "RA",
            AttendanceState::JustifiedAbsence => "AP",
        }
    }

    /// Parses an optional state code from a request body.
    pub fn from_request(code: Option<&str>) -> Result<Self, AppError> {
        match code {
            Some(code) => code.parse(),
            None => Err(invalid_state("(vacío)")),
        }
    }
}

fn invalid_state(code: &str) -> AppError {
    AppError::Validation(format!(
        "Estado inválido: {}. Los estados válidos son {}.",
        code,
        VALID_STATE_CODES.join(", ")
    ))
}

impl fmt::Display for AttendanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AttendanceState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P" => Ok(AttendanceState::Present),
            "A" => Ok(AttendanceState::Absent),
            "T" => Ok(AttendanceState::Late),
            "RA" => Ok(AttendanceState::RetiredWithNotice),
            "AP" => Ok(AttendanceState::JustifiedAbsence),
            other => Err(invalid_state(other)),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Course {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbCourse {
    pub id: Option<i64>,
    pub nombre: Option<String>,
}

impl From<DbCourse> for Course {
    fn from(course: DbCourse) -> Self {
        Self {
            id: course.id.unwrap_or_default(),
            name: course.nombre.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Subject {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSubject {
    pub id: Option<i64>,
    pub nombre: Option<String>,
}

impl From<DbSubject> for Subject {
    fn from(subject: DbSubject) -> Self {
        Self {
            id: subject.id.unwrap_or_default(),
            name: subject.nombre.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub course_id: i64,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbStudent {
    pub id: Option<i64>,
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub curso_id: Option<i64>,
}

impl From<DbStudent> for Student {
    fn from(db: DbStudent) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.nombre.unwrap_or_default(),
            surname: db.apellido.unwrap_or_default(),
            course_id: db.curso_id.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub subject_id: i64,
    pub state: AttendanceState,
    pub recorded_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbAttendanceRecord {
    pub id: Option<i64>,
    pub alumno_id: Option<i64>,
    pub curso_id: Option<i64>,
    pub materia_id: Option<i64>,
    pub estado: Option<String>,
    pub fecha: Option<NaiveDateTime>,
}

impl TryFrom<DbAttendanceRecord> for AttendanceRecord {
    type Error = AppError;

    fn try_from(db: DbAttendanceRecord) -> Result<Self, Self::Error> {
        let state = stored_state(db.estado.as_deref())?;

        Ok(Self {
            id: db.id.unwrap_or_default(),
            student_id: db.alumno_id.unwrap_or_default(),
            course_id: db.curso_id.unwrap_or_default(),
            subject_id: db.materia_id.unwrap_or_default(),
            state,
            recorded_at: db.fecha.unwrap_or_default(),
        })
    }
}

/// One joined row of the attendance history.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub record_id: i64,
    pub recorded_at: NaiveDateTime,
    pub state: AttendanceState,
    pub student_name: String,
    pub student_surname: String,
    pub course_name: String,
    pub subject_name: String,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbHistoryEntry {
    pub registro_id: Option<i64>,
    pub fecha: Option<NaiveDateTime>,
    pub estado: Option<String>,
    pub alumno_nombre: Option<String>,
    pub alumno_apellido: Option<String>,
    pub curso_nombre: Option<String>,
    pub materia_nombre: Option<String>,
}

impl TryFrom<DbHistoryEntry> for HistoryEntry {
    type Error = AppError;

    fn try_from(db: DbHistoryEntry) -> Result<Self, Self::Error> {
        let state = stored_state(db.estado.as_deref())?;

        Ok(Self {
            record_id: db.registro_id.unwrap_or_default(),
            recorded_at: db.fecha.unwrap_or_default(),
            state,
            student_name: db.alumno_nombre.unwrap_or_default(),
            student_surname: db.alumno_apellido.unwrap_or_default(),
            course_name: db.curso_nombre.unwrap_or_default(),
            subject_name: db.materia_nombre.unwrap_or_default(),
        })
    }
}

// The table CHECK constraint makes anything else a corrupted row.
fn stored_state(code: Option<&str>) -> Result<AttendanceState, AppError> {
    let code = code.unwrap_or_default();
    code.parse()
        .map_err(|_| AppError::Internal(format!("Unknown attendance state stored: {:?}", code)))
}

/// A validated attendance registration, ready to insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAttendance {
    pub student_id: i64,
    pub course_id: i64,
    pub subject_id: i64,
    pub state: AttendanceState,
}

/// A validated student, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub surname: String,
    pub course_id: i64,
}
