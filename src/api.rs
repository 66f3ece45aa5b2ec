use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use serde_json::Value;
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::db::{
    create_attendance_batch, create_attendance_record, create_student, delete_attendance_record,
    get_all_courses, get_attendance_history, get_latest_attendance, get_students_for_course,
    get_subjects_for_course, update_attendance_state,
};
use crate::error::{ApiError, AppError, ErrorContext};
use crate::models::{
    AttendanceState, Course, HistoryEntry, NewAttendance, NewStudent, Student, Subject,
};
use crate::validation::{
    MessageResponse, ValidateExt, date_range, lenient_id, non_blank, parse_body,
};

const MISSING_ATTENDANCE_FIELDS: &str = "Faltan campos requeridos.";
const MISSING_STUDENT_FIELDS: &str = "Faltan campos: nombre, apellido o ID de Curso.";

#[derive(Serialize, Deserialize, Debug)]
pub struct StudentResponse {
    pub id: i64,
    pub nombre: String,
    pub apellido: String,
}

impl From<Student> for StudentResponse {
    fn from(student: Student) -> Self {
        Self {
            id: student.id,
            nombre: student.name,
            apellido: student.surname,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct LatestAttendanceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<AttendanceState>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HistoryEntryResponse {
    pub registro_id: i64,
    pub fecha: String,
    pub fecha_formato: String,
    pub estado: String,
    pub alumno_nombre: String,
    pub alumno_apellido: String,
    pub curso_nombre: String,
    pub materia_nombre: String,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            registro_id: entry.record_id,
            fecha: entry.recorded_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            fecha_formato: entry.recorded_at.format("%d/%m/%Y %H:%M").to_string(),
            estado: entry.state.code().to_string(),
            alumno_nombre: entry.student_name,
            alumno_apellido: entry.student_surname,
            curso_nombre: entry.course_name,
            materia_nombre: entry.subject_name,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct StudentCreatedResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BatchCreatedResponse {
    pub message: String,
    pub cantidad: usize,
}

#[get("/cursos")]
pub async fn api_get_courses(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<Course>>, ApiError> {
    let courses = get_all_courses(db).await.context("Error al obtener Cursos.")?;

    Ok(Json(courses))
}

#[get("/materias/<course_id>")]
pub async fn api_get_subjects(
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Subject>>, ApiError> {
    let subjects = get_subjects_for_course(db, course_id)
        .await
        .context("Error al obtener Materias.")?;

    Ok(Json(subjects))
}

#[get("/alumnos/<course_id>")]
pub async fn api_get_students(
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<StudentResponse>>, ApiError> {
    let students = get_students_for_course(db, course_id)
        .await
        .context("Error al obtener alumnos.")?;

    Ok(Json(
        students.into_iter().map(StudentResponse::from).collect(),
    ))
}

#[get("/asistencia_reciente/<student_id>/<course_id>/<subject_id>")]
pub async fn api_get_latest_attendance(
    student_id: i64,
    course_id: i64,
    subject_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LatestAttendanceResponse>, ApiError> {
    let latest = get_latest_attendance(db, student_id, course_id, subject_id)
        .await
        .context("Error al obtener asistencia reciente.")?;

    Ok(Json(LatestAttendanceResponse {
        estado: latest.map(|record| record.state),
    }))
}

#[derive(Deserialize, Validate)]
pub struct AttendanceRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    #[validate(required(message = "Faltan campos requeridos."))]
    alumno_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    #[validate(required(message = "Faltan campos requeridos."))]
    curso_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    #[validate(required(message = "Faltan campos requeridos."))]
    materia_id: Option<i64>,
    #[serde(default)]
    estado: Option<String>,
}

impl AttendanceRequest {
    /// State is checked before field presence.
    pub fn into_new_attendance(self) -> Result<NewAttendance, AppError> {
        let state = AttendanceState::from_request(self.estado.as_deref())?;
        let validated = self.validate_custom()?;

        match (validated.alumno_id, validated.curso_id, validated.materia_id) {
            (Some(student_id), Some(course_id), Some(subject_id)) => Ok(NewAttendance {
                student_id,
                course_id,
                subject_id,
                state,
            }),
            _ => Err(AppError::Validation(MISSING_ATTENDANCE_FIELDS.to_string())),
        }
    }
}

#[post("/registro", data = "<body>")]
pub async fn api_create_attendance(
    body: Json<Value>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<MessageResponse>>, ApiError> {
    let request: AttendanceRequest = parse_body(body)?;
    let attendance = request.into_new_attendance()?;

    create_attendance_record(db, &attendance)
        .await
        .context("Error al insertar registro en la BD.")?;

    Ok(Custom(
        Status::Created,
        Json(MessageResponse::new("Registro de asistencia exitoso.")),
    ))
}

#[derive(Serialize, Deserialize, Validate)]
pub struct BatchEntryRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    #[validate(required(message = "Faltan campos requeridos."))]
    alumno_id: Option<i64>,
    #[serde(default)]
    estado: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct AttendanceBatchRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    #[validate(required(message = "Faltan campos requeridos."))]
    curso_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    #[validate(required(message = "Faltan campos requeridos."))]
    materia_id: Option<i64>,
    #[serde(default)]
    #[validate(length(min = 1, message = "La lista de registros está vacía."))]
    registros: Vec<BatchEntryRequest>,
}

impl AttendanceBatchRequest {
    pub fn into_new_attendances(self) -> Result<Vec<NewAttendance>, AppError> {
        let validated = self.validate_custom()?;

        let (Some(course_id), Some(subject_id)) = (validated.curso_id, validated.materia_id) else {
            return Err(AppError::Validation(MISSING_ATTENDANCE_FIELDS.to_string()));
        };

        validated
            .registros
            .into_iter()
            .map(|entry| {
                let state = AttendanceState::from_request(entry.estado.as_deref())?;
                let entry = entry.validate_custom()?;
                let student_id = entry
                    .alumno_id
                    .ok_or_else(|| AppError::Validation(MISSING_ATTENDANCE_FIELDS.to_string()))?;

                Ok(NewAttendance {
                    student_id,
                    course_id,
                    subject_id,
                    state,
                })
            })
            .collect()
    }
}

#[post("/registros", data = "<body>")]
pub async fn api_create_attendance_batch(
    body: Json<Value>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<BatchCreatedResponse>>, ApiError> {
    let request: AttendanceBatchRequest = parse_body(body)?;
    let attendances = request.into_new_attendances()?;

    let count = create_attendance_batch(db, &attendances)
        .await
        .context("Error al registrar asistencias.")?;

    Ok(Custom(
        Status::Created,
        Json(BatchCreatedResponse {
            message: "Asistencias guardadas.".to_string(),
            cantidad: count,
        }),
    ))
}

#[get("/historial?<fecha_inicio>&<fecha_fin>")]
pub async fn api_get_history(
    fecha_inicio: Option<&str>,
    fecha_fin: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let range = date_range(fecha_inicio, fecha_fin)?;

    let history = get_attendance_history(db, range)
        .await
        .context("Error al obtener historial.")?;

    Ok(Json(
        history.into_iter().map(HistoryEntryResponse::from).collect(),
    ))
}

#[derive(Deserialize)]
pub struct AttendanceUpdateRequest {
    #[serde(default)]
    estado: Option<String>,
}

#[put("/registro/<id>", data = "<body>")]
pub async fn api_update_attendance(
    id: i64,
    body: Json<Value>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request: AttendanceUpdateRequest = parse_body(body)?;
    let state = AttendanceState::from_request(request.estado.as_deref())?;

    update_attendance_state(db, id, state)
        .await
        .context("Error al actualizar registro.")?;

    Ok(Json(MessageResponse::new(
        "Registro de asistencia actualizado con éxito.",
    )))
}

#[delete("/registro/<id>")]
pub async fn api_delete_attendance(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, ApiError> {
    delete_attendance_record(db, id)
        .await
        .context("Error al eliminar registro.")?;

    Ok(Json(MessageResponse::new(
        "Registro de asistencia eliminado con éxito.",
    )))
}

#[derive(Deserialize, Validate)]
pub struct StudentCreateRequest {
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(required(message = "Faltan campos: nombre, apellido o ID de Curso."))]
    nombre: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(required(message = "Faltan campos: nombre, apellido o ID de Curso."))]
    apellido: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    #[validate(required(message = "Faltan campos: nombre, apellido o ID de Curso."))]
    curso_id: Option<i64>,
}

impl StudentCreateRequest {
    pub fn into_new_student(self) -> Result<NewStudent, AppError> {
        let validated = self.validate_custom()?;

        match (validated.nombre, validated.apellido, validated.curso_id) {
            (Some(name), Some(surname), Some(course_id)) => Ok(NewStudent {
                name,
                surname,
                course_id,
            }),
            _ => Err(AppError::Validation(MISSING_STUDENT_FIELDS.to_string())),
        }
    }
}

#[post("/alumno", data = "<body>")]
pub async fn api_create_student(
    body: Json<Value>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<StudentCreatedResponse>>, ApiError> {
    let request: StudentCreateRequest = parse_body(body)?;
    let student = request.into_new_student()?;

    let id = create_student(db, &student)
        .await
        .context("Error al insertar el nuevo alumno en la BD.")?;

    Ok(Custom(
        Status::Created,
        Json(StudentCreatedResponse {
            message: "Alumno agregado con éxito.".to_string(),
            id,
        }),
    ))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(400)]
pub fn bad_request() -> Json<MessageResponse> {
    Json(MessageResponse::new("Solicitud inválida."))
}

#[catch(404)]
pub fn not_found(req: &rocket::Request<'_>) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Ruta no encontrada: {} {}",
        req.method(),
        req.uri()
    )))
}

#[catch(422)]
pub fn unprocessable_entity() -> Json<MessageResponse> {
    Json(MessageResponse::new("Datos de la solicitud inválidos."))
}

#[catch(500)]
pub fn internal_error() -> Json<MessageResponse> {
    Json(MessageResponse::new("Error interno del servidor."))
}
