#[cfg(test)]
pub mod test_db {
    use crate::db::connect_options;
    use crate::error::AppError;
    use crate::models::{AttendanceRecord, DbAttendanceRecord};
    use sqlx::{Pool, Sqlite, sqlite::SqlitePoolOptions};
    use std::collections::HashMap;
    use std::sync::Once;
    use std::time::Duration;

    static INIT: Once = Once::new();

    #[derive(Default)]
    pub struct TestDbBuilder {
        courses: Vec<String>,
        subjects: Vec<TestSubject>,
        students: Vec<TestStudent>,
        attendances: Vec<TestAttendance>,
    }

    pub struct TestSubject {
        pub name: String,
        pub course_names: Vec<String>,
    }

    pub struct TestStudent {
        pub name: String,
        pub surname: String,
        pub course_name: String,
    }

    pub struct TestAttendance {
        pub student_surname: String,
        pub course_name: String,
        pub subject_name: String,
        pub state: String,
        pub recorded_at: Option<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn course(mut self, name: &str) -> Self {
            self.courses.push(name.to_string());
            self
        }

        pub fn subject(mut self, name: &str, course_names: &[&str]) -> Self {
            self.subjects.push(TestSubject {
                name: name.to_string(),
                course_names: course_names.iter().map(|c| c.to_string()).collect(),
            });
            self
        }

        pub fn student(mut self, name: &str, surname: &str, course_name: &str) -> Self {
            self.students.push(TestStudent {
                name: name.to_string(),
                surname: surname.to_string(),
                course_name: course_name.to_string(),
            });
            self
        }

        pub fn attendance(
            mut self,
            student_surname: &str,
            course_name: &str,
            subject_name: &str,
            state: &str,
            recorded_at: Option<&str>,
        ) -> Self {
            self.attendances.push(TestAttendance {
                student_surname: student_surname.to_string(),
                course_name: course_name.to_string(),
                subject_name: subject_name.to_string(),
                state: state.to_string(),
                recorded_at: recorded_at.map(String::from),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter("debug,sqlx=warn")
                    .with_test_writer()
                    .try_init();
            });

            // One long-lived connection keeps the in-memory database alive.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(connect_options("sqlite::memory:")?)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut course_id_map: HashMap<String, i64> = HashMap::new();
            let mut subject_id_map: HashMap<String, i64> = HashMap::new();
            let mut student_id_map: HashMap<String, i64> = HashMap::new();
            let mut attendance_ids: Vec<i64> = Vec::new();

            for course in &self.courses {
                let res = sqlx::query("INSERT INTO cursos (nombre) VALUES (?)")
                    .bind(course)
                    .execute(&pool)
                    .await?;
                course_id_map.insert(course.clone(), res.last_insert_rowid());
            }

            for subject in &self.subjects {
                let res = sqlx::query("INSERT INTO materias (nombre) VALUES (?)")
                    .bind(&subject.name)
                    .execute(&pool)
                    .await?;
                let subject_id = res.last_insert_rowid();
                subject_id_map.insert(subject.name.clone(), subject_id);

                for course_name in &subject.course_names {
                    let course_id = lookup(&course_id_map, "course", course_name)?;
                    sqlx::query("INSERT INTO curso_materia (curso_id, materia_id) VALUES (?, ?)")
                        .bind(course_id)
                        .bind(subject_id)
                        .execute(&pool)
                        .await?;
                }
            }

            for student in &self.students {
                let course_id = lookup(&course_id_map, "course", &student.course_name)?;
                let res = sqlx::query(
                    "INSERT INTO alumnos (nombre, apellido, curso_id) VALUES (?, ?, ?)",
                )
                .bind(&student.name)
                .bind(&student.surname)
                .bind(course_id)
                .execute(&pool)
                .await?;
                student_id_map.insert(student.surname.clone(), res.last_insert_rowid());
            }

            for attendance in &self.attendances {
                let student_id = lookup(&student_id_map, "student", &attendance.student_surname)?;
                let course_id = lookup(&course_id_map, "course", &attendance.course_name)?;
                let subject_id = lookup(&subject_id_map, "subject", &attendance.subject_name)?;

                let res = match &attendance.recorded_at {
                    Some(recorded_at) => {
                        sqlx::query(
                            "INSERT INTO asistencia (alumno_id, curso_id, materia_id, estado, fecha)
                             VALUES (?, ?, ?, ?, ?)",
                        )
                        .bind(student_id)
                        .bind(course_id)
                        .bind(subject_id)
                        .bind(&attendance.state)
                        .bind(recorded_at)
                        .execute(&pool)
                        .await?
                    }
                    None => {
                        sqlx::query(
                            "INSERT INTO asistencia (alumno_id, curso_id, materia_id, estado)
                             VALUES (?, ?, ?, ?)",
                        )
                        .bind(student_id)
                        .bind(course_id)
                        .bind(subject_id)
                        .bind(&attendance.state)
                        .execute(&pool)
                        .await?
                    }
                };
                attendance_ids.push(res.last_insert_rowid());
            }

            Ok(TestDb {
                pool,
                course_id_map,
                subject_id_map,
                student_id_map,
                attendance_ids,
            })
        }
    }

    fn lookup(map: &HashMap<String, i64>, kind: &str, name: &str) -> Result<i64, AppError> {
        map.get(name)
            .copied()
            .ok_or_else(|| AppError::Internal(format!("Unknown fixture {}: {}", kind, name)))
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub course_id_map: HashMap<String, i64>,
        pub subject_id_map: HashMap<String, i64>,
        pub student_id_map: HashMap<String, i64>,
        pub attendance_ids: Vec<i64>,
    }

    impl TestDb {
        pub fn course_id(&self, name: &str) -> Option<i64> {
            self.course_id_map.get(name).copied()
        }

        pub fn subject_id(&self, name: &str) -> Option<i64> {
            self.subject_id_map.get(name).copied()
        }

        pub fn student_id(&self, surname: &str) -> Option<i64> {
            self.student_id_map.get(surname).copied()
        }

        pub async fn attendance_record(
            &self,
            id: i64,
        ) -> Result<Option<AttendanceRecord>, AppError> {
            let row = sqlx::query_as::<_, DbAttendanceRecord>(
                "SELECT id, alumno_id, curso_id, materia_id, estado, fecha
                 FROM asistencia WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            row.map(AttendanceRecord::try_from).transpose()
        }

        pub async fn count_rows(&self, table: &str) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use rocket::http::ContentType;
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde_json::Value;

    pub use super::test_db::{TestDb, TestDbBuilder};

    pub const FIRST_COURSE: &str = "1° A";
    pub const SECOND_COURSE: &str = "2° B";

    /// Two courses, three subjects, four students and a few dated records.
    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .course(FIRST_COURSE)
            .course(SECOND_COURSE)
            .subject("Matemática", &[FIRST_COURSE, SECOND_COURSE])
            .subject("Historia", &[FIRST_COURSE])
            .subject("Biología", &[SECOND_COURSE])
            .student("Sofía", "Pérez", FIRST_COURSE)
            .student("Lucía", "Fernández", FIRST_COURSE)
            .student("Mateo", "López", FIRST_COURSE)
            .student("Juan", "Benítez", SECOND_COURSE)
            .attendance(
                "Fernández",
                FIRST_COURSE,
                "Matemática",
                "P",
                Some("2025-03-10 08:00:00"),
            )
            .attendance(
                "López",
                FIRST_COURSE,
                "Historia",
                "A",
                Some("2025-03-11 09:00:00"),
            )
            .attendance(
                "Fernández",
                FIRST_COURSE,
                "Matemática",
                "T",
                Some("2025-03-12 08:05:00"),
            )
            .attendance(
                "Benítez",
                SECOND_COURSE,
                "Biología",
                "AP",
                Some("2025-04-02 10:00:00"),
            )
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = crate::init_rocket(test_db.pool.clone());
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build rocket test client");

        (client, test_db)
    }

    pub async fn post_json<'c>(client: &'c Client, uri: &str, body: &Value) -> LocalResponse<'c> {
        client
            .post(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    pub async fn put_json<'c>(client: &'c Client, uri: &str, body: &Value) -> LocalResponse<'c> {
        client
            .put(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    pub async fn response_json(response: LocalResponse<'_>) -> Value {
        let body = response
            .into_string()
            .await
            .expect("Response body was empty");
        serde_json::from_str(&body).expect("Response body was not JSON")
    }
}
