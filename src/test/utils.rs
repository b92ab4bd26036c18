#[cfg(test)]
pub mod test_utils {
    use crate::db::{create_school, create_student};
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::NewStudent;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    #[derive(Default)]
    pub struct TestDbBuilder {
        schools: Vec<TestSchool>,
        students: Vec<TestStudent>,
    }

    pub struct TestSchool {
        pub name: String,
        pub code: String,
    }

    pub struct TestStudent {
        pub name: String,
        pub school_code: String,
        pub year: i64,
        pub class_name: String,
        pub section: String,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn school(mut self, name: &str, code: &str) -> Self {
            self.schools.push(TestSchool {
                name: name.to_string(),
                code: code.to_string(),
            });
            self
        }

        /// Enrols a student; students are created in the order they are added.
        pub fn student(mut self, name: &str, school_code: &str, year: i64) -> Self {
            self.students.push(TestStudent {
                name: name.to_string(),
                school_code: school_code.to_string(),
                year,
                class_name: "10".to_string(),
                section: "A".to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new("debug"))
                    .with_test_writer()
                    .try_init();
            });

            let pool = test_pool().await?;

            for school in &self.schools {
                create_school(&pool, &school.name, &school.code).await?;
            }

            let mut roll_numbers = HashMap::new();
            for student in &self.students {
                let created = create_student(
                    &pool,
                    &NewStudent {
                        year: student.year,
                        name: student.name.clone(),
                        class_name: student.class_name.clone(),
                        section: student.section.clone(),
                        city: "Springfield".to_string(),
                        school_code: student.school_code.clone(),
                    },
                )
                .await?;

                roll_numbers.insert(student.name.clone(), created.roll_number);
            }

            Ok(TestDb { pool, roll_numbers })
        }
    }

    /// A single-connection in-memory database with migrations applied.
    pub async fn test_pool() -> Result<Pool<Sqlite>, AppError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub roll_numbers: HashMap<String, String>,
    }

    impl TestDb {
        pub fn roll_number(&self, student_name: &str) -> Option<&str> {
            self.roll_numbers.get(student_name).map(String::as_str)
        }

        pub async fn student_count(&self, school_code: &str) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE school_code = ?")
                .bind(school_code)
                .fetch_one(&self.pool)
                .await
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .school("Alpha High", "ALP")
            .school("Beta Academy", "BET")
            .student("Ada", "ALP", 2024)
            .student("Brian", "ALP", 2024)
            .student("Chloe", "BET", 2023)
            .build()
            .await
            .expect("Failed to build standard test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone()).await;
        let client = Client::tracked(rocket)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }

    pub async fn send_json<'c>(
        client: &'c Client,
        method: rocket::http::Method,
        uri: &str,
        body: serde_json::Value,
    ) -> LocalResponse<'c> {
        client
            .req(method, uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    pub async fn read_body<T: serde::de::DeserializeOwned>(
        response: LocalResponse<'_>,
        expected: Status,
    ) -> T {
        assert_eq!(response.status(), expected);
        let body = response.into_string().await.expect("response body");
        serde_json::from_str(&body).expect("response body should be valid JSON")
    }
}
