use rocket::http::Status;
use rocket::serde::{Deserialize, Serialize, json::Json};
use rocket::{Request, State, catch, delete, get, post, put};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::db::{
    create_school, create_student, delete_school, delete_student, get_all_schools,
    get_all_students, get_school, get_student, get_students_for_school, update_school,
    update_student,
};
use crate::models::{NewStudent, School, SchoolChanges, Student, StudentChanges};
use crate::validation::{ApiError, AppErrorExt, JsonValidateExt, ToValidationResponse};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSchoolRequest {
    #[validate(length(min = 1, message = "School name must not be empty"))]
    school_name: String,
    #[validate(length(min = 1, message = "School code must not be empty"))]
    school_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    year: i64,
    #[validate(length(min = 1, message = "Name must not be empty"))]
    name: String,
    #[validate(length(min = 1, message = "Class name must not be empty"))]
    class_name: String,
    #[validate(length(min = 1, message = "Section must not be empty"))]
    section: String,
    #[validate(length(min = 1, message = "City must not be empty"))]
    city: String,
    #[validate(length(min = 1, message = "School code must not be empty"))]
    school_code: String,
}

impl From<CreateStudentRequest> for NewStudent {
    fn from(request: CreateStudentRequest) -> Self {
        Self {
            year: request.year,
            name: request.name,
            class_name: request.class_name,
            section: request.section,
            city: request.city,
            school_code: request.school_code,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StudentUpdateRequest {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    name: Option<String>,
    #[validate(length(min = 1, message = "Section must not be empty"))]
    section: Option<String>,
    #[validate(length(min = 1, message = "Class name must not be empty"))]
    class_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SchoolUpdateRequest {
    #[validate(length(min = 1, message = "School name must not be empty"))]
    school_name: Option<String>,
    #[validate(length(min = 1, message = "School code must not be empty"))]
    school_code: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UpdatedStudentData {
    pub roll_number: String,
    pub name: String,
    pub section: String,
    pub class_name: String,
}

impl From<Student> for UpdatedStudentData {
    fn from(student: Student) -> Self {
        Self {
            roll_number: student.roll_number,
            name: student.name,
            section: student.section,
            class_name: student.class_name,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct StudentUpdateResponse {
    pub message: String,
    pub student: UpdatedStudentData,
}

#[post("/schools", data = "<school>")]
pub async fn api_create_school(
    school: Json<CreateSchoolRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<School>, ApiError> {
    let validated = school.validate_custom()?;

    let created = create_school(db, &validated.school_name, &validated.school_code)
        .await
        .validate_custom()?;

    Ok(Json(created))
}

#[post("/students", data = "<student>")]
pub async fn api_create_student(
    student: Json<CreateStudentRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Student>, ApiError> {
    let validated = student.validate_custom()?;

    let created = create_student(db, &NewStudent::from(validated))
        .await
        .validate_custom()?;

    Ok(Json(created))
}

#[get("/students")]
pub async fn api_get_students(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<Student>>, ApiError> {
    let students = get_all_students(db).await.validate_custom()?;
    Ok(Json(students))
}

#[get("/schools")]
pub async fn api_get_schools(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<School>>, ApiError> {
    let schools = get_all_schools(db).await.validate_custom()?;
    Ok(Json(schools))
}

#[get("/schools/<school_code>")]
pub async fn api_get_school(
    school_code: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<School>, ApiError> {
    let school = get_school(db, school_code).await.validate_custom()?;
    Ok(Json(school))
}

// A school without students yields an empty list, unlike GET /students.
#[get("/schools/<school_code>/students")]
pub async fn api_get_school_students(
    school_code: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Student>>, ApiError> {
    get_school(db, school_code).await.validate_custom()?;

    let students = get_students_for_school(db, school_code)
        .await
        .validate_custom()?;
    Ok(Json(students))
}

#[get("/students/<roll_number>")]
pub async fn api_get_student(
    roll_number: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Student>, ApiError> {
    let student = get_student(db, roll_number).await.validate_custom()?;
    Ok(Json(student))
}

#[delete("/students/school/<roll_number>")]
pub async fn api_delete_student(
    roll_number: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, ApiError> {
    delete_student(db, roll_number).await.validate_custom()?;

    Ok(Json(MessageResponse {
        message: format!("Student with roll number {} deleted successfully", roll_number),
    }))
}

#[delete("/schools/<school_code>")]
pub async fn api_delete_school(
    school_code: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, ApiError> {
    delete_school(db, school_code).await.validate_custom()?;

    Ok(Json(MessageResponse {
        message: format!("School with School code {} deleted successfully", school_code),
    }))
}

#[put("/students/<roll_number>", data = "<update>")]
pub async fn api_update_student(
    roll_number: &str,
    update: Json<StudentUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<StudentUpdateResponse>, ApiError> {
    let validated = update.validate_custom()?;

    let changes = StudentChanges {
        name: validated.name,
        section: validated.section,
        class_name: validated.class_name,
    };

    let student = update_student(db, roll_number, &changes)
        .await
        .validate_custom()?;

    Ok(Json(StudentUpdateResponse {
        message: format!("Student with roll number {} updated successfully", roll_number),
        student: UpdatedStudentData::from(student),
    }))
}

#[put("/schools/<school_code>", data = "<update>")]
pub async fn api_update_school(
    school_code: &str,
    update: Json<SchoolUpdateRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let validated = update.validate_custom()?;

    let changes = SchoolChanges {
        school_name: validated.school_name,
        school_code: validated.school_code,
    };

    update_school(db, school_code, &changes)
        .await
        .validate_custom()?;

    Ok(Json(MessageResponse {
        message: format!(
            "School with code {} and associated students updated successfully",
            school_code
        ),
    }))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[catch(default)]
pub fn default_catcher(status: Status, _request: &Request<'_>) -> ApiError {
    status.to_validation_response()
}
