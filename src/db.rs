use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{debug, info, instrument};

use crate::error::AppError;
use crate::models::{NewStudent, School, SchoolChanges, Student, StudentChanges};
use crate::roll_number::{allocate_roll_number, renumber_students};

async fn find_school_by_code(
    conn: &mut SqliteConnection,
    school_code: &str,
) -> Result<Option<School>, AppError> {
    let school = sqlx::query_as::<_, School>(
        "SELECT school_code, school_name FROM schools WHERE school_code = ?",
    )
    .bind(school_code)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(school)
}

async fn find_school_by_name(
    conn: &mut SqliteConnection,
    school_name: &str,
) -> Result<Option<School>, AppError> {
    let school = sqlx::query_as::<_, School>(
        "SELECT school_code, school_name FROM schools WHERE school_name = ?",
    )
    .bind(school_name)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(school)
}

async fn find_student(
    conn: &mut SqliteConnection,
    roll_number: &str,
) -> Result<Option<Student>, AppError> {
    let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE roll_number = ?")
        .bind(roll_number)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(student)
}

#[instrument]
pub async fn create_school(
    pool: &Pool<Sqlite>,
    school_name: &str,
    school_code: &str,
) -> Result<School, AppError> {
    info!("Creating school");
    let mut tx = pool.begin().await?;

    if find_school_by_name(&mut tx, school_name).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "School with name '{}' already exists.",
            school_name
        )));
    }

    if find_school_by_code(&mut tx, school_code).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "School with school code '{}' already exists.",
            school_code
        )));
    }

    sqlx::query("INSERT INTO schools (school_code, school_name) VALUES (?, ?)")
        .bind(school_code)
        .bind(school_name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(School {
        school_code: school_code.to_string(),
        school_name: school_name.to_string(),
    })
}

#[instrument]
pub async fn get_school(pool: &Pool<Sqlite>, school_code: &str) -> Result<School, AppError> {
    info!("Fetching school by code");
    let mut conn = pool.acquire().await?;

    match find_school_by_code(&mut conn, school_code).await? {
        Some(school) => Ok(school),
        None => Err(AppError::NotFound(format!(
            "School with code '{}' not found",
            school_code
        ))),
    }
}

#[instrument]
pub async fn get_all_schools(pool: &Pool<Sqlite>) -> Result<Vec<School>, AppError> {
    info!("Getting all schools");
    let schools = sqlx::query_as::<_, School>(
        "SELECT school_code, school_name FROM schools ORDER BY school_code",
    )
    .fetch_all(pool)
    .await?;

    if schools.is_empty() {
        return Err(AppError::NotFound("No schools found".to_string()));
    }

    Ok(schools)
}

/// Deletes a school together with every student enrolled in it.
///
/// Returns the number of students removed by the cascade.
#[instrument]
pub async fn delete_school(pool: &Pool<Sqlite>, school_code: &str) -> Result<i64, AppError> {
    info!("Deleting school");
    let mut tx = pool.begin().await?;

    if find_school_by_code(&mut tx, school_code).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "No school found with school_code {}",
            school_code
        )));
    }

    let enrolled =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students WHERE school_code = ?")
            .bind(school_code)
            .fetch_one(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM schools WHERE school_code = ?")
        .bind(school_code)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(students_removed = enrolled, "School deleted");
    Ok(enrolled)
}

/// Applies a partial update to a school. A code change renumbers every
/// enrolled student within the same transaction.
#[instrument]
pub async fn update_school(
    pool: &Pool<Sqlite>,
    school_code: &str,
    changes: &SchoolChanges,
) -> Result<School, AppError> {
    info!("Updating school");
    let mut tx = pool.begin().await?;

    let result = apply_school_changes(&mut tx, school_code, changes).await;

    match result {
        Ok(school) => {
            tx.commit().await?;
            Ok(school)
        }
        Err(e) => {
            tx.rollback().await?;
            Err(e)
        }
    }
}

async fn apply_school_changes(
    conn: &mut SqliteConnection,
    school_code: &str,
    changes: &SchoolChanges,
) -> Result<School, AppError> {
    let mut school = find_school_by_code(conn, school_code)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No school found with school code {}", school_code))
        })?;

    if let Some(school_name) = &changes.school_name {
        if let Some(existing) = find_school_by_name(conn, school_name).await? {
            if existing.school_code != school_code {
                return Err(AppError::Conflict(format!(
                    "School name '{}' already exists.",
                    school_name
                )));
            }
        }

        sqlx::query("UPDATE schools SET school_name = ? WHERE school_code = ?")
            .bind(school_name)
            .bind(school_code)
            .execute(&mut *conn)
            .await?;
        school.school_name = school_name.clone();
    }

    let Some(new_code) = changes.school_code.as_deref() else {
        return Ok(school);
    };
    if new_code == school_code {
        return Ok(school);
    }

    if find_school_by_code(conn, new_code).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "School code '{}' already exists.",
            new_code
        )));
    }

    // Students briefly reference a code that no longer exists.
    sqlx::query("PRAGMA defer_foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE schools SET school_code = ? WHERE school_code = ?")
        .bind(new_code)
        .bind(school_code)
        .execute(&mut *conn)
        .await?;

    let reassignments = renumber_students(conn, school_code, new_code).await?;
    for reassignment in &reassignments {
        debug!(
            previous = %reassignment.previous,
            current = %reassignment.current,
            "Reassigned roll number"
        );
    }
    info!(
        from = %school_code,
        to = %new_code,
        students = reassignments.len(),
        "School code changed"
    );

    school.school_code = new_code.to_string();
    Ok(school)
}

#[instrument]
pub async fn create_student(pool: &Pool<Sqlite>, student: &NewStudent) -> Result<Student, AppError> {
    info!("Creating student");
    let mut tx = pool.begin().await?;

    if find_school_by_code(&mut tx, &student.school_code)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "School with code '{}' not found",
            student.school_code
        )));
    }

    let roll_number = allocate_roll_number(&mut tx, &student.school_code, student.year).await?;

    sqlx::query(
        "INSERT INTO students (roll_number, name, class_name, section, city, year, school_code)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&roll_number)
    .bind(&student.name)
    .bind(&student.class_name)
    .bind(&student.section)
    .bind(&student.city)
    .bind(student.year)
    .bind(&student.school_code)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(roll_number = %roll_number, "Student created");
    Ok(Student {
        roll_number,
        name: student.name.clone(),
        class_name: student.class_name.clone(),
        section: student.section.clone(),
        city: student.city.clone(),
        year: student.year,
        school_code: student.school_code.clone(),
    })
}

#[instrument]
pub async fn get_student(pool: &Pool<Sqlite>, roll_number: &str) -> Result<Student, AppError> {
    info!("Fetching student by roll number");
    let mut conn = pool.acquire().await?;

    match find_student(&mut conn, roll_number).await? {
        Some(student) => Ok(student),
        None => Err(AppError::NotFound(format!(
            "No student found with roll number {}",
            roll_number
        ))),
    }
}

#[instrument]
pub async fn get_all_students(pool: &Pool<Sqlite>) -> Result<Vec<Student>, AppError> {
    info!("Getting all students");
    let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY roll_number")
        .fetch_all(pool)
        .await?;

    if students.is_empty() {
        return Err(AppError::NotFound("No students found".to_string()));
    }

    Ok(students)
}

/// Students enrolled in a school, ordered by roll number. Empty when none are.
#[instrument]
pub async fn get_students_for_school(
    pool: &Pool<Sqlite>,
    school_code: &str,
) -> Result<Vec<Student>, AppError> {
    info!("Getting students for school");
    let students = sqlx::query_as::<_, Student>(
        "SELECT * FROM students WHERE school_code = ? ORDER BY roll_number",
    )
    .bind(school_code)
    .fetch_all(pool)
    .await?;

    Ok(students)
}

#[instrument]
pub async fn update_student(
    pool: &Pool<Sqlite>,
    roll_number: &str,
    changes: &StudentChanges,
) -> Result<Student, AppError> {
    info!("Updating student");
    let mut tx = pool.begin().await?;

    let mut student = find_student(&mut tx, roll_number).await?.ok_or_else(|| {
        AppError::NotFound(format!("No student found with roll number {}", roll_number))
    })?;

    if changes.is_empty() {
        return Ok(student);
    }

    if let Some(name) = &changes.name {
        student.name = name.clone();
    }
    if let Some(section) = &changes.section {
        student.section = section.clone();
    }
    if let Some(class_name) = &changes.class_name {
        student.class_name = class_name.clone();
    }

    sqlx::query(
        "UPDATE students
         SET name = ?, section = ?, class_name = ?
         WHERE roll_number = ?",
    )
    .bind(&student.name)
    .bind(&student.section)
    .bind(&student.class_name)
    .bind(roll_number)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(student)
}

#[instrument]
pub async fn delete_student(pool: &Pool<Sqlite>, roll_number: &str) -> Result<(), AppError> {
    info!("Deleting student");
    let result = sqlx::query("DELETE FROM students WHERE roll_number = ?")
        .bind(roll_number)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "No students found with roll number {}",
            roll_number
        )));
    }

    Ok(())
}
