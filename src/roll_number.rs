//! Roll number allocation and school-code renumbering.
//!
//! A roll number is `<school_code><year><sequence>` with the sequence zero
//! padded to four digits. The "latest" roll number is always picked by
//! string order, which matches numeric order only while every roll number
//! compared shares the same prefix length.

use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use crate::error::AppError;
use crate::models::Student;

const SEQUENCE_DIGITS: usize = 4;

pub fn format_roll_number(school_code: &str, year: i64, sequence: u64) -> String {
    format!("{}{}{:04}", school_code, year, sequence)
}

/// Sequence following `latest` for a fresh enrolment.
///
/// Only the trailing four characters are inspected; anything other than four
/// ASCII digits counts as zero.
pub fn next_sequence(latest: Option<&str>) -> u64 {
    let Some(latest) = latest else {
        return 1;
    };

    let suffix_start = latest
        .char_indices()
        .rev()
        .nth(SEQUENCE_DIGITS - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let suffix = &latest[suffix_start..];

    let current = if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
        suffix.parse::<u64>().unwrap_or(0)
    } else {
        0
    };

    current + 1
}

/// Sequence following `latest` while moving a student of `year` under `new_code`.
///
/// The prefix stripped is `new_code` plus the student's own year, even when
/// `latest` belongs to a different year.
pub fn renumber_sequence(latest: Option<&str>, new_code: &str, year: i64) -> Result<u64, AppError> {
    let Some(latest) = latest else {
        return Ok(1);
    };

    let prefix_len = new_code.len() + year.to_string().len();
    let remainder = latest.get(prefix_len..).ok_or_else(|| {
        AppError::Internal(format!(
            "Roll number '{}' is shorter than prefix '{}{}'",
            latest, new_code, year
        ))
    })?;

    let current = remainder.parse::<u64>().map_err(|e| {
        AppError::Internal(format!(
            "Roll number '{}' has non-numeric sequence '{}': {}",
            latest, remainder, e
        ))
    })?;

    current.checked_add(1).ok_or_else(|| {
        AppError::Internal(format!("Roll number '{}' sequence overflowed", latest))
    })
}

/// Next roll number for a new student of `school_code` enrolled in `year`.
#[instrument(skip(conn))]
pub async fn allocate_roll_number(
    conn: &mut SqliteConnection,
    school_code: &str,
    year: i64,
) -> Result<String, AppError> {
    let latest = sqlx::query_scalar::<_, String>(
        "SELECT roll_number FROM students
         WHERE school_code = ? AND year = ?
         ORDER BY roll_number DESC
         LIMIT 1",
    )
    .bind(school_code)
    .bind(year)
    .fetch_optional(&mut *conn)
    .await?;

    let roll_number = format_roll_number(school_code, year, next_sequence(latest.as_deref()));
    debug!(latest = ?latest, roll_number = %roll_number, "Allocated roll number");

    Ok(roll_number)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    pub previous: String,
    pub current: String,
}

/// Moves every student of `old_code` under `new_code`, regenerating roll numbers.
///
/// Must run inside the transaction that renames the school, with foreign key
/// checks deferred. Each student is written before the next lookup so the
/// sequence keeps climbing.
#[instrument(skip(conn))]
pub async fn renumber_students(
    conn: &mut SqliteConnection,
    old_code: &str,
    new_code: &str,
) -> Result<Vec<Reassignment>, AppError> {
    let students = sqlx::query_as::<_, Student>(
        "SELECT * FROM students WHERE school_code = ? ORDER BY roll_number",
    )
    .bind(old_code)
    .fetch_all(&mut *conn)
    .await?;

    info!(count = students.len(), "Renumbering students");

    let mut reassignments = Vec::with_capacity(students.len());
    for student in students {
        // Not scoped by year, unlike allocate_roll_number.
        let latest = sqlx::query_scalar::<_, String>(
            "SELECT roll_number FROM students
             WHERE school_code = ?
             ORDER BY roll_number DESC
             LIMIT 1",
        )
        .bind(new_code)
        .fetch_optional(&mut *conn)
        .await?;

        let sequence = renumber_sequence(latest.as_deref(), new_code, student.year)?;
        let roll_number = format_roll_number(new_code, student.year, sequence);

        sqlx::query("UPDATE students SET roll_number = ?, school_code = ? WHERE roll_number = ?")
            .bind(&roll_number)
            .bind(new_code)
            .bind(&student.roll_number)
            .execute(&mut *conn)
            .await?;

        reassignments.push(Reassignment {
            previous: student.roll_number,
            current: roll_number,
        });
    }

    Ok(reassignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pads_sequence() {
        assert_eq!(format_roll_number("ALP", 2024, 1), "ALP20240001");
        assert_eq!(format_roll_number("ALP", 2024, 42), "ALP20240042");
        assert_eq!(format_roll_number("X", 2024, 12345), "X202412345");
    }

    #[test]
    fn test_next_sequence_starts_at_one() {
        assert_eq!(next_sequence(None), 1);
    }

    #[test]
    fn test_next_sequence_increments_trailing_digits() {
        assert_eq!(next_sequence(Some("ALP20240001")), 2);
        assert_eq!(next_sequence(Some("ALP20240099")), 100);
    }

    #[test]
    fn test_next_sequence_treats_non_digit_suffix_as_zero() {
        assert_eq!(next_sequence(Some("ALP2024000A")), 1);
        assert_eq!(next_sequence(Some("")), 1);
    }

    #[test]
    fn test_next_sequence_after_five_digit_suffix_restarts() {
        // "ALP202410000" ends in "0000"; the suffix is four digits wide
        assert_eq!(format_roll_number("ALP", 2024, 10000), "ALP202410000");
        assert_eq!(next_sequence(Some("ALP202410000")), 1);
    }

    #[test]
    fn test_next_sequence_short_roll_number() {
        assert_eq!(next_sequence(Some("12")), 13);
    }

    #[test]
    fn test_renumber_sequence_strips_code_and_year() {
        assert_eq!(renumber_sequence(None, "ALH", 2024).unwrap(), 1);
        assert_eq!(
            renumber_sequence(Some("ALH20240001"), "ALH", 2024).unwrap(),
            2
        );
    }

    #[test]
    fn test_renumber_sequence_ignores_year_of_latest() {
        // latest belongs to 2023, student is 2024: sequence continues across years
        assert_eq!(
            renumber_sequence(Some("ALH20230003"), "ALH", 2024).unwrap(),
            4
        );
    }

    #[test]
    fn test_renumber_sequence_rejects_unparseable_remainder() {
        let err = renumber_sequence(Some("ALH2024ABCD"), "ALH", 2024).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        let err = renumber_sequence(Some("AL"), "ALH", 2024).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn test_renumber_sequence_large_remainders() {
        assert_eq!(
            renumber_sequence(Some("A14294967295"), "A", 1).unwrap(),
            4_294_967_296
        );

        let err = renumber_sequence(Some("A118446744073709551615"), "A", 1).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
