use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct School {
    pub school_code: String,
    pub school_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Student {
    pub roll_number: String,
    pub name: String,
    pub class_name: String,
    pub section: String,
    pub city: String,
    pub year: i64,
    pub school_code: String,
}

/// Everything needed to enrol a student. The roll number is derived, never supplied.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub year: i64,
    pub name: String,
    pub class_name: String,
    pub section: String,
    pub city: String,
    pub school_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct StudentChanges {
    pub name: Option<String>,
    pub section: Option<String>,
    pub class_name: Option<String>,
}

impl StudentChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.section.is_none() && self.class_name.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchoolChanges {
    pub school_name: Option<String>,
    pub school_code: Option<String>,
}
