use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "Student" => Some(Role::Student),
            "Instructor" => Some(Role::Instructor),
            "Admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "Student"),
            Role::Instructor => write!(f, "Instructor"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub approved: bool,
    pub image: String,
    pub courses: Vec<Uuid>,
    pub course_progress: Vec<Uuid>,
    pub profile_id: Uuid,
    // single-use password-reset token, checked against the expiry at lookup
    #[serde(skip_serializing, default)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub reset_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: Uuid,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub about: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseStatus {
    Draft,
    Published,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub what_you_will_learn: String,
    /// Non-negative, in the smallest currency unit.
    pub price: u64,
    pub tags: Vec<String>,
    pub instructions: Vec<String>,
    pub thumbnail: String,
    pub status: CourseStatus,
    pub students_enrolled: Vec<Uuid>,
    pub sections: Vec<Uuid>,
    pub category_id: Uuid,
    pub instructor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    pub subsections: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubSection {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    pub description: String,
    pub duration_secs: u64,
    pub video_url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub courses: Vec<Uuid>,
}

/// Per (user, course) progress ledger entry. The store guarantees at most
/// one record per pair.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub completed: HashSet<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeState {
    Issued,
    Consumed,
}

/// Short-lived signup code tied to an email. Issued → Consumed, atomically
/// consumed on first successful use.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OneTimeCode {
    pub email: String,
    pub code: String,
    pub state: CodeState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
