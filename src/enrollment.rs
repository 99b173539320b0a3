//! Enrollment workflow: the transition from "payment claimed by the
//! client" to "user enrolled in course(s)".
//!
//! Capture quotes the courses and asks the gateway for an order;
//! verification then calls [`enroll`], which performs one atomic ledger
//! upsert per course and dispatches one notification per course. Email
//! failures are logged and never roll back an enrollment.

use uuid::Uuid;

use crate::error::ApiError;
use crate::mailer::{templates, Mailer};
use crate::store::{Db, StoreError};

/// Collapse duplicate course ids, preserving first-seen order.
fn dedupe(course_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    course_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .copied()
        .collect()
}

/// Validate the course list for a user and sum the payable amount.
pub async fn quote(db: &Db, user_id: Uuid, course_ids: &[Uuid]) -> Result<u64, ApiError> {
    let courses = dedupe(course_ids);
    if courses.is_empty() {
        return Err(ApiError::validation("Please Provide Course ID"));
    }

    let mut total: u64 = 0;
    for course_id in courses {
        let course = db
            .course(course_id)
            .await
            .map_err(|_| ApiError::not_found("Course not found"))?;
        if course.students_enrolled.contains(&user_id) {
            return Err(ApiError::conflict("Already enrolled"));
        }
        total += course.price;
    }
    Ok(total)
}

/// Enroll the user in every course and notify them once per course.
pub async fn enroll(
    db: &Db,
    mailer: &dyn Mailer,
    user_id: Uuid,
    course_ids: &[Uuid],
) -> Result<(), ApiError> {
    let courses = dedupe(course_ids);
    if courses.is_empty() {
        return Err(ApiError::validation("Please Provide Course ID"));
    }

    let student = db
        .user_by_id(user_id)
        .await
        .map_err(|_| ApiError::not_found("User not found"))?;

    for course_id in courses {
        let course = db
            .course(course_id)
            .await
            .map_err(|_| ApiError::not_found("Course not found"))?;

        match db.enroll(user_id, course_id).await {
            Ok(_) => {}
            Err(StoreError::AlreadyExists) => {
                return Err(ApiError::conflict("Already enrolled"));
            }
            Err(StoreError::NotFound) => {
                return Err(ApiError::not_found("Course not found"));
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(user = %student.email, course = %course.title, "enrolled");

        let (subject, body) = templates::enrollment(&course.title, &student.full_name());
        if let Err(e) = mailer.send(&student.email, &subject, &body).await {
            tracing::warn!(error = %e, course = %course.title, "enrollment email failed");
        }
    }
    Ok(())
}
