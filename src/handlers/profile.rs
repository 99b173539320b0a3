//! Profile handlers: own details, profile updates, enrolled courses and
//! account deletion.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::courses::{course_content, seconds_to_duration};
use crate::state::AppState;

async fn user_with_profile(
    state: &AppState,
    user_id: uuid::Uuid,
) -> Result<serde_json::Value, ApiError> {
    let user = state
        .db
        .user_by_id(user_id)
        .await
        .map_err(|_| ApiError::not_found("User not found"))?;
    let profile = state.db.profile(user.profile_id).await?;

    let mut obj = match serde_json::to_value(&user) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return Err(ApiError::upstream("Internal server error")),
    };
    obj.insert(
        "additionalDetails".into(),
        serde_json::to_value(&profile).map_err(|_| ApiError::upstream("Internal server error"))?,
    );
    Ok(serde_json::Value::Object(obj))
}

pub async fn get_user_details(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let data = user_with_profile(&state, user.id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": data,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileReq {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub about: Option<String>,
    pub contact_number: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut record = state
        .db
        .user_by_id(user.id)
        .await
        .map_err(|_| ApiError::not_found("User not found"))?;

    if let Some(first_name) = req.first_name {
        record.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        record.last_name = last_name;
    }
    let profile_id = record.profile_id;
    state.db.update_user(record).await?;

    let mut profile = state.db.profile(profile_id).await?;
    if req.gender.is_some() {
        profile.gender = req.gender;
    }
    if req.date_of_birth.is_some() {
        profile.date_of_birth = req.date_of_birth;
    }
    if req.about.is_some() {
        profile.about = req.about;
    }
    if req.contact_number.is_some() {
        profile.contact_number = req.contact_number;
    }
    state.db.update_profile(profile).await?;

    let data = user_with_profile(&state, user.id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Profile updated successfully",
        "data": data,
    })))
}

pub async fn get_enrolled_courses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .db
        .user_by_id(user.id)
        .await
        .map_err(|_| ApiError::not_found("User not found"))?;

    let mut data = Vec::with_capacity(record.courses.len());
    for course_id in &record.courses {
        let course = state.db.course(*course_id).await?;
        let summary = course_content(&state.db, &course, false).await?;

        let completed = match state.db.enrollment_record(user.id, *course_id).await {
            Ok(rec) => rec.completed.len(),
            Err(_) => 0,
        };
        let progress = if summary.subsection_count == 0 {
            100.0
        } else {
            let raw = completed as f64 / summary.subsection_count as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        };

        let mut obj = match serde_json::to_value(&course) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return Err(ApiError::upstream("Internal server error")),
        };
        obj.insert(
            "courseContent".into(),
            serde_json::Value::Array(summary.content),
        );
        obj.insert(
            "totalDuration".into(),
            serde_json::Value::String(seconds_to_duration(summary.total_duration_secs)),
        );
        obj.insert("progressPercentage".into(), serde_json::json!(progress));
        data.push(serde_json::Value::Object(obj));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": data,
    })))
}

pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .db
        .delete_user(user.id)
        .await
        .map_err(|_| ApiError::not_found("User not found"))?;
    tracing::info!(user = %user.email, "account deleted");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}
