//! Catalog handlers: courses, categories, sections, subsections and
//! per-user course progress.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Category, Course, CourseStatus, Role, Section, SubSection};
use crate::state::AppState;
use crate::store::{Db, StoreError};

/// Render a duration the way the dashboard displays it.
pub(crate) fn seconds_to_duration(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn parse_status(s: Option<&str>) -> Result<CourseStatus, ApiError> {
    match s {
        None | Some("Draft") => Ok(CourseStatus::Draft),
        Some("Published") => Ok(CourseStatus::Published),
        Some(_) => Err(ApiError::validation("Invalid course status")),
    }
}

fn to_object(value: impl serde::Serialize) -> Result<serde_json::Map<String, serde_json::Value>, ApiError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        _ => Err(ApiError::upstream("Internal server error")),
    }
}

pub(crate) struct ContentSummary {
    pub content: Vec<serde_json::Value>,
    pub total_duration_secs: u64,
    pub subsection_count: usize,
}

/// Expand a course's section ids into section objects carrying their
/// subsections under `subSection`, totalling durations along the way.
pub(crate) async fn course_content(
    db: &Db,
    course: &Course,
    hide_video: bool,
) -> Result<ContentSummary, ApiError> {
    let mut content = Vec::with_capacity(course.sections.len());
    let mut total_duration_secs = 0u64;
    let mut subsection_count = 0usize;

    for section_id in &course.sections {
        let section = db.section(*section_id).await?;
        let mut subs = Vec::with_capacity(section.subsections.len());
        for sub_id in &section.subsections {
            let sub = db.subsection(*sub_id).await?;
            total_duration_secs += sub.duration_secs;
            subsection_count += 1;
            let mut obj = to_object(&sub)?;
            if hide_video {
                obj.remove("videoUrl");
            }
            subs.push(serde_json::Value::Object(obj));
        }
        let mut obj = to_object(&section)?;
        obj.insert("subSection".into(), serde_json::Value::Array(subs));
        content.push(serde_json::Value::Object(obj));
    }

    Ok(ContentSummary {
        content,
        total_duration_secs,
        subsection_count,
    })
}

async fn course_with_content(
    db: &Db,
    course: &Course,
    hide_video: bool,
) -> Result<(serde_json::Value, ContentSummary), ApiError> {
    let summary = course_content(db, course, hide_video).await?;
    let mut obj = to_object(course)?;
    obj.insert(
        "courseContent".into(),
        serde_json::Value::Array(summary.content.clone()),
    );
    Ok((serde_json::Value::Object(obj), summary))
}

async fn section_with_content(db: &Db, section: &Section) -> Result<serde_json::Value, ApiError> {
    let mut subs = Vec::with_capacity(section.subsections.len());
    for sub_id in &section.subsections {
        let sub = db.subsection(*sub_id).await?;
        subs.push(serde_json::to_value(sub).map_err(|_| ApiError::upstream("Internal server error"))?);
    }
    let mut obj = to_object(section)?;
    obj.insert("subSection".into(), serde_json::Value::Array(subs));
    Ok(serde_json::Value::Object(obj))
}

// ---- courses ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseReq {
    #[serde(default)]
    pub course_name: String,
    #[serde(default)]
    pub course_description: String,
    #[serde(default)]
    pub what_you_will_learn: String,
    pub price: Option<u64>,
    #[serde(default)]
    pub tag: Vec<String>,
    pub category: Option<Uuid>,
    #[serde(default)]
    pub instructions: Vec<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub thumbnail: String,
}

pub async fn create_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCourseReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;

    if req.course_name.is_empty()
        || req.course_description.is_empty()
        || req.what_you_will_learn.is_empty()
        || req.price.is_none()
        || req.tag.is_empty()
        || req.category.is_none()
        || req.instructions.is_empty()
    {
        return Err(ApiError::validation("All fields are mandatory"));
    }
    let status = parse_status(req.status.as_deref())?;

    let instructor = state
        .db
        .user_by_id(user.id)
        .await
        .map_err(|_| ApiError::not_found("Instructor details not found"))?;

    let category = req.category.unwrap_or_default();
    state
        .db
        .category(category)
        .await
        .map_err(|_| ApiError::not_found("Category not found"))?;

    let course = state
        .db
        .create_course(Course {
            id: Uuid::new_v4(),
            title: req.course_name,
            description: req.course_description,
            what_you_will_learn: req.what_you_will_learn,
            price: req.price.unwrap_or_default(),
            tags: req.tag,
            instructions: req.instructions,
            thumbnail: req.thumbnail,
            status,
            students_enrolled: vec![],
            sections: vec![],
            category_id: category,
            instructor_id: instructor.id,
            created_at: Utc::now(),
        })
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": course,
        "message": "Course created successfully",
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCourseReq {
    pub course_id: Uuid,
    pub course_name: Option<String>,
    pub course_description: Option<String>,
    pub what_you_will_learn: Option<String>,
    pub price: Option<u64>,
    pub tag: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub status: Option<String>,
    pub thumbnail: Option<String>,
    pub category: Option<Uuid>,
}

pub async fn edit_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<EditCourseReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;

    let mut course = state
        .db
        .course(req.course_id)
        .await
        .map_err(|_| ApiError::not_found("Course not found"))?;

    if let Some(title) = req.course_name {
        course.title = title;
    }
    if let Some(description) = req.course_description {
        course.description = description;
    }
    if let Some(blurb) = req.what_you_will_learn {
        course.what_you_will_learn = blurb;
    }
    if let Some(price) = req.price {
        course.price = price;
    }
    if let Some(tags) = req.tag {
        course.tags = tags;
    }
    if let Some(instructions) = req.instructions {
        course.instructions = instructions;
    }
    if let Some(thumbnail) = req.thumbnail {
        course.thumbnail = thumbnail;
    }
    if req.status.is_some() {
        course.status = parse_status(req.status.as_deref())?;
    }
    if let Some(category) = req.category {
        state
            .db
            .category(category)
            .await
            .map_err(|_| ApiError::not_found("Category not found"))?;
        course.category_id = category;
    }

    state.db.update_course(course.clone()).await?;
    let (data, _) = course_with_content(&state.db, &course, false).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Course updated successfully",
        "data": data,
    })))
}

pub async fn get_all_courses(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let courses = state.db.published_courses().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": courses,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseIdReq {
    pub course_id: Uuid,
}

pub async fn get_course_details(
    State(state): State<AppState>,
    Json(req): Json<CourseIdReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let course = state
        .db
        .course(req.course_id)
        .await
        .map_err(|_| ApiError::not_found("Course not found"))?;

    // public view: subsection video urls are withheld
    let (details, summary) = course_with_content(&state.db, &course, true).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "courseDetails": details,
            "totalDuration": seconds_to_duration(summary.total_duration_secs),
        },
    })))
}

pub async fn get_full_course_details(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CourseIdReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let course = state
        .db
        .course(req.course_id)
        .await
        .map_err(|_| ApiError::not_found("Course not found"))?;

    let (details, summary) = course_with_content(&state.db, &course, false).await?;
    let completed: Vec<Uuid> = match state.db.enrollment_record(user.id, course.id).await {
        Ok(record) => record.completed.into_iter().collect(),
        Err(_) => vec![],
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "courseDetails": details,
            "totalDuration": seconds_to_duration(summary.total_duration_secs),
            "completedVideos": completed,
        },
    })))
}

pub async fn get_instructor_courses(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;
    let courses = state.db.courses_by_instructor(user.id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": courses,
    })))
}

pub async fn delete_course(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CourseIdReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;
    state
        .db
        .delete_course(req.course_id)
        .await
        .map_err(|_| ApiError::not_found("Course not found"))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Course deleted successfully",
    })))
}

// ---- categories ----

#[derive(Deserialize)]
pub struct CreateCategoryReq {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCategoryReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Admin)?;
    if req.name.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }
    let category = state
        .db
        .create_category(Category {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            courses: vec![],
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => ApiError::conflict("Category already exists"),
            other => other.into(),
        })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": category,
        "message": "Category created successfully",
    })))
}

pub async fn show_all_categories(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let categories = state.db.categories().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": categories,
    })))
}

// ---- sections ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSectionReq {
    #[serde(default)]
    pub section_name: String,
    pub course_id: Option<Uuid>,
}

pub async fn add_section(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AddSectionReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;
    let Some(course_id) = req.course_id else {
        return Err(ApiError::validation("Missing required properties"));
    };
    if req.section_name.is_empty() {
        return Err(ApiError::validation("Missing required properties"));
    }

    let course = state
        .db
        .course(course_id)
        .await
        .map_err(|_| ApiError::not_found("Course not found"))?;

    state
        .db
        .add_section(Section {
            id: Uuid::new_v4(),
            course_id: course.id,
            name: req.section_name,
            subsections: vec![],
        })
        .await?;

    let course = state.db.course(course_id).await?;
    let (data, _) = course_with_content(&state.db, &course, false).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Section created successfully",
        "data": data,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSectionReq {
    #[serde(default)]
    pub section_name: String,
    pub section_id: Uuid,
}

pub async fn update_section(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateSectionReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;
    if req.section_name.is_empty() {
        return Err(ApiError::validation("Missing required properties"));
    }

    let mut section = state
        .db
        .section(req.section_id)
        .await
        .map_err(|_| ApiError::not_found("Section not found"))?;
    section.name = req.section_name;
    state.db.update_section(section.clone()).await?;

    let course = state.db.course(section.course_id).await?;
    let (data, _) = course_with_content(&state.db, &course, false).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Section updated successfully",
        "data": data,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionIdReq {
    pub section_id: Uuid,
}

pub async fn delete_section(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SectionIdReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;
    state
        .db
        .delete_section(req.section_id)
        .await
        .map_err(|_| ApiError::not_found("Section not found"))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Section deleted successfully",
    })))
}

// ---- subsections ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubSectionReq {
    pub section_id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub time_duration: Option<u64>,
    #[serde(default)]
    pub video_url: String,
}

pub async fn add_subsection(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AddSubSectionReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;
    let (Some(section_id), Some(duration)) = (req.section_id, req.time_duration) else {
        return Err(ApiError::validation("All fields are required"));
    };
    if req.title.is_empty() || req.description.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }

    let section = state
        .db
        .section(section_id)
        .await
        .map_err(|_| ApiError::not_found("Section not found"))?;

    state
        .db
        .add_subsection(SubSection {
            id: Uuid::new_v4(),
            section_id: section.id,
            title: req.title,
            description: req.description,
            duration_secs: duration,
            video_url: req.video_url,
        })
        .await?;

    let section = state.db.section(section_id).await?;
    let data = section_with_content(&state.db, &section).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "SubSection created successfully",
        "data": data,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubSectionReq {
    pub sub_section_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub time_duration: Option<u64>,
    pub video_url: Option<String>,
}

pub async fn update_subsection(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateSubSectionReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;

    let mut sub = state
        .db
        .subsection(req.sub_section_id)
        .await
        .map_err(|_| ApiError::not_found("SubSection not found"))?;
    if let Some(title) = req.title {
        sub.title = title;
    }
    if let Some(description) = req.description {
        sub.description = description;
    }
    if let Some(duration) = req.time_duration {
        sub.duration_secs = duration;
    }
    if let Some(video_url) = req.video_url {
        sub.video_url = video_url;
    }
    state.db.update_subsection(sub.clone()).await?;

    let section = state.db.section(sub.section_id).await?;
    let data = section_with_content(&state.db, &section).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "SubSection updated successfully",
        "data": data,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSectionIdReq {
    pub sub_section_id: Uuid,
}

pub async fn delete_subsection(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SubSectionIdReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    user.require(Role::Instructor)?;
    state
        .db
        .delete_subsection(req.sub_section_id)
        .await
        .map_err(|_| ApiError::not_found("SubSection not found"))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "SubSection deleted successfully",
    })))
}

// ---- progress ----

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressReq {
    pub course_id: Uuid,
    pub subsection_id: Uuid,
}

pub async fn update_course_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CourseProgressReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .db
        .subsection(req.subsection_id)
        .await
        .map_err(|_| ApiError::not_found("Invalid subsection"))?;

    state
        .db
        .complete_subsection(user.id, req.course_id, req.subsection_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ApiError::not_found("Course progress does not exist"),
            StoreError::Conflict => ApiError::conflict("Subsection already completed"),
            other => other.into(),
        })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Course progress updated",
    })))
}
