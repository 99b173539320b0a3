//! Signup, login and credential-recovery handlers.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{generate_signup_code, hash_password, issue_token, verify_password, AuthUser};
use crate::error::ApiError;
use crate::mailer::templates;
use crate::models::{CodeState, OneTimeCode, Profile, Role, User};
use crate::state::AppState;
use crate::store::StoreError;

const CODE_VALIDITY_MINUTES: i64 = 10;
const RESET_VALIDITY_MINUTES: i64 = 5;

#[derive(Deserialize)]
pub struct SendOtpReq {
    pub email: String,
}

pub async fn send_otp(
    State(state): State<AppState>,
    Json(req): Json<SendOtpReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }
    if state.db.user_by_email(&email).await.is_ok() {
        return Err(ApiError::conflict("User already registered"));
    }

    let code = generate_signup_code();
    let (subject, body) = templates::signup_code(&code);
    state
        .mailer
        .send(&email, &subject, &body)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "signup code email failed");
            ApiError::upstream("Failed to send OTP")
        })?;

    let now = Utc::now();
    state
        .db
        .issue_code(OneTimeCode {
            email,
            code,
            state: CodeState::Issued,
            created_at: now,
            expires_at: now + Duration::minutes(CODE_VALIDITY_MINUTES),
        })
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "OTP sent successfully",
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupReq {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    pub account_type: Option<String>,
    pub contact_number: Option<String>,
    #[serde(default)]
    pub otp: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.first_name.is_empty()
        || req.last_name.is_empty()
        || req.email.is_empty()
        || req.password.is_empty()
        || req.confirm_password.is_empty()
        || req.otp.is_empty()
    {
        return Err(ApiError::forbidden("All fields are required"));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::validation(
            "Password and Confirm Password do not match",
        ));
    }

    let role = match &req.account_type {
        Some(s) => Role::parse(s).ok_or_else(|| ApiError::validation("Invalid account type"))?,
        None => Role::Student,
    };

    let email = req.email.trim().to_lowercase();
    if state.db.user_by_email(&email).await.is_ok() {
        return Err(ApiError::conflict("User already exists. Please login."));
    }

    state
        .db
        .consume_code(&email, &req.otp)
        .await
        .map_err(|_| ApiError::validation("Invalid OTP"))?;

    let password_hash = hash_password(&req.password)?;

    // instructors wait for approval before publishing
    let approved = role != Role::Instructor;

    let profile = state
        .db
        .create_profile(Profile {
            id: Uuid::new_v4(),
            gender: None,
            date_of_birth: None,
            about: None,
            contact_number: req.contact_number.clone(),
        })
        .await?;

    let user = state
        .db
        .create_user(User {
            id: Uuid::new_v4(),
            first_name: req.first_name,
            last_name: req.last_name,
            email,
            password_hash,
            role,
            approved,
            image: String::new(),
            courses: vec![],
            course_progress: vec![],
            profile_id: profile.id,
            reset_token: None,
            reset_expires: None,
            created_at: Utc::now(),
        })
        .await
        .map_err(|e| match e {
            StoreError::AlreadyExists => ApiError::conflict("User already exists. Please login."),
            other => other.into(),
        })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "User registered successfully",
        "user": user,
    })))
}

#[derive(Deserialize)]
pub struct LoginReq {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginReq>,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }

    let email = req.email.trim().to_lowercase();
    let user = state
        .db
        .user_by_email(&email)
        .await
        .map_err(|_| ApiError::unauthorized("User not registered"))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::unauthorized("Incorrect password"));
    }

    let token = issue_token(&user, &state.jwt_secret)?;
    let cookie = Cookie::build(("token", token.clone()))
        .path("/")
        .http_only(true)
        .build();

    Ok((
        jar.add(cookie),
        Json(serde_json::json!({
            "success": true,
            "token": token,
            "user": user,
            "message": "Login successful",
        })),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordReq {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation("All fields are required"));
    }

    let mut record = state
        .db
        .user_by_id(user.id)
        .await
        .map_err(|_| ApiError::not_found("User not found"))?;

    if !verify_password(&req.old_password, &record.password_hash)? {
        return Err(ApiError::unauthorized("Old password is incorrect"));
    }

    record.password_hash = hash_password(&req.new_password)?;
    let name = record.full_name();
    let email = record.email.clone();
    state.db.update_user(record).await?;

    let (subject, body) = templates::password_updated(&name);
    if let Err(e) = state.mailer.send(&email, &subject, &body).await {
        tracing::warn!(error = %e, "password update email failed");
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Password updated successfully",
    })))
}

#[derive(Deserialize)]
pub struct ResetTokenReq {
    #[serde(default)]
    pub email: String,
}

pub async fn reset_password_token(
    State(state): State<AppState>,
    Json(req): Json<ResetTokenReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let mut user = state
        .db
        .user_by_email(&email)
        .await
        .map_err(|_| ApiError::unauthorized("User not registered"))?;

    let token = Uuid::new_v4().to_string();
    user.reset_token = Some(token.clone());
    user.reset_expires = Some(Utc::now() + Duration::minutes(RESET_VALIDITY_MINUTES));
    state.db.update_user(user).await?;

    let reset_url = format!("{}/update-password/{}", state.frontend_url, token);
    let (subject, body) = templates::password_reset(&reset_url);
    state.mailer.send(&email, &subject, &body).await.map_err(|e| {
        tracing::error!(error = %e, "reset password email failed");
        ApiError::upstream("Error sending reset password email")
    })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Reset password link sent to email",
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordReq {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.password != req.confirm_password {
        return Err(ApiError::validation("Passwords do not match"));
    }

    let mut user = state
        .db
        .user_by_reset_token(&req.token)
        .await
        .map_err(|_| ApiError::validation("Token is invalid or expired"))?;

    // expiry is checked at lookup time
    match user.reset_expires {
        Some(expires) if expires > Utc::now() => {}
        _ => return Err(ApiError::validation("Token is invalid or expired")),
    }

    user.password_hash = hash_password(&req.password)?;
    user.reset_token = None;
    user.reset_expires = None;
    state.db.update_user(user).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Password reset successful",
    })))
}
