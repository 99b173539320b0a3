//! Payment handlers: capture, verify and the post-payment receipt email.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::enrollment;
use crate::error::ApiError;
use crate::mailer::templates;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CapturePaymentReq {
    #[serde(default)]
    pub courses: Vec<Uuid>,
}

pub async fn capture_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CapturePaymentReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let total = enrollment::quote(&state.db, user.id, &req.courses).await?;

    let order = state
        .gateway
        .create_order(total, "INR")
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "order creation failed");
            ApiError::upstream("Payment initiation failed")
        })?;

    if state.gateway.is_mock() {
        return Ok(Json(serde_json::json!({
            "success": true,
            "message": "Mock payment order created",
            "data": order,
        })));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": order,
    })))
}

#[derive(Deserialize)]
pub struct VerifyPaymentReq {
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_signature: Option<String>,
    #[serde(default)]
    pub courses: Vec<Uuid>,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VerifyPaymentReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.gateway.is_mock() {
        enrollment::enroll(&state.db, state.mailer.as_ref(), user.id, &req.courses).await?;
        return Ok(Json(serde_json::json!({
            "success": true,
            "message": "Mock payment verified",
        })));
    }

    let (Some(order_id), Some(payment_id), Some(signature)) = (
        req.razorpay_order_id.as_deref(),
        req.razorpay_payment_id.as_deref(),
        req.razorpay_signature.as_deref(),
    ) else {
        return Err(ApiError::validation("Payment Failed"));
    };

    if !state.gateway.verify_signature(order_id, payment_id, signature) {
        return Err(ApiError::validation("Payment Failed"));
    }

    enrollment::enroll(&state.db, state.mailer.as_ref(), user.id, &req.courses).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Payment Verified",
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessEmailReq {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub payment_id: String,
    pub amount: Option<u64>,
}

pub async fn send_payment_success_email(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PaymentSuccessEmailReq>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.order_id.is_empty() || req.payment_id.is_empty() || req.amount.is_none() {
        return Err(ApiError::validation("Please provide all the details"));
    }

    let student = state
        .db
        .user_by_id(user.id)
        .await
        .map_err(|_| ApiError::not_found("User not found"))?;

    let (subject, body) = templates::payment_receipt(
        &student.full_name(),
        req.amount.unwrap_or_default(),
        &req.order_id,
        &req.payment_id,
    );
    state
        .mailer
        .send(&student.email, &subject, &body)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "payment receipt email failed");
            ApiError::upstream("Email sending failed")
        })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Payment email sent",
    })))
}
