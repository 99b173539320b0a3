//! API-level tests: the assembled router driven in-process against the
//! in-memory store, a mock or live-configured gateway, and a recording
//! mailer.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::issue_token;
use crate::config::PaymentCredentials;
use crate::handlers;
use crate::mailer::test_support::RecordingMailer;
use crate::models::{Category, Course, CourseStatus, Profile, Role, Section, SubSection, User};
use crate::payments::{signature_for, PaymentGateway};
use crate::state::AppState;
use crate::store::{self, Db};

const JWT_SECRET: &str = "test-secret";
const LIVE_SECRET: &str = "rzp-secret";

struct TestApp {
    state: AppState,
    mailer: Arc<RecordingMailer>,
}

fn mock_app() -> TestApp {
    app_with(None)
}

fn live_app() -> TestApp {
    app_with(Some(PaymentCredentials {
        key_id: "rzp_test_key".into(),
        key_secret: LIVE_SECRET.into(),
    }))
}

fn app_with(creds: Option<PaymentCredentials>) -> TestApp {
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState {
        db: store::memory(),
        gateway: Arc::new(PaymentGateway::from_credentials(creds)),
        mailer: mailer.clone(),
        jwt_secret: Arc::from(JWT_SECRET),
        frontend_url: Arc::from("http://localhost:3000"),
    };
    TestApp { state, mailer }
}

async fn request(
    state: &AppState,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let app = handlers::router(state.clone());
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn post(
    state: &AppState,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    request(state, Method::POST, path, token, Some(body)).await
}

async fn seed_user(db: &Db, email: &str, role: Role) -> User {
    let profile = db
        .create_profile(Profile {
            id: Uuid::new_v4(),
            ..Default::default()
        })
        .await
        .unwrap();
    db.create_user(User {
        id: Uuid::new_v4(),
        first_name: "Asha".into(),
        last_name: "Rao".into(),
        email: email.into(),
        password_hash: bcrypt::hash("hunter2", 4).unwrap(),
        role,
        approved: true,
        image: String::new(),
        courses: vec![],
        course_progress: vec![],
        profile_id: profile.id,
        reset_token: None,
        reset_expires: None,
        created_at: Utc::now(),
    })
    .await
    .unwrap()
}

async fn seed_course(db: &Db, instructor: &User, price: u64) -> Course {
    let category = db
        .create_category(Category {
            id: Uuid::new_v4(),
            name: format!("cat-{}", Uuid::new_v4()),
            description: "seeded".into(),
            courses: vec![],
        })
        .await
        .unwrap();
    db.create_course(Course {
        id: Uuid::new_v4(),
        title: "Rust from scratch".into(),
        description: "systems programming, gently".into(),
        what_you_will_learn: "ownership".into(),
        price,
        tags: vec!["rust".into()],
        instructions: vec!["bring a laptop".into()],
        thumbnail: String::new(),
        status: CourseStatus::Published,
        students_enrolled: vec![],
        sections: vec![],
        category_id: category.id,
        instructor_id: instructor.id,
        created_at: Utc::now(),
    })
    .await
    .unwrap()
}

fn token_for(user: &User) -> String {
    issue_token(user, JWT_SECRET).unwrap()
}

#[tokio::test]
async fn public_routes_answer_without_a_token() {
    let app = mock_app();
    let (status, _) = request(
        &app.state,
        Method::GET,
        "/api/course/showAllCategories",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = mock_app();
    let (status, body) =
        request(&app.state, Method::GET, "/api/profile/getUserDetails", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Token is missing"));
}

#[tokio::test]
async fn signup_requires_all_fields() {
    let app = mock_app();
    let (status, body) = post(
        &app.state,
        "/api/user/signup",
        None,
        json!({ "email": "a@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], json!("All fields are required"));
}

#[tokio::test]
async fn signup_flow_via_otp() {
    let app = mock_app();
    let (status, body) = post(
        &app.state,
        "/api/user/sendotp",
        None,
        json!({ "email": "new@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("OTP sent successfully"));

    // the recording mailer saw the code
    let code = {
        let sent = app.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "new@example.com");
        let body = &sent[0].body;
        let at = body.find("code is: ").unwrap() + "code is: ".len();
        body[at..at + 6].to_string()
    };

    let (status, body) = post(
        &app.state,
        "/api/user/signup",
        None,
        json!({
            "firstName": "Asha",
            "lastName": "Rao",
            "email": "new@example.com",
            "password": "hunter2",
            "confirmPassword": "hunter2",
            "accountType": "Student",
            "otp": code,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("User registered successfully"));
    assert_eq!(body["user"]["email"], json!("new@example.com"));
    // the hash never leaves the server
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = post(
        &app.state,
        "/api/user/login",
        None,
        json!({ "email": "new@example.com", "password": "hunter2" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Login successful"));
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = request(
        &app.state,
        Method::GET,
        "/api/profile/getUserDetails",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], json!("new@example.com"));
    assert!(body["data"]["additionalDetails"].is_object());
}

#[tokio::test]
async fn signup_with_wrong_otp_is_rejected() {
    let app = mock_app();
    post(
        &app.state,
        "/api/user/sendotp",
        None,
        json!({ "email": "new@example.com" }),
    )
    .await;

    let (status, body) = post(
        &app.state,
        "/api/user/signup",
        None,
        json!({
            "firstName": "Asha",
            "lastName": "Rao",
            "email": "new@example.com",
            "password": "hunter2",
            "confirmPassword": "hunter2",
            "otp": "000000",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid OTP"));
}

#[tokio::test]
async fn sendotp_refuses_registered_emails() {
    let app = mock_app();
    seed_user(&app.state.db, "taken@example.com", Role::Student).await;
    let (status, body) = post(
        &app.state,
        "/api/user/sendotp",
        None,
        json!({ "email": "taken@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("User already registered"));
}

#[tokio::test]
async fn login_sets_an_http_only_cookie() {
    let app = mock_app();
    seed_user(&app.state.db, "asha@example.com", Role::Student).await;

    let router = handlers::router(app.state.clone());
    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/user/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "asha@example.com", "password": "hunter2" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = mock_app();
    seed_user(&app.state.db, "asha@example.com", Role::Student).await;
    let (status, body) = post(
        &app.state,
        "/api/user/login",
        None,
        json!({ "email": "asha@example.com", "password": "nope" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Incorrect password"));
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = mock_app();
    seed_user(&app.state.db, "asha@example.com", Role::Student).await;

    let (status, _) = post(
        &app.state,
        "/api/user/reset-password-token",
        None,
        json!({ "email": "asha@example.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = {
        let sent = app.mailer.sent.lock().unwrap();
        let body = &sent[0].body;
        let at = body.find("/update-password/").unwrap() + "/update-password/".len();
        body[at..].split_whitespace().next().unwrap().to_string()
    };

    let (status, body) = post(
        &app.state,
        "/api/user/reset-password",
        None,
        json!({ "token": token, "password": "n3wpass", "confirmPassword": "n3wpass" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Password reset successful"));

    // the token is single use
    let (status, body) = post(
        &app.state,
        "/api/user/reset-password",
        None,
        json!({ "token": token, "password": "again", "confirmPassword": "again" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Token is invalid or expired"));

    let (status, _) = post(
        &app.state,
        "/api/user/login",
        None,
        json!({ "email": "asha@example.com", "password": "n3wpass" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ---- payments ----

#[tokio::test]
async fn capture_with_empty_course_list_fails() {
    let app = mock_app();
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    let (status, body) = post(
        &app.state,
        "/api/payments/capturePayment",
        Some(&token_for(&student)),
        json!({ "courses": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Please Provide Course ID"));
}

#[tokio::test]
async fn capture_with_unknown_course_is_not_found() {
    let app = mock_app();
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    let (status, body) = post(
        &app.state,
        "/api/payments/capturePayment",
        Some(&token_for(&student)),
        json!({ "courses": [Uuid::new_v4()] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Course not found"));
}

#[tokio::test]
async fn mock_capture_synthesizes_an_order() {
    let app = mock_app();
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let course_a = seed_course(&app.state.db, &instructor, 49900).await;
    let course_b = seed_course(&app.state.db, &instructor, 100).await;
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;

    let (status, body) = post(
        &app.state,
        "/api/payments/capturePayment",
        Some(&token_for(&student)),
        json!({ "courses": [course_a.id, course_b.id] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Mock payment order created"));
    assert!(body["data"]["id"]
        .as_str()
        .unwrap()
        .starts_with("order_mock_"));
    assert_eq!(body["data"]["amount"], json!(50000));
    assert_eq!(body["data"]["currency"], json!("INR"));
}

#[tokio::test]
async fn capture_conflicts_when_already_enrolled() {
    let app = mock_app();
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let course = seed_course(&app.state.db, &instructor, 49900).await;
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    app.state.db.enroll(student.id, course.id).await.unwrap();

    let (status, body) = post(
        &app.state,
        "/api/payments/capturePayment",
        Some(&token_for(&student)),
        json!({ "courses": [course.id] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Already enrolled"));
}

#[tokio::test]
async fn mock_verify_enrolls_and_notifies_once() {
    let app = mock_app();
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let course = seed_course(&app.state.db, &instructor, 49900).await;
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;

    let (status, body) = post(
        &app.state,
        "/api/payments/verifyPayment",
        Some(&token_for(&student)),
        json!({ "courses": [course.id] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Mock payment verified"));

    let student = app.state.db.user_by_id(student.id).await.unwrap();
    assert_eq!(student.courses, vec![course.id]);
    let record = app
        .state
        .db
        .enrollment_record(student.id, course.id)
        .await
        .unwrap();
    assert!(record.completed.is_empty());
    assert_eq!(app.mailer.sent_count(), 1);
}

#[tokio::test]
async fn live_verify_accepts_a_valid_signature() {
    let app = live_app();
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let course = seed_course(&app.state.db, &instructor, 49900).await;
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;

    let signature = signature_for(LIVE_SECRET, "order_1", "pay_1");
    let (status, body) = post(
        &app.state,
        "/api/payments/verifyPayment",
        Some(&token_for(&student)),
        json!({
            "razorpay_order_id": "order_1",
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": signature,
            "courses": [course.id],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Payment Verified"));
    assert!(app
        .state
        .db
        .enrollment_record(student.id, course.id)
        .await
        .is_ok());
}

#[tokio::test]
async fn live_verify_rejects_a_mismatched_signature_without_mutation() {
    let app = live_app();
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let course = seed_course(&app.state.db, &instructor, 49900).await;
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;

    let signature = signature_for("wrong-secret", "order_1", "pay_1");
    let (status, body) = post(
        &app.state,
        "/api/payments/verifyPayment",
        Some(&token_for(&student)),
        json!({
            "razorpay_order_id": "order_1",
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": signature,
            "courses": [course.id],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Payment Failed"));

    // nothing was enrolled, nothing was sent
    let student = app.state.db.user_by_id(student.id).await.unwrap();
    assert!(student.courses.is_empty());
    assert!(app
        .state
        .db
        .enrollment_record(student.id, course.id)
        .await
        .is_err());
    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn payment_receipt_email_is_sent() {
    let app = mock_app();
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    let (status, body) = post(
        &app.state,
        "/api/payments/sendPaymentSuccessEmail",
        Some(&token_for(&student)),
        json!({ "orderId": "order_1", "paymentId": "pay_1", "amount": 49900 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Payment email sent"));

    let sent = app.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Payment Received");
    assert!(sent[0].body.contains("499.00"));
}

// ---- catalog ----

#[tokio::test]
async fn category_creation_is_admin_only() {
    let app = mock_app();
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    let (status, _) = post(
        &app.state,
        "/api/course/createCategory",
        Some(&token_for(&student)),
        json!({ "name": "Programming", "description": "code" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = seed_user(&app.state.db, "a@example.com", Role::Admin).await;
    let (status, body) = post(
        &app.state,
        "/api/course/createCategory",
        Some(&token_for(&admin)),
        json!({ "name": "Programming", "description": "code" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Category created successfully"));
}

#[tokio::test]
async fn course_creation_is_instructor_only() {
    let app = mock_app();
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    let (status, body) = post(
        &app.state,
        "/api/course/createCourse",
        Some(&token_for(&student)),
        json!({ "courseName": "Rust" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        json!("This is a protected route for Instructor")
    );
}

#[tokio::test]
async fn catalog_flow_builds_a_course_with_content() {
    let app = mock_app();
    let admin = seed_user(&app.state.db, "a@example.com", Role::Admin).await;
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let instructor_token = token_for(&instructor);

    let (_, body) = post(
        &app.state,
        "/api/course/createCategory",
        Some(&token_for(&admin)),
        json!({ "name": "Programming", "description": "code" }),
    )
    .await;
    let category_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &app.state,
        "/api/course/createCourse",
        Some(&instructor_token),
        json!({
            "courseName": "Rust from scratch",
            "courseDescription": "systems programming, gently",
            "whatYouWillLearn": "ownership",
            "price": 49900,
            "tag": ["rust"],
            "category": category_id,
            "instructions": ["bring a laptop"],
            "status": "Published",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let course_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &app.state,
        "/api/course/addSection",
        Some(&instructor_token),
        json!({ "sectionName": "Getting started", "courseId": course_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let section_id = body["data"]["courseContent"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = post(
        &app.state,
        "/api/course/addSubSection",
        Some(&instructor_token),
        json!({
            "sectionId": section_id,
            "title": "Installing the toolchain",
            "description": "rustup and friends",
            "timeDuration": 150,
            "videoUrl": "https://cdn.example.com/v/1",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // the public view withholds video urls and totals the duration
    let (status, body) = post(
        &app.state,
        "/api/course/getCourseDetails",
        None,
        json!({ "courseId": course_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalDuration"], json!("2m 30s"));
    let sub = &body["data"]["courseDetails"]["courseContent"][0]["subSection"][0];
    assert_eq!(sub["title"], json!("Installing the toolchain"));
    assert!(sub.get("videoUrl").is_none());

    // published listing picks it up
    let (_, body) = request(&app.state, Method::GET, "/api/course/getAllCourses", None, None).await;
    assert_eq!(body["data"][0]["title"], json!("Rust from scratch"));

    let (_, body) = request(
        &app.state,
        Method::GET,
        "/api/course/getInstructorCourses",
        Some(&instructor_token),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn progress_updates_once_per_subsection() {
    let app = mock_app();
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let course = seed_course(&app.state.db, &instructor, 49900).await;
    let section = app
        .state
        .db
        .add_section(Section {
            id: Uuid::new_v4(),
            course_id: course.id,
            name: "Getting started".into(),
            subsections: vec![],
        })
        .await
        .unwrap();
    let sub = app
        .state
        .db
        .add_subsection(SubSection {
            id: Uuid::new_v4(),
            section_id: section.id,
            title: "Installing the toolchain".into(),
            description: "rustup".into(),
            duration_secs: 150,
            video_url: String::new(),
        })
        .await
        .unwrap();

    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    app.state.db.enroll(student.id, course.id).await.unwrap();
    let token = token_for(&student);

    let (status, body) = post(
        &app.state,
        "/api/course/updateCourseProgress",
        Some(&token),
        json!({ "courseId": course.id, "subsectionId": sub.id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Course progress updated"));

    let (status, body) = post(
        &app.state,
        "/api/course/updateCourseProgress",
        Some(&token),
        json!({ "courseId": course.id, "subsectionId": sub.id }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Subsection already completed"));

    // full details now report the completed subsection
    let (_, body) = post(
        &app.state,
        "/api/course/getFullCourseDetails",
        Some(&token),
        json!({ "courseId": course.id }),
    )
    .await;
    assert_eq!(body["data"]["completedVideos"][0], json!(sub.id));

    // and enrolled courses report full progress
    let (_, body) = request(
        &app.state,
        Method::GET,
        "/api/profile/getEnrolledCourses",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["data"][0]["progressPercentage"], json!(100.0));
}

#[tokio::test]
async fn deleting_the_account_unenrolls() {
    let app = mock_app();
    let instructor = seed_user(&app.state.db, "i@example.com", Role::Instructor).await;
    let course = seed_course(&app.state.db, &instructor, 49900).await;
    let student = seed_user(&app.state.db, "s@example.com", Role::Student).await;
    app.state.db.enroll(student.id, course.id).await.unwrap();

    let (status, body) = request(
        &app.state,
        Method::DELETE,
        "/api/profile/deleteProfile",
        Some(&token_for(&student)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("User deleted successfully"));

    let course = app.state.db.course(course.id).await.unwrap();
    assert!(course.students_enrolled.is_empty());
}
