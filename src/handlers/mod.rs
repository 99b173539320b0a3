use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod courses;
pub mod payments;
pub mod profile;

pub fn router(state: AppState) -> Router {
    Router::new()
        // identity
        .route("/api/user/sendotp", post(auth::send_otp))
        .route("/api/user/signup", post(auth::signup))
        .route("/api/user/login", post(auth::login))
        .route("/api/user/changepassword", post(auth::change_password))
        .route(
            "/api/user/reset-password-token",
            post(auth::reset_password_token),
        )
        .route("/api/user/reset-password", post(auth::reset_password))
        // profile
        .route("/api/profile/getUserDetails", get(profile::get_user_details))
        .route("/api/profile/updateProfile", put(profile::update_profile))
        .route(
            "/api/profile/getEnrolledCourses",
            get(profile::get_enrolled_courses),
        )
        .route("/api/profile/deleteProfile", delete(profile::delete_account))
        // catalog
        .route("/api/course/createCourse", post(courses::create_course))
        .route("/api/course/editCourse", post(courses::edit_course))
        .route("/api/course/getAllCourses", get(courses::get_all_courses))
        .route(
            "/api/course/getCourseDetails",
            post(courses::get_course_details),
        )
        .route(
            "/api/course/getFullCourseDetails",
            post(courses::get_full_course_details),
        )
        .route(
            "/api/course/getInstructorCourses",
            get(courses::get_instructor_courses),
        )
        .route("/api/course/deleteCourse", delete(courses::delete_course))
        .route("/api/course/createCategory", post(courses::create_category))
        .route(
            "/api/course/showAllCategories",
            get(courses::show_all_categories),
        )
        .route("/api/course/addSection", post(courses::add_section))
        .route("/api/course/updateSection", post(courses::update_section))
        .route("/api/course/deleteSection", post(courses::delete_section))
        .route("/api/course/addSubSection", post(courses::add_subsection))
        .route(
            "/api/course/updateSubSection",
            post(courses::update_subsection),
        )
        .route(
            "/api/course/deleteSubSection",
            post(courses::delete_subsection),
        )
        .route(
            "/api/course/updateCourseProgress",
            post(courses::update_course_progress),
        )
        // payments
        .route(
            "/api/payments/capturePayment",
            post(payments::capture_payment),
        )
        .route("/api/payments/verifyPayment", post(payments::verify_payment))
        .route(
            "/api/payments/sendPaymentSuccessEmail",
            post(payments::send_payment_success_email),
        )
        .with_state(state)
}
