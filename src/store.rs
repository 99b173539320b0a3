//! Storage port for the identity store, catalog store and enrollment
//! ledger, plus the in-process backend.
//!
//! Handlers consume the [`Db`] alias and never see backend details. All
//! mutations that must be atomic (the enrollment upsert, one-time-code
//! consumption, cascading deletes) happen under a single writer lock in
//! the in-memory backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Category, CodeState, Course, CourseStatus, EnrollmentRecord, OneTimeCode, Profile, Section,
    SubSection, User,
};

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Db = Arc<dyn Store>;

/// Open the in-process store.
pub fn memory() -> Db {
    Arc::new(MemoryStore::default())
}

#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn create_user(&self, user: User) -> Result<User, StoreError>;
    async fn user_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn user_by_reset_token(&self, token: &str) -> Result<User, StoreError>;
    async fn update_user(&self, user: User) -> Result<(), StoreError>;
    /// Removes the user, their ledger entries, their profile, and their
    /// membership in every course's enrolled set.
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    // profiles
    async fn create_profile(&self, profile: Profile) -> Result<Profile, StoreError>;
    async fn profile(&self, id: Uuid) -> Result<Profile, StoreError>;
    async fn update_profile(&self, profile: Profile) -> Result<(), StoreError>;

    // categories
    async fn create_category(&self, category: Category) -> Result<Category, StoreError>;
    async fn category(&self, id: Uuid) -> Result<Category, StoreError>;
    async fn categories(&self) -> Result<Vec<Category>, StoreError>;

    // courses
    async fn create_course(&self, course: Course) -> Result<Course, StoreError>;
    async fn course(&self, id: Uuid) -> Result<Course, StoreError>;
    async fn update_course(&self, course: Course) -> Result<(), StoreError>;
    /// Removes the course, its sections and subsections, its ledger
    /// entries, and unenrolls every student.
    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError>;
    async fn published_courses(&self) -> Result<Vec<Course>, StoreError>;
    async fn courses_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<Course>, StoreError>;

    // sections / subsections
    async fn add_section(&self, section: Section) -> Result<Section, StoreError>;
    async fn section(&self, id: Uuid) -> Result<Section, StoreError>;
    async fn update_section(&self, section: Section) -> Result<(), StoreError>;
    async fn delete_section(&self, id: Uuid) -> Result<(), StoreError>;
    async fn add_subsection(&self, sub: SubSection) -> Result<SubSection, StoreError>;
    async fn subsection(&self, id: Uuid) -> Result<SubSection, StoreError>;
    async fn update_subsection(&self, sub: SubSection) -> Result<(), StoreError>;
    async fn delete_subsection(&self, id: Uuid) -> Result<(), StoreError>;

    // enrollment ledger
    /// Idempotent upsert keyed on (user, course): appends the user to the
    /// course's enrolled set, creates a fresh record with an empty
    /// completed set, and appends both references to the user, as one
    /// operation. A second call for the same pair fails with
    /// [`StoreError::AlreadyExists`] and leaves exactly one record.
    async fn enroll(&self, user_id: Uuid, course_id: Uuid)
        -> Result<EnrollmentRecord, StoreError>;
    async fn enrollment_record(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<EnrollmentRecord, StoreError>;
    /// Marks a subsection complete; completing it twice is a conflict.
    async fn complete_subsection(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        subsection_id: Uuid,
    ) -> Result<(), StoreError>;

    // one-time codes
    /// Issues a code for an email, replacing any previous one.
    async fn issue_code(&self, code: OneTimeCode) -> Result<(), StoreError>;
    /// Atomic consume: the code must match, be `Issued`, and be within its
    /// validity window; on success it transitions to `Consumed` so a
    /// replay fails.
    async fn consume_code(&self, email: &str, code: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    users_by_email: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, Profile>,
    categories: HashMap<Uuid, Category>,
    courses: HashMap<Uuid, Course>,
    sections: HashMap<Uuid, Section>,
    subsections: HashMap<Uuid, SubSection>,
    records: HashMap<Uuid, EnrollmentRecord>,
    records_by_pair: HashMap<(Uuid, Uuid), Uuid>,
    codes: HashMap<String, OneTimeCode>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users_by_email.contains_key(&user.email) {
            return Err(StoreError::AlreadyExists);
        }
        inner.users_by_email.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let inner = self.inner.read().await;
        inner.users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn user_by_email(&self, email: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().await;
        let id = inner.users_by_email.get(email).ok_or(StoreError::NotFound)?;
        inner.users.get(id).cloned().ok_or(StoreError::NotFound)
    }

    async fn user_by_reset_token(&self, token: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().await;
        inner
            .users
            .values()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner.users.remove(&id).ok_or(StoreError::NotFound)?;
        inner.users_by_email.remove(&user.email);
        inner.profiles.remove(&user.profile_id);
        for course_id in &user.courses {
            if let Some(course) = inner.courses.get_mut(course_id) {
                course.students_enrolled.retain(|s| *s != id);
            }
            if let Some(rec_id) = inner.records_by_pair.remove(&(id, *course_id)) {
                inner.records.remove(&rec_id);
            }
        }
        Ok(())
    }

    async fn create_profile(&self, profile: Profile) -> Result<Profile, StoreError> {
        let mut inner = self.inner.write().await;
        inner.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn profile(&self, id: Uuid) -> Result<Profile, StoreError> {
        let inner = self.inner.read().await;
        inner.profiles.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_profile(&self, profile: Profile) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.profiles.contains_key(&profile.id) {
            return Err(StoreError::NotFound);
        }
        inner.profiles.insert(profile.id, profile);
        Ok(())
    }

    async fn create_category(&self, category: Category) -> Result<Category, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::AlreadyExists);
        }
        inner.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn category(&self, id: Uuid) -> Result<Category, StoreError> {
        let inner = self.inner.read().await;
        inner
            .categories
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn categories(&self) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.categories.values().cloned().collect())
    }

    async fn create_course(&self, course: Course) -> Result<Course, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&course.instructor_id) {
            return Err(StoreError::NotFound);
        }
        if !inner.categories.contains_key(&course.category_id) {
            return Err(StoreError::NotFound);
        }
        inner.courses.insert(course.id, course.clone());
        if let Some(category) = inner.categories.get_mut(&course.category_id) {
            category.courses.push(course.id);
        }
        if let Some(instructor) = inner.users.get_mut(&course.instructor_id) {
            instructor.courses.push(course.id);
        }
        Ok(course)
    }

    async fn course(&self, id: Uuid) -> Result<Course, StoreError> {
        let inner = self.inner.read().await;
        inner.courses.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_course(&self, course: Course) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.courses.contains_key(&course.id) {
            return Err(StoreError::NotFound);
        }
        inner.courses.insert(course.id, course);
        Ok(())
    }

    async fn delete_course(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let course = inner.courses.remove(&id).ok_or(StoreError::NotFound)?;
        for student_id in &course.students_enrolled {
            if let Some(student) = inner.users.get_mut(student_id) {
                student.courses.retain(|c| *c != id);
            }
            if let Some(rec_id) = inner.records_by_pair.remove(&(*student_id, id)) {
                inner.records.remove(&rec_id);
                if let Some(student) = inner.users.get_mut(student_id) {
                    student.course_progress.retain(|r| *r != rec_id);
                }
            }
        }
        for section_id in &course.sections {
            if let Some(section) = inner.sections.remove(section_id) {
                for sub_id in &section.subsections {
                    inner.subsections.remove(sub_id);
                }
            }
        }
        if let Some(category) = inner.categories.get_mut(&course.category_id) {
            category.courses.retain(|c| *c != id);
        }
        if let Some(instructor) = inner.users.get_mut(&course.instructor_id) {
            instructor.courses.retain(|c| *c != id);
        }
        Ok(())
    }

    async fn published_courses(&self) -> Result<Vec<Course>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .courses
            .values()
            .filter(|c| c.status == CourseStatus::Published)
            .cloned()
            .collect())
    }

    async fn courses_by_instructor(&self, instructor_id: Uuid) -> Result<Vec<Course>, StoreError> {
        let inner = self.inner.read().await;
        let mut courses: Vec<Course> = inner
            .courses
            .values()
            .filter(|c| c.instructor_id == instructor_id)
            .cloned()
            .collect();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(courses)
    }

    async fn add_section(&self, section: Section) -> Result<Section, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.courses.contains_key(&section.course_id) {
            return Err(StoreError::NotFound);
        }
        inner.sections.insert(section.id, section.clone());
        if let Some(course) = inner.courses.get_mut(&section.course_id) {
            course.sections.push(section.id);
        }
        Ok(section)
    }

    async fn section(&self, id: Uuid) -> Result<Section, StoreError> {
        let inner = self.inner.read().await;
        inner.sections.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update_section(&self, section: Section) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.sections.contains_key(&section.id) {
            return Err(StoreError::NotFound);
        }
        inner.sections.insert(section.id, section);
        Ok(())
    }

    async fn delete_section(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let section = inner.sections.remove(&id).ok_or(StoreError::NotFound)?;
        for sub_id in &section.subsections {
            inner.subsections.remove(sub_id);
        }
        if let Some(course) = inner.courses.get_mut(&section.course_id) {
            course.sections.retain(|s| *s != id);
        }
        Ok(())
    }

    async fn add_subsection(&self, sub: SubSection) -> Result<SubSection, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.sections.contains_key(&sub.section_id) {
            return Err(StoreError::NotFound);
        }
        inner.subsections.insert(sub.id, sub.clone());
        if let Some(section) = inner.sections.get_mut(&sub.section_id) {
            section.subsections.push(sub.id);
        }
        Ok(sub)
    }

    async fn subsection(&self, id: Uuid) -> Result<SubSection, StoreError> {
        let inner = self.inner.read().await;
        inner
            .subsections
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_subsection(&self, sub: SubSection) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.subsections.contains_key(&sub.id) {
            return Err(StoreError::NotFound);
        }
        inner.subsections.insert(sub.id, sub);
        Ok(())
    }

    async fn delete_subsection(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let sub = inner.subsections.remove(&id).ok_or(StoreError::NotFound)?;
        if let Some(section) = inner.sections.get_mut(&sub.section_id) {
            section.subsections.retain(|s| *s != id);
        }
        Ok(())
    }

    async fn enroll(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<EnrollmentRecord, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        let already_member = match inner.courses.get(&course_id) {
            Some(course) => course.students_enrolled.contains(&user_id),
            None => return Err(StoreError::NotFound),
        };
        if already_member || inner.records_by_pair.contains_key(&(user_id, course_id)) {
            return Err(StoreError::AlreadyExists);
        }

        let record = EnrollmentRecord {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            completed: Default::default(),
            created_at: Utc::now(),
        };
        inner.records_by_pair.insert((user_id, course_id), record.id);
        inner.records.insert(record.id, record.clone());
        if let Some(course) = inner.courses.get_mut(&course_id) {
            course.students_enrolled.push(user_id);
        }
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.courses.push(course_id);
            user.course_progress.push(record.id);
        }
        Ok(record)
    }

    async fn enrollment_record(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<EnrollmentRecord, StoreError> {
        let inner = self.inner.read().await;
        let rec_id = inner
            .records_by_pair
            .get(&(user_id, course_id))
            .ok_or(StoreError::NotFound)?;
        inner.records.get(rec_id).cloned().ok_or(StoreError::NotFound)
    }

    async fn complete_subsection(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        subsection_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let rec_id = *inner
            .records_by_pair
            .get(&(user_id, course_id))
            .ok_or(StoreError::NotFound)?;
        let record = inner.records.get_mut(&rec_id).ok_or(StoreError::NotFound)?;
        if !record.completed.insert(subsection_id) {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn issue_code(&self, code: OneTimeCode) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.codes.insert(code.email.clone(), code);
        Ok(())
    }

    async fn consume_code(&self, email: &str, code: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let entry = inner.codes.get_mut(email).ok_or(StoreError::NotFound)?;
        if entry.code != code {
            return Err(StoreError::NotFound);
        }
        if entry.state == CodeState::Consumed {
            return Err(StoreError::Conflict);
        }
        if entry.expires_at < Utc::now() {
            return Err(StoreError::Conflict);
        }
        entry.state = CodeState::Consumed;
        Ok(())
    }
}
