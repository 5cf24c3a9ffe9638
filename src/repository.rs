use crate::models::{
    AdminDashboardStats, Assignment, Course, CourseRole, CreateAssignmentRequest,
    CreateCourseRequest, Enrollment, NewUser, Submission, UpdateUserRequest, User,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers and the access
/// control engine only see this trait, so the Postgres store and the in-memory
/// store are interchangeable.
///
/// Failures are logged by the implementation and surface as `None`, `false` or
/// an empty list; callers translate those into HTTP statuses.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity Store ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    async fn get_user_by_username(&self, username: &str) -> Option<User>;
    async fn get_user_by_email(&self, email: &str) -> Option<User>;
    // Returns None if the username or email is taken.
    async fn create_user(&self, user: NewUser) -> Option<User>;
    // Case-insensitive match on username, email and names. `None` lists everyone.
    async fn search_users(&self, search: Option<String>) -> Vec<User>;
    async fn set_user_approved(&self, id: Uuid, approved: bool) -> Option<User>;
    // Partial update; only `Some` fields change.
    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> Option<User>;
    async fn get_stats(&self) -> AdminDashboardStats;

    // --- Courses ---
    /// Creates the course and enrolls `owner_id` as its teacher in one step.
    async fn create_course(&self, req: CreateCourseRequest, owner_id: Uuid) -> Option<Course>;
    async fn get_course(&self, id: Uuid) -> Option<Course>;
    async fn get_course_by_code(&self, code: &str) -> Option<Course>;
    // Courses the user holds any enrollment in.
    async fn get_courses_for_user(&self, user_id: Uuid) -> Vec<Course>;
    async fn get_all_courses(&self) -> Vec<Course>;
    /// Cascades to enrollments, assignments and submissions.
    async fn delete_course(&self, id: Uuid) -> bool;

    // --- Enrollment Ledger ---
    async fn get_enrollment(&self, course_id: Uuid, user_id: Uuid) -> Option<Enrollment>;
    // Returns None if the pair is already enrolled.
    async fn enroll(&self, course_id: Uuid, user_id: Uuid, role: CourseRole) -> Option<Enrollment>;
    async fn unenroll(&self, course_id: Uuid, user_id: Uuid) -> bool;
    async fn get_roster(&self, course_id: Uuid) -> Vec<Enrollment>;

    // --- Assignments ---
    async fn create_assignment(
        &self,
        course_id: Uuid,
        req: CreateAssignmentRequest,
    ) -> Option<Assignment>;
    async fn get_assignment(&self, id: Uuid) -> Option<Assignment>;
    // Ordered by deadline, earliest first.
    async fn get_assignments(&self, course_id: Uuid) -> Vec<Assignment>;
    /// Cascades to submissions.
    async fn delete_assignment(&self, id: Uuid) -> bool;

    // --- Submissions ---
    /// Inserts, or replaces the content of the existing (assignment, user) entry.
    /// A replaced submission loses its grade.
    async fn upsert_submission(
        &self,
        assignment_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Option<Submission>;
    async fn get_submission(&self, id: Uuid) -> Option<Submission>;
    async fn get_submissions(&self, assignment_id: Uuid) -> Vec<Submission>;
    async fn get_user_submission(&self, assignment_id: Uuid, user_id: Uuid) -> Option<Submission>;
    async fn grade_submission(
        &self,
        id: Uuid,
        grade: i32,
        feedback: Option<String>,
    ) -> Option<Submission>;
    async fn delete_submission(&self, id: Uuid) -> bool;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
