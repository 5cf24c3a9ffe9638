#![allow(dead_code)]

use chrono::{Duration, Utc};
use classroom_portal::{
    AccessControl, AppState, InMemoryRepository,
    auth::AuthUser,
    config::AppConfig,
    models::{
        Assignment, Course, CourseRole, CreateAssignmentRequest, CreateCourseRequest, NewUser,
        Role, User,
    },
    repository::{Repository, RepositoryState},
};
use std::sync::Arc;
use uuid::Uuid;

/// Stored for fixture accounts that never log in. Not a PHC string, so
/// `verify_password` always rejects it.
pub const UNUSABLE_HASH: &str = "!";

/// A user id that exists nowhere in the store.
pub const BOGUS_ID: Uuid = Uuid::from_u128(0xdead_beef);

/// Seeded world shared by the handler and access tests.
///
/// * `teacher` owns `course` ("Test Course 2") and `other_course`.
/// * `student1` is enrolled in `course` as a student; `student2` is enrolled nowhere.
/// * `teacher2` is an approved teacher with no courses.
/// * `pending_teacher` registered but was never approved.
pub struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub admin: User,
    pub teacher: User,
    pub teacher2: User,
    pub pending_teacher: User,
    pub student1: User,
    pub student2: User,
    pub course: Course,
    pub other_course: Course,
    pub assignment: Assignment,
}

impl Fixture {
    pub async fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());

        let admin = seed_user(&repo, "admin", Role::Admin, true).await;
        let teacher = seed_user(&repo, "teacher", Role::Teacher, true).await;
        let teacher2 = seed_user(&repo, "teacher2", Role::Teacher, true).await;
        let pending_teacher = seed_user(&repo, "pending", Role::Teacher, false).await;
        let student1 = seed_user(&repo, "student1", Role::Student, true).await;
        let student2 = seed_user(&repo, "student2", Role::Student, true).await;

        let course = seed_course(&repo, "Test Course 2", "TC2", teacher.id).await;
        let other_course = seed_course(&repo, "Hidden Course", "HIDDEN", teacher.id).await;

        repo.enroll(course.id, student1.id, CourseRole::Student)
            .await
            .expect("enroll student1");

        let assignment = repo
            .create_assignment(
                course.id,
                CreateAssignmentRequest {
                    title: "Homework 1".to_string(),
                    description: "Chapter one exercises".to_string(),
                    deadline: Utc::now() + Duration::days(7),
                },
            )
            .await
            .expect("seed assignment");

        Fixture {
            repo,
            admin,
            teacher,
            teacher2,
            pending_teacher,
            student1,
            student2,
            course,
            other_course,
            assignment,
        }
    }

    pub fn access(&self) -> AccessControl<'_> {
        AccessControl::new(&*self.repo)
    }

    pub fn state(&self) -> AppState {
        AppState {
            repo: self.repo.clone() as RepositoryState,
            config: AppConfig::default(),
        }
    }
}

pub async fn seed_user(repo: &InMemoryRepository, username: &str, role: Role, approved: bool) -> User {
    seed_user_with_hash(repo, username, role, approved, UNUSABLE_HASH.to_string()).await
}

pub async fn seed_user_with_hash(
    repo: &InMemoryRepository,
    username: &str,
    role: Role,
    approved: bool,
    password_hash: String,
) -> User {
    repo.create_user(NewUser {
        username: username.to_string(),
        email: format!("{username}@school.test"),
        first_name: username.to_string(),
        last_name: "Fixture".to_string(),
        password_hash,
        role,
        approved,
    })
    .await
    .expect("seed user")
}

pub async fn seed_course(repo: &InMemoryRepository, title: &str, code: &str, owner: Uuid) -> Course {
    repo.create_course(
        CreateCourseRequest {
            title: title.to_string(),
            code: code.to_string(),
            description: String::new(),
        },
        owner,
    )
    .await
    .expect("seed course")
}

/// Session for a stored user, as the `AuthUser` extractor would build it.
pub fn session(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        role: user.role,
    }
}

/// A validly signed session whose subject does not exist.
pub fn bogus_session() -> AuthUser {
    AuthUser {
        id: BOGUS_ID,
        role: Role::Student,
    }
}
