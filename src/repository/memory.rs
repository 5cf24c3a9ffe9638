use super::Repository;
use crate::models::{
    AdminDashboardStats, Assignment, Course, CourseRole, CreateAssignmentRequest,
    CreateCourseRequest, Enrollment, NewUser, Submission, UpdateUserRequest, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    courses: HashMap<Uuid, Course>,
    enrollments: HashMap<(Uuid, Uuid), Enrollment>,
    assignments: HashMap<Uuid, Assignment>,
    submissions: HashMap<Uuid, Submission>,
}

impl Tables {
    fn remove_assignment(&mut self, id: Uuid) -> bool {
        let removed = self.assignments.remove(&id).is_some();
        if removed {
            self.submissions.retain(|_, s| s.assignment_id != id);
        }
        removed
    }
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Used when the server runs
/// locally without `DATABASE_URL`, and as the store behind the test suite.
/// Mirrors the Postgres schema's unique keys and cascades.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(user: &User, needle: &str) -> bool {
    [&user.username, &user.email, &user.first_name, &user.last_name]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- IDENTITY STORE ---

    async fn get_user(&self, id: Uuid) -> Option<User> {
        self.tables.read().await.users.get(&id).cloned()
    }

    async fn get_user_by_username(&self, username: &str) -> Option<User> {
        let tables = self.tables.read().await;
        tables.users.values().find(|u| u.username == username).cloned()
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        let tables = self.tables.read().await;
        tables.users.values().find(|u| u.email == email).cloned()
    }

    async fn create_user(&self, user: NewUser) -> Option<User> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return None;
        }

        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            role: user.role,
            approved: user.approved,
            created_at: Utc::now(),
        };
        tables.users.insert(record.id, record.clone());
        Some(record)
    }

    async fn search_users(&self, search: Option<String>) -> Vec<User> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| needle.as_deref().is_none_or(|n| matches(u, n)))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    async fn set_user_approved(&self, id: Uuid, approved: bool) -> Option<User> {
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id)?;
        user.approved = approved;
        Some(user.clone())
    }

    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> Option<User> {
        let mut tables = self.tables.write().await;

        // Same unique-email rule the database enforces.
        if let Some(email) = &req.email {
            if tables.users.values().any(|u| u.id != id && &u.email == email) {
                return None;
            }
        }

        let user = tables.users.get_mut(&id)?;
        if let Some(email) = req.email {
            user.email = email;
        }
        if let Some(first_name) = req.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name;
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        Some(user.clone())
    }

    async fn get_stats(&self) -> AdminDashboardStats {
        let tables = self.tables.read().await;
        AdminDashboardStats {
            total_users: tables.users.len() as i64,
            total_courses: tables.courses.len() as i64,
            total_assignments: tables.assignments.len() as i64,
            total_submissions: tables.submissions.len() as i64,
            pending_approvals: tables.users.values().filter(|u| !u.approved).count() as i64,
        }
    }

    // --- COURSES ---

    async fn create_course(&self, req: CreateCourseRequest, owner_id: Uuid) -> Option<Course> {
        let mut tables = self.tables.write().await;
        if tables.courses.values().any(|c| c.code == req.code) {
            return None;
        }

        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            title: req.title,
            code: req.code,
            description: req.description,
            created_by: Some(owner_id),
            created_at: now,
        };
        tables.courses.insert(course.id, course.clone());
        tables.enrollments.insert(
            (course.id, owner_id),
            Enrollment {
                course_id: course.id,
                user_id: owner_id,
                role: CourseRole::Teacher,
                enrolled_at: now,
            },
        );
        Some(course)
    }

    async fn get_course(&self, id: Uuid) -> Option<Course> {
        self.tables.read().await.courses.get(&id).cloned()
    }

    async fn get_course_by_code(&self, code: &str) -> Option<Course> {
        let tables = self.tables.read().await;
        tables.courses.values().find(|c| c.code == code).cloned()
    }

    async fn get_courses_for_user(&self, user_id: Uuid) -> Vec<Course> {
        let tables = self.tables.read().await;
        let mut courses: Vec<Course> = tables
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| tables.courses.get(&e.course_id).cloned())
            .collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        courses
    }

    async fn get_all_courses(&self) -> Vec<Course> {
        let tables = self.tables.read().await;
        let mut courses: Vec<Course> = tables.courses.values().cloned().collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        courses
    }

    async fn delete_course(&self, id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        if tables.courses.remove(&id).is_none() {
            return false;
        }

        tables.enrollments.retain(|(course_id, _), _| *course_id != id);
        let assignment_ids: Vec<Uuid> = tables
            .assignments
            .values()
            .filter(|a| a.course_id == id)
            .map(|a| a.id)
            .collect();
        for assignment_id in assignment_ids {
            tables.remove_assignment(assignment_id);
        }
        true
    }

    // --- ENROLLMENT LEDGER ---

    async fn get_enrollment(&self, course_id: Uuid, user_id: Uuid) -> Option<Enrollment> {
        let tables = self.tables.read().await;
        tables.enrollments.get(&(course_id, user_id)).cloned()
    }

    async fn enroll(&self, course_id: Uuid, user_id: Uuid, role: CourseRole) -> Option<Enrollment> {
        let mut tables = self.tables.write().await;
        // Foreign keys: both sides must exist.
        if !tables.courses.contains_key(&course_id) || !tables.users.contains_key(&user_id) {
            return None;
        }
        if tables.enrollments.contains_key(&(course_id, user_id)) {
            return None;
        }

        let enrollment = Enrollment {
            course_id,
            user_id,
            role,
            enrolled_at: Utc::now(),
        };
        tables
            .enrollments
            .insert((course_id, user_id), enrollment.clone());
        Some(enrollment)
    }

    async fn unenroll(&self, course_id: Uuid, user_id: Uuid) -> bool {
        let mut tables = self.tables.write().await;
        tables.enrollments.remove(&(course_id, user_id)).is_some()
    }

    async fn get_roster(&self, course_id: Uuid) -> Vec<Enrollment> {
        let tables = self.tables.read().await;
        let mut roster: Vec<Enrollment> = tables
            .enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect();
        // Teachers first, then by join time.
        roster.sort_by_key(|e| (e.role != CourseRole::Teacher, e.enrolled_at));
        roster
    }

    // --- ASSIGNMENTS ---

    async fn create_assignment(
        &self,
        course_id: Uuid,
        req: CreateAssignmentRequest,
    ) -> Option<Assignment> {
        let mut tables = self.tables.write().await;
        if !tables.courses.contains_key(&course_id) {
            return None;
        }

        let assignment = Assignment {
            id: Uuid::new_v4(),
            course_id,
            title: req.title,
            description: req.description,
            deadline: req.deadline,
            created_at: Utc::now(),
        };
        tables.assignments.insert(assignment.id, assignment.clone());
        Some(assignment)
    }

    async fn get_assignment(&self, id: Uuid) -> Option<Assignment> {
        self.tables.read().await.assignments.get(&id).cloned()
    }

    async fn get_assignments(&self, course_id: Uuid) -> Vec<Assignment> {
        let tables = self.tables.read().await;
        let mut assignments: Vec<Assignment> = tables
            .assignments
            .values()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.deadline);
        assignments
    }

    async fn delete_assignment(&self, id: Uuid) -> bool {
        self.tables.write().await.remove_assignment(id)
    }

    // --- SUBMISSIONS ---

    async fn upsert_submission(
        &self,
        assignment_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Option<Submission> {
        let mut tables = self.tables.write().await;
        if !tables.assignments.contains_key(&assignment_id) || !tables.users.contains_key(&user_id)
        {
            return None;
        }

        let now = Utc::now();
        if let Some(existing) = tables
            .submissions
            .values_mut()
            .find(|s| s.assignment_id == assignment_id && s.user_id == user_id)
        {
            existing.content = content;
            existing.submitted_at = now;
            existing.grade = None;
            existing.feedback = None;
            return Some(existing.clone());
        }

        let submission = Submission {
            id: Uuid::new_v4(),
            assignment_id,
            user_id,
            content,
            submitted_at: now,
            grade: None,
            feedback: None,
        };
        tables.submissions.insert(submission.id, submission.clone());
        Some(submission)
    }

    async fn get_submission(&self, id: Uuid) -> Option<Submission> {
        self.tables.read().await.submissions.get(&id).cloned()
    }

    async fn get_submissions(&self, assignment_id: Uuid) -> Vec<Submission> {
        let tables = self.tables.read().await;
        let mut submissions: Vec<Submission> = tables
            .submissions
            .values()
            .filter(|s| s.assignment_id == assignment_id)
            .cloned()
            .collect();
        submissions.sort_by_key(|s| s.submitted_at);
        submissions
    }

    async fn get_user_submission(&self, assignment_id: Uuid, user_id: Uuid) -> Option<Submission> {
        let tables = self.tables.read().await;
        tables
            .submissions
            .values()
            .find(|s| s.assignment_id == assignment_id && s.user_id == user_id)
            .cloned()
    }

    async fn grade_submission(
        &self,
        id: Uuid,
        grade: i32,
        feedback: Option<String>,
    ) -> Option<Submission> {
        let mut tables = self.tables.write().await;
        let submission = tables.submissions.get_mut(&id)?;
        submission.grade = Some(grade);
        submission.feedback = feedback;
        Some(submission.clone())
    }

    async fn delete_submission(&self, id: Uuid) -> bool {
        self.tables.write().await.submissions.remove(&id).is_some()
    }
}
