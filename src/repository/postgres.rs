use super::Repository;
use crate::models::{
    AdminDashboardStats, Assignment, Course, CourseRole, CreateAssignmentRequest,
    CreateCourseRequest, Enrollment, NewUser, Submission, UpdateUserRequest, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, role, approved, created_at";
const COURSE_COLUMNS: &str = "id, title, code, description, created_by, created_at";
const ENROLLMENT_COLUMNS: &str = "course_id, user_id, role, enrolled_at";
const ASSIGNMENT_COLUMNS: &str = "id, course_id, title, description, deadline, created_at";
const SUBMISSION_COLUMNS: &str =
    "id, assignment_id, user_id, content, submitted_at, grade, feedback";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Queries are bound at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("count error ({}): {:?}", sql, e);
                0
            })
    }

    /// Course row and owner enrollment are written in one transaction, so a
    /// course never exists without a teacher.
    async fn insert_course(
        &self,
        req: CreateCourseRequest,
        owner_id: Uuid,
    ) -> Result<Course, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let course = sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (id, title, code, description, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {COURSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.title)
        .bind(req.code)
        .bind(req.description)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO enrollments (course_id, user_id, role, enrolled_at) VALUES ($1, $2, $3, NOW())",
        )
        .bind(course.id)
        .bind(owner_id)
        .bind(CourseRole::Teacher.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(course)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- IDENTITY STORE ---

    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn get_user_by_username(&self, username: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user_by_username error: {:?}", e);
            None
        })
    }

    async fn get_user_by_email(&self, email: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user_by_email error: {:?}", e);
                None
            })
    }

    /// create_user
    ///
    /// `ON CONFLICT DO NOTHING` turns a duplicate username or email into `None`
    /// instead of an error.
    async fn create_user(&self, user: NewUser) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, first_name, last_name, password_hash, role, approved, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
             ON CONFLICT DO NOTHING \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user.username)
        .bind(user.email)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .bind(user.approved)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_user error: {:?}", e);
            None
        })
    }

    /// search_users
    ///
    /// Uses QueryBuilder so the optional search term is always bound, never spliced.
    async fn search_users(&self, search: Option<String>) -> Vec<User> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));

        if let Some(s) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", s.trim());
            builder.push(" WHERE username ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR email ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR first_name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR last_name ILIKE ");
            builder.push_bind(pattern);
        }

        builder.push(" ORDER BY username ASC");

        match builder.build_query_as::<User>().fetch_all(&self.pool).await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("search_users error: {:?}", e);
                vec![]
            }
        }
    }

    async fn set_user_approved(&self, id: Uuid, approved: bool) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET approved = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(approved)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("set_user_approved error: {:?}", e);
            None
        })
    }

    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> Option<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users \
             SET email = COALESCE($2, email), \
                 first_name = COALESCE($3, first_name), \
                 last_name = COALESCE($4, last_name), \
                 role = COALESCE($5, role) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(req.email)
        .bind(req.first_name)
        .bind(req.last_name)
        .bind(req.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_user error: {:?}", e);
            None
        })
    }

    async fn get_stats(&self) -> AdminDashboardStats {
        AdminDashboardStats {
            total_users: self.count("SELECT COUNT(*) FROM users").await,
            total_courses: self.count("SELECT COUNT(*) FROM courses").await,
            total_assignments: self.count("SELECT COUNT(*) FROM assignments").await,
            total_submissions: self.count("SELECT COUNT(*) FROM submissions").await,
            pending_approvals: self
                .count("SELECT COUNT(*) FROM users WHERE approved = false")
                .await,
        }
    }

    // --- COURSES ---

    async fn create_course(&self, req: CreateCourseRequest, owner_id: Uuid) -> Option<Course> {
        self.insert_course(req, owner_id)
            .await
            .map_err(|e| tracing::error!("create_course error: {:?}", e))
            .ok()
    }

    async fn get_course(&self, id: Uuid) -> Option<Course> {
        sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_course error: {:?}", e);
                None
            })
    }

    async fn get_course_by_code(&self, code: &str) -> Option<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_course_by_code error: {:?}", e);
            None
        })
    }

    async fn get_courses_for_user(&self, user_id: Uuid) -> Vec<Course> {
        let query = r#"
            SELECT c.id, c.title, c.code, c.description, c.created_by, c.created_at
            FROM courses c
            JOIN enrollments e ON e.course_id = c.id
            WHERE e.user_id = $1
            ORDER BY c.title ASC
        "#;

        sqlx::query_as::<_, Course>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_courses_for_user error: {:?}", e);
                vec![]
            })
    }

    async fn get_all_courses(&self) -> Vec<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY title ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_all_courses error: {:?}", e);
            vec![]
        })
    }

    /// delete_course
    ///
    /// Enrollments, assignments and (through assignments) submissions go with
    /// the course via `ON DELETE CASCADE`.
    async fn delete_course(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_course error: {:?}", e);
                false
            }
        }
    }

    // --- ENROLLMENT LEDGER ---

    async fn get_enrollment(&self, course_id: Uuid, user_id: Uuid) -> Option<Enrollment> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE course_id = $1 AND user_id = $2"
        ))
        .bind(course_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_enrollment error: {:?}", e);
            None
        })
    }

    async fn enroll(&self, course_id: Uuid, user_id: Uuid, role: CourseRole) -> Option<Enrollment> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "INSERT INTO enrollments (course_id, user_id, role, enrolled_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (course_id, user_id) DO NOTHING \
             RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(course_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("enroll error: {:?}", e);
            None
        })
    }

    async fn unenroll(&self, course_id: Uuid, user_id: Uuid) -> bool {
        match sqlx::query("DELETE FROM enrollments WHERE course_id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("unenroll error: {:?}", e);
                false
            }
        }
    }

    async fn get_roster(&self, course_id: Uuid) -> Vec<Enrollment> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE course_id = $1 ORDER BY role DESC, enrolled_at ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_roster error: {:?}", e);
            vec![]
        })
    }

    // --- ASSIGNMENTS ---

    async fn create_assignment(
        &self,
        course_id: Uuid,
        req: CreateAssignmentRequest,
    ) -> Option<Assignment> {
        sqlx::query_as::<_, Assignment>(&format!(
            "INSERT INTO assignments (id, course_id, title, description, deadline, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.deadline)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("create_assignment error: {:?}", e);
            None
        })
    }

    async fn get_assignment(&self, id: Uuid) -> Option<Assignment> {
        sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_assignment error: {:?}", e);
            None
        })
    }

    async fn get_assignments(&self, course_id: Uuid) -> Vec<Assignment> {
        sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE course_id = $1 ORDER BY deadline ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_assignments error: {:?}", e);
            vec![]
        })
    }

    async fn delete_assignment(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_assignment error: {:?}", e);
                false
            }
        }
    }

    // --- SUBMISSIONS ---

    /// upsert_submission
    ///
    /// Relies on the `UNIQUE (assignment_id, user_id)` constraint: a second
    /// submission from the same student overwrites the first and clears the grade.
    async fn upsert_submission(
        &self,
        assignment_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> Option<Submission> {
        sqlx::query_as::<_, Submission>(&format!(
            "INSERT INTO submissions (id, assignment_id, user_id, content, submitted_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (assignment_id, user_id) DO UPDATE \
             SET content = EXCLUDED.content, submitted_at = NOW(), grade = NULL, feedback = NULL \
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(assignment_id)
        .bind(user_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("upsert_submission error: {:?}", e);
            None
        })
    }

    async fn get_submission(&self, id: Uuid) -> Option<Submission> {
        sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_submission error: {:?}", e);
            None
        })
    }

    async fn get_submissions(&self, assignment_id: Uuid) -> Vec<Submission> {
        sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE assignment_id = $1 ORDER BY submitted_at ASC"
        ))
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_submissions error: {:?}", e);
            vec![]
        })
    }

    async fn get_user_submission(&self, assignment_id: Uuid, user_id: Uuid) -> Option<Submission> {
        sqlx::query_as::<_, Submission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE assignment_id = $1 AND user_id = $2"
        ))
        .bind(assignment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_user_submission error: {:?}", e);
            None
        })
    }

    async fn grade_submission(
        &self,
        id: Uuid,
        grade: i32,
        feedback: Option<String>,
    ) -> Option<Submission> {
        sqlx::query_as::<_, Submission>(&format!(
            "UPDATE submissions SET grade = $2, feedback = $3 WHERE id = $1 RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(id)
        .bind(grade)
        .bind(feedback)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("grade_submission error: {:?}", e);
            None
        })
    }

    async fn delete_submission(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM submissions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_submission error: {:?}", e);
                false
            }
        }
    }
}
