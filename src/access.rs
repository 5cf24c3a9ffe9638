//! Access control engine.
//!
//! Every write on courses, assignments and submissions is decided here before a
//! repository mutator runs. Each decision takes the session identity and the
//! target resource, and either returns the resolved records the handler needs
//! or an [`AccessError`] carrying the HTTP status to answer with.
//!
//! The session only asserts *who* is calling. The stored user record is
//! authoritative for role and approval, so a token outliving a role change or an
//! account deletion cannot widen access.

use axum::http::StatusCode;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    models::{Assignment, Course, CourseRole, Enrollment, Role, Submission, User},
    repository::Repository,
};

/// Why a request was refused. Each variant maps to one HTTP status.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
}

impl AccessError {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
            AccessError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AccessError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl From<AccessError> for StatusCode {
    fn from(err: AccessError) -> Self {
        err.status()
    }
}

/// The guarded actions, used to label audit log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateCourse,
    ViewCourse,
    ManageCourse,
    DeleteCourse,
    AddTeacher,
    JoinCourse,
    LeaveCourse,
    DeleteAssignment,
    Submit,
    ViewSubmissions,
    GradeSubmission,
    DeleteSubmission,
    Administer,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateCourse => "create_course",
            Action::ViewCourse => "view_course",
            Action::ManageCourse => "manage_course",
            Action::DeleteCourse => "delete_course",
            Action::AddTeacher => "add_teacher",
            Action::JoinCourse => "join_course",
            Action::LeaveCourse => "leave_course",
            Action::DeleteAssignment => "delete_assignment",
            Action::Submit => "submit",
            Action::ViewSubmissions => "view_submissions",
            Action::GradeSubmission => "grade_submission",
            Action::DeleteSubmission => "delete_submission",
            Action::Administer => "administer",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A course the actor was allowed to act on.
#[derive(Debug, Clone)]
pub struct CourseAccess {
    pub actor: User,
    pub course: Course,
    /// The actor's own enrollment. `None` only for admins viewing a course.
    pub enrollment: Option<Enrollment>,
}

/// An approved submission: the student submitting and the assignment target.
#[derive(Debug, Clone)]
pub struct SubmitGrant {
    pub student: User,
    pub assignment: Assignment,
}

/// Which submissions of an assignment the actor may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionScope {
    All,
    Own(Uuid),
}

#[derive(Debug, Clone)]
pub struct SubmissionView {
    pub assignment: Assignment,
    pub scope: SubmissionScope,
}

fn audited<T>(action: Action, session: &AuthUser, decision: Result<T, AccessError>) -> Result<T, AccessError> {
    match &decision {
        Ok(_) => tracing::debug!(actor = %session.id, %action, "access granted"),
        Err(reason) => tracing::warn!(actor = %session.id, %action, %reason, "access denied"),
    }
    decision
}

/// AccessControl
///
/// Borrowed view over the repository that answers authorization questions.
/// Construct one per request: `AccessControl::new(state.repo.as_ref())`.
pub struct AccessControl<'a> {
    repo: &'a dyn Repository,
}

impl<'a> AccessControl<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Resolves the session to a live, approved account.
    async fn actor(&self, session: &AuthUser) -> Result<User, AccessError> {
        let user = self
            .repo
            .get_user(session.id)
            .await
            .ok_or(AccessError::Forbidden("unknown user"))?;
        if !user.approved {
            return Err(AccessError::Forbidden("account not approved"));
        }
        Ok(user)
    }

    async fn course(&self, course_id: Uuid) -> Result<Course, AccessError> {
        self.repo
            .get_course(course_id)
            .await
            .ok_or(AccessError::NotFound("course"))
    }

    /// True when `user` is a site teacher enrolled as a teacher of `course_id`.
    async fn teaches(&self, user: &User, course_id: Uuid) -> Option<Enrollment> {
        if user.role != Role::Teacher {
            return None;
        }
        self.repo
            .get_enrollment(course_id, user.id)
            .await
            .filter(|e| e.role == CourseRole::Teacher)
    }

    pub async fn create_course(&self, session: &AuthUser) -> Result<User, AccessError> {
        let decision: Result<User, AccessError> = async {
            let actor = self.actor(session).await?;
            if actor.role != Role::Teacher {
                return Err(AccessError::Forbidden("only teachers can create courses"));
            }
            Ok(actor)
        }
        .await;
        audited(Action::CreateCourse, session, decision)
    }

    /// Any enrollment grants read access; admins may read every course.
    pub async fn view_course(
        &self,
        session: &AuthUser,
        course_id: Uuid,
    ) -> Result<CourseAccess, AccessError> {
        let decision: Result<CourseAccess, AccessError> = async {
            let actor = self.actor(session).await?;
            let course = self.course(course_id).await?;
            let enrollment = self.repo.get_enrollment(course_id, actor.id).await;
            if enrollment.is_none() && actor.role != Role::Admin {
                return Err(AccessError::Forbidden("not enrolled in course"));
            }
            Ok(CourseAccess {
                actor,
                course,
                enrollment,
            })
        }
        .await;
        audited(Action::ViewCourse, session, decision)
    }

    /// Owner-only: the actor must be a teacher enrolled as a teacher of the course.
    /// Gates assignment creation, the roster and co-teacher management.
    pub async fn manage_course(
        &self,
        session: &AuthUser,
        course_id: Uuid,
    ) -> Result<CourseAccess, AccessError> {
        let decision = self.check_manage_course(session, course_id).await;
        audited(Action::ManageCourse, session, decision)
    }

    async fn check_manage_course(
        &self,
        session: &AuthUser,
        course_id: Uuid,
    ) -> Result<CourseAccess, AccessError> {
        let actor = self.actor(session).await?;
        if actor.role != Role::Teacher {
            return Err(AccessError::Forbidden("only teachers can manage courses"));
        }
        let course = self.course(course_id).await?;
        let enrollment = self
            .teaches(&actor, course_id)
            .await
            .ok_or(AccessError::Forbidden("not a teacher of this course"))?;
        Ok(CourseAccess {
            actor,
            course,
            enrollment: Some(enrollment),
        })
    }

    /// Admins may delete any course; teachers only the ones they teach.
    pub async fn delete_course(
        &self,
        session: &AuthUser,
        course_id: Uuid,
    ) -> Result<Course, AccessError> {
        let decision: Result<Course, AccessError> = async {
            let actor = self.actor(session).await?;
            let course = self.course(course_id).await?;
            if actor.role == Role::Admin || self.teaches(&actor, course_id).await.is_some() {
                Ok(course)
            } else {
                Err(AccessError::Forbidden("not a teacher of this course"))
            }
        }
        .await;
        audited(Action::DeleteCourse, session, decision)
    }

    /// Adds a co-teacher. The target must be an approved site teacher who is not
    /// already in the course.
    pub async fn add_teacher(
        &self,
        session: &AuthUser,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Course, User), AccessError> {
        let decision: Result<(Course, User), AccessError> = async {
            let access = self.check_manage_course(session, course_id).await?;
            let teacher = self
                .repo
                .get_user(user_id)
                .await
                .filter(|u| u.role == Role::Teacher && u.approved)
                .ok_or(AccessError::BadRequest("user is not an approved teacher"))?;
            if self.repo.get_enrollment(course_id, user_id).await.is_some() {
                return Err(AccessError::Conflict("user already enrolled"));
            }
            Ok((access.course, teacher))
        }
        .await;
        audited(Action::AddTeacher, session, decision)
    }

    /// Students join by course code. Teachers are added by an owner instead.
    pub async fn join_course(
        &self,
        session: &AuthUser,
        code: &str,
    ) -> Result<(User, Course), AccessError> {
        let decision: Result<(User, Course), AccessError> = async {
            let actor = self.actor(session).await?;
            if actor.role != Role::Student {
                return Err(AccessError::Forbidden("only students can join by code"));
            }
            let course = self
                .repo
                .get_course_by_code(code)
                .await
                .ok_or(AccessError::NotFound("course"))?;
            if self.repo.get_enrollment(course.id, actor.id).await.is_some() {
                return Err(AccessError::Conflict("already enrolled"));
            }
            Ok((actor, course))
        }
        .await;
        audited(Action::JoinCourse, session, decision)
    }

    /// Removing an enrollment: users may leave on their own, course teachers and
    /// admins may remove anyone. The last teacher of a course cannot be removed.
    pub async fn leave_course(
        &self,
        session: &AuthUser,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<Enrollment, AccessError> {
        let decision: Result<Enrollment, AccessError> = async {
            let actor = self.actor(session).await?;
            self.course(course_id).await?;

            let allowed = actor.id == user_id
                || actor.role == Role::Admin
                || self.teaches(&actor, course_id).await.is_some();
            if !allowed {
                return Err(AccessError::Forbidden("cannot remove other members"));
            }

            let enrollment = self
                .repo
                .get_enrollment(course_id, user_id)
                .await
                .ok_or(AccessError::NotFound("enrollment"))?;

            if enrollment.role == CourseRole::Teacher {
                let teachers = self
                    .repo
                    .get_roster(course_id)
                    .await
                    .into_iter()
                    .filter(|e| e.role == CourseRole::Teacher)
                    .count();
                if teachers <= 1 {
                    return Err(AccessError::Conflict("course needs at least one teacher"));
                }
            }
            Ok(enrollment)
        }
        .await;
        audited(Action::LeaveCourse, session, decision)
    }

    /// The assignment must belong to the course named in the request.
    pub async fn delete_assignment(
        &self,
        session: &AuthUser,
        course_id: Uuid,
        assignment_id: Uuid,
    ) -> Result<Assignment, AccessError> {
        let decision: Result<Assignment, AccessError> = async {
            self.check_manage_course(session, course_id).await?;
            self.repo
                .get_assignment(assignment_id)
                .await
                .filter(|a| a.course_id == course_id)
                .ok_or(AccessError::NotFound("assignment"))
        }
        .await;
        audited(Action::DeleteAssignment, session, decision)
    }

    /// submit
    ///
    /// `claimed_user` is the author named in the request body. Checks, in order:
    /// 1. it is the session user (403, forged submission);
    /// 2. that user exists (400);
    /// 3. the assignment exists (400);
    /// 4. the user is a student (403) with an approved account (403);
    /// 5. the user is enrolled as a student in the assignment's course (403).
    pub async fn submit(
        &self,
        session: &AuthUser,
        assignment_id: Uuid,
        claimed_user: Uuid,
    ) -> Result<SubmitGrant, AccessError> {
        let decision: Result<SubmitGrant, AccessError> = async {
            if claimed_user != session.id {
                return Err(AccessError::Forbidden("cannot submit on behalf of another user"));
            }
            let student = self
                .repo
                .get_user(claimed_user)
                .await
                .ok_or(AccessError::BadRequest("unknown user"))?;
            let assignment = self
                .repo
                .get_assignment(assignment_id)
                .await
                .ok_or(AccessError::BadRequest("unknown assignment"))?;
            if student.role != Role::Student {
                return Err(AccessError::Forbidden("only students can submit"));
            }
            if !student.approved {
                return Err(AccessError::Forbidden("account not approved"));
            }
            self.repo
                .get_enrollment(assignment.course_id, student.id)
                .await
                .filter(|e| e.role == CourseRole::Student)
                .ok_or(AccessError::Forbidden("not enrolled in course"))?;
            Ok(SubmitGrant {
                student,
                assignment,
            })
        }
        .await;
        audited(Action::Submit, session, decision)
    }

    /// Course teachers and admins read every submission; enrolled students only
    /// their own.
    pub async fn view_submissions(
        &self,
        session: &AuthUser,
        assignment_id: Uuid,
    ) -> Result<SubmissionView, AccessError> {
        let decision: Result<SubmissionView, AccessError> = async {
            let actor = self.actor(session).await?;
            let assignment = self
                .repo
                .get_assignment(assignment_id)
                .await
                .ok_or(AccessError::NotFound("assignment"))?;

            let scope = if actor.role == Role::Admin
                || self.teaches(&actor, assignment.course_id).await.is_some()
            {
                SubmissionScope::All
            } else {
                match self.repo.get_enrollment(assignment.course_id, actor.id).await {
                    Some(e) if e.role == CourseRole::Student => SubmissionScope::Own(actor.id),
                    _ => return Err(AccessError::Forbidden("not enrolled in course")),
                }
            };
            Ok(SubmissionView { assignment, scope })
        }
        .await;
        audited(Action::ViewSubmissions, session, decision)
    }

    pub async fn grade_submission(
        &self,
        session: &AuthUser,
        submission_id: Uuid,
    ) -> Result<Submission, AccessError> {
        let decision = self.check_submission_owner(session, submission_id).await;
        audited(Action::GradeSubmission, session, decision)
    }

    pub async fn delete_submission(
        &self,
        session: &AuthUser,
        submission_id: Uuid,
    ) -> Result<Submission, AccessError> {
        let decision = self.check_submission_owner(session, submission_id).await;
        audited(Action::DeleteSubmission, session, decision)
    }

    /// Only a teacher of the course the submission's assignment belongs to.
    async fn check_submission_owner(
        &self,
        session: &AuthUser,
        submission_id: Uuid,
    ) -> Result<Submission, AccessError> {
        let actor = self.actor(session).await?;
        let submission = self
            .repo
            .get_submission(submission_id)
            .await
            .ok_or(AccessError::NotFound("submission"))?;
        let assignment = self
            .repo
            .get_assignment(submission.assignment_id)
            .await
            .ok_or(AccessError::NotFound("assignment"))?;
        if self.teaches(&actor, assignment.course_id).await.is_none() {
            return Err(AccessError::Forbidden("not a teacher of this course"));
        }
        Ok(submission)
    }

    pub async fn administer(&self, session: &AuthUser) -> Result<User, AccessError> {
        let decision: Result<User, AccessError> = async {
            let actor = self.actor(session).await?;
            if actor.role != Role::Admin {
                return Err(AccessError::Forbidden("admin only"));
            }
            Ok(actor)
        }
        .await;
        audited(Action::Administer, session, decision)
    }
}
