use crate::{
    AppState,
    access::{AccessControl, SubmissionScope},
    auth::{self, AuthUser},
    models::{
        AddTeacherRequest, AdminDashboardStats, Assignment, Course, CourseRole,
        CreateAssignmentRequest, CreateCourseRequest, Enrollment, GradeSubmissionRequest,
        JoinCourseRequest, LoginRequest, LoginResponse, NewUser, RegisterUserRequest, Role,
        Submission, SubmitAssignmentRequest, UpdateUserRequest, UserProfile,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// UserFilter
///
/// Query parameters for the admin user search (`GET /admin/users`).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UserFilter {
    /// Case-insensitive term matched against username, email and names.
    pub search: Option<String>,
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

// --- Identity ---

/// register_user
///
/// [Public Route] Creates an account. Students are approved on the spot;
/// teachers wait for an admin. Admin accounts cannot be self-registered.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Missing fields or admin role requested"),
        (status = 409, description = "Username or email already in use")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), StatusCode> {
    if payload.role == Role::Admin {
        return Err(StatusCode::BAD_REQUEST);
    }
    if blank(&payload.username) || blank(&payload.email) || payload.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    if state.repo.get_user_by_username(&payload.username).await.is_some() {
        return Err(StatusCode::CONFLICT);
    }
    if state.repo.get_user_by_email(&payload.email).await.is_some() {
        return Err(StatusCode::CONFLICT);
    }

    // Argon2 hashing blocks; run it off the async workers.
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let approved = payload.role == Role::Student;
    let new_user = NewUser {
        username: payload.username,
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        password_hash,
        role: payload.role,
        approved,
    };

    // None here means a concurrent registration took the name first.
    let user = state
        .repo
        .create_user(new_user)
        .await
        .ok_or(StatusCode::CONFLICT)?;

    tracing::info!(user_id = %user.id, role = %user.role, approved, "registered user");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// login
///
/// [Public Route] Verifies credentials and issues a session token.
/// Unknown usernames and wrong passwords are indistinguishable (401).
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 403, description = "Account not yet approved")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    let user = state
        .repo
        .get_user_by_username(&payload.username)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let hash = user.password_hash.clone();
    let password = payload.password;
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&hash, &password))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    if !valid {
        return Err(StatusCode::UNAUTHORIZED);
    }

    if !user.approved {
        return Err(StatusCode::FORBIDDEN);
    }

    let token = auth::issue_token(&state.config, &user).map_err(|e| {
        tracing::error!("token signing failed: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    tracing::info!(user_id = %user.id, "login");
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

/// get_me
///
/// [Authenticated Route] Profile of the session user. 404 once the account is gone.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, StatusCode> {
    match state.repo.get_user(id).await {
        Some(user) => Ok(Json(user.into())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// --- Courses ---

/// get_my_courses
///
/// [Authenticated Route] Courses the caller is enrolled in, as teacher or student.
#[utoipa::path(
    get,
    path = "/courses",
    responses((status = 200, description = "My courses", body = [Course]))
)]
pub async fn get_my_courses(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Course>> {
    Json(state.repo.get_courses_for_user(id).await)
}

/// create_course
///
/// [Authenticated Route] Teachers only. The creator becomes the course's
/// first teacher in the enrollment ledger.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Created", body = Course),
        (status = 403, description = "Not a teacher"),
        (status = 409, description = "Course code already in use")
    )
)]
pub async fn create_course(
    session: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), StatusCode> {
    let teacher = AccessControl::new(state.repo.as_ref())
        .create_course(&session)
        .await?;

    // Codes are matched trimmed on join, so they are stored trimmed.
    let payload = CreateCourseRequest {
        title: payload.title.trim().to_string(),
        code: payload.code.trim().to_string(),
        description: payload.description,
    };
    if blank(&payload.title) || blank(&payload.code) {
        return Err(StatusCode::BAD_REQUEST);
    }
    if state.repo.get_course_by_code(&payload.code).await.is_some() {
        return Err(StatusCode::CONFLICT);
    }

    // None here means a concurrent create took the code first.
    let course = state
        .repo
        .create_course(payload, teacher.id)
        .await
        .ok_or(StatusCode::CONFLICT)?;

    tracing::info!(course_id = %course.id, teacher_id = %teacher.id, "course created");
    Ok((StatusCode::CREATED, Json(course)))
}

/// join_course
///
/// [Authenticated Route] A student enrolls using the course code.
#[utoipa::path(
    post,
    path = "/courses/join",
    request_body = JoinCourseRequest,
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 403, description = "Not a student"),
        (status = 404, description = "No course with that code"),
        (status = 409, description = "Already enrolled")
    )
)]
pub async fn join_course(
    session: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<JoinCourseRequest>,
) -> Result<(StatusCode, Json<Enrollment>), StatusCode> {
    let (student, course) = AccessControl::new(state.repo.as_ref())
        .join_course(&session, payload.code.trim())
        .await?;

    match state.repo.enroll(course.id, student.id, CourseRole::Student).await {
        Some(enrollment) => Ok((StatusCode::CREATED, Json(enrollment))),
        None => Err(StatusCode::CONFLICT),
    }
}

/// get_course
///
/// [Authenticated Route] Course details for enrolled users and admins.
#[utoipa::path(
    get,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = Course),
        (status = 403, description = "Not enrolled"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_course(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Course>, StatusCode> {
    let access = AccessControl::new(state.repo.as_ref())
        .view_course(&session, id)
        .await?;
    Ok(Json(access.course))
}

/// delete_course
///
/// [Authenticated Route] Course teachers and admins. Cascades to enrollments,
/// assignments and submissions.
#[utoipa::path(
    delete,
    path = "/courses/{id}",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not a teacher of this course"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_course(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    let course = match AccessControl::new(state.repo.as_ref())
        .delete_course(&session, id)
        .await
    {
        Ok(course) => course,
        Err(denied) => return denied.status(),
    };

    if state.repo.delete_course(course.id).await {
        tracing::info!(course_id = %course.id, actor = %session.id, "course deleted");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Enrollment Ledger ---

/// get_roster
///
/// [Authenticated Route] Everyone enrolled in a course, teachers first.
/// Owner-only.
#[utoipa::path(
    get,
    path = "/courses/{id}/roster",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses((status = 200, description = "Roster", body = [Enrollment]))
)]
pub async fn get_roster(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Enrollment>>, StatusCode> {
    let access = AccessControl::new(state.repo.as_ref())
        .manage_course(&session, id)
        .await?;
    Ok(Json(state.repo.get_roster(access.course.id).await))
}

/// add_teacher
///
/// [Authenticated Route] An owner adds another approved teacher as co-owner.
#[utoipa::path(
    post,
    path = "/courses/{id}/teachers",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = AddTeacherRequest,
    responses(
        (status = 201, description = "Added", body = Enrollment),
        (status = 400, description = "Target is not an approved teacher"),
        (status = 409, description = "Target already enrolled")
    )
)]
pub async fn add_teacher(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddTeacherRequest>,
) -> Result<(StatusCode, Json<Enrollment>), StatusCode> {
    let (course, teacher) = AccessControl::new(state.repo.as_ref())
        .add_teacher(&session, id, payload.user_id)
        .await?;

    match state.repo.enroll(course.id, teacher.id, CourseRole::Teacher).await {
        Some(enrollment) => Ok((StatusCode::CREATED, Json(enrollment))),
        None => Err(StatusCode::CONFLICT),
    }
}

/// remove_enrollment
///
/// [Authenticated Route] Leave a course, or (as a course teacher or admin)
/// remove someone from it.
#[utoipa::path(
    delete,
    path = "/courses/{id}/enrollments/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        ("user_id" = Uuid, Path, description = "Enrolled user ID")
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 403, description = "Cannot remove other members"),
        (status = 404, description = "Not enrolled"),
        (status = 409, description = "Last teacher of the course")
    )
)]
pub async fn remove_enrollment(
    session: AuthUser,
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(Uuid, Uuid)>,
) -> StatusCode {
    let enrollment = match AccessControl::new(state.repo.as_ref())
        .leave_course(&session, course_id, user_id)
        .await
    {
        Ok(enrollment) => enrollment,
        Err(denied) => return denied.status(),
    };

    if state.repo.unenroll(enrollment.course_id, enrollment.user_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Assignments ---

/// get_assignments
///
/// [Authenticated Route] Assignments of a course, earliest deadline first.
#[utoipa::path(
    get,
    path = "/courses/{id}/assignments",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses((status = 200, description = "Assignments", body = [Assignment]))
)]
pub async fn get_assignments(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Assignment>>, StatusCode> {
    let access = AccessControl::new(state.repo.as_ref())
        .view_course(&session, id)
        .await?;
    Ok(Json(state.repo.get_assignments(access.course.id).await))
}

/// create_assignment
///
/// [Authenticated Route] Owner-only: the caller must teach the course.
#[utoipa::path(
    post,
    path = "/courses/{id}/assignments",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Created", body = Assignment),
        (status = 400, description = "Missing title"),
        (status = 403, description = "Not a teacher of this course"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn create_assignment(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<Assignment>), StatusCode> {
    let access = AccessControl::new(state.repo.as_ref())
        .manage_course(&session, id)
        .await?;

    if blank(&payload.title) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let assignment = state
        .repo
        .create_assignment(access.course.id, payload)
        .await
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!(assignment_id = %assignment.id, course_id = %access.course.id, "assignment created");
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// delete_assignment
///
/// [Authenticated Route] Owner-only. The assignment must belong to the course
/// in the path. Its submissions are removed with it.
#[utoipa::path(
    delete,
    path = "/courses/{id}/assignments/{assignment_id}",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        ("assignment_id" = Uuid, Path, description = "Assignment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not a teacher of this course"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_assignment(
    session: AuthUser,
    State(state): State<AppState>,
    Path((course_id, assignment_id)): Path<(Uuid, Uuid)>,
) -> StatusCode {
    let assignment = match AccessControl::new(state.repo.as_ref())
        .delete_assignment(&session, course_id, assignment_id)
        .await
    {
        Ok(assignment) => assignment,
        Err(denied) => return denied.status(),
    };

    if state.repo.delete_assignment(assignment.id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Submissions ---

/// get_submissions
///
/// [Authenticated Route] Course teachers and admins see every submission;
/// students see only their own.
#[utoipa::path(
    get,
    path = "/assignments/{id}/submissions",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses((status = 200, description = "Submissions", body = [Submission]))
)]
pub async fn get_submissions(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Submission>>, StatusCode> {
    let view = AccessControl::new(state.repo.as_ref())
        .view_submissions(&session, id)
        .await?;

    let submissions = match view.scope {
        SubmissionScope::All => state.repo.get_submissions(view.assignment.id).await,
        SubmissionScope::Own(user_id) => state
            .repo
            .get_user_submission(view.assignment.id, user_id)
            .await
            .into_iter()
            .collect(),
    };
    Ok(Json(submissions))
}

/// submit_assignment
///
/// [Authenticated Route] A student hands in work. The body's `user_id` must be
/// the caller; the caller must be enrolled as a student in the assignment's
/// course. Resubmitting replaces the earlier entry.
#[utoipa::path(
    post,
    path = "/assignments/{id}/submissions",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = SubmitAssignmentRequest,
    responses(
        (status = 201, description = "Submitted", body = Submission),
        (status = 400, description = "Unknown user or assignment, or empty content"),
        (status = 403, description = "Forged author, not a student, or not enrolled")
    )
)]
pub async fn submit_assignment(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAssignmentRequest>,
) -> Result<(StatusCode, Json<Submission>), StatusCode> {
    let grant = AccessControl::new(state.repo.as_ref())
        .submit(&session, id, payload.user_id)
        .await?;

    if blank(&payload.content) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let submission = state
        .repo
        .upsert_submission(grant.assignment.id, grant.student.id, payload.content)
        .await
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    tracing::info!(
        submission_id = %submission.id,
        assignment_id = %grant.assignment.id,
        student_id = %grant.student.id,
        "submission recorded"
    );
    Ok((StatusCode::CREATED, Json(submission)))
}

/// grade_submission
///
/// [Authenticated Route] A course teacher records a grade (0-100) and optional
/// feedback.
#[utoipa::path(
    put,
    path = "/submissions/{id}/grade",
    params(("id" = Uuid, Path, description = "Submission ID")),
    request_body = GradeSubmissionRequest,
    responses(
        (status = 200, description = "Graded", body = Submission),
        (status = 400, description = "Grade out of range"),
        (status = 403, description = "Not a teacher of this course"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn grade_submission(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GradeSubmissionRequest>,
) -> Result<Json<Submission>, StatusCode> {
    let submission = AccessControl::new(state.repo.as_ref())
        .grade_submission(&session, id)
        .await?;

    if !(0..=100).contains(&payload.grade) {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state
        .repo
        .grade_submission(submission.id, payload.grade, payload.feedback)
        .await
    {
        Some(graded) => Ok(Json(graded)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// delete_submission
///
/// [Authenticated Route] A course teacher removes a submission.
#[utoipa::path(
    delete,
    path = "/submissions/{id}",
    params(("id" = Uuid, Path, description = "Submission ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not a teacher of this course"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_submission(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    let submission = match AccessControl::new(state.repo.as_ref())
        .delete_submission(&session, id)
        .await
    {
        Ok(submission) => submission,
        Err(denied) => return denied.status(),
    };

    if state.repo.delete_submission(submission.id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Admin ---

/// get_admin_stats
///
/// [Admin Route] Dashboard counters.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn get_admin_stats(
    session: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboardStats>, StatusCode> {
    AccessControl::new(state.repo.as_ref())
        .administer(&session)
        .await?;
    Ok(Json(state.repo.get_stats().await))
}

/// search_users
///
/// [Admin Route] Lists users, optionally filtered by a search term.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserFilter),
    responses((status = 200, description = "Users", body = [UserProfile]))
)]
pub async fn search_users(
    session: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<UserProfile>>, StatusCode> {
    AccessControl::new(state.repo.as_ref())
        .administer(&session)
        .await?;
    let users = state.repo.search_users(filter.search).await;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// set_user_approval
///
/// [Admin Route] Approves or suspends an account. Admins cannot suspend
/// themselves.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/approval",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = bool,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_user_approval(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(approved): Json<bool>,
) -> Result<Json<UserProfile>, StatusCode> {
    let admin = AccessControl::new(state.repo.as_ref())
        .administer(&session)
        .await?;
    if admin.id == id && !approved {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.repo.set_user_approved(id, approved).await {
        Some(user) => {
            tracing::info!(user_id = %user.id, approved, admin_id = %admin.id, "approval changed");
            Ok(Json(user.into()))
        }
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// update_user
///
/// [Admin Route] Partial edit of a user's details or role.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_user(
    session: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, StatusCode> {
    AccessControl::new(state.repo.as_ref())
        .administer(&session)
        .await?;

    if let Some(email) = &payload.email {
        if blank(email) {
            return Err(StatusCode::BAD_REQUEST);
        }
        if let Some(owner) = state.repo.get_user_by_email(email).await {
            if owner.id != id {
                return Err(StatusCode::CONFLICT);
            }
        }
    }

    match state.repo.update_user(id, payload).await {
        Some(user) => Ok(Json(user.into())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// get_admin_courses
///
/// [Admin Route] Every course in the system.
#[utoipa::path(
    get,
    path = "/admin/courses",
    responses((status = 200, description = "All courses", body = [Course]))
)]
pub async fn get_admin_courses(
    session: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Course>>, StatusCode> {
    AccessControl::new(state.repo.as_ref())
        .administer(&session)
        .await?;
    Ok(Json(state.repo.get_all_courses().await))
}
