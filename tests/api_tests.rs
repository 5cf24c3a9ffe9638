use chrono::{Duration, Utc};
use classroom_portal::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{
        Assignment, Course, CreateAssignmentRequest, CreateCourseRequest, LoginResponse, NewUser,
        Role, Submission, UserProfile,
    },
    repository::{Repository, RepositoryState},
};
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub repo: Arc<InMemoryRepository>,
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::new());
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, repo }
}

impl TestApp {
    async fn register(&self, client: &reqwest::Client, username: &str, role: Role) -> UserProfile {
        let response = client
            .post(format!("{}/register", self.address))
            .json(&serde_json::json!({
                "username": username,
                "email": format!("{username}@school.test"),
                "password": "correct horse",
                "role": role,
            }))
            .send()
            .await
            .expect("register fail");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn login(&self, client: &reqwest::Client, username: &str) -> String {
        let response = client
            .post(format!("{}/login", self.address))
            .json(&serde_json::json!({ "username": username, "password": "correct horse" }))
            .send()
            .await
            .expect("login fail");
        assert_eq!(response.status(), StatusCode::OK);
        let body: LoginResponse = response.json().await.unwrap();
        body.token
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/courses", app.address))
        .json(&serde_json::json!({ "title": "PyTest Course 2", "code": "PYT002" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/admin/stats", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/me", app.address))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(app.repo.get_course_by_code("PYT002").await.is_none());
}

#[tokio::test]
async fn test_createassg_and_submitassg_noauth() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let teacher = app
        .repo
        .create_user(NewUser {
            username: "teacher".to_string(),
            email: "teacher@school.test".to_string(),
            role: Role::Teacher,
            approved: true,
            ..NewUser::default()
        })
        .await
        .unwrap();
    let course = app
        .repo
        .create_course(
            CreateCourseRequest {
                title: "PyTest Course 1".to_string(),
                code: "PYT001".to_string(),
                description: String::new(),
            },
            teacher.id,
        )
        .await
        .unwrap();
    let assignment = app
        .repo
        .create_assignment(
            course.id,
            CreateAssignmentRequest {
                title: "Calculus Homework 1".to_string(),
                description: String::new(),
                deadline: Utc::now() + Duration::days(1),
            },
        )
        .await
        .unwrap();

    let response = client
        .post(format!("{}/courses/{}/assignments", app.address, course.id))
        .json(&serde_json::json!({
            "title": "Calculus Homework 2",
            "deadline": "2030-01-01T00:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.repo.get_assignments(course.id).await.len(), 1);

    let response = client
        .post(format!("{}/assignments/{}/submissions", app.address, assignment.id))
        .json(&serde_json::json!({ "user_id": teacher.id, "content": "42" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.repo.get_submissions(assignment.id).await.is_empty());
}

#[tokio::test]
async fn test_pending_teacher_cannot_log_in() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let teacher = app.register(&client, "newteacher", Role::Teacher).await;
    assert!(!teacher.approved);

    let response = client
        .post(format!("{}/login", app.address))
        .json(&serde_json::json!({ "username": "newteacher", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_classroom_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Admins are provisioned out of band.
    let admin = app
        .repo
        .create_user(NewUser {
            username: "admin".to_string(),
            email: "admin@school.test".to_string(),
            role: Role::Admin,
            approved: true,
            ..NewUser::default()
        })
        .await
        .unwrap();

    let teacher = app.register(&client, "teacher", Role::Teacher).await;
    let student = app.register(&client, "student1", Role::Student).await;

    // Approve the teacher through the admin API (local x-user-id bypass).
    let response = client
        .put(format!("{}/admin/users/{}/approval", app.address, teacher.id))
        .header("x-user-id", admin.id.to_string())
        .json(&true)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let teacher_token = app.login(&client, "teacher").await;
    let student_token = app.login(&client, "student1").await;

    // Teacher creates a course.
    let response = client
        .post(format!("{}/courses", app.address))
        .bearer_auth(&teacher_token)
        .json(&serde_json::json!({
            "title": "PyTest Course 1",
            "code": "PYT001",
            "description": "Made by the API test",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let course: Course = response.json().await.unwrap();

    // Student may not create assignments, and joins by code.
    let response = client
        .post(format!("{}/courses/{}/assignments", app.address, course.id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({
            "title": "Calculus Homework 4",
            "deadline": "2030-01-01T00:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .post(format!("{}/courses/join", app.address))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "code": "PYT001" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Teacher posts an assignment.
    let response = client
        .post(format!("{}/courses/{}/assignments", app.address, course.id))
        .bearer_auth(&teacher_token)
        .json(&serde_json::json!({
            "title": "Calculus Homework 1",
            "description": "Page 32 of the textbook, #6-12",
            "deadline": "2030-01-01T00:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let assignment: Assignment = response.json().await.unwrap();

    // Student submits; a forged author is refused.
    let response = client
        .post(format!("{}/assignments/{}/submissions", app.address, assignment.id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "user_id": teacher.id, "content": "forged" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .post(format!("{}/assignments/{}/submissions", app.address, assignment.id))
        .bearer_auth(&student_token)
        .json(&serde_json::json!({ "user_id": student.id, "content": "42" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let submission: Submission = response.json().await.unwrap();

    // Teacher grades it.
    let response = client
        .put(format!("{}/submissions/{}/grade", app.address, submission.id))
        .bearer_auth(&teacher_token)
        .json(&serde_json::json!({ "grade": 90, "feedback": "Good" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let graded: Submission = response.json().await.unwrap();
    assert_eq!(graded.grade, Some(90));

    // The student sees their grade.
    let response = client
        .get(format!("{}/assignments/{}/submissions", app.address, assignment.id))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    let mine: Vec<Submission> = response.json().await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].grade, Some(90));

    // Teacher deletes the assignment; its submission goes with it.
    let response = client
        .delete(format!(
            "{}/courses/{}/assignments/{}",
            app.address, course.id, assignment.id
        ))
        .bearer_auth(&teacher_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.repo.get_submission(submission.id).await.is_none());
}
