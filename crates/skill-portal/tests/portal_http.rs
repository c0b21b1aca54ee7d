//! HTTP behaviour of the portal router: authentication, role gates, the
//! response envelope and the status codes of the enrollment rules.

mod common {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use skill_portal::auth::TokenAuthority;
    use skill_portal::domain::{ExternalIdentity, Role, StudentType, User};
    use skill_portal::http::{portal_router, PortalState};
    use skill_portal::store::InMemoryStore;
    use skill_portal::workflows::{SkillPortal, WorkflowSettings};

    pub(super) struct Harness {
        pub router: Router,
        pub portal: Arc<SkillPortal<InMemoryStore>>,
        pub tokens: Arc<TokenAuthority>,
        pub team: User,
        pub faculty: User,
        pub hosteller: User,
        pub day_scholar: User,
    }

    impl Harness {
        pub fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let portal = Arc::new(SkillPortal::new(store, WorkflowSettings::default()));
            let tokens = Arc::new(TokenAuthority::new(b"router-test-secret", Duration::hours(1)));

            let account = |handle: &str, role: Role, student_type: Option<StudentType>| {
                portal
                    .identity()
                    .provision_with_role(
                        ExternalIdentity {
                            google_id: format!("google-{handle}"),
                            email: format!("{handle}@bitsathy.ac.in"),
                            name: handle.to_string(),
                        },
                        role,
                        student_type,
                        Utc::now(),
                    )
                    .expect("account provisioned")
            };

            let team = account("team", Role::SkillTeam, None);
            let faculty = account("faculty", Role::Faculty, None);
            let hosteller = account("hosteller", Role::Student, Some(StudentType::Hosteller));
            let day_scholar = account("day", Role::Student, Some(StudentType::DayScholar));

            let router = portal_router(PortalState::new(portal.clone(), tokens.clone()));

            Self {
                router,
                portal,
                tokens,
                team,
                faculty,
                hosteller,
                day_scholar,
            }
        }

        pub fn token(&self, user: &User) -> String {
            self.tokens.issue(user, Utc::now()).expect("token issued")
        }

        pub async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(body) => request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
                    .expect("request builds"),
                None => request.body(Body::empty()).expect("request builds"),
            };

            let response = self
                .router
                .clone()
                .oneshot(request)
                .await
                .expect("route executes");
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("read body");
            let payload = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).expect("json payload")
            };
            (status, payload)
        }

        /// Submits and approves a skill, returning its id.
        pub async fn active_skill(&self, skill_type: &str, capacity: u32) -> String {
            let start = Utc::now() + Duration::days(7);
            let (status, body) = self
                .call(
                    Method::POST,
                    "/api/faculty/submit-budget",
                    Some(&self.token(&self.faculty)),
                    Some(json!({
                        "name": format!("{skill_type} electronics"),
                        "type": skill_type,
                        "numberOfVenues": 1,
                        "numberOfStudents": capacity,
                        "amount": 18000.0,
                        "startDate": start,
                        "endDate": start + Duration::days(30),
                        "venue": "Block C",
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
            let skill_id = body["data"]["skill"]["id"]
                .as_str()
                .expect("skill id")
                .to_string();

            let (status, body) = self
                .call(
                    Method::PATCH,
                    &format!("/api/team/review-budget/{skill_id}"),
                    Some(&self.token(&self.team)),
                    Some(json!({ "status": "approved" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            assert_eq!(body["data"]["skill"]["status"], "active");

            skill_id
        }
    }
}

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::Harness;
use serde_json::json;
use skill_portal::domain::UserId;

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let harness = Harness::new();

    let (status, body) = harness
        .call(Method::GET, "/api/auth/me", None, None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["code"], "TOKEN_MISSING");
    assert_eq!(body["message"], "Not authorized to access this route");

    let (status, body) = harness
        .call(Method::GET, "/api/auth/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn tokens_for_unknown_accounts_are_rejected() {
    let harness = Harness::new();
    let mut ghost = harness.hosteller.clone();
    ghost.id = UserId::from("usr-ghost");

    let token = harness.tokens.issue(&ghost, Utc::now()).expect("token");
    let (status, body) = harness
        .call(Method::GET, "/api/auth/me", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User not found");
}

#[tokio::test]
async fn me_returns_the_account_in_the_envelope() {
    let harness = Harness::new();
    let token = harness.token(&harness.hosteller);

    let (status, body) = harness
        .call(Method::GET, "/api/auth/me", Some(&token), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["user"]["email"], "hosteller@bitsathy.ac.in");
    assert_eq!(body["data"]["user"]["studentType"], "hosteller");
}

#[tokio::test]
async fn route_groups_are_gated_by_role() {
    let harness = Harness::new();
    let student = harness.token(&harness.hosteller);

    let (status, body) = harness
        .call(Method::GET, "/api/team/pending-budgets", Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "User role student is not authorized to access this route"
    );

    let faculty = harness.token(&harness.faculty);
    let (status, _) = harness
        .call(Method::GET, "/api/student/available-skills", Some(&faculty), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let team = harness.token(&harness.team);
    let (status, body) = harness
        .call(Method::GET, "/api/team/pending-budgets", Some(&team), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 0);
}

#[tokio::test]
async fn enrollment_rules_surface_distinct_statuses() {
    let harness = Harness::new();
    let night = harness.active_skill("night", 1).await;
    let hosteller = harness.token(&harness.hosteller);
    let day_scholar = harness.token(&harness.day_scholar);

    let (status, body) = harness
        .call(
            Method::POST,
            &format!("/api/student/register/{night}"),
            Some(&day_scholar),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "TYPE_MISMATCH");
    assert_eq!(
        body["message"],
        "Day scholars can only register for day skills"
    );

    let (status, body) = harness
        .call(
            Method::POST,
            &format!("/api/student/register/{night}"),
            Some(&hosteller),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["data"]["skill"]["enrolledStudents"]
            .as_array()
            .map(Vec::len),
        Some(1)
    );

    let (status, body) = harness
        .call(
            Method::POST,
            &format!("/api/student/register/{night}"),
            Some(&hosteller),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_ENROLLED");

    let (status, body) = harness
        .call(Method::GET, "/api/student/my-skills", Some(&hosteller), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["skills"][0]["id"], night.as_str());
}

#[tokio::test]
async fn capacity_is_reported_as_unprocessable() {
    let harness = Harness::new();
    let skill = harness.active_skill("both", 1).await;
    let first = harness.token(&harness.hosteller);
    let second_student = harness
        .portal
        .identity()
        .provision_with_role(
            skill_portal::domain::ExternalIdentity {
                google_id: "google-late".to_string(),
                email: "late@bitsathy.ac.in".to_string(),
                name: "late".to_string(),
            },
            skill_portal::domain::Role::Student,
            Some(skill_portal::domain::StudentType::Hosteller),
            Utc::now(),
        )
        .expect("second student");
    let second = harness.token(&second_student);

    let uri = format!("/api/student/register/{skill}");
    let (status, _) = harness.call(Method::POST, &uri, Some(&first), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = harness.call(Method::POST, &uri, Some(&second), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "No available slots in this skill");
}

#[tokio::test]
async fn unknown_documents_and_bad_bodies_are_client_errors() {
    let harness = Harness::new();
    let team = harness.token(&harness.team);

    let (status, body) = harness
        .call(Method::GET, "/api/skills/skl-missing", Some(&team), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Skill not found");

    let (status, body) = harness
        .call(
            Method::PATCH,
            "/api/team/review-budget/skl-missing",
            Some(&team),
            Some(json!({ "status": "maybe" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn students_do_not_see_rejection_reasons() {
    let harness = Harness::new();
    let faculty = harness.token(&harness.faculty);
    let team = harness.token(&harness.team);
    let start = Utc::now() + chrono::Duration::days(10);

    let (_, body) = harness
        .call(
            Method::POST,
            "/api/faculty/submit-budget",
            Some(&faculty),
            Some(json!({
                "name": "Drone design",
                "type": "day",
                "numberOfVenues": 1,
                "numberOfStudents": 30,
                "amount": 90000.0,
                "startDate": start,
                "endDate": start + chrono::Duration::days(20),
                "venue": "Aero Lab",
            })),
        )
        .await;
    let skill_id = body["data"]["skill"]["id"].as_str().expect("id").to_string();

    let (status, body) = harness
        .call(
            Method::PATCH,
            &format!("/api/team/review-budget/{skill_id}"),
            Some(&team),
            Some(json!({ "status": "rejected", "rejectionReason": "Over budget" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["skill"]["budget"]["rejectionReason"], "Over budget");

    let (status, body) = harness
        .call(
            Method::PATCH,
            &format!("/api/team/review-budget/{skill_id}"),
            Some(&team),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "This budget has already been reviewed");

    let student = harness.token(&harness.day_scholar);
    let (status, body) = harness
        .call(Method::GET, &format!("/api/skills/{skill_id}"), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["skill"]["budget"]
        .get("rejectionReason")
        .map_or(true, |reason| reason.is_null()));
}
