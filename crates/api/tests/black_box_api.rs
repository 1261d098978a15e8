use std::sync::Arc;

use caretrack_api::app::{build_app, services::AppServices};
use caretrack_auth::{JwtClaims, Role, roles};
use caretrack_core::{TenantId, UserId};
use caretrack_infra::{LogMailer, StaticTenderFeed};
use caretrack_tenders::FeedNotice;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";
const PASSWORD: &str = "correct horse battery";

struct TestServer {
    base_url: String,
    mailer: Arc<LogMailer>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with_feed(Vec::new()).await
    }

    async fn spawn_with_feed(notices: Vec<FeedNotice>) -> Self {
        Self::spawn_with(notices, &[]).await
    }

    async fn spawn_with(notices: Vec<FeedNotice>, superadmin_emails: &[&str]) -> Self {
        // Same router as prod over the in-memory store, on an ephemeral port.
        let mailer = Arc::new(LogMailer::new());
        let feed = Arc::new(StaticTenderFeed::new(notices));
        let services = AppServices::in_memory(SECRET, mailer.clone(), feed)
            .with_superadmin_emails(superadmin_emails.iter().copied());
        let app = build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            mailer,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn send(&self, method: reqwest::Method, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, token, path, body).await
    }

    async fn put(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, token, path, body).await
    }

    async fn delete(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self.client.delete(self.url(path)).bearer_auth(token).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    /// Create one contract type and one local authority in the caller's tenant.
    async fn reference_data(&self, token: &str) -> Refs {
        let (status, ct) = self.post(token, "/contract-types", json!({ "name": "Supported living" })).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, la) = self
            .post(token, "/local-authorities", json!({ "name": "Kent", "code": "KCC" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        Refs {
            contract_type_id: ct["id"].as_str().unwrap().to_string(),
            local_authority_id: la["id"].as_str().unwrap().to_string(),
        }
    }

    async fn create_user(&self, admin: &str, email: &str, role: &str) -> Value {
        let (status, user) = self
            .post(
                admin,
                "/users",
                json!({
                    "email": email,
                    "display_name": email,
                    "role": role,
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        user
    }

    /// Register an organisation and sign in as its first admin.
    async fn register(&self, organisation: &str, email: &str) -> (TenantId, String) {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "organisation_name": organisation,
                "email": email,
                "display_name": "First Admin",
                "password": PASSWORD,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        let tenant_id: TenantId = body["organisation"]["id"].as_str().unwrap().parse().unwrap();
        (tenant_id, self.login(email).await)
    }

    async fn login(&self, email: &str) -> String {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

struct Refs {
    contract_type_id: String,
    local_authority_id: String,
}

impl Refs {
    /// Well-formed ids that exist nowhere.
    fn unknown() -> Self {
        Refs {
            contract_type_id: uuid::Uuid::now_v7().to_string(),
            local_authority_id: uuid::Uuid::now_v7().to_string(),
        }
    }
}

fn contract_body(refs: &Refs, reference: &str, annual_value: i64) -> Value {
    json!({
        "title": "Supported living - Elm House",
        "reference": reference,
        "contract_type_id": refs.contract_type_id,
        "local_authority_id": refs.local_authority_id,
        "start_date": "2026-01-01",
        "end_date": "2027-12-31",
        "annual_value": annual_value,
    })
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");

    let res = srv
        .client
        .get(srv.url("/contracts"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, vec![roles::CONTRACT_MANAGER]);

    let (status, body) = srv.get(&token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "contract_manager"));
}

#[tokio::test]
async fn register_login_and_verify_email() {
    let srv = TestServer::spawn().await;
    let (tenant_id, token) = srv.register("Oak Care Ltd", "Owner@Oak.example").await;

    let (status, body) = srv.get(&token, "/organisation").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["organisation"]["id"].as_str().unwrap(), tenant_id.to_string());
    assert_eq!(body["organisation"]["seats_used"], 1);

    // The verification link went out through the mailer.
    let sent = srv.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@oak.example");
    let verify_token = sent[0]
        .body
        .split("token=")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap()
        .to_string();

    let res = srv
        .client
        .get(srv.url(&format!("/auth/verify?token={verify_token}")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["verified"], true);

    // Tokens are single use.
    let res = srv
        .client
        .get(srv.url(&format!("/auth/verify?token={verify_token}")))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_client_error());

    // Same email cannot register twice.
    let res = srv
        .client
        .post(srv.url("/auth/register"))
        .json(&json!({
            "organisation_name": "Other Org",
            "email": "owner@oak.example",
            "display_name": "Someone",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let srv = TestServer::spawn().await;
    srv.register("Birch Care", "admin@birch.example").await;

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "email": "admin@birch.example", "password": "not the password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn viewer_can_read_but_not_write() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::VIEWER]);

    let (status, body) = srv.get(&token, "/contracts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    let (status, body) = srv
        .post(&token, "/contracts", contract_body(&Refs::unknown(), "ELM-001", 100_000))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn records_are_invisible_to_other_tenants() {
    let srv = TestServer::spawn().await;
    let a = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);
    let b = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);
    let refs_a = srv.reference_data(&a).await;
    let refs_b = srv.reference_data(&b).await;

    let (status, created) = srv.post(&a, "/contracts", contract_body(&refs_a, "ELM-001", 100_000)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["reference"], "ELM-001");

    let (status, _) = srv.get(&b, &format!("/contracts/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, list) = srv.get(&b, "/contracts").await;
    assert!(list["items"].as_array().unwrap().is_empty());

    // References are unique per tenant only.
    let (status, _) = srv.post(&b, "/contracts", contract_body(&refs_b, "elm-001", 5_000)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = srv.post(&a, "/contracts", contract_body(&refs_a, "elm-001", 5_000)).await;

    // Another tenant's reference data cannot be borrowed.
    let (status, body_b) = srv.post(&b, "/contracts", contract_body(&refs_a, "ELM-009", 5_000)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body_b["error"], "validation_error");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);
    let (status, body) = srv.get(&token, "/contracts/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn seat_limit_blocks_extra_users_until_raised() {
    let srv = TestServer::spawn_with(Vec::new(), &["ops@caretrack.example"]).await;
    let (_, admin) = srv.register("Cedar Care", "admin@cedar.example").await;

    // Default limit is 5 and the admin holds one seat.
    for n in 0..4 {
        let (status, _) = srv
            .post(
                &admin,
                "/users",
                json!({
                    "email": format!("staff{n}@cedar.example"),
                    "display_name": format!("Staff {n}"),
                    "role": "staff",
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let extra = json!({
        "email": "extra@cedar.example",
        "display_name": "Extra",
        "role": "staff",
        "password": PASSWORD,
    });
    let (status, body) = srv.post(&admin, "/users", extra.clone()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invariant_violation");

    let (status, request) = srv
        .post(&admin, "/organisation/seats", json!({ "requested_seats": 8, "reason": "new service" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = request["id"].as_str().unwrap();

    // Organisation admins cannot approve their own request.
    let (status, _) = srv
        .post(&admin, &format!("/admin/seat-requests/{request_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The platform operator's account comes from SUPERADMIN_EMAILS.
    let (_, platform) = srv.register("Caretrack Platform", "ops@caretrack.example").await;
    let (_, me) = srv.get(&platform, "/whoami").await;
    assert!(me["roles"].as_array().unwrap().iter().any(|r| r == "superadmin"));

    let (status, body) = srv
        .post(&platform, &format!("/admin/seat-requests/{request_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["organisation"]["seat_limit"], 8);

    let (status, _) = srv.post(&admin, "/users", extra).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn gated_contract_change_waits_for_approval() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let manager = mint_jwt(tenant_id, vec![roles::CONTRACT_MANAGER]);
    let admin = mint_jwt(tenant_id, vec![roles::ORGANISATION_ADMIN]);
    let refs = srv.reference_data(&manager).await;

    let (status, _) = srv
        .post(
            &admin,
            "/approvals/rules",
            json!({
                "entity_type": "contract",
                "field": "annual_value",
                "action": "update",
                "required_role": "organisation_admin",
                "description": "Value changes need an admin",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, contract) = srv.post(&manager, "/contracts", contract_body(&refs, "ELM-002", 100_000)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = contract["id"].as_str().unwrap();

    // Ungated fields go straight through.
    let mut renamed = contract_body(&refs, "ELM-002", 100_000);
    renamed["title"] = json!("Supported living - Elm House (north)");
    let (status, _) = srv.put(&manager, &format!("/contracts/{id}"), renamed.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let mut raised = renamed.clone();
    raised["annual_value"] = json!(150_000);
    let (status, parked) = srv.put(&manager, &format!("/contracts/{id}"), raised).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(parked["status"], "pending_approval");
    let request_id = parked["approval_request"]["id"].as_str().unwrap();

    let (_, current) = srv.get(&manager, &format!("/contracts/{id}")).await;
    assert_eq!(current["annual_value"], 100_000);

    // The requester cannot decide their own request even with the permission.
    let (status, _) = srv
        .post(&manager, &format!("/approvals/requests/{request_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, decided) = srv
        .post(&admin, &format!("/approvals/requests/{request_id}/approve"), json!({ "comment": "ok" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["request"]["status"], "approved");
    assert_eq!(decided["applied"]["annual_value"], 150_000);

    let (_, current) = srv.get(&manager, &format!("/contracts/{id}")).await;
    assert_eq!(current["annual_value"], 150_000);

    let (_, log) = srv.get(&admin, &format!("/audit?entity_id={id}")).await;
    let actions: Vec<&str> = log["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"contract.create"));
    assert!(actions.contains(&"contract.update"));
}

#[tokio::test]
async fn new_rate_version_closes_the_previous_one() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::ORGANISATION_ADMIN]);

    let (_, ct) = srv.post(&token, "/contract-types", json!({ "name": "Domiciliary care" })).await;
    let (_, la) = srv.post(&token, "/local-authorities", json!({ "name": "Kent", "code": "KCC" })).await;
    let ct = ct["id"].as_str().unwrap().to_string();
    let la = la["id"].as_str().unwrap().to_string();

    let rate = |amount: i64, from: &str| {
        json!({
            "contract_type_id": ct,
            "local_authority_id": la,
            "amount": amount,
            "unit": "hourly",
            "effective_from": from,
        })
    };

    let (status, first) = srv.post(&token, "/rates", rate(2_150, "2025-04-01")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(first["closed_previous"].is_null());

    let (status, second) = srv.post(&token, "/rates", rate(2_300, "2026-04-01")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["closed_previous"]["effective_to"], "2026-03-31");

    // Back-dated versions are refused.
    let (status, _) = srv.post(&token, "/rates", rate(2_000, "2025-10-01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, current) = srv
        .get(&token, &format!("/rates/current?contract_type_id={ct}&local_authority_id={la}&on=2025-12-01"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["amount"], 2_150);
}

#[tokio::test]
async fn team_import_from_csv() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::ORGANISATION_ADMIN]);

    let csv = "name,description,parent\nNorth,Northern region,\nNorth East,,North\nNorth,duplicate,\n";

    let dry = srv
        .client
        .post(srv.url("/teams/import?dry_run=true"))
        .bearer_auth(&token)
        .header("content-type", "text/csv")
        .body(csv)
        .send()
        .await
        .unwrap();
    assert_eq!(dry.status(), StatusCode::OK);
    let dry: Value = dry.json().await.unwrap();
    assert_eq!(dry["to_create"].as_array().unwrap().len(), 2);
    let (_, teams) = srv.get(&token, "/teams").await;
    assert!(teams["items"].as_array().unwrap().is_empty());

    let res = srv
        .client
        .post(srv.url("/teams/import"))
        .bearer_auth(&token)
        .header("content-type", "text/csv")
        .body(csv)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    let created = report["created"].as_array().unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1]["parent_team_id"], created[0]["id"]);

    let (_, teams) = srv.get(&token, "/teams").await;
    assert_eq!(teams["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn tender_check_stores_matching_notices_once() {
    let notice = |id: &str, title: &str| FeedNotice {
        source_id: Some(id.to_string()),
        title: title.to_string(),
        buyer: "Kent County Council".to_string(),
        region: None,
        value: None,
        deadline: None,
        published_at: None,
        url: None,
    };
    let srv = TestServer::spawn_with_feed(vec![
        notice("n-1", "Home care framework"),
        notice("n-2", "Road resurfacing"),
    ])
    .await;
    let token = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);

    // Not configured yet.
    let (status, _) = srv.post(&token, "/tenders/check", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = srv.put(&token, "/tenders/preferences", json!({ "keywords": ["care"] })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, check) = srv.post(&token, "/tenders/check", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let found = check["new_opportunities"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "Home care framework");

    let (_, again) = srv.post(&token, "/tenders/check", json!({})).await;
    assert!(again["new_opportunities"].as_array().unwrap().is_empty());

    let (_, listed) = srv.get(&token, "/tenders/opportunities").await;
    let opportunity_id = listed["items"][0]["id"].as_str().unwrap().to_string();

    let (status, tender) = srv
        .post(
            &token,
            "/tenders",
            json!({
                "title": "Home care framework bid",
                "authority": "Kent County Council",
                "opportunity_id": opportunity_id,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tender["status"], "identified");
}

#[tokio::test]
async fn assistant_answers_from_the_portfolio() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);
    let refs = srv.reference_data(&token).await;
    let (status, _) = srv.post(&token, "/contracts", contract_body(&refs, "ELM-003", 250_000)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, summary) = srv.get(&token, "/assistant/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["contracts_by_status"]["draft"], 1);

    let (status, answer) = srv
        .post(&token, "/assistant/ask", json!({ "question": "How many contracts do we have?" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!answer["text"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn negative_amounts_are_rejected() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::ORGANISATION_ADMIN]);
    let refs = srv.reference_data(&token).await;

    let (status, _) = srv.post(&token, "/contracts", contract_body(&refs, "NEG-001", -5)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, contract) = srv.post(&token, "/contracts", contract_body(&refs, "NEG-001", 5)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = srv
        .post(
            &token,
            "/payments",
            json!({
                "contract_id": contract["id"],
                "amount": -500,
                "paid_on": "2026-02-01",
                "reference": "BACS-1",
                "method": "bacs",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = srv
        .post(
            &token,
            "/rates",
            json!({
                "contract_type_id": refs.contract_type_id,
                "local_authority_id": refs.local_authority_id,
                "amount": -1,
                "unit": "hourly",
                "effective_from": "2026-04-01",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, payments) = srv.get(&token, "/payments").await;
    assert!(payments["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn expiring_window_is_bounded() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);

    let (status, body) = srv.get(&token, "/contracts?expiring_within=1000000000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = srv.get(&token, "/contracts?expiring_within=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = srv.get(&token, "/contracts?expiring_within=3650").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn contracts_need_a_type_and_an_authority() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);

    let mut body = contract_body(&Refs::unknown(), "REF-001", 1_000);
    body.as_object_mut().unwrap().remove("contract_type_id");
    let (status, _) = srv.post(&token, "/contracts", body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = srv
        .post(&token, "/contracts", contract_body(&Refs::unknown(), "REF-001", 1_000))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn payments_record_void_and_total() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::ORGANISATION_ADMIN]);
    let refs = srv.reference_data(&token).await;
    let (_, contract) = srv.post(&token, "/contracts", contract_body(&refs, "PAY-001", 120_000)).await;
    let contract_id = contract["id"].as_str().unwrap().to_string();

    let payment = |amount: i64, paid_on: &str, reference: &str| {
        json!({
            "contract_id": contract_id,
            "amount": amount,
            "paid_on": paid_on,
            "reference": reference,
            "method": "bacs",
        })
    };
    let (status, first) = srv.post(&token, "/payments", payment(10_000, "2026-01-31", "BACS-001")).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = srv.post(&token, "/payments", payment(2_550, "2026-02-28", "BACS-002")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, totals) = srv.get(&token, "/payments/totals").await;
    let row = &totals["items"][0];
    assert_eq!(row["contract_id"], contract_id.as_str());
    assert_eq!(row["count"], 2);
    assert_eq!(row["total"], 12_550);
    assert_eq!(row["last_paid_on"], "2026-02-28");

    let first_id = first["id"].as_str().unwrap();
    let (status, voided) = srv.delete(&token, &format!("/payments/{first_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voided["is_active"], false);
    let (status, _) = srv.delete(&token, &format!("/payments/{first_id}")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, listed) = srv.get(&token, &format!("/payments?contract_id={contract_id}")).await;
    let listed = listed["items"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["reference"], "BACS-002");

    let (_, totals) = srv.get(&token, "/payments/totals").await;
    assert_eq!(totals["items"][0]["count"], 1);
    assert_eq!(totals["items"][0]["total"], 2_550);

    // Contract managers can read payments but not record them.
    let manager = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);
    let (status, _) = srv.post(&manager, "/payments", payment(1, "2026-03-01", "X")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn identifiers_are_unique_across_people() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);

    let (status, mary) = srv
        .post(
            &token,
            "/people",
            json!({
                "first_name": "Mary",
                "last_name": "Seacole",
                "identifiers": [{ "kind": "nhs_number", "value": "943 476 5919" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(mary["identifiers"][0]["value"], "9434765919");
    let mary_id = mary["id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(
            &token,
            "/people",
            json!({
                "first_name": "Florence",
                "last_name": "Nightingale",
                "identifiers": [{ "kind": "nhs_number", "value": "9434765919" }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, florence) = srv
        .post(&token, "/people", json!({ "first_name": "Florence", "last_name": "Nightingale" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let florence_id = florence["id"].as_str().unwrap().to_string();

    let nhs = json!({ "kind": "nhs_number", "value": "943-476-5919" });
    let (status, _) = srv.post(&token, &format!("/people/{florence_id}/identifiers"), nhs.clone()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Removal accepts the same spellings as entry.
    let (status, mary) = srv
        .delete(&token, &format!("/people/{mary_id}/identifiers/nhs_number/943-476-5919"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(mary["identifiers"].as_array().unwrap().is_empty());

    let (status, florence) = srv.post(&token, &format!("/people/{florence_id}/identifiers"), nhs).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(florence["identifiers"][0]["value"], "9434765919");

    let (_, found) = srv.get(&token, "/people?q=94347").await;
    let found = found["items"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], florence_id.as_str());
}

#[tokio::test]
async fn glossary_terms_can_be_managed_and_searched() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::CONTRACT_MANAGER]);

    let (status, term) = srv
        .post(
            &token,
            "/glossary",
            json!({
                "term": "Spot purchase",
                "definition": "Care bought per person rather than under a block contract.",
                "category": "commissioning",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = term["id"].as_str().unwrap().to_string();

    let (status, _) = srv
        .post(&token, "/glossary", json!({ "term": "spot PURCHASE", "definition": "duplicate" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, hits) = srv.get(&token, "/glossary?q=spot").await;
    assert_eq!(hits["items"].as_array().unwrap().len(), 1);
    let (_, misses) = srv.get(&token, "/glossary?q=framework").await;
    assert!(misses["items"].as_array().unwrap().is_empty());

    let (status, updated) = srv
        .put(
            &token,
            &format!("/glossary/{id}"),
            json!({ "term": "Spot purchase", "definition": "Individually commissioned care." }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["definition"], "Individually commissioned care.");

    let (_, answer) = srv
        .post(&token, "/assistant/ask", json!({ "question": "What is spot purchase?" }))
        .await;
    assert!(answer["text"].as_str().unwrap().contains("Individually commissioned care."));

    // Viewers may search but not edit.
    let viewer = mint_jwt(TenantId::new(), vec![roles::VIEWER]);
    let (status, _) = srv.delete(&viewer, &format!("/glossary/{id}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, deleted) = srv.delete(&token, &format!("/glossary/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], id.as_str());
    let (status, _) = srv.get(&token, &format!("/glossary/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_with_active_sub_teams_cannot_be_deactivated() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt(TenantId::new(), vec![roles::ORGANISATION_ADMIN]);

    let (status, parent) = srv.post(&token, "/teams", json!({ "name": "Operations" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let parent_id = parent["id"].as_str().unwrap().to_string();
    let (status, child) = srv
        .post(&token, "/teams", json!({ "name": "North", "parent_team_id": parent_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let child_id = child["id"].as_str().unwrap().to_string();

    let (status, body) = srv.post(&token, &format!("/teams/{parent_id}/deactivate"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invariant_violation");

    let (status, _) = srv.post(&token, &format!("/teams/{child_id}/deactivate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, parent) = srv.post(&token, &format!("/teams/{parent_id}/deactivate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parent["is_active"], false);

    // The name is free again once the team is inactive.
    let (status, _) = srv.post(&token, "/teams", json!({ "name": "operations" })).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn rejected_change_leaves_the_contract_untouched() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let manager = mint_jwt(tenant_id, vec![roles::CONTRACT_MANAGER]);
    let other_manager = mint_jwt(tenant_id, vec![roles::CONTRACT_MANAGER]);
    let admin = mint_jwt(tenant_id, vec![roles::ORGANISATION_ADMIN]);
    let refs = srv.reference_data(&manager).await;

    let (status, _) = srv
        .post(
            &admin,
            "/approvals/rules",
            json!({
                "entity_type": "contract",
                "field": "annual_value",
                "action": "update",
                "required_role": "organisation_admin",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, contract) = srv.post(&manager, "/contracts", contract_body(&refs, "ASH-001", 80_000)).await;
    let id = contract["id"].as_str().unwrap().to_string();
    let (status, parked) = srv
        .put(&manager, &format!("/contracts/{id}"), contract_body(&refs, "ASH-001", 95_000))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let request_id = parked["approval_request"]["id"].as_str().unwrap().to_string();

    // The rule asks for an organisation admin.
    let (status, _) = srv
        .post(&other_manager, &format!("/approvals/requests/{request_id}/reject"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, rejected) = srv
        .post(
            &admin,
            &format!("/approvals/requests/{request_id}/reject"),
            json!({ "comment": "not this year" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["comment"], "not this year");

    // Decided requests cannot be decided again.
    let (status, _) = srv
        .post(&admin, &format!("/approvals/requests/{request_id}/approve"), json!({}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, current) = srv.get(&manager, &format!("/contracts/{id}")).await;
    assert_eq!(current["annual_value"], 80_000);

    let (_, listed) = srv.get(&admin, "/approvals/requests?status=rejected").await;
    assert_eq!(listed["items"].as_array().unwrap().len(), 1);
    let (_, pending) = srv.get(&admin, "/approvals/requests?status=pending").await;
    assert!(pending["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn configured_superadmin_is_promoted_on_sign_in() {
    let srv = TestServer::spawn_with(Vec::new(), &["lead@elm.example"]).await;
    let (tenant_id, admin) = srv.register("Elm Care", "admin@elm.example").await;

    // Created as staff, then picked up by the configured list at sign-in.
    let lead = srv.create_user(&admin, "lead@elm.example", "staff").await;
    assert_eq!(lead["role"], "staff");
    let lead_token = srv.login("lead@elm.example").await;
    let (_, me) = srv.get(&lead_token, "/whoami").await;
    assert!(me["roles"].as_array().unwrap().iter().any(|r| r == "superadmin"));

    let lead_id = lead["id"].as_str().unwrap().to_string();
    let (_, log) = srv.get(&admin, &format!("/audit?entity_id={lead_id}")).await;
    assert!(
        log["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e["action"] == "user.promote_superadmin")
    );

    // An organisation admin can neither deactivate nor reactivate a superadmin.
    let (status, _) = srv.post(&admin, &format!("/users/{lead_id}/deactivate"), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let platform = mint_jwt(tenant_id, vec![roles::SUPERADMIN]);
    let (status, _) = srv.post(&platform, &format!("/users/{lead_id}/deactivate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = srv.post(&admin, &format!("/users/{lead_id}/reactivate"), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = srv.post(&platform, &format!("/users/{lead_id}/reactivate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() {
    let srv = TestServer::spawn().await;
    srv.register("Hazel Care", "admin@hazel.example").await;

    let mut bodies = Vec::new();
    for email in ["admin@hazel.example", "nobody@hazel.example", "not-an-email"] {
        let res = srv
            .client
            .post(srv.url("/auth/login"))
            .json(&json!({ "email": email, "password": "not the password" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        bodies.push(res.json::<Value>().await.unwrap());
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
}
