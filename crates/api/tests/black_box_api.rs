use pvz_api::config::ServerConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory stores), bound to an ephemeral port.
        let app = pvz_api::app::build_app(&ServerConfig::default())
            .await
            .expect("failed to build app");
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
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn login(&self, role: &str) -> String {
        let res = self
            .client
            .post(format!("{}/dummyLogin", self.base_url))
            .json(&json!({ "role": role }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let text = res.text().await.unwrap();
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, value)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    async fn create_pvz(&self, moderator: &str, city: &str) -> String {
        let (status, body) = self
            .post("/pvz", Some(moderator), Some(json!({ "city": city })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn().await;
    let res = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let server = TestServer::spawn().await;

    let (status, body) = server
        .post("/pvz", None, Some(json!({ "city": "Москва" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let res = server
        .client
        .get(format!("{}/pvz", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .post("/receptions", Some("not.a.jwt"), Some(json!({ "pvzId": "x" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn roles_gate_each_route() {
    let server = TestServer::spawn().await;
    let employee = server.login("employee").await;
    let moderator = server.login("moderator").await;

    let (status, body) = server
        .post("/pvz", Some(&employee), Some(json!({ "city": "Москва" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let pvz = server.create_pvz(&moderator, "Москва").await;

    let (status, _) = server
        .post("/receptions", Some(&moderator), Some(json!({ "pvzId": pvz })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .post("/products", Some(&moderator), Some(json!({ "type": "обувь", "pvzId": pvz })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .post(&format!("/pvz/{pvz}/delete_last_product"), Some(&moderator), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .post(&format!("/pvz/{pvz}/close_last_reception"), Some(&moderator), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Both roles read history.
    assert_eq!(server.get("/pvz", &employee).await.0, StatusCode::OK);
    assert_eq!(server.get("/pvz", &moderator).await.0, StatusCode::OK);
}

#[tokio::test]
async fn dummy_login_rejects_unknown_roles() {
    let server = TestServer::spawn().await;
    let (status, body) = server
        .post("/dummyLogin", None, Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_json");
}

#[tokio::test]
async fn create_pvz_returns_wire_shape() {
    let server = TestServer::spawn().await;
    let moderator = server.login("moderator").await;

    let (status, body) = server
        .post("/pvz", Some(&moderator), Some(json!({ "city": "Казань" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["city"], "Казань");
    assert!(body["registrationDate"].is_string());
    assert!(body["id"].is_string());

    let (status, body) = server
        .post("/pvz", Some(&moderator), Some(json!({ "city": "Kazan" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");
}

#[tokio::test]
async fn reception_lifecycle_over_http() {
    let server = TestServer::spawn().await;
    let moderator = server.login("moderator").await;
    let employee = server.login("employee").await;
    let staff = Some(employee.as_str());
    let pvz = server.create_pvz(&moderator, "Москва").await;

    let (status, reception) = server
        .post("/receptions", staff, Some(json!({ "pvzId": pvz })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reception["status"], "in_progress");
    assert_eq!(reception["pvzId"], pvz.as_str());

    let (status, body) = server
        .post("/receptions", staff, Some(json!({ "pvzId": pvz })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    for product_type in ["электроника", "одежда"] {
        let (status, product) = server
            .post("/products", staff, Some(json!({ "type": product_type, "pvzId": pvz })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(product["type"], product_type);
        assert_eq!(product["receptionId"], reception["id"]);
    }

    let (status, _) = server
        .post(&format!("/pvz/{pvz}/delete_last_product"), staff, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, closed) = server
        .post(&format!("/pvz/{pvz}/close_last_reception"), staff, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "close");
    assert_eq!(closed["id"], reception["id"]);

    let (status, body) = server
        .post("/products", staff, Some(json!({ "type": "обувь", "pvzId": pvz })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_active_reception");

    let (status, history) = server.get("/pvz", &employee).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["pvz"]["id"], pvz.as_str());
    let receptions = entries[0]["receptions"].as_array().unwrap();
    assert_eq!(receptions.len(), 1);
    assert_eq!(receptions[0]["reception"]["status"], "close");
    let products = receptions[0]["products"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["type"], "электроника");
}

#[tokio::test]
async fn unknown_and_malformed_pvz_ids() {
    let server = TestServer::spawn().await;
    let employee = server.login("employee").await;
    let staff = Some(employee.as_str());
    let missing = "0195f3a1-7a2b-7c3d-8e4f-5a6b7c8d9e0f";

    let (status, body) = server
        .post("/receptions", staff, Some(json!({ "pvzId": missing })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = server
        .post("/pvz/not-a-uuid/close_last_reception", staff, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let (status, body) = server
        .post(&format!("/pvz/{missing}/delete_last_product"), staff, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no_active_reception");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let server = TestServer::spawn().await;
    let employee = server.login("employee").await;
    let res = server
        .client
        .post(format!("{}/receptions", server.base_url))
        .bearer_auth(&employee)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_json");
}

#[tokio::test]
async fn history_query_validation() {
    let server = TestServer::spawn().await;
    let employee = server.login("employee").await;

    let (status, body) = server.get("/pvz?limit=31", &employee).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let (status, _) = server.get("/pvz?page=0", &employee).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.get("/pvz?startDate=yesterday", &employee).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_date_format");
    assert!(body["message"].as_str().unwrap().contains("startDate"));

    let (status, _) = server.get("/pvz?page=abc", &employee).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_pages_in_creation_order() {
    let server = TestServer::spawn().await;
    let moderator = server.login("moderator").await;
    let employee = server.login("employee").await;

    let mut ids = Vec::new();
    for _ in 0..15 {
        let pvz = server.create_pvz(&moderator, "Санкт-Петербург").await;
        let (status, _) = server
            .post("/receptions", Some(&employee), Some(json!({ "pvzId": pvz })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(pvz);
    }

    let (status, page1) = server.get("/pvz?page=1&limit=10", &employee).await;
    assert_eq!(status, StatusCode::OK);
    let (status, page2) = server.get("/pvz?page=2&limit=10", &employee).await;
    assert_eq!(status, StatusCode::OK);

    let page_ids = |page: &Value| -> Vec<String> {
        page.as_array()
            .unwrap()
            .iter()
            .map(|e| e["pvz"]["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(page_ids(&page1), ids[..10].to_vec());
    assert_eq!(page_ids(&page2), ids[10..].to_vec());

    let (status, old) = server
        .get(
            "/pvz?startDate=2000-01-01T00:00:00Z&endDate=2000-12-31T23:59:59Z",
            &moderator,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(old.as_array().unwrap().is_empty());
}
