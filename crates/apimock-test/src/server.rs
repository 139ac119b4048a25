//! TestServer: runs a mock server in-process on an ephemeral port.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use apimock::{MockServer, ServerConfig, StartupError};

/// Errors from TestServer operations.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Absolute path to a file in the shared `tests/fixtures` directory.
pub fn fixture(name: &str) -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/apimock-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(name)
}

/// Full-stack test harness.
///
/// Binds `127.0.0.1:0` before the server task starts, so requests can be
/// sent as soon as construction returns.
pub struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    /// Serve the document at `path` in dev mode.
    pub async fn from_document(path: impl AsRef<Path>) -> Result<Self, TestError> {
        let config = ServerConfig {
            dev_mode: true,
            ..ServerConfig::default()
        };
        Self::with_config(path, config).await
    }

    pub async fn with_config(
        path: impl AsRef<Path>,
        config: ServerConfig,
    ) -> Result<Self, TestError> {
        let server = MockServer::load(path.as_ref(), config)?;
        Self::start(server).await
    }

    /// Serve an already assembled server, e.g. one with overrides.
    pub async fn start(server: MockServer) -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let task = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        Ok(Self {
            addr,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
            task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response, TestError> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// POST a JSON body.
    pub async fn post(&self, path: &str, body: &str) -> Result<reqwest::Response, TestError> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await?)
    }

    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<reqwest::Response, TestError> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.request(method, &url).send().await?)
    }

    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(mut self) -> Result<(), TestError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(result) => Ok(result?),
            Err(e) => Err(TestError::Io(std::io::Error::other(e))),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apimock::{handler, json_response, RouteRequest};
    use apimock_spec::load_and_normalize;
    use serde_json::Value;

    async fn petstore() -> TestServer {
        TestServer::from_document(fixture("petstore.yaml"))
            .await
            .expect("failed to start server")
    }

    #[tokio::test]
    async fn path_params_route_to_generated_pet() {
        let server = petstore().await;

        let resp = server.get("/pets/42").await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "application/json");

        let body: Value = resp.json().await.unwrap();
        assert!(body["id"].as_i64().unwrap() >= 1);
        assert!(body["name"].is_string());
        if let Some(tag) = body.get("tag") {
            assert!(["cat", "dog", "bird"].contains(&tag.as_str().unwrap()));
        }
    }

    #[tokio::test]
    async fn list_returns_array_of_pets() {
        let server = petstore().await;

        let body: Value = server.get("/pets?limit=5").await.unwrap().json().await.unwrap();
        let pets = body.as_array().unwrap();
        assert!(!pets.is_empty());
        for pet in pets {
            assert!(pet["id"].is_i64());
            assert!(pet["name"].is_string());
        }
    }

    #[tokio::test]
    async fn composed_response_has_all_parts() {
        let server = petstore().await;

        let body: Value = server.get("/owners/7").await.unwrap().json().await.unwrap();
        assert!(body["email"].as_str().unwrap().contains('@'));
        assert_eq!(body["id"].as_str().unwrap().len(), 36);
        assert!(body["pets"].is_array());
    }

    #[tokio::test]
    async fn invalid_request_body_is_400() {
        let server = petstore().await;

        let resp = server.post("/pets", "{}").await.unwrap();
        assert_eq!(resp.status(), 400);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["message"], "Request failed to validate");
        let meta = body["error"]["meta"].as_array().unwrap();
        assert!(!meta.is_empty());
        assert_eq!(meta[0]["keyword"], "required");
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let server = petstore().await;

        let resp = server.post("/pets", "{\"name\":").await.unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["message"], "Request failed to validate");
    }

    #[tokio::test]
    async fn valid_request_gets_lowest_success_status() {
        let server = petstore().await;

        let resp = server.post("/pets", r#"{"name":"Rex"}"#).await.unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        assert!(body["id"].is_i64());
    }

    #[tokio::test]
    async fn no_content_operation() {
        let server = petstore().await;

        let resp = server
            .request(reqwest::Method::DELETE, "/pets/3")
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);
        assert!(resp.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let server = petstore().await;

        let resp = server.get("/nonexistent").await.unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.text().await.unwrap(), r#"{"error":{"message":"Not found"}}"#);
    }

    #[tokio::test]
    async fn wrong_method_is_404_with_allow() {
        let server = petstore().await;

        let resp = server
            .request(reqwest::Method::PATCH, "/pets")
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers()["allow"], "GET, POST");
    }

    #[tokio::test]
    async fn reserved_endpoints() {
        let server = petstore().await;

        let health: Value = server
            .get("/__apimock/health")
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health, serde_json::json!({"status": "healthy", "routes": 5}));

        let doc: Value = server
            .get("/__apimock/openapi.json")
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let show = &doc["paths"]["/pets/{petId}"]["get"];
        assert_eq!(show["parameters"][0]["name"], "petId");
        assert_eq!(
            show["responses"]["200"]["content"]["application/json"]["schema"]["key"],
            "Pet"
        );

        let resp = server.get("/__apimock/docs").await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.text().await.unwrap().contains("/__apimock/openapi.json"));
    }

    #[tokio::test]
    async fn duplicate_identifiers_keep_both_routes() {
        let server = TestServer::from_document(fixture("duplicate-ids.yaml"))
            .await
            .unwrap();

        let v1: Value = server.get("/v1/status").await.unwrap().json().await.unwrap();
        let v2: Value = server.get("/v2/status").await.unwrap().json().await.unwrap();
        assert_eq!(v1["version"], "v1");
        assert_eq!(v2["version"], "v2");
    }

    #[tokio::test]
    async fn strict_mode_refuses_to_start() {
        let config = ServerConfig {
            strict_operation_ids: true,
            ..ServerConfig::default()
        };
        let err = TestServer::with_config(fixture("duplicate-ids.yaml"), config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TestError::Startup(StartupError::Compile(_))));
    }

    #[tokio::test]
    async fn circular_document_refuses_to_start() {
        let err = TestServer::from_document(fixture("circular.yaml"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TestError::Startup(StartupError::Spec(_))));
    }

    #[tokio::test]
    async fn operation_override_replaces_mock() {
        let document = load_and_normalize(&fixture("petstore.yaml")).unwrap();
        let server = MockServer::builder(document, ServerConfig::default())
            .override_operation(
                "showPetById",
                handler(|req: RouteRequest| async move {
                    let id: i64 = req.param("petId").unwrap_or("0").parse().unwrap_or(0);
                    let body = serde_json::json!({"id": id, "name": "Fixed"});
                    Ok(json_response(reqwest::StatusCode::OK, body.to_string()))
                }),
            )
            .build()
            .unwrap();
        let server = TestServer::start(server).await.unwrap();

        let body: Value = server.get("/pets/9").await.unwrap().json().await.unwrap();
        assert_eq!(body, serde_json::json!({"id": 9, "name": "Fixed"}));
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let config = ServerConfig {
            max_body_size: 64,
            ..ServerConfig::default()
        };
        let server = TestServer::with_config(fixture("petstore.yaml"), config)
            .await
            .unwrap();

        let resp = server.post("/pets", r#"{"name":"Rex"}"#).await.unwrap();
        assert_eq!(resp.status(), 201);

        let name = "x".repeat(128);
        let resp = server
            .post("/pets", &format!(r#"{{"name":"{}"}}"#, name))
            .await
            .unwrap();
        assert_eq!(resp.status(), 413);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["message"], "request body exceeds 64 bytes");
    }

    #[tokio::test]
    async fn head_is_answered_by_get_route() {
        let server = petstore().await;

        let resp = server
            .request(reqwest::Method::HEAD, "/pets/1")
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn override_sees_decoded_params() {
        let document = load_and_normalize(&fixture("petstore.yaml")).unwrap();
        let server = MockServer::builder(document, ServerConfig::default())
            .override_operation(
                "showPetById",
                handler(|req: RouteRequest| async move {
                    let body = serde_json::json!({"petId": req.param("petId")});
                    Ok(json_response(reqwest::StatusCode::OK, body.to_string()))
                }),
            )
            .build()
            .unwrap();
        let server = TestServer::start(server).await.unwrap();

        let body: Value = server
            .get("/pets/hello%20world")
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"petId": "hello world"}));
    }

    #[tokio::test]
    async fn shutdown_stops_accepting() {
        let server = petstore().await;
        let url = server.base_url();
        server.shutdown().await.unwrap();

        assert!(reqwest::get(format!("{}/pets/1", url)).await.is_err());
    }
}
