//! The default handler: validate the request, then answer with a fake body.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde_json::Value;

use apimock_compiler::CompiledOperation;
use apimock_faker::Faker;
use apimock_telemetry::{log_generation_error, log_validation_failure};
use apimock_validator::ErrorResponse;

use crate::config::ServerConfig;
use crate::error::HandlerError;
use crate::server::{json_response, Handler, HandlerResult, RouteRequest};

/// Answers one operation with schema-conforming fake data.
pub struct MockHandler {
    operation: Arc<CompiledOperation>,
    faker: Arc<Faker>,
    timeout: Duration,
    dev_mode: bool,
}

impl MockHandler {
    pub fn new(operation: Arc<CompiledOperation>, faker: Arc<Faker>, config: &ServerConfig) -> Self {
        Self {
            operation,
            faker,
            timeout: config.generation_timeout,
            dev_mode: config.dev_mode,
        }
    }

    pub fn into_handler(self) -> Handler {
        let this = Arc::new(self);
        Arc::new(move |req| {
            let this = Arc::clone(&this);
            Box::pin(async move { this.handle(req).await })
        })
    }

    pub async fn handle(&self, req: RouteRequest) -> HandlerResult {
        let label = self.operation.operation.label();

        if let Some(validator) = &self.operation.request_validator {
            if let Err(faults) = validator.validate_body(req.content_type(), &req.body) {
                log_validation_failure!(operation = %label, faults = faults.len());
                return Ok(json_response(
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::validation_failed(faults).to_json(),
                ));
            }
        }

        let status = StatusCode::from_u16(self.operation.status()).unwrap_or(StatusCode::OK);
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = status;
            return Ok(response);
        }

        let Some(schema) = &self.operation.response_schema else {
            return Ok(json_response(status, "{}"));
        };

        let value = match self.generate().await {
            Ok(value) => value,
            Err(err) => {
                log_generation_error!(operation = %label, error = %err);
                return Err(err);
            }
        };

        if self.dev_mode {
            self.check_generated(&label, schema, &value);
        }

        let mut response = Response::new(Full::new(Bytes::from(serde_json::to_vec(&value)?)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, self.content_type());
        Ok(response)
    }

    /// Run the generator off the async runtime, bounded by the timeout.
    async fn generate(&self) -> Result<Value, HandlerError> {
        let operation = Arc::clone(&self.operation);
        let faker = Arc::clone(&self.faker);
        let task = tokio::task::spawn_blocking(move || match &operation.response_schema {
            Some(schema) => faker.fake(schema),
            None => Ok(Value::Object(serde_json::Map::new())),
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(HandlerError::Timeout(self.timeout)),
            Ok(Err(join)) => Err(HandlerError::Task(join.to_string())),
            Ok(Ok(result)) => result.map_err(HandlerError::from),
        }
    }

    /// Warn when a generated body does not satisfy its own schema.
    fn check_generated(&self, label: &str, schema: &Value, value: &Value) {
        let Some(validator) = &self.operation.response_validator else {
            tracing::debug!(operation = %label, "no response validator for schema");
            return;
        };
        if let Err(faults) = validator.validate_value(value) {
            tracing::warn!(
                operation = %label,
                faults = ?faults.iter().map(|f| f.message.as_str()).collect::<Vec<_>>(),
                schema = %schema,
                "generated response does not match its schema"
            );
        }
    }

    /// The declared response type when it is JSON-like, else plain JSON.
    fn content_type(&self) -> HeaderValue {
        self.operation
            .response_content_type()
            .filter(|ct| ct.contains("json"))
            .and_then(|ct| HeaderValue::from_str(ct).ok())
            .unwrap_or_else(|| HeaderValue::from_static("application/json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apimock_compiler::{compile, CompileOptions};
    use apimock_spec::parse_and_normalize;
    use http_body_util::BodyExt;
    use hyper::header::HeaderMap;
    use hyper::Method;

    const PETS: &str = r#"
openapi: 3.0.3
info: { title: Pets, version: "1" }
paths:
  /pets:
    post:
      operationId: createPet
      requestBody:
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: { type: string }
      responses:
        "201":
          content:
            application/vnd.pets+json:
              schema:
                type: object
                required: [id, name]
                properties:
                  id: { type: integer }
                  name: { type: string }
  /pets/{id}:
    delete:
      operationId: deletePet
      responses:
        "204": { description: gone }
  /ping:
    get:
      operationId: ping
      responses:
        "200": { description: pong }
"#;

    fn handler_for(id: &str, config: &ServerConfig) -> MockHandler {
        let doc = parse_and_normalize(PETS).unwrap();
        let result = compile(&doc, &CompileOptions::default()).unwrap();
        let operation = result
            .operations
            .into_iter()
            .find(|op| op.operation.operation_id.as_deref() == Some(id))
            .unwrap();
        MockHandler::new(
            Arc::new(operation),
            Arc::new(Faker::new(config.faker.clone())),
            config,
        )
    }

    fn request(method: Method, body: &str) -> RouteRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        RouteRequest {
            method,
            path: "/pets".into(),
            query: None,
            params: Vec::new(),
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    async fn json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn invalid_body_is_rejected() {
        let handler = handler_for("createPet", &ServerConfig::default());
        let response = handler.handle(request(Method::POST, "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["error"]["message"], "Request failed to validate");
        assert!(!body["error"]["meta"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_body_gets_generated_response() {
        let config = ServerConfig {
            dev_mode: true,
            ..ServerConfig::default()
        };
        let handler = handler_for("createPet", &config);
        let response = handler
            .handle(request(Method::POST, r#"{"name":"Rex"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/vnd.pets+json"
        );
        let body = json(response).await;
        assert!(body["id"].is_i64());
        assert!(body["name"].is_string());
    }

    #[tokio::test]
    async fn no_content_has_empty_body() {
        let handler = handler_for("deletePet", &ServerConfig::default());
        let response = handler.handle(request(Method::DELETE, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn missing_schema_answers_empty_object() {
        let handler = handler_for("ping", &ServerConfig::default());
        let response = handler.handle(request(Method::GET, "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn generation_over_budget_is_timeout() {
        let config = ServerConfig {
            generation_timeout: Duration::ZERO,
            ..ServerConfig::default()
        };
        let handler = handler_for("createPet", &config);
        let err = handler
            .handle(request(Method::POST, r#"{"name":"Rex"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Timeout(budget) if budget.is_zero()), "got {:?}", err);
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
