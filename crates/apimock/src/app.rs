//! Startup: document → compiled operations → a ready dispatcher.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;

use apimock_compiler::{compile, CompileOptions, CompileWarning};
use apimock_spec::{load_and_normalize, Document};
use apimock_telemetry::{log_compile_warning, log_document_loaded};

use crate::config::ServerConfig;
use crate::docs;
use crate::error::StartupError;
use crate::routes::{self, OperationTable};
use crate::server::{Dispatcher, Handler};

/// A fully assembled mock server, not yet listening.
pub struct MockServer {
    dispatcher: Arc<Dispatcher>,
    operations: OperationTable,
    warnings: Vec<CompileWarning>,
    operation_routes: usize,
}

impl MockServer {
    /// Load, normalize and compile the document at `path`.
    pub fn load(path: &Path, config: ServerConfig) -> Result<Self, StartupError> {
        let document = load_and_normalize(path)?;
        log_document_loaded!(
            path = %path.display(),
            title = document.title().unwrap_or("-"),
            paths = document.paths().count()
        );
        Self::builder(document, config).build()
    }

    pub fn builder(document: Document, config: ServerConfig) -> MockServerBuilder {
        MockServerBuilder {
            document,
            config,
            overrides: HashMap::new(),
        }
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Handlers by operation identifier.
    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    /// Number of routes generated from the document.
    pub fn operation_routes(&self) -> usize {
        self.operation_routes
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        self.dispatcher.serve(listener, shutdown).await
    }
}

/// Collects operation overrides before the server is assembled.
pub struct MockServerBuilder {
    document: Document,
    config: ServerConfig,
    overrides: HashMap<String, Handler>,
}

impl MockServerBuilder {
    /// Serve the operation identified by `id` (operationId, else summary)
    /// with `handler` instead of generated data.
    pub fn override_operation(mut self, id: impl Into<String>, handler: Handler) -> Self {
        self.overrides.insert(id.into(), handler);
        self
    }

    pub fn build(self) -> Result<MockServer, StartupError> {
        let options = CompileOptions {
            strict_operation_ids: self.config.strict_operation_ids,
        };
        let result = compile(&self.document, &options)?;

        for warning in &result.warnings {
            log_compile_warning!(
                code = %warning.code,
                location = warning.location.as_deref().unwrap_or("-"),
                "{}",
                warning.message
            );
        }

        let mut dispatcher = Dispatcher::new(self.config.dev_mode)
            .with_max_body_size(self.config.max_body_size);
        let operations = routes::synthesize(
            &mut dispatcher,
            result.operations,
            &self.config,
            self.overrides,
        )?;
        let operation_routes = dispatcher.route_count();

        docs::register(
            &mut dispatcher,
            &self.document,
            operation_routes,
            self.config.assets_dir.as_deref(),
        );

        Ok(MockServer {
            dispatcher: Arc::new(dispatcher),
            operations,
            warnings: result.warnings,
            operation_routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apimock_compiler::CompileError;
    use apimock_spec::parse_and_normalize;

    const DUPLICATES: &str = r#"
openapi: 3.0.3
info: { title: Dupes, version: "1" }
paths:
  /a:
    get:
      operationId: same
      responses: { "200": { description: ok } }
  /b:
    get:
      operationId: same
      responses: { "200": { description: ok } }
"#;

    #[test]
    fn duplicate_ids_warn_but_serve_both() {
        let doc = parse_and_normalize(DUPLICATES).unwrap();
        let server = MockServer::builder(doc, ServerConfig::default())
            .build()
            .unwrap();
        assert_eq!(server.operation_routes(), 2);
        assert_eq!(server.warnings().len(), 1);
        assert_eq!(server.warnings()[0].code, "W2001");
        // Health, openapi.json and docs are added on top.
        assert_eq!(server.dispatcher().route_count(), 5);
    }

    #[test]
    fn strict_mode_rejects_duplicate_ids() {
        let doc = parse_and_normalize(DUPLICATES).unwrap();
        let config = ServerConfig {
            strict_operation_ids: true,
            ..ServerConfig::default()
        };
        let err = MockServer::builder(doc, config).build().err().unwrap();
        assert!(matches!(
            err,
            StartupError::Compile(CompileError::DuplicateOperationId(..))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = MockServer::load(Path::new("/nonexistent/api.yaml"), ServerConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, StartupError::Spec(_)));
    }
}
