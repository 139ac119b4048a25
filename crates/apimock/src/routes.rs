//! Turns compiled operations into dispatcher routes.

use std::collections::HashMap;
use std::sync::Arc;

use apimock_compiler::CompiledOperation;
use apimock_faker::Faker;
use apimock_router::template_to_pattern;
use apimock_telemetry::log_route_registered;

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::mock::MockHandler;
use crate::server::{Dispatcher, Handler};

/// Handlers registered for each operation identifier.
#[derive(Default)]
pub struct OperationTable {
    by_id: HashMap<String, Handler>,
}

impl OperationTable {
    pub fn get(&self, id: &str) -> Option<&Handler> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }
}

/// Register one route per operation.
///
/// An operation whose identifier appears in `overrides` is served by that
/// handler instead of the generated mock. Every override must be consumed.
pub fn synthesize(
    dispatcher: &mut Dispatcher,
    operations: Vec<CompiledOperation>,
    config: &ServerConfig,
    mut overrides: HashMap<String, Handler>,
) -> Result<OperationTable, StartupError> {
    let faker = Arc::new(Faker::new(config.faker.clone()));
    let mut table = OperationTable::default();

    for compiled in operations {
        let pattern = template_to_pattern(&compiled.operation.path);
        let method = compiled.operation.method.clone();
        let id = compiled.operation.identifier().map(str::to_string);

        let custom = id.as_deref().and_then(|id| overrides.get(id).cloned());
        let overridden = custom.is_some();
        let handler = match custom {
            Some(handler) => handler,
            None => MockHandler::new(Arc::new(compiled), Arc::clone(&faker), config).into_handler(),
        };

        if dispatcher
            .route(&method, &pattern, Arc::clone(&handler))
            .is_some()
        {
            tracing::warn!(method = %method, pattern = %pattern, "route replaced an earlier registration");
        }

        log_route_registered!(
            method = %method,
            pattern = %pattern,
            operation = id.as_deref().unwrap_or("-"),
            overridden,
            "{} {} ({})",
            method,
            pattern,
            id.as_deref().unwrap_or("anonymous")
        );

        if let Some(id) = id {
            // A later operation with the same identifier wins the table slot.
            table.by_id.insert(id, handler);
        }
    }

    for id in table.by_id.keys() {
        overrides.remove(id);
    }
    if let Some(unknown) = overrides.into_keys().min() {
        return Err(StartupError::UnknownOverride(unknown));
    }

    Ok(table)
}
