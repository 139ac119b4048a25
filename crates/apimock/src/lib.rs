//! apimock server library.
//!
//! Builds an HTTP mock server from an OpenAPI 3.x document. The `apimock`
//! binary is a thin CLI over [`MockServer`].

pub mod app;
pub mod config;
pub mod docs;
pub mod error;
pub mod mock;
pub mod routes;
pub mod server;

pub use app::{MockServer, MockServerBuilder};
pub use config::{ServerConfig, DEFAULT_MAX_BODY_SIZE, DEFAULT_PORT};
pub use error::{HandlerError, StartupError};
pub use apimock_router::template_to_pattern;
pub use server::{handler, json_response, Dispatcher, Handler, HandlerResult, RouteRequest};
