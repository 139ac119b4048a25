//! Test harness for apimock servers.
//!
//! Provides `TestServer` for full-stack tests over real HTTP, with the
//! server running in-process.

pub mod server;

pub use server::{fixture, TestError, TestServer};
