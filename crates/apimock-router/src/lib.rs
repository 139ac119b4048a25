//! Prefix-trie HTTP request router.
//!
//! Stores handlers under express-style patterns (`/pets/:id`, `/assets/*path`)
//! with per-method entries. Supports path parameter capture, static-over-param
//! precedence, trailing wildcards, and request path normalization.

pub mod trie;

pub use trie::{normalize_path, pattern_shape, template_to_pattern, RouteMatch, Router};
